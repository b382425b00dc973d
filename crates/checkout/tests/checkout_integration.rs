//! End-to-end checkout flows against the in-memory store.
//!
//! Carts, conversion, cancellation and payment reconciliation are driven
//! through [`CheckoutEngine`] exactly as the HTTP layer drives them.

use std::sync::Arc;

use checkout::{
    CheckoutConfig, CheckoutEngine, CheckoutError, InMemoryPaymentGateway, PaymentGateway,
};
use domain::{
    Buyer, BuyerId, DeliveryInfo, InMemoryBuyerDirectory, InMemoryCatalog, Money, OptionId,
    OrderStatus, OrderToken, PaymentMethod, PaymentStatus, Product, ProductId, ProductOption,
    SellerId, StockKey,
};
use event_store::{AppendOptions, EventEnvelope, EventStore, InMemoryEventStore, Version};

const MUG: &str = "P-MUG";
const TEE: &str = "P-TEE";
const TEE_XL: &str = "OPT-TEE-XL";

struct Fixture {
    engine: CheckoutEngine<InMemoryEventStore>,
    store: InMemoryEventStore,
    catalog: InMemoryCatalog,
    buyers: InMemoryBuyerDirectory,
    gateway: InMemoryPaymentGateway,
}

impl Fixture {
    async fn new() -> Self {
        Self::with_gateway(|gateway| Arc::new(gateway) as Arc<dyn PaymentGateway>).await
    }

    /// Lets a test put its own gateway in front of the in-memory one.
    async fn with_gateway(
        wrap: impl FnOnce(InMemoryPaymentGateway) -> Arc<dyn PaymentGateway>,
    ) -> Self {
        let store = InMemoryEventStore::new();
        let catalog = InMemoryCatalog::new();
        let buyers = InMemoryBuyerDirectory::new();
        let gateway = InMemoryPaymentGateway::new();

        catalog.upsert_product(mug()).await;
        catalog.upsert_product(tee()).await;

        let engine = CheckoutEngine::new(
            store.clone(),
            Arc::new(catalog.clone()),
            Arc::new(buyers.clone()),
            wrap(gateway.clone()),
            CheckoutConfig::default(),
        );

        Self {
            engine,
            store,
            catalog,
            buyers,
            gateway,
        }
    }

    async fn buyer(&self) -> BuyerId {
        let id = BuyerId::new();
        self.buyers
            .register(Buyer {
                id,
                name: "Kim".to_string(),
                email: format!("{id}@example.com"),
            })
            .await;
        id
    }

    async fn stock(&self, key: &StockKey, quantity: u32) {
        self.engine.inventory.receive(key, quantity).await.unwrap();
    }

    async fn available(&self, key: &StockKey) -> u32 {
        self.engine.inventory.available(key).await.unwrap()
    }

    async fn add(&self, buyer: BuyerId, product: &str, option: Option<&str>, quantity: u32) {
        self.engine
            .cart
            .add_line(
                buyer,
                ProductId::new(product),
                option.map(OptionId::new),
                quantity,
            )
            .await
            .unwrap();
    }
}

fn mug() -> Product {
    Product {
        id: ProductId::new(MUG),
        name: "Mug".to_string(),
        seller_id: SellerId::new(),
        price: Money::new(12_000),
        discount_rate: 0,
        options: vec![],
    }
}

fn tee() -> Product {
    Product {
        id: ProductId::new(TEE),
        name: "T-shirt".to_string(),
        seller_id: SellerId::new(),
        price: Money::new(20_000),
        discount_rate: 10,
        options: vec![
            ProductOption {
                id: OptionId::new(TEE_XL),
                product_id: ProductId::new(TEE),
                option_type: "size".to_string(),
                option_value: "XL".to_string(),
                additional_price: Money::new(2_000),
                display_order: 1,
                active: true,
            },
            ProductOption {
                id: OptionId::new("OPT-TEE-XS"),
                product_id: ProductId::new(TEE),
                option_type: "size".to_string(),
                option_value: "XS".to_string(),
                additional_price: Money::zero(),
                display_order: 0,
                active: false,
            },
        ],
    }
}

fn mug_key() -> StockKey {
    StockKey::Product(ProductId::new(MUG))
}

fn xl_key() -> StockKey {
    StockKey::Option(OptionId::new(TEE_XL))
}

fn delivery() -> DeliveryInfo {
    DeliveryInfo {
        recipient_name: "Kim".to_string(),
        recipient_phone: "010-1234-5678".to_string(),
        address: "Seoul, Gangnam-gu".to_string(),
        message: Some("Leave at the door".to_string()),
    }
}

mod cart {
    use super::*;

    #[tokio::test]
    async fn adding_the_same_product_merges_lines() {
        let fx = Fixture::new().await;
        let buyer = fx.buyer().await;
        fx.stock(&mug_key(), 10).await;

        fx.add(buyer, MUG, None, 2).await;
        fx.add(buyer, MUG, None, 3).await;

        let cart = fx.engine.cart.get_cart(buyer).await.unwrap();
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 5);
        assert_eq!(cart.total, Money::new(60_000));
    }

    #[tokio::test]
    async fn quantity_above_stock_is_rejected() {
        let fx = Fixture::new().await;
        let buyer = fx.buyer().await;
        fx.stock(&mug_key(), 3).await;

        let result = fx
            .engine
            .cart
            .add_line(buyer, ProductId::new(MUG), None, 4)
            .await;

        assert!(matches!(
            result,
            Err(CheckoutError::OutOfStock {
                requested: 4,
                available: 3,
                ..
            })
        ));
        assert_eq!(fx.engine.cart.line_count(buyer).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn inactive_option_is_unavailable() {
        let fx = Fixture::new().await;
        let buyer = fx.buyer().await;

        let result = fx
            .engine
            .cart
            .add_line(
                buyer,
                ProductId::new(TEE),
                Some(OptionId::new("OPT-TEE-XS")),
                1,
            )
            .await;

        assert!(matches!(result, Err(CheckoutError::OptionUnavailable { .. })));
    }

    #[tokio::test]
    async fn option_of_another_product_is_unavailable() {
        let fx = Fixture::new().await;
        let buyer = fx.buyer().await;

        let result = fx
            .engine
            .cart
            .add_line(buyer, ProductId::new(MUG), Some(OptionId::new(TEE_XL)), 1)
            .await;

        assert!(matches!(result, Err(CheckoutError::OptionUnavailable { .. })));
    }

    #[tokio::test]
    async fn unknown_buyer_and_product_are_rejected() {
        let fx = Fixture::new().await;

        let result = fx
            .engine
            .cart
            .add_line(BuyerId::new(), ProductId::new(MUG), None, 1)
            .await;
        assert!(matches!(result, Err(CheckoutError::BuyerNotFound(_))));

        let buyer = fx.buyer().await;
        let result = fx
            .engine
            .cart
            .add_line(buyer, ProductId::new("P-NOPE"), None, 1)
            .await;
        assert!(matches!(result, Err(CheckoutError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn set_quantity_and_remove_line() {
        let fx = Fixture::new().await;
        let buyer = fx.buyer().await;
        fx.stock(&mug_key(), 10).await;
        fx.stock(&xl_key(), 10).await;
        fx.add(buyer, MUG, None, 1).await;
        fx.add(buyer, TEE, Some(TEE_XL), 1).await;

        let cart = fx.engine.cart.get_cart(buyer).await.unwrap();
        let mug_line = cart.lines[0].line_id;
        let tee_line = cart.lines[1].line_id;

        let cart = fx
            .engine
            .cart
            .set_quantity(buyer, mug_line, 4)
            .await
            .unwrap();
        assert_eq!(cart.lines[0].quantity, 4);

        let zero = fx.engine.cart.set_quantity(buyer, mug_line, 0).await;
        assert!(matches!(zero, Err(CheckoutError::InvalidQuantity(_))));

        let cart = fx.engine.cart.remove_line(buyer, tee_line).await.unwrap();
        assert_eq!(cart.lines.len(), 1);

        let missing = fx.engine.cart.remove_line(buyer, tee_line).await;
        assert!(matches!(missing, Err(CheckoutError::CartLineNotFound(_))));
    }

    #[tokio::test]
    async fn cart_shows_live_prices_and_option_labels() {
        let fx = Fixture::new().await;
        let buyer = fx.buyer().await;
        fx.stock(&xl_key(), 5).await;
        fx.add(buyer, TEE, Some(TEE_XL), 2).await;

        let cart = fx.engine.cart.get_cart(buyer).await.unwrap();
        assert_eq!(cart.lines[0].unit_price, Money::new(20_000));
        assert_eq!(cart.lines[0].option_label.as_deref(), Some("size: XL"));
        assert_eq!(cart.lines[0].available, 5);

        fx.catalog
            .reprice(&ProductId::new(TEE), Money::new(30_000), 0)
            .await;

        let cart = fx.engine.cart.get_cart(buyer).await.unwrap();
        assert_eq!(cart.lines[0].unit_price, Money::new(32_000));
        assert_eq!(cart.total, Money::new(64_000));
    }
}

mod conversion {
    use super::*;

    #[tokio::test]
    async fn cart_becomes_pending_order() {
        let fx = Fixture::new().await;
        let buyer = fx.buyer().await;
        fx.stock(&mug_key(), 10).await;
        fx.stock(&xl_key(), 5).await;
        fx.add(buyer, MUG, None, 2).await;
        fx.add(buyer, TEE, Some(TEE_XL), 1).await;

        let order_id = fx
            .engine
            .lifecycle
            .create_order(buyer, delivery())
            .await
            .unwrap();

        let order = fx.engine.lifecycle.get_order(order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.buyer_id, buyer);
        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.lines[1].line.unit_price, Money::new(20_000));
        assert_eq!(
            order.lines[1]
                .line
                .option
                .as_ref()
                .map(|o| o.label.as_str()),
            Some("size: XL")
        );
        assert_eq!(order.total, Money::new(44_000));
        assert!(order.payment.is_none());

        assert_eq!(fx.available(&mug_key()).await, 8);
        assert_eq!(fx.available(&xl_key()).await, 4);
        assert_eq!(fx.engine.cart.line_count(buyer).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let fx = Fixture::new().await;
        let buyer = fx.buyer().await;

        let result = fx.engine.lifecycle.create_order(buyer, delivery()).await;

        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
    }

    #[tokio::test]
    async fn unknown_buyer_is_rejected() {
        let fx = Fixture::new().await;

        let result = fx
            .engine
            .lifecycle
            .create_order(BuyerId::new(), delivery())
            .await;

        assert!(matches!(result, Err(CheckoutError::BuyerNotFound(_))));
    }

    #[tokio::test]
    async fn missing_delivery_field_writes_nothing() {
        let fx = Fixture::new().await;
        let buyer = fx.buyer().await;
        fx.stock(&mug_key(), 10).await;
        fx.add(buyer, MUG, None, 1).await;
        let events_before = fx.store.event_count().await;

        let mut delivery = delivery();
        delivery.address = "  ".to_string();
        let result = fx.engine.lifecycle.create_order(buyer, delivery).await;

        assert!(matches!(result, Err(CheckoutError::InvalidInput(_))));
        assert_eq!(fx.store.event_count().await, events_before);
        assert_eq!(fx.available(&mug_key()).await, 10);
    }

    #[tokio::test]
    async fn shortage_on_any_line_aborts_the_whole_conversion() {
        let fx = Fixture::new().await;
        let first = fx.buyer().await;
        let second = fx.buyer().await;
        fx.stock(&mug_key(), 10).await;
        fx.stock(&xl_key(), 1).await;

        fx.add(second, MUG, None, 2).await;
        fx.add(second, TEE, Some(TEE_XL), 1).await;
        fx.add(first, TEE, Some(TEE_XL), 1).await;
        fx.engine
            .lifecycle
            .create_order(first, delivery())
            .await
            .unwrap();
        let events_before = fx.store.event_count().await;

        let result = fx.engine.lifecycle.create_order(second, delivery()).await;

        match result {
            Err(CheckoutError::OutOfStock {
                item,
                product_name,
                requested,
                available,
            }) => {
                assert_eq!(item, xl_key());
                assert_eq!(product_name, "T-shirt");
                assert_eq!(requested, 1);
                assert_eq!(available, 0);
            }
            other => panic!("expected OutOfStock, got {other:?}"),
        }

        assert_eq!(fx.store.event_count().await, events_before);
        assert_eq!(fx.available(&mug_key()).await, 10);
        assert_eq!(fx.engine.cart.line_count(second).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn order_keeps_prices_from_placement() {
        let fx = Fixture::new().await;
        let buyer = fx.buyer().await;
        fx.stock(&mug_key(), 10).await;
        fx.add(buyer, MUG, None, 3).await;

        let order_id = fx
            .engine
            .lifecycle
            .create_order(buyer, delivery())
            .await
            .unwrap();
        fx.catalog
            .reprice(&ProductId::new(MUG), Money::new(99_000), 50)
            .await;

        let order = fx.engine.lifecycle.get_order(order_id).await.unwrap();
        assert_eq!(order.lines[0].line.unit_price, Money::new(12_000));
        assert_eq!(order.lines[0].line_total, Money::new(36_000));
        assert_eq!(order.total, Money::new(36_000));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checkouts_never_oversell() {
        let fx = Arc::new(Fixture::new().await);
        fx.stock(&mug_key(), 5).await;

        let mut buyers = Vec::new();
        for _ in 0..20 {
            let buyer = fx.buyer().await;
            fx.add(buyer, MUG, None, 1).await;
            buyers.push(buyer);
        }

        let handles: Vec<_> = buyers
            .into_iter()
            .map(|buyer| {
                let fx = fx.clone();
                tokio::spawn(async move { fx.engine.lifecycle.create_order(buyer, delivery()).await })
            })
            .collect();

        let mut placed = 0;
        let mut out_of_stock = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => placed += 1,
                Err(CheckoutError::OutOfStock { .. }) => out_of_stock += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(placed, 5);
        assert_eq!(out_of_stock, 15);
        assert_eq!(fx.available(&mug_key()).await, 0);
    }
}

mod lifecycle {
    use super::*;

    async fn placed_order(fx: &Fixture) -> common::AggregateId {
        let buyer = fx.buyer().await;
        fx.stock(&mug_key(), 10).await;
        fx.add(buyer, MUG, None, 4).await;
        fx.engine
            .lifecycle
            .create_order(buyer, delivery())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn cancelling_restores_stock() {
        let fx = Fixture::new().await;
        let order_id = placed_order(&fx).await;
        assert_eq!(fx.available(&mug_key()).await, 6);

        let order = fx
            .engine
            .lifecycle
            .cancel_order(order_id, "Changed my mind")
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(
            order.cancellation.as_ref().map(|c| c.reason.as_str()),
            Some("Changed my mind")
        );
        assert_eq!(fx.available(&mug_key()).await, 10);
    }

    #[tokio::test]
    async fn second_cancel_is_rejected_without_double_release() {
        let fx = Fixture::new().await;
        let order_id = placed_order(&fx).await;

        fx.engine
            .lifecycle
            .cancel_order(order_id, "first")
            .await
            .unwrap();
        let again = fx.engine.lifecycle.cancel_order(order_id, "second").await;

        assert!(matches!(again, Err(CheckoutError::OrderAlreadyCancelled)));
        assert_eq!(fx.available(&mug_key()).await, 10);
    }

    #[tokio::test]
    async fn shipped_orders_cannot_be_cancelled() {
        let fx = Fixture::new().await;
        let order_id = placed_order(&fx).await;

        for status in [
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Shipped,
        ] {
            fx.engine
                .lifecycle
                .update_order_status(order_id, status)
                .await
                .unwrap();
        }

        let result = fx.engine.lifecycle.cancel_order(order_id, "too late").await;

        assert!(matches!(
            result,
            Err(CheckoutError::OrderCannotCancel {
                status: OrderStatus::Shipped
            })
        ));
        assert_eq!(fx.available(&mug_key()).await, 6);
    }

    #[tokio::test]
    async fn delivered_orders_are_terminal() {
        let fx = Fixture::new().await;
        let order_id = placed_order(&fx).await;

        let order = fx
            .engine
            .lifecycle
            .update_order_status(order_id, OrderStatus::Delivered)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);

        let update = fx
            .engine
            .lifecycle
            .update_order_status(order_id, OrderStatus::Shipped)
            .await;
        assert!(matches!(
            update,
            Err(CheckoutError::OrderCannotUpdate {
                status: OrderStatus::Delivered
            })
        ));

        let cancel = fx.engine.lifecycle.cancel_order(order_id, "no").await;
        assert!(matches!(cancel, Err(CheckoutError::OrderCannotCancel { .. })));
    }

    #[tokio::test]
    async fn backward_moves_are_rejected() {
        let fx = Fixture::new().await;
        let order_id = placed_order(&fx).await;
        fx.engine
            .lifecycle
            .update_order_status(order_id, OrderStatus::Preparing)
            .await
            .unwrap();

        let result = fx
            .engine
            .lifecycle
            .update_order_status(order_id, OrderStatus::Confirmed)
            .await;

        assert!(matches!(
            result,
            Err(CheckoutError::InvalidTransition {
                from: OrderStatus::Preparing,
                to: OrderStatus::Confirmed
            })
        ));
    }

    #[tokio::test]
    async fn administrative_cancel_releases_stock() {
        let fx = Fixture::new().await;
        let order_id = placed_order(&fx).await;

        let order = fx
            .engine
            .lifecycle
            .update_order_status(order_id, OrderStatus::Cancelled)
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(fx.available(&mug_key()).await, 10);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let fx = Fixture::new().await;
        let missing = common::AggregateId::new();

        assert!(matches!(
            fx.engine.lifecycle.get_order(missing).await,
            Err(CheckoutError::OrderNotFound(_))
        ));
        assert!(matches!(
            fx.engine.lifecycle.cancel_order(missing, "x").await,
            Err(CheckoutError::OrderNotFound(_))
        ));
    }
}

mod payment {
    use std::sync::{Mutex, OnceLock};

    use async_trait::async_trait;
    use checkout::{
        ConfirmRequest, GatewayError, OrderLifecycle, PaymentApproval, PaymentCancellation,
    };
    use common::AggregateId;
    use domain::OrderView;

    use super::*;

    async fn payment_order(fx: &Fixture) -> checkout::PaymentRequest {
        let buyer = fx.buyer().await;
        fx.stock(&mug_key(), 10).await;
        fx.stock(&xl_key(), 10).await;
        fx.add(buyer, MUG, None, 1).await;
        fx.add(buyer, TEE, Some(TEE_XL), 2).await;
        fx.engine
            .lifecycle
            .create_order_for_payment(buyer, delivery())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn placement_returns_widget_data() {
        let fx = Fixture::new().await;

        let request = payment_order(&fx).await;

        assert_eq!(request.amount, Money::new(52_000));
        assert_eq!(request.order_name, "Mug and 1 more");
        assert_eq!(request.order_id, request.token.order_id());

        let order = fx.engine.lifecycle.get_order(request.order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(
            order.payment.as_ref().map(|p| p.status),
            Some(PaymentStatus::Ready)
        );
        assert_eq!(fx.available(&xl_key()).await, 8);
    }

    #[tokio::test]
    async fn confirmed_payment_confirms_the_order() {
        let fx = Fixture::new().await;
        let request = payment_order(&fx).await;

        fx.engine
            .payments
            .request_authorization(request.token)
            .await
            .unwrap();
        let order = fx
            .engine
            .payments
            .confirm_payment("pay_123", request.token, request.amount)
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Confirmed);
        let payment = order.payment.unwrap();
        assert_eq!(payment.status, PaymentStatus::Done);
        assert_eq!(payment.payment_key.as_deref(), Some("pay_123"));
        assert_eq!(payment.method, Some(PaymentMethod::Card));
        assert!(fx.gateway.is_captured("pay_123").await);
    }

    #[tokio::test]
    async fn replayed_confirmation_is_ignored() {
        let fx = Fixture::new().await;
        let request = payment_order(&fx).await;

        let first = fx
            .engine
            .payments
            .confirm_payment("pay_1", request.token, request.amount)
            .await
            .unwrap();
        let second = fx
            .engine
            .payments
            .confirm_payment("pay_1", request.token, request.amount)
            .await
            .unwrap();

        assert_eq!(first.version, second.version);
        assert_eq!(fx.gateway.confirm_calls().await, 1);
    }

    #[tokio::test]
    async fn amount_mismatch_changes_nothing() {
        let fx = Fixture::new().await;
        let request = payment_order(&fx).await;
        let events_before = fx.store.event_count().await;

        let result = fx
            .engine
            .payments
            .confirm_payment("pay_1", request.token, Money::new(1_000))
            .await;

        assert!(matches!(
            result,
            Err(CheckoutError::PaymentAmountMismatch { expected, actual })
                if expected == request.amount && actual == Money::new(1_000)
        ));
        assert_eq!(fx.gateway.confirm_calls().await, 0);
        assert_eq!(fx.store.event_count().await, events_before);
    }

    #[tokio::test]
    async fn gateway_rejection_cancels_and_releases() {
        let fx = Fixture::new().await;
        let request = payment_order(&fx).await;
        fx.gateway.set_fail_on_confirm(true).await;

        let result = fx
            .engine
            .payments
            .confirm_payment("pay_1", request.token, request.amount)
            .await;

        assert!(matches!(result, Err(CheckoutError::Gateway(_))));

        let order = fx.engine.lifecycle.get_order(request.order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(
            order.payment.as_ref().map(|p| p.status),
            Some(PaymentStatus::Failed)
        );
        assert_eq!(fx.available(&mug_key()).await, 10);
        assert_eq!(fx.available(&xl_key()).await, 10);
    }

    #[tokio::test]
    async fn status_changes_wait_for_payment() {
        let fx = Fixture::new().await;
        let request = payment_order(&fx).await;

        let result = fx
            .engine
            .lifecycle
            .update_order_status(request.order_id, OrderStatus::Preparing)
            .await;

        assert!(matches!(
            result,
            Err(CheckoutError::AwaitingPayment {
                status: PaymentStatus::Ready
            })
        ));
    }

    #[tokio::test]
    async fn authorization_failure_keeps_the_reservation() {
        let fx = Fixture::new().await;
        let request = payment_order(&fx).await;

        let order = fx
            .engine
            .payments
            .record_authorization_failure(request.token, "USER_CANCEL", "closed the widget")
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        let payment = order.payment.unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(
            payment.failure.map(|f| f.code),
            Some("USER_CANCEL".to_string())
        );
        assert_eq!(fx.available(&mug_key()).await, 9);

        // The buyer may try again.
        let order = fx
            .engine
            .payments
            .confirm_payment("pay_2", request.token, request.amount)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn cancelling_a_paid_order_refunds_it() {
        let fx = Fixture::new().await;
        let request = payment_order(&fx).await;
        fx.engine
            .payments
            .confirm_payment("pay_9", request.token, request.amount)
            .await
            .unwrap();

        let order = fx
            .engine
            .lifecycle
            .cancel_order(request.order_id, "Buyer request")
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(
            order.payment.as_ref().map(|p| p.status),
            Some(PaymentStatus::Canceled)
        );
        assert_eq!(fx.gateway.cancelled_keys().await, vec!["pay_9".to_string()]);
        assert_eq!(fx.available(&xl_key()).await, 10);
    }

    /// Ships the order from inside the refund call, the way a concurrent
    /// admin request would land while the gateway is working.
    struct ShipsDuringRefund {
        inner: InMemoryPaymentGateway,
        lifecycle: OnceLock<Arc<OrderLifecycle<InMemoryEventStore>>>,
        order_id: OnceLock<AggregateId>,
        interleaved: Mutex<Option<checkout::Result<OrderView>>>,
    }

    #[async_trait]
    impl PaymentGateway for ShipsDuringRefund {
        async fn confirm(
            &self,
            request: ConfirmRequest,
        ) -> Result<PaymentApproval, GatewayError> {
            self.inner.confirm(request).await
        }

        async fn cancel(
            &self,
            payment_key: &str,
            reason: &str,
        ) -> Result<PaymentCancellation, GatewayError> {
            let lifecycle = self.lifecycle.get().expect("lifecycle wired");
            let order_id = *self.order_id.get().expect("order id set");
            let shipped = lifecycle
                .update_order_status(order_id, OrderStatus::Shipped)
                .await;
            *self.interleaved.lock().unwrap() = Some(shipped);
            self.inner.cancel(payment_key, reason).await
        }
    }

    #[tokio::test]
    async fn status_change_during_refund_is_refused() {
        let gateway = OnceLock::new();
        let fx = Fixture::with_gateway(|inner| {
            let double = Arc::new(ShipsDuringRefund {
                inner,
                lifecycle: OnceLock::new(),
                order_id: OnceLock::new(),
                interleaved: Mutex::new(None),
            });
            let _ = gateway.set(double.clone());
            double as Arc<dyn PaymentGateway>
        })
        .await;
        let double = gateway.get().expect("gateway built");
        let _ = double.lifecycle.set(fx.engine.lifecycle.clone());

        let request = payment_order(&fx).await;
        let _ = double.order_id.set(request.order_id);
        fx.engine
            .payments
            .confirm_payment("pay_9", request.token, request.amount)
            .await
            .unwrap();

        let order = fx
            .engine
            .lifecycle
            .cancel_order(request.order_id, "Buyer request")
            .await
            .unwrap();

        let interleaved = double.interleaved.lock().unwrap().take();
        assert!(matches!(
            interleaved,
            Some(Err(CheckoutError::RefundPending {
                status: PaymentStatus::CancelPending
            }))
        ));
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(
            order.payment.as_ref().map(|p| p.status),
            Some(PaymentStatus::Canceled)
        );
        assert_eq!(fx.gateway.cancelled_keys().await, vec!["pay_9".to_string()]);
        assert_eq!(fx.available(&xl_key()).await, 10);
    }

    #[tokio::test]
    async fn paid_order_can_advance_after_a_failed_refund() {
        let fx = Fixture::new().await;
        let request = payment_order(&fx).await;
        fx.engine
            .payments
            .confirm_payment("pay_9", request.token, request.amount)
            .await
            .unwrap();
        fx.gateway.set_fail_on_cancel(true).await;

        let result = fx
            .engine
            .lifecycle
            .cancel_order(request.order_id, "Buyer request")
            .await;
        assert!(matches!(result, Err(CheckoutError::Gateway(_))));

        let order = fx
            .engine
            .lifecycle
            .update_order_status(request.order_id, OrderStatus::Shipped)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(
            order.payment.as_ref().map(|p| p.status),
            Some(PaymentStatus::Done)
        );
    }

    #[tokio::test]
    async fn failed_refund_leaves_the_order_untouched() {
        let fx = Fixture::new().await;
        let request = payment_order(&fx).await;
        fx.engine
            .payments
            .confirm_payment("pay_9", request.token, request.amount)
            .await
            .unwrap();
        fx.gateway.set_fail_on_cancel(true).await;

        let result = fx
            .engine
            .lifecycle
            .cancel_order(request.order_id, "Buyer request")
            .await;

        assert!(matches!(result, Err(CheckoutError::Gateway(_))));
        let order = fx.engine.lifecycle.get_order(request.order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(
            order.payment.as_ref().map(|p| p.status),
            Some(PaymentStatus::Done)
        );
        assert_eq!(fx.available(&xl_key()).await, 8);
    }

    #[tokio::test]
    async fn confirming_a_cancelled_order_is_rejected() {
        let fx = Fixture::new().await;
        let request = payment_order(&fx).await;
        fx.engine
            .lifecycle
            .cancel_order(request.order_id, "changed mind")
            .await
            .unwrap();

        let result = fx
            .engine
            .payments
            .confirm_payment("pay_1", request.token, request.amount)
            .await;

        assert!(matches!(
            result,
            Err(CheckoutError::PaymentNotPending {
                status: PaymentStatus::Canceled
            })
        ));
        assert_eq!(fx.gateway.confirm_calls().await, 0);
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let fx = Fixture::new().await;

        let result = fx
            .engine
            .payments
            .confirm_payment("pay_1", OrderToken::new(), Money::new(1))
            .await;

        assert!(matches!(result, Err(CheckoutError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn unreadable_order_is_not_reported_missing() {
        let fx = Fixture::new().await;
        let token = OrderToken::new();
        let garbled = EventEnvelope::builder()
            .aggregate_id(token.order_id())
            .aggregate_type("Order")
            .event_type("OrderPlaced")
            .version(Version::new(1))
            .payload_raw(serde_json::json!({ "type": "OrderPlaced", "data": { "total": "many" } }))
            .build()
            .unwrap();
        fx.store
            .append(vec![garbled], AppendOptions::new())
            .await
            .unwrap();

        let confirm = fx
            .engine
            .payments
            .confirm_payment("pay_1", token, Money::new(1))
            .await;
        let authorize = fx.engine.payments.request_authorization(token).await;

        for result in [confirm.map(|_| ()), authorize.map(|_| ())] {
            assert!(matches!(
                result,
                Err(CheckoutError::Domain(_) | CheckoutError::EventStore(_))
            ));
        }
        assert_eq!(fx.gateway.confirm_calls().await, 0);
    }
}
