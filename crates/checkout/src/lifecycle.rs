//! Order lifecycle controller.
//!
//! Turns carts into orders, moves orders through their statuses and cancels
//! them. Stock moves in the same commit as the order event that causes it.

use std::sync::Arc;
use std::time::Instant;

use common::AggregateId;
use domain::{
    Aggregate, BuyerDirectory, BuyerId, Cart, Catalog, CommandHandler, DeliveryInfo, Money, Order,
    OrderError, OrderEvent, OrderLine, OrderStatus, OrderToken, OrderView, PaymentStatus,
    UnitOfWork,
};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, Result};
use crate::inventory::{Inventory, StockLedger};
use crate::lookup::{require_buyer, resolve_product};
use crate::payment::PaymentGateway;
use crate::retry::with_retry;

/// How a cart becomes an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementMode {
    /// Placed `PENDING`; administrative status changes apply directly.
    Direct,
    /// Placed `PENDING` with a payment sub-state awaiting the gateway.
    PaymentMediated,
}

impl PlacementMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementMode::Direct => "direct",
            PlacementMode::PaymentMediated => "payment",
        }
    }
}

/// Data the client needs to open the gateway's payment widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub order_id: AggregateId,
    pub token: OrderToken,
    pub amount: Money,
    pub order_name: String,
}

impl PaymentRequest {
    pub(crate) fn for_order(order: &Order, token: OrderToken) -> Result<Self> {
        let order_id = order
            .id()
            .ok_or_else(|| CheckoutError::OrderNotFound(token.to_string()))?;
        Ok(Self {
            order_id,
            token,
            amount: order.total(),
            order_name: order.order_name(),
        })
    }
}

pub struct OrderLifecycle<S: EventStore + Clone> {
    store: S,
    orders: CommandHandler<S, Order>,
    carts: CommandHandler<S, Cart>,
    inventory: Inventory<S>,
    catalog: Arc<dyn Catalog>,
    buyers: Arc<dyn BuyerDirectory>,
    gateway: Arc<dyn PaymentGateway>,
    config: CheckoutConfig,
}

impl<S: EventStore + Clone> OrderLifecycle<S> {
    pub fn new(
        store: S,
        catalog: Arc<dyn Catalog>,
        buyers: Arc<dyn BuyerDirectory>,
        gateway: Arc<dyn PaymentGateway>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            orders: CommandHandler::new(store.clone()),
            carts: CommandHandler::new(store.clone()),
            inventory: Inventory::new(store.clone(), config.clone()),
            store,
            catalog,
            buyers,
            gateway,
            config,
        }
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    /// Converts the buyer's cart into a `PENDING` order.
    #[tracing::instrument(skip(self, delivery))]
    pub async fn create_order(
        &self,
        buyer_id: BuyerId,
        delivery: DeliveryInfo,
    ) -> Result<AggregateId> {
        let (order_id, _) = self
            .place(buyer_id, delivery, PlacementMode::Direct)
            .await?;
        Ok(order_id)
    }

    /// Converts the cart into a `PENDING` order awaiting payment. Stock is
    /// reserved now; the order is confirmed once the gateway captures it.
    #[tracing::instrument(skip(self, delivery))]
    pub async fn create_order_for_payment(
        &self,
        buyer_id: BuyerId,
        delivery: DeliveryInfo,
    ) -> Result<PaymentRequest> {
        let (_, order) = self
            .place(buyer_id, delivery, PlacementMode::PaymentMediated)
            .await?;
        let token = order
            .payment()
            .map(|p| p.token)
            .ok_or_else(|| CheckoutError::InvalidInput("order has no payment token".to_string()))?;
        PaymentRequest::for_order(&order, token)
    }

    /// The conversion routine shared by both placement modes.
    async fn place(
        &self,
        buyer_id: BuyerId,
        delivery: DeliveryInfo,
        mode: PlacementMode,
    ) -> Result<(AggregateId, Order)> {
        let started = Instant::now();
        let token = match mode {
            PlacementMode::Direct => None,
            PlacementMode::PaymentMediated => Some(OrderToken::new()),
        };
        let order_id = token.map_or_else(AggregateId::new, |t| t.order_id());

        require_buyer(self.buyers.as_ref(), buyer_id).await?;

        let order = with_retry("place_order", self.config.max_commit_attempts, || {
            self.convert(buyer_id, &delivery, order_id, token)
        })
        .await?;

        metrics::counter!("orders_placed_total", "mode" => mode.as_str()).increment(1);
        metrics::histogram!("checkout_duration_seconds", "mode" => mode.as_str())
            .record(started.elapsed().as_secs_f64());
        tracing::info!(
            %order_id,
            %buyer_id,
            mode = mode.as_str(),
            total = %order.total(),
            lines = order.lines().len(),
            "order placed"
        );

        Ok((order_id, order))
    }

    /// One conversion attempt from a fresh read.
    ///
    /// Walks the cart in order, reports the first line that cannot be
    /// served, and otherwise commits every reservation, the order and the
    /// cart clearing together.
    async fn convert(
        &self,
        buyer_id: BuyerId,
        delivery: &DeliveryInfo,
        order_id: AggregateId,
        token: Option<OrderToken>,
    ) -> Result<Order> {
        let cart_id = Cart::stream_id(buyer_id);
        let cart = self.carts.load(cart_id).await?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let mut ledger = StockLedger::new();
        let mut lines = Vec::with_capacity(cart.line_count());

        for cart_line in cart.lines() {
            let (product, option) = resolve_product(
                self.catalog.as_ref(),
                &cart_line.product_id,
                cart_line.option_id.as_ref(),
            )
            .await?;

            let key = cart_line.stock_key();
            let stock = ledger.entry(&self.inventory, &key).await?;
            if cart_line.quantity > stock.available() {
                return Err(CheckoutError::OutOfStock {
                    item: key,
                    product_name: product.name,
                    requested: cart_line.quantity,
                    available: stock.available(),
                });
            }
            stock.reserve(order_id, cart_line.quantity)?;

            lines.push(OrderLine::snapshot(
                &product,
                option.as_ref(),
                cart_line.quantity,
            ));
        }

        let mut order = Order::default();
        let placed = order.place(order_id, buyer_id, delivery.clone(), lines, token)?;
        let cleared = cart.clear(order_id)?;

        let mut uow = UnitOfWork::new();
        ledger.record_into(&mut uow)?;
        uow.record(order_id, &order, &placed)?;
        uow.record(cart_id, &cart, &cleared)?;
        uow.commit(&self.store).await?;

        apply_committed(&mut order, placed);
        Ok(order)
    }

    /// Cancels an order and returns every reserved unit to stock.
    ///
    /// A captured payment is refunded through the gateway. The order is
    /// frozen before the refund is sent, so no status change can slip in
    /// between the refund and the cancellation. If the refund fails the
    /// order is unfrozen and nothing else changes.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: AggregateId, reason: &str) -> Result<OrderView> {
        let order = self.load_order(order_id).await?;

        let order = match captured_key(&order) {
            Some(payment_key) => self.refund_then_cancel(order_id, &payment_key, reason).await?,
            None => match self
                .cancel_with_release("cancel_order", order_id, |order| order.cancel(reason))
                .await
            {
                // Payment was captured after the first load.
                Err(CheckoutError::PaymentCaptured) => {
                    let order = self.load_order(order_id).await?;
                    let payment_key = captured_key(&order).ok_or(CheckoutError::PaymentCaptured)?;
                    self.refund_then_cancel(order_id, &payment_key, reason).await?
                }
                other => other?,
            },
        };

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(%order_id, reason, "order cancelled");
        self.view(&order)
    }

    async fn refund_then_cancel(
        &self,
        order_id: AggregateId,
        payment_key: &str,
        reason: &str,
    ) -> Result<Order> {
        with_retry("request_refund", self.config.max_commit_attempts, || async {
            Ok(self
                .orders
                .execute(order_id, |order| order.request_refund(reason))
                .await?)
        })
        .await?;

        if let Err(e) = self.gateway.cancel(payment_key, reason).await {
            tracing::warn!(%order_id, error = %e, "refund failed, order left unchanged");
            let message = e.to_string();
            let recorded = with_retry(
                "record_refund_failure",
                self.config.max_commit_attempts,
                || async {
                    Ok(self
                        .orders
                        .execute(order_id, |order| order.record_refund_failure(&message))
                        .await?)
                },
            )
            .await;
            if let Err(record_error) = recorded {
                tracing::error!(
                    %order_id,
                    error = %record_error,
                    "order left frozen after failed refund"
                );
            }
            return Err(CheckoutError::Gateway(e));
        }
        tracing::info!(%order_id, payment_key, "payment refunded");

        self.cancel_with_release("cancel_order", order_id, |order| {
            order.complete_refund(reason)
        })
        .await
        .inspect_err(|e| {
            tracing::error!(
                %order_id,
                payment_key,
                error = %e,
                "payment refunded but order not cancelled"
            );
        })
    }

    /// Administrative status change. A `CANCELLED` target goes through
    /// [`cancel_order`](Self::cancel_order) so stock is restored.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_id: AggregateId,
        target: OrderStatus,
    ) -> Result<OrderView> {
        if target == OrderStatus::Cancelled {
            return self
                .cancel_order(order_id, "Cancelled by administrator")
                .await;
        }

        self.load_order(order_id).await?;

        let result = with_retry("update_order_status", self.config.max_commit_attempts, || async {
            Ok(self
                .orders
                .execute(order_id, |order| order.advance_status(target))
                .await?)
        })
        .await?;

        tracing::info!(%order_id, status = %target, "order status updated");
        self.view(&result.aggregate)
    }

    pub async fn get_order(&self, order_id: AggregateId) -> Result<OrderView> {
        let order = self.load_order(order_id).await?;
        self.view(&order)
    }

    pub(crate) async fn load_order(&self, order_id: AggregateId) -> Result<Order> {
        self.orders
            .load_existing(order_id)
            .await?
            .ok_or_else(|| CheckoutError::OrderNotFound(order_id.to_string()))
    }

    pub(crate) fn orders(&self) -> &CommandHandler<S, Order> {
        &self.orders
    }

    pub(crate) fn view(&self, order: &Order) -> Result<OrderView> {
        order
            .view()
            .ok_or_else(|| CheckoutError::OrderNotFound("unplaced order".to_string()))
    }

    /// Appends the cancellation decided by `decide` together with a release
    /// for every order line, retrying on conflicts.
    pub(crate) async fn cancel_with_release<F>(
        &self,
        operation: &'static str,
        order_id: AggregateId,
        decide: F,
    ) -> Result<Order>
    where
        F: Fn(&Order) -> std::result::Result<Vec<OrderEvent>, OrderError>,
    {
        with_retry(operation, self.config.max_commit_attempts, || async {
            let mut order = self.load_order(order_id).await?;
            let cancelled = decide(&order)?;

            let mut ledger = StockLedger::new();
            for line in order.lines() {
                ledger
                    .entry(&self.inventory, &line.stock_key())
                    .await?
                    .release(order_id, line.quantity)?;
            }

            let mut uow = UnitOfWork::new();
            ledger.record_into(&mut uow)?;
            uow.record(order_id, &order, &cancelled)?;
            uow.commit(&self.store).await?;

            apply_committed(&mut order, cancelled);
            Ok(order)
        })
        .await
    }
}

fn captured_key(order: &Order) -> Option<String> {
    order
        .payment()
        .filter(|p| p.status == PaymentStatus::Done)
        .and_then(|p| p.payment_key.clone())
}

/// Applies events that were just committed and advances the version to match.
pub(crate) fn apply_committed(order: &mut Order, events: Vec<OrderEvent>) {
    let version = events.iter().fold(order.version(), |v, _| v.next());
    order.apply_events(events);
    order.set_version(version);
}
