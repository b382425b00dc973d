//! Checkout error types.

use domain::{
    BuyerId, CartError, CartLineId, DomainError, Money, OptionId, OrderError, OrderStatus,
    PaymentStatus, ProductId, StockError, StockKey, TransitionError,
};
use event_store::EventStoreError;
use thiserror::Error;

use crate::payment::GatewayError;

/// Errors surfaced by the checkout engine.
///
/// Validation failures are raised before anything is appended, so a caller
/// that receives one of them can assume no state changed.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Out of stock: {product_name} ({item}) has {available} left, {requested} requested")]
    OutOfStock {
        item: StockKey,
        product_name: String,
        requested: u32,
        available: u32,
    },

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Order cannot be cancelled once {status}")]
    OrderCannotCancel { status: OrderStatus },

    #[error("Order is already cancelled")]
    OrderAlreadyCancelled,

    #[error("Order cannot be updated once {status}")]
    OrderCannotUpdate { status: OrderStatus },

    #[error("Payment amount mismatch: expected {expected}, got {actual}")]
    PaymentAmountMismatch { expected: Money, actual: Money },

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Buyer not found: {0}")]
    BuyerNotFound(BuyerId),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Option {option_id} is not available for product {product_id}")]
    OptionUnavailable {
        product_id: ProductId,
        option_id: OptionId,
    },

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Cart line not found: {0}")]
    CartLineNotFound(CartLineId),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Payment is {status}; the order cannot move until payment completes")]
    AwaitingPayment { status: PaymentStatus },

    #[error("Payment is not pending (payment status {status})")]
    PaymentNotPending { status: PaymentStatus },

    #[error("Payment is {status}; the order is frozen until the refund settles")]
    RefundPending { status: PaymentStatus },

    #[error("Payment was captured; the order must be cancelled through a refund")]
    PaymentCaptured,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{operation} gave up after {attempts} conflicting attempts")]
    Contention {
        operation: &'static str,
        attempts: u32,
    },

    #[error("Domain error: {0}")]
    Domain(DomainError),

    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),
}

impl CheckoutError {
    /// True when the failure was a lost optimistic-concurrency race.
    pub fn is_conflict(&self) -> bool {
        match self {
            CheckoutError::EventStore(e) => e.is_conflict(),
            CheckoutError::Domain(e) => e.is_conflict(),
            _ => false,
        }
    }
}

impl From<DomainError> for CheckoutError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::EventStore(e) => CheckoutError::EventStore(e),
            DomainError::Order(e) => e.into(),
            DomainError::Cart(e) => e.into(),
            DomainError::Stock(e) => e.into(),
            other => CheckoutError::Domain(other),
        }
    }
}

impl From<OrderError> for CheckoutError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::Transition(t) => t.into(),
            OrderError::NoLines => CheckoutError::EmptyCart,
            OrderError::InvalidDelivery { field } => {
                CheckoutError::InvalidInput(format!("delivery {field} is required"))
            }
            OrderError::InvalidQuantity { product_id } => {
                CheckoutError::InvalidQuantity(format!("quantity for {product_id} must be positive"))
            }
            OrderError::AwaitingPayment { status } => CheckoutError::AwaitingPayment { status },
            OrderError::PaymentNotPending { status } => CheckoutError::PaymentNotPending { status },
            OrderError::PaymentAmountMismatch { expected, actual } => {
                CheckoutError::PaymentAmountMismatch { expected, actual }
            }
            OrderError::RefundPending { status } => CheckoutError::RefundPending { status },
            OrderError::PaymentCaptured => CheckoutError::PaymentCaptured,
            OrderError::PaymentNotCaptured { status } => {
                CheckoutError::InvalidInput(format!("payment is {status}, nothing to refund"))
            }
            OrderError::NotPaymentMediated => {
                CheckoutError::InvalidInput("order is not payment-mediated".to_string())
            }
            other => CheckoutError::Domain(DomainError::Order(other)),
        }
    }
}

impl From<TransitionError> for CheckoutError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::AlreadyCancelled => CheckoutError::OrderAlreadyCancelled,
            TransitionError::CannotCancel { from } => {
                CheckoutError::OrderCannotCancel { status: from }
            }
            TransitionError::CannotUpdate { from } => {
                CheckoutError::OrderCannotUpdate { status: from }
            }
            TransitionError::InvalidTransition { from, to } => {
                CheckoutError::InvalidTransition { from, to }
            }
        }
    }
}

impl From<CartError> for CheckoutError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::InvalidQuantity { quantity } => {
                CheckoutError::InvalidQuantity(format!("{quantity} (must be greater than 0)"))
            }
            CartError::ExceedsStock {
                requested,
                available,
            } => CheckoutError::InvalidQuantity(format!(
                "{requested} exceeds available stock {available}"
            )),
            CartError::LineNotFound { line_id } => CheckoutError::CartLineNotFound(line_id),
            CartError::Empty => CheckoutError::EmptyCart,
        }
    }
}

impl From<StockError> for CheckoutError {
    fn from(e: StockError) -> Self {
        match e {
            StockError::OutOfStock {
                key,
                requested,
                available,
            } => CheckoutError::OutOfStock {
                product_name: key.to_string(),
                item: key,
                requested,
                available,
            },
            StockError::InvalidQuantity { quantity } => {
                CheckoutError::InvalidQuantity(format!("{quantity} (must be greater than 0)"))
            }
            StockError::Overflow { key } => {
                CheckoutError::InvalidQuantity(format!("stock counter for {key} would overflow"))
            }
            other => CheckoutError::Domain(DomainError::Stock(other)),
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use super::*;
    use common::AggregateId;
    use event_store::Version;

    #[test]
    fn transition_errors_map_to_lifecycle_errors() {
        let e: CheckoutError = DomainError::Order(OrderError::Transition(
            TransitionError::CannotCancel {
                from: OrderStatus::Shipped,
            },
        ))
        .into();
        assert!(matches!(
            e,
            CheckoutError::OrderCannotCancel {
                status: OrderStatus::Shipped
            }
        ));

        let e: CheckoutError = OrderError::Transition(TransitionError::AlreadyCancelled).into();
        assert!(matches!(e, CheckoutError::OrderAlreadyCancelled));
    }

    #[test]
    fn refund_errors_keep_their_meaning() {
        let e: CheckoutError = OrderError::RefundPending {
            status: PaymentStatus::CancelPending,
        }
        .into();
        assert!(matches!(
            e,
            CheckoutError::RefundPending {
                status: PaymentStatus::CancelPending
            }
        ));

        let e: CheckoutError = OrderError::PaymentCaptured.into();
        assert!(matches!(e, CheckoutError::PaymentCaptured));
    }

    #[test]
    fn conflicts_are_detected_through_layers() {
        let conflict = EventStoreError::ConcurrencyConflict {
            aggregate_id: AggregateId::new(),
            expected: Version::new(1),
            actual: Version::new(2),
        };
        let e: CheckoutError = DomainError::EventStore(conflict).into();
        assert!(e.is_conflict());
        assert!(!CheckoutError::EmptyCart.is_conflict());
    }
}
