//! Order aggregate and related types.

mod aggregate;
mod events;
mod payment;
mod status;
mod value_objects;

pub use aggregate::{Cancellation, Order};
pub use events::{
    OrderCancelledData, OrderEvent, OrderPlacedData, OrderStatusChangedData,
    PaymentAuthorizationFailedData, PaymentAuthorizationRequestedData, PaymentConfirmedData,
    PaymentRefundFailedData, PaymentRefundRequestedData,
};
pub use payment::{PaymentFailure, PaymentMethod, PaymentState, PaymentStatus};
pub use status::{OrderStatus, TransitionError, UnknownStatus};
pub use value_objects::{DeliveryInfo, OptionSnapshot, OrderLine};

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value_objects::{BuyerId, Money};

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order has not been placed")]
    NotPlaced,

    #[error("Order already placed")]
    AlreadyPlaced,

    #[error("Order has no lines")]
    NoLines,

    #[error("Delivery info is missing {field}")]
    InvalidDelivery { field: &'static str },

    #[error("Invalid quantity for {product_id} (must be greater than 0)")]
    InvalidQuantity { product_id: String },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Payment is {status}; status changes wait for a completed payment")]
    AwaitingPayment { status: PaymentStatus },

    #[error("Order is not payment-mediated")]
    NotPaymentMediated,

    #[error("Payment is not pending (current payment status {status})")]
    PaymentNotPending { status: PaymentStatus },

    #[error("Payment is {status}; the order cannot change until the refund settles")]
    RefundPending { status: PaymentStatus },

    #[error("Payment was captured; cancelling requires a refund")]
    PaymentCaptured,

    #[error("Payment has not been captured (current payment status {status})")]
    PaymentNotCaptured { status: PaymentStatus },

    #[error("Payment amount mismatch: expected {expected}, got {actual}")]
    PaymentAmountMismatch { expected: Money, actual: Money },
}

/// An order line as shown to buyers and sellers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineView {
    #[serde(flatten)]
    pub line: OrderLine,
    pub line_total: Money,
}

impl From<OrderLine> for OrderLineView {
    fn from(line: OrderLine) -> Self {
        let line_total = line.line_total();
        Self { line, line_total }
    }
}

/// Read-side representation of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub id: AggregateId,
    pub buyer_id: BuyerId,
    pub status: OrderStatus,
    pub status_description: String,
    pub delivery: DeliveryInfo,
    pub lines: Vec<OrderLineView>,
    pub total: Money,
    pub payment: Option<PaymentState>,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancellation: Option<Cancellation>,
    pub version: i64,
}
