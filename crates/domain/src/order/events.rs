//! Order domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::{BuyerId, Money, OrderToken};

use super::{DeliveryInfo, OrderLine, OrderStatus, PaymentMethod, PaymentStatus};

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was created from a cart. Carries everything that never changes.
    OrderPlaced(OrderPlacedData),

    /// Administrative fulfilment step.
    OrderStatusChanged(OrderStatusChangedData),

    /// The buyer opened the gateway's payment widget.
    PaymentAuthorizationRequested(PaymentAuthorizationRequestedData),

    /// The gateway rejected the authorization.
    PaymentAuthorizationFailed(PaymentAuthorizationFailedData),

    /// The gateway confirmed the payment; the order is confirmed.
    PaymentConfirmed(PaymentConfirmedData),

    /// A refund of the captured payment was sent to the gateway. The order
    /// is frozen until the refund settles.
    PaymentRefundRequested(PaymentRefundRequestedData),

    /// The gateway refused the refund; the payment is captured again.
    PaymentRefundFailed(PaymentRefundFailedData),

    /// Order was cancelled and its stock given back.
    OrderCancelled(OrderCancelledData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::OrderStatusChanged(_) => "OrderStatusChanged",
            OrderEvent::PaymentAuthorizationRequested(_) => "PaymentAuthorizationRequested",
            OrderEvent::PaymentAuthorizationFailed(_) => "PaymentAuthorizationFailed",
            OrderEvent::PaymentConfirmed(_) => "PaymentConfirmed",
            OrderEvent::PaymentRefundRequested(_) => "PaymentRefundRequested",
            OrderEvent::PaymentRefundFailed(_) => "PaymentRefundFailed",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: AggregateId,
    pub buyer_id: BuyerId,
    pub delivery: DeliveryInfo,
    pub lines: Vec<OrderLine>,
    /// Sum of line totals, computed once.
    pub total: Money,
    /// Present for payment-mediated orders only.
    pub payment_token: Option<OrderToken>,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusChangedData {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAuthorizationRequestedData {
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAuthorizationFailedData {
    pub code: String,
    pub message: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfirmedData {
    pub payment_key: String,
    pub method: PaymentMethod,
    pub amount: Money,
    pub approved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRefundRequestedData {
    pub reason: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRefundFailedData {
    pub message: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub reason: String,
    /// Status the order was cancelled from.
    pub from: OrderStatus,
    /// New payment sub-status, for payment-mediated orders.
    pub payment_status: Option<PaymentStatus>,
    pub cancelled_at: DateTime<Utc>,
}

impl OrderEvent {
    pub fn order_placed(
        order_id: AggregateId,
        buyer_id: BuyerId,
        delivery: DeliveryInfo,
        lines: Vec<OrderLine>,
        payment_token: Option<OrderToken>,
    ) -> Self {
        let total = lines.iter().map(OrderLine::line_total).sum();
        OrderEvent::OrderPlaced(OrderPlacedData {
            order_id,
            buyer_id,
            delivery,
            lines,
            total,
            payment_token,
            placed_at: Utc::now(),
        })
    }

    pub fn status_changed(from: OrderStatus, to: OrderStatus) -> Self {
        OrderEvent::OrderStatusChanged(OrderStatusChangedData {
            from,
            to,
            changed_at: Utc::now(),
        })
    }

    pub fn payment_authorization_requested() -> Self {
        OrderEvent::PaymentAuthorizationRequested(PaymentAuthorizationRequestedData {
            requested_at: Utc::now(),
        })
    }

    pub fn payment_authorization_failed(code: impl Into<String>, message: impl Into<String>) -> Self {
        OrderEvent::PaymentAuthorizationFailed(PaymentAuthorizationFailedData {
            code: code.into(),
            message: message.into(),
            failed_at: Utc::now(),
        })
    }

    pub fn payment_confirmed(
        payment_key: impl Into<String>,
        method: PaymentMethod,
        amount: Money,
        approved_at: DateTime<Utc>,
    ) -> Self {
        OrderEvent::PaymentConfirmed(PaymentConfirmedData {
            payment_key: payment_key.into(),
            method,
            amount,
            approved_at,
        })
    }

    pub fn payment_refund_requested(reason: impl Into<String>) -> Self {
        OrderEvent::PaymentRefundRequested(PaymentRefundRequestedData {
            reason: reason.into(),
            requested_at: Utc::now(),
        })
    }

    pub fn payment_refund_failed(message: impl Into<String>) -> Self {
        OrderEvent::PaymentRefundFailed(PaymentRefundFailedData {
            message: message.into(),
            failed_at: Utc::now(),
        })
    }

    pub fn order_cancelled(
        reason: impl Into<String>,
        from: OrderStatus,
        payment_status: Option<PaymentStatus>,
    ) -> Self {
        OrderEvent::OrderCancelled(OrderCancelledData {
            reason: reason.into(),
            from,
            payment_status,
            cancelled_at: Utc::now(),
        })
    }

    /// When the recorded fact happened.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(data) => data.placed_at,
            OrderEvent::OrderStatusChanged(data) => data.changed_at,
            OrderEvent::PaymentAuthorizationRequested(data) => data.requested_at,
            OrderEvent::PaymentAuthorizationFailed(data) => data.failed_at,
            OrderEvent::PaymentConfirmed(data) => data.approved_at,
            OrderEvent::PaymentRefundRequested(data) => data.requested_at,
            OrderEvent::PaymentRefundFailed(data) => data.failed_at,
            OrderEvent::OrderCancelled(data) => data.cancelled_at,
        }
    }
}
