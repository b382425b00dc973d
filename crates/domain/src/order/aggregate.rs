//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::value_objects::{BuyerId, Money, OrderToken};

use super::{
    DeliveryInfo, OrderError, OrderEvent, OrderLine, OrderStatus, OrderView, PaymentFailure,
    PaymentMethod, PaymentState, PaymentStatus, TransitionError,
    events::{OrderCancelledData, OrderPlacedData, PaymentConfirmedData},
};

/// Why and when an order was cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}

/// Order aggregate root.
///
/// Buyer, delivery details, lines and total are fixed by `OrderPlaced`.
/// Only the status and the payment sub-state move afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    buyer_id: Option<BuyerId>,

    delivery: Option<DeliveryInfo>,

    lines: Vec<OrderLine>,

    total: Money,

    status: OrderStatus,

    /// Present only for payment-mediated orders.
    payment: Option<PaymentState>,

    placed_at: Option<DateTime<Utc>>,

    updated_at: Option<DateTime<Utc>>,

    cancellation: Option<Cancellation>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        self.updated_at = Some(event.occurred_at());

        match event {
            OrderEvent::OrderPlaced(data) => self.apply_order_placed(data),
            OrderEvent::OrderStatusChanged(data) => {
                self.status = data.to;
            }
            OrderEvent::PaymentAuthorizationRequested(_) => {
                if let Some(payment) = self.payment.as_mut() {
                    payment.status = PaymentStatus::InProgress;
                    payment.failure = None;
                }
            }
            OrderEvent::PaymentAuthorizationFailed(data) => {
                if let Some(payment) = self.payment.as_mut() {
                    payment.status = PaymentStatus::Failed;
                    payment.failure = Some(PaymentFailure {
                        code: data.code,
                        message: data.message,
                    });
                }
            }
            OrderEvent::PaymentConfirmed(data) => self.apply_payment_confirmed(data),
            OrderEvent::PaymentRefundRequested(_) => {
                if let Some(payment) = self.payment.as_mut() {
                    payment.status = PaymentStatus::CancelPending;
                }
            }
            OrderEvent::PaymentRefundFailed(_) => {
                if let Some(payment) = self.payment.as_mut() {
                    payment.status = PaymentStatus::Done;
                }
            }
            OrderEvent::OrderCancelled(data) => self.apply_order_cancelled(data),
        }
    }
}

// Query methods
impl Order {
    pub fn buyer_id(&self) -> Option<BuyerId> {
        self.buyer_id
    }

    pub fn delivery(&self) -> Option<&DeliveryInfo> {
        self.delivery.as_ref()
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment(&self) -> Option<&PaymentState> {
        self.payment.as_ref()
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        self.placed_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn cancellation(&self) -> Option<&Cancellation> {
        self.cancellation.as_ref()
    }

    pub fn is_payment_mediated(&self) -> bool {
        self.payment.is_some()
    }

    /// Short display name for the payment widget, e.g. "Hoodie and 2 more".
    pub fn order_name(&self) -> String {
        match self.lines.as_slice() {
            [] => String::new(),
            [only] => only.product_name.clone(),
            [first, rest @ ..] => format!("{} and {} more", first.product_name, rest.len()),
        }
    }

    /// Still waiting for the gateway: `PENDING` with payment not yet done.
    pub fn awaiting_payment(&self) -> bool {
        self.status == OrderStatus::Pending
            && self
                .payment
                .as_ref()
                .is_some_and(|p| p.status.is_pre_authorization())
    }

    /// True if the payment was already confirmed with `payment_key`.
    pub fn is_confirmed_with(&self, payment_key: &str) -> bool {
        self.payment.as_ref().is_some_and(|p| {
            p.status == PaymentStatus::Done && p.payment_key.as_deref() == Some(payment_key)
        })
    }

    /// Read-side copy of the order; `None` until placed.
    pub fn view(&self) -> Option<OrderView> {
        let id = self.id?;
        Some(OrderView {
            id,
            buyer_id: self.buyer_id?,
            status: self.status,
            status_description: self.status.description().to_string(),
            delivery: self.delivery.clone()?,
            lines: self.lines.iter().cloned().map(Into::into).collect(),
            total: self.total,
            payment: self.payment.clone(),
            placed_at: self.placed_at?,
            updated_at: self.updated_at.or(self.placed_at)?,
            cancellation: self.cancellation.clone(),
            version: self.version.as_i64(),
        })
    }

    fn placed(&self) -> Result<(), OrderError> {
        if self.id.is_none() {
            return Err(OrderError::NotPlaced);
        }
        Ok(())
    }

    fn payment_state(&self) -> Result<&PaymentState, OrderError> {
        self.payment.as_ref().ok_or(OrderError::NotPaymentMediated)
    }

    fn payment_status(&self) -> Option<PaymentStatus> {
        self.payment.as_ref().map(|p| p.status)
    }
}

// Command methods (return events)
impl Order {
    /// Places the order. `payment_token` makes it payment-mediated.
    pub fn place(
        &self,
        order_id: AggregateId,
        buyer_id: BuyerId,
        delivery: DeliveryInfo,
        lines: Vec<OrderLine>,
        payment_token: Option<OrderToken>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyPlaced);
        }

        if lines.is_empty() {
            return Err(OrderError::NoLines);
        }

        if let Some(line) = lines.iter().find(|l| l.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                product_id: line.product_id.to_string(),
            });
        }

        delivery.validate()?;

        Ok(vec![OrderEvent::order_placed(
            order_id,
            buyer_id,
            delivery,
            lines,
            payment_token,
        )])
    }

    /// Administrative forward move (confirm, prepare, ship, deliver).
    ///
    /// Cancellation has its own command because it releases stock.
    pub fn advance_status(&self, target: OrderStatus) -> Result<Vec<OrderEvent>, OrderError> {
        self.placed()?;

        if target == OrderStatus::Cancelled {
            return Err(TransitionError::InvalidTransition {
                from: self.status,
                to: target,
            }
            .into());
        }

        let to = self.status.transition(target)?;

        match self.payment_status() {
            None | Some(PaymentStatus::Done) => {}
            Some(status @ PaymentStatus::CancelPending) => {
                return Err(OrderError::RefundPending { status });
            }
            Some(status) => return Err(OrderError::AwaitingPayment { status }),
        }

        Ok(vec![OrderEvent::status_changed(self.status, to)])
    }

    /// Cancels on request of buyer or admin. A payment sub-state becomes
    /// `CANCELED`. A captured payment must go through [`Order::request_refund`]
    /// first.
    pub fn cancel(&self, reason: impl Into<String>) -> Result<Vec<OrderEvent>, OrderError> {
        self.placed()?;
        self.status.transition(OrderStatus::Cancelled)?;

        match self.payment_status() {
            Some(PaymentStatus::Done) => return Err(OrderError::PaymentCaptured),
            Some(status @ PaymentStatus::CancelPending) => {
                return Err(OrderError::RefundPending { status });
            }
            _ => {}
        }

        let payment_status = self.payment.as_ref().map(|_| PaymentStatus::Canceled);
        Ok(vec![OrderEvent::order_cancelled(
            reason,
            self.status,
            payment_status,
        )])
    }

    /// Compensating cancellation after the gateway refused to confirm.
    pub fn cancel_for_failed_payment(
        &self,
        reason: impl Into<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.placed()?;
        self.payment_state()?;
        self.status.transition(OrderStatus::Cancelled)?;

        Ok(vec![OrderEvent::order_cancelled(
            reason,
            self.status,
            Some(PaymentStatus::Failed),
        )])
    }

    /// Freezes a captured order while its refund is with the gateway. Status
    /// changes and other cancellations are refused until the refund settles.
    pub fn request_refund(&self, reason: impl Into<String>) -> Result<Vec<OrderEvent>, OrderError> {
        self.placed()?;
        let payment = self.payment_state()?;
        self.status.transition(OrderStatus::Cancelled)?;

        match payment.status {
            PaymentStatus::Done => Ok(vec![OrderEvent::payment_refund_requested(reason)]),
            status @ PaymentStatus::CancelPending => Err(OrderError::RefundPending { status }),
            status => Err(OrderError::PaymentNotCaptured { status }),
        }
    }

    /// Unfreezes the order after the gateway refused the refund. No-op unless
    /// a refund is pending.
    pub fn record_refund_failure(
        &self,
        message: impl Into<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.placed()?;
        if self.payment_status() != Some(PaymentStatus::CancelPending) {
            return Ok(vec![]);
        }
        Ok(vec![OrderEvent::payment_refund_failed(message)])
    }

    /// Cancels the order once the gateway accepted the refund.
    pub fn complete_refund(&self, reason: impl Into<String>) -> Result<Vec<OrderEvent>, OrderError> {
        self.placed()?;
        let payment = self.payment_state()?;
        self.status.transition(OrderStatus::Cancelled)?;

        if payment.status != PaymentStatus::CancelPending {
            return Err(OrderError::PaymentNotCaptured {
                status: payment.status,
            });
        }

        Ok(vec![OrderEvent::order_cancelled(
            reason,
            self.status,
            Some(PaymentStatus::Canceled),
        )])
    }

    /// Marks the payment `IN_PROGRESS`. Repeating the request is a no-op.
    pub fn request_payment_authorization(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.placed()?;
        let payment = self.payment_state()?;

        if !self.awaiting_payment() {
            return Err(OrderError::PaymentNotPending {
                status: payment.status,
            });
        }

        if payment.status == PaymentStatus::InProgress {
            return Ok(vec![]);
        }

        Ok(vec![OrderEvent::payment_authorization_requested()])
    }

    /// Records a gateway rejection. The order stays `PENDING` with its stock
    /// reserved until someone cancels it.
    pub fn record_authorization_failure(
        &self,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.placed()?;
        let payment = self.payment_state()?;

        if !self.awaiting_payment() {
            return Err(OrderError::PaymentNotPending {
                status: payment.status,
            });
        }

        Ok(vec![OrderEvent::payment_authorization_failed(code, message)])
    }

    pub fn check_payment_amount(&self, amount: Money) -> Result<(), OrderError> {
        if amount != self.total {
            return Err(OrderError::PaymentAmountMismatch {
                expected: self.total,
                actual: amount,
            });
        }
        Ok(())
    }

    /// Records the gateway's approval. The order becomes `CONFIRMED`.
    pub fn confirm_payment(
        &self,
        payment_key: impl Into<String>,
        method: PaymentMethod,
        amount: Money,
        approved_at: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.placed()?;
        let payment = self.payment_state()?;
        self.check_payment_amount(amount)?;

        if !self.awaiting_payment() {
            return Err(OrderError::PaymentNotPending {
                status: payment.status,
            });
        }

        Ok(vec![OrderEvent::payment_confirmed(
            payment_key,
            method,
            amount,
            approved_at,
        )])
    }
}

// Apply event helpers
impl Order {
    fn apply_order_placed(&mut self, data: OrderPlacedData) {
        self.id = Some(data.order_id);
        self.buyer_id = Some(data.buyer_id);
        self.delivery = Some(data.delivery);
        self.lines = data.lines;
        self.total = data.total;
        self.status = OrderStatus::Pending;
        self.payment = data.payment_token.map(PaymentState::ready);
        self.placed_at = Some(data.placed_at);
    }

    fn apply_payment_confirmed(&mut self, data: PaymentConfirmedData) {
        if let Some(payment) = self.payment.as_mut() {
            payment.status = PaymentStatus::Done;
            payment.payment_key = Some(data.payment_key);
            payment.method = Some(data.method);
            payment.approved_at = Some(data.approved_at);
            payment.failure = None;
        }
        self.status = OrderStatus::Confirmed;
    }

    fn apply_order_cancelled(&mut self, data: OrderCancelledData) {
        self.status = OrderStatus::Cancelled;
        if let (Some(payment), Some(status)) = (self.payment.as_mut(), data.payment_status) {
            payment.status = status;
        }
        self.cancellation = Some(Cancellation {
            reason: data.reason,
            cancelled_at: data.cancelled_at,
        });
    }
}
