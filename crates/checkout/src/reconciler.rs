//! Payment confirmation adapter.
//!
//! Maps the gateway's answers onto order state: authorization requests and
//! failures, confirmation, and the compensating cancellation when the
//! gateway refuses to capture.

use std::sync::Arc;

use common::AggregateId;
use domain::{Money, Order, OrderToken, OrderView};
use event_store::EventStore;

use crate::error::{CheckoutError, Result};
use crate::lifecycle::{OrderLifecycle, PaymentRequest};
use crate::payment::{ConfirmRequest, PaymentGateway};
use crate::retry::with_retry;

pub struct PaymentReconciler<S: EventStore + Clone> {
    lifecycle: Arc<OrderLifecycle<S>>,
    gateway: Arc<dyn PaymentGateway>,
}

impl<S: EventStore + Clone> PaymentReconciler<S> {
    pub fn new(lifecycle: Arc<OrderLifecycle<S>>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { lifecycle, gateway }
    }

    /// Marks the payment `IN_PROGRESS` and returns what the payment widget
    /// needs.
    #[tracing::instrument(skip(self))]
    pub async fn request_authorization(&self, token: OrderToken) -> Result<PaymentRequest> {
        let order_id = self.order_for(token).await?;

        let result = with_retry(
            "request_authorization",
            self.lifecycle.config().max_commit_attempts,
            || async {
                Ok(self
                    .lifecycle
                    .orders()
                    .execute(order_id, |order| order.request_payment_authorization())
                    .await?)
            },
        )
        .await?;

        PaymentRequest::for_order(&result.aggregate, token)
    }

    /// Records that the gateway rejected the authorization. The order keeps
    /// its reservation until it is cancelled.
    #[tracing::instrument(skip(self))]
    pub async fn record_authorization_failure(
        &self,
        token: OrderToken,
        code: &str,
        message: &str,
    ) -> Result<OrderView> {
        let order_id = self.order_for(token).await?;

        let result = with_retry(
            "record_authorization_failure",
            self.lifecycle.config().max_commit_attempts,
            || async {
                Ok(self
                    .lifecycle
                    .orders()
                    .execute(order_id, |order| {
                        order.record_authorization_failure(code, message)
                    })
                    .await?)
            },
        )
        .await?;

        metrics::counter!("payments_failed_total", "stage" => "authorization").increment(1);
        tracing::warn!(%order_id, code, message, "payment authorization failed");
        self.lifecycle.view(&result.aggregate)
    }

    /// Confirms a payment the buyer authorized in the gateway widget.
    ///
    /// The amount must equal the order total; a mismatch changes nothing and
    /// the gateway is not called. A repeated confirmation for the same
    /// payment key returns the confirmed order without side effects. If the
    /// gateway refuses, the order is cancelled and its stock released.
    #[tracing::instrument(skip(self, payment_key))]
    pub async fn confirm_payment(
        &self,
        payment_key: &str,
        token: OrderToken,
        amount: Money,
    ) -> Result<OrderView> {
        let order_id = token.order_id();
        let order = self.order_by_token(token).await?;

        if let Err(e) = order.check_payment_amount(amount) {
            metrics::counter!("payment_amount_mismatch_total").increment(1);
            tracing::error!(
                %order_id,
                expected = %order.total(),
                actual = %amount,
                "payment amount does not match order total"
            );
            return Err(e.into());
        }

        if order.is_confirmed_with(payment_key) {
            tracing::info!(%order_id, "payment already confirmed, ignoring replay");
            return self.lifecycle.view(&order);
        }

        ensure_awaiting_payment(&order)?;

        let request = ConfirmRequest {
            payment_key: payment_key.to_string(),
            order_token: token,
            amount,
        };
        let approval = match self.gateway.confirm(request).await {
            Ok(approval) => approval,
            Err(e) => {
                metrics::counter!("payments_failed_total", "stage" => "confirmation").increment(1);
                tracing::warn!(%order_id, error = %e, "payment confirmation failed, cancelling order");

                let reason = format!("Payment confirmation failed: {e}");
                if let Err(cancel_error) = self
                    .lifecycle
                    .cancel_with_release("compensate_payment", order_id, |order| {
                        order.cancel_for_failed_payment(reason.as_str())
                    })
                    .await
                {
                    tracing::error!(%order_id, error = %cancel_error, "compensating cancellation failed");
                }

                return Err(CheckoutError::Gateway(e));
            }
        };

        if approval.total_amount != amount {
            tracing::error!(
                %order_id,
                approved = %approval.total_amount,
                requested = %amount,
                "gateway approved a different amount"
            );
        }

        let recorded = with_retry(
            "confirm_payment",
            self.lifecycle.config().max_commit_attempts,
            || async {
                Ok(self
                    .lifecycle
                    .orders()
                    .execute(order_id, |order| {
                        if order.is_confirmed_with(payment_key) {
                            return Ok(vec![]);
                        }
                        order.confirm_payment(
                            payment_key,
                            approval.method.clone(),
                            amount,
                            approval.approved_at,
                        )
                    })
                    .await?)
            },
        )
        .await;

        let result = match recorded {
            Ok(result) => result,
            Err(e) => {
                // Captured at the gateway but the order moved on meanwhile
                // (e.g. cancelled): hand the money back.
                tracing::error!(%order_id, error = %e, "captured payment could not be recorded, refunding");
                if let Err(refund_error) = self
                    .gateway
                    .cancel(payment_key, "Order no longer awaiting payment")
                    .await
                {
                    tracing::error!(%order_id, error = %refund_error, "refund after failed recording failed");
                }
                return Err(e);
            }
        };

        metrics::counter!("payments_confirmed_total").increment(1);
        tracing::info!(%order_id, method = ?approval.method, "payment confirmed");
        self.lifecycle.view(&result.aggregate)
    }

    async fn order_for(&self, token: OrderToken) -> Result<AggregateId> {
        self.order_by_token(token).await?;
        Ok(token.order_id())
    }

    /// Only a missing stream reads as an unknown token; store and decode
    /// failures propagate.
    async fn order_by_token(&self, token: OrderToken) -> Result<Order> {
        self.lifecycle
            .orders()
            .load_existing(token.order_id())
            .await?
            .ok_or_else(|| CheckoutError::OrderNotFound(token.to_string()))
    }
}

fn ensure_awaiting_payment(order: &Order) -> Result<()> {
    match order.payment() {
        None => Err(CheckoutError::InvalidInput(
            "order is not payment-mediated".to_string(),
        )),
        Some(payment) if !order.awaiting_payment() => Err(CheckoutError::PaymentNotPending {
            status: payment.status,
        }),
        Some(_) => Ok(()),
    }
}
