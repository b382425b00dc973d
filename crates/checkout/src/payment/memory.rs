use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use domain::{Money, OrderToken, PaymentMethod};
use tokio::sync::RwLock;

use super::{ConfirmRequest, GatewayError, PaymentApproval, PaymentCancellation, PaymentGateway};

#[derive(Debug, Default)]
struct GatewayState {
    /// Captured payments by payment key.
    captured: HashMap<String, (OrderToken, Money)>,
    cancelled: Vec<String>,
    confirm_calls: usize,
    fail_on_confirm: bool,
    fail_on_cancel: bool,
}

/// Gateway double for tests and for running without credentials.
///
/// Every confirmation is approved as a card payment unless failure is
/// switched on.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<GatewayState>>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_confirm(&self, fail: bool) {
        self.state.write().await.fail_on_confirm = fail;
    }

    pub async fn set_fail_on_cancel(&self, fail: bool) {
        self.state.write().await.fail_on_cancel = fail;
    }

    /// Number of `confirm` calls received, successful or not.
    pub async fn confirm_calls(&self) -> usize {
        self.state.read().await.confirm_calls
    }

    pub async fn is_captured(&self, payment_key: &str) -> bool {
        self.state.read().await.captured.contains_key(payment_key)
    }

    pub async fn cancelled_keys(&self) -> Vec<String> {
        self.state.read().await.cancelled.clone()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn confirm(&self, request: ConfirmRequest) -> Result<PaymentApproval, GatewayError> {
        let mut state = self.state.write().await;
        state.confirm_calls += 1;

        if state.fail_on_confirm {
            return Err(GatewayError::Rejected {
                code: "REJECT_CARD_PAYMENT".to_string(),
                message: "Payment declined".to_string(),
            });
        }

        state.captured.insert(
            request.payment_key.clone(),
            (request.order_token, request.amount),
        );

        Ok(PaymentApproval {
            payment_key: request.payment_key,
            status: "DONE".to_string(),
            method: PaymentMethod::Card,
            approved_at: Utc::now(),
            total_amount: request.amount,
        })
    }

    async fn cancel(
        &self,
        payment_key: &str,
        _reason: &str,
    ) -> Result<PaymentCancellation, GatewayError> {
        let mut state = self.state.write().await;

        if state.fail_on_cancel {
            return Err(GatewayError::Rejected {
                code: "FAILED_REFUND_PROCESS".to_string(),
                message: "Refund failed".to_string(),
            });
        }

        if state.captured.remove(payment_key).is_none() {
            return Err(GatewayError::Rejected {
                code: "NOT_FOUND_PAYMENT".to_string(),
                message: format!("No captured payment {payment_key}"),
            });
        }
        state.cancelled.push(payment_key.to_string());

        Ok(PaymentCancellation {
            payment_key: payment_key.to_string(),
            status: "CANCELED".to_string(),
        })
    }
}
