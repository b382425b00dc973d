use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Money, OrderToken, PaymentMethod};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the buyer's browser brought back from the payment widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmRequest {
    pub payment_key: String,
    pub order_token: OrderToken,
    pub amount: Money,
}

/// The gateway's answer to a successful confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentApproval {
    pub payment_key: String,
    /// Gateway status, normally `DONE`.
    pub status: String,
    pub method: PaymentMethod,
    pub approved_at: DateTime<Utc>,
    pub total_amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCancellation {
    pub payment_key: String,
    /// Gateway status, normally `CANCELED`.
    pub status: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered and refused.
    #[error("payment rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("unexpected response from payment gateway: {0}")]
    UnexpectedResponse(String),

    #[error("invalid payment gateway url: {0}")]
    InvalidUrl(String),
}

/// External payment provider.
///
/// Implementations are called without any store lock held and may be slow.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Captures an authorized payment.
    async fn confirm(&self, request: ConfirmRequest) -> Result<PaymentApproval, GatewayError>;

    /// Cancels (refunds) a captured payment.
    async fn cancel(
        &self,
        payment_key: &str,
        reason: &str,
    ) -> Result<PaymentCancellation, GatewayError>;
}
