//! Payment sub-state of payment-mediated orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::OrderToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Order placed, authorization not started.
    Ready,
    /// The buyer is in the gateway's payment widget.
    InProgress,
    Done,
    /// A refund was sent to the gateway and has not settled yet.
    CancelPending,
    Canceled,
    Failed,
}

impl PaymentStatus {
    /// Statuses from which a confirmation may still arrive.
    pub fn is_pre_authorization(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Ready | PaymentStatus::InProgress | PaymentStatus::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Ready => "READY",
            PaymentStatus::InProgress => "IN_PROGRESS",
            PaymentStatus::Done => "DONE",
            PaymentStatus::CancelPending => "CANCEL_PENDING",
            PaymentStatus::Canceled => "CANCELED",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    Transfer,
    VirtualAccount,
    Mobile,
    KakaoPay,
    TossPay,
    NaverPay,
    Other(String),
}

impl PaymentMethod {
    /// Maps the method label reported by the gateway. The gateway reports
    /// Korean labels; English names are accepted as well.
    pub fn from_gateway_label(label: &str) -> Self {
        match label.trim() {
            "카드" | "CARD" | "Card" => PaymentMethod::Card,
            "계좌이체" | "TRANSFER" | "Transfer" => PaymentMethod::Transfer,
            "가상계좌" | "VIRTUAL_ACCOUNT" | "VirtualAccount" => PaymentMethod::VirtualAccount,
            "휴대폰" | "MOBILE_PHONE" | "MOBILE" | "Mobile" => PaymentMethod::Mobile,
            "카카오페이" | "KAKAOPAY" | "KakaoPay" => PaymentMethod::KakaoPay,
            "토스페이" | "TOSSPAY" | "TossPay" => PaymentMethod::TossPay,
            "네이버페이" | "NAVERPAY" | "NaverPay" => PaymentMethod::NaverPay,
            other => PaymentMethod::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailure {
    pub code: String,
    pub message: String,
}

/// Where a payment-mediated order stands with the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentState {
    pub token: OrderToken,
    pub status: PaymentStatus,
    pub payment_key: Option<String>,
    pub method: Option<PaymentMethod>,
    pub approved_at: Option<DateTime<Utc>>,
    pub failure: Option<PaymentFailure>,
}

impl PaymentState {
    pub fn ready(token: OrderToken) -> Self {
        Self {
            token,
            status: PaymentStatus::Ready,
            payment_key: None,
            method: None,
            approved_at: None,
            failure: None,
        }
    }
}
