//! Toss Payments style HTTP gateway client.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use domain::{Money, PaymentMethod};
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};

use super::{ConfirmRequest, GatewayError, PaymentApproval, PaymentCancellation, PaymentGateway};

pub const DEFAULT_GATEWAY_URL: &str = "https://api.tosspayments.com";

/// HTTP client for the payment gateway's confirm and cancel endpoints.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    base_url: String,
    authorization: String,
    http: Client,
}

impl HttpPaymentGateway {
    /// `secret_key` is sent as HTTP Basic credentials `secret_key:` (empty
    /// password).
    pub fn new(base_url: impl Into<String>, secret_key: &str) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            authorization: format!("Basic {}", BASE64.encode(format!("{secret_key}:"))),
            http: Client::new(),
        }
    }

    /// Appends `segments` to the base URL. Each segment is percent-encoded, so
    /// a payment key cannot change the path.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| GatewayError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<Response, GatewayError> {
        let response = self
            .http
            .post(url)
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .json(body)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => Err(GatewayError::Rejected {
                code: body.code,
                message: body.message,
            }),
            Err(_) => Err(GatewayError::UnexpectedResponse(format!(
                "request failed with status {status}: {text}"
            ))),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[tracing::instrument(skip(self, request), fields(order_token = %request.order_token))]
    async fn confirm(&self, request: ConfirmRequest) -> Result<PaymentApproval, GatewayError> {
        let url = self.endpoint(&["v1", "payments", "confirm"])?;
        let body = ConfirmBody {
            payment_key: &request.payment_key,
            order_id: request.order_token.to_string(),
            amount: request.amount.amount(),
        };

        let parsed: PaymentBody = self.post(url, &body).await?.json().await?;
        let approved_at = parsed.approved_at.ok_or_else(|| {
            GatewayError::UnexpectedResponse("confirmed payment has no approvedAt".to_string())
        })?;

        Ok(PaymentApproval {
            payment_key: parsed.payment_key,
            status: parsed.status,
            method: parsed
                .method
                .as_deref()
                .map(PaymentMethod::from_gateway_label)
                .unwrap_or(PaymentMethod::Other(String::new())),
            approved_at,
            total_amount: Money::new(parsed.total_amount),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn cancel(
        &self,
        payment_key: &str,
        reason: &str,
    ) -> Result<PaymentCancellation, GatewayError> {
        let url = self.endpoint(&["v1", "payments", payment_key, "cancel"])?;
        let body = CancelBody {
            cancel_reason: reason,
        };

        let parsed: PaymentBody = self.post(url, &body).await?.json().await?;

        Ok(PaymentCancellation {
            payment_key: parsed.payment_key,
            status: parsed.status,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmBody<'a> {
    payment_key: &'a str,
    order_id: String,
    amount: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelBody<'a> {
    cancel_reason: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentBody {
    payment_key: String,
    status: String,
    #[serde(default)]
    total_amount: i64,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_key_becomes_basic_credentials() {
        let gateway = HttpPaymentGateway::new("https://gateway.test/", "test_sk_123");
        assert_eq!(gateway.base_url, "https://gateway.test");
        assert_eq!(gateway.authorization, "Basic dGVzdF9za18xMjM6");
    }

    #[test]
    fn payment_key_stays_inside_its_path_segment() {
        let gateway = HttpPaymentGateway::new("https://gateway.test/toss/", "sk");

        let url = gateway
            .endpoint(&["v1", "payments", "pk/../confirm?x=1", "cancel"])
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://gateway.test/toss/v1/payments/pk%2F..%2Fconfirm%3Fx=1/cancel"
        );
    }

    #[test]
    fn unparsable_base_url_is_reported() {
        let gateway = HttpPaymentGateway::new("not a url", "sk");
        assert!(matches!(
            gateway.endpoint(&["v1"]),
            Err(GatewayError::InvalidUrl(_))
        ));
    }

    #[test]
    fn payment_body_accepts_offset_timestamps() {
        let body: PaymentBody = serde_json::from_str(
            r#"{
                "paymentKey": "pk_1",
                "orderId": "ignored",
                "status": "DONE",
                "totalAmount": 15000,
                "method": "카드",
                "approvedAt": "2024-03-01T12:00:00+09:00"
            }"#,
        )
        .unwrap();

        assert_eq!(body.total_amount, 15_000);
        assert_eq!(
            body.approved_at.unwrap().to_rfc3339(),
            "2024-03-01T03:00:00+00:00"
        );
    }
}
