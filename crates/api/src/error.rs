//! API error types with HTTP response mapping.
//!
//! Every error body has the shape `{"error": <message>, "code": <code>}`.
//! Codes: `E001` invalid input, `E002` entity not found, `E005` internal,
//! `P001` product not found, `P002` out of stock, `O001` order not found,
//! `O002` already cancelled, `O003` cannot cancel, `O004` empty cart,
//! `M001` buyer not found, `PAY` payment rejected by the gateway.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::{CheckoutError, GatewayError};
use projections::ProjectionError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Checkout engine error.
    Checkout(CheckoutError),
    /// Read model could not catch up.
    Projection(ProjectionError),
    /// Internal server error.
    Internal(String),
}

const INTERNAL_MESSAGE: &str = "Internal server error";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "E002", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "E001", msg),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Projection(err) => {
                tracing::error!(error = %err, "read model catch-up failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "E005",
                    INTERNAL_MESSAGE.to_string(),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "E005",
                    INTERNAL_MESSAGE.to_string(),
                )
            }
        };

        let body = serde_json::json!({ "error": message, "code": code });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, &'static str, String) {
    let (status, code) = match &err {
        CheckoutError::OrderNotFound(_) => (StatusCode::NOT_FOUND, "O001"),
        CheckoutError::OrderAlreadyCancelled => (StatusCode::CONFLICT, "O002"),
        CheckoutError::OrderCannotCancel { .. } => (StatusCode::CONFLICT, "O003"),
        CheckoutError::EmptyCart => (StatusCode::BAD_REQUEST, "O004"),
        CheckoutError::ProductNotFound(_) | CheckoutError::OptionUnavailable { .. } => {
            (StatusCode::NOT_FOUND, "P001")
        }
        CheckoutError::OutOfStock { .. } => (StatusCode::CONFLICT, "P002"),
        CheckoutError::BuyerNotFound(_) => (StatusCode::NOT_FOUND, "M001"),
        CheckoutError::CartLineNotFound(_) => (StatusCode::NOT_FOUND, "E002"),
        CheckoutError::InvalidQuantity(_)
        | CheckoutError::InvalidInput(_)
        | CheckoutError::PaymentAmountMismatch { .. } => (StatusCode::BAD_REQUEST, "E001"),
        CheckoutError::OrderCannotUpdate { .. }
        | CheckoutError::InvalidTransition { .. }
        | CheckoutError::AwaitingPayment { .. }
        | CheckoutError::PaymentNotPending { .. }
        | CheckoutError::RefundPending { .. }
        | CheckoutError::PaymentCaptured => (StatusCode::CONFLICT, "E001"),
        CheckoutError::Gateway(GatewayError::Rejected { message, .. }) => {
            return (StatusCode::PAYMENT_REQUIRED, "PAY", message.clone());
        }
        CheckoutError::Gateway(e) => {
            tracing::error!(error = %e, "payment gateway unavailable");
            return (
                StatusCode::BAD_GATEWAY,
                "E005",
                "Payment gateway unavailable".to_string(),
            );
        }
        CheckoutError::Contention { .. } => {
            tracing::warn!(error = %err, "request gave up under contention");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                "E005",
                "Too many concurrent updates, try again".to_string(),
            );
        }
        CheckoutError::Domain(_) | CheckoutError::EventStore(_) => {
            tracing::error!(error = %err, "checkout failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "E005",
                INTERNAL_MESSAGE.to_string(),
            );
        }
    };
    (status, code, err.to_string())
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        ApiError::Projection(err)
    }
}
