//! Payment gateway callbacks.
//!
//! The client opens the gateway widget with the data from
//! `POST /buyers/:id/orders/payment`; the gateway redirects back with a
//! payment key, which is confirmed here.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use checkout::PaymentRequest;
use domain::{Money, OrderToken, OrderView};
use event_store::EventStore;
use serde::Deserialize;

use super::parse_id;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AuthorizationFailure {
    pub code: String,
    pub message: String,
}

/// Field names follow the gateway's redirect parameters.
#[derive(Deserialize)]
pub struct ConfirmPaymentRequest {
    #[serde(alias = "paymentKey")]
    pub payment_key: String,
    #[serde(alias = "orderId")]
    pub order_id: OrderToken,
    pub amount: Money,
}

/// POST /payments/:token/authorize: The buyer opened the payment widget.
#[tracing::instrument(skip(state))]
pub async fn authorize<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(token): Path<String>,
) -> Result<Json<PaymentRequest>, ApiError> {
    let token: OrderToken = parse_id("order token", &token)?;
    Ok(Json(
        state.engine.payments.request_authorization(token).await?,
    ))
}

/// POST /payments/:token/fail: The gateway reported a failed authorization.
#[tracing::instrument(skip(state, req))]
pub async fn fail<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(token): Path<String>,
    Json(req): Json<AuthorizationFailure>,
) -> Result<Json<OrderView>, ApiError> {
    let token: OrderToken = parse_id("order token", &token)?;
    let order = state
        .engine
        .payments
        .record_authorization_failure(token, &req.code, &req.message)
        .await?;
    Ok(Json(order))
}

/// POST /payments/confirm: Capture an authorized payment.
#[tracing::instrument(skip(state, req))]
pub async fn confirm<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<ConfirmPaymentRequest>,
) -> Result<Json<OrderView>, ApiError> {
    if req.payment_key.trim().is_empty() {
        return Err(ApiError::BadRequest("paymentKey is required".to_string()));
    }

    let order = state
        .engine
        .payments
        .confirm_payment(&req.payment_key, req.order_id, req.amount)
        .await?;
    Ok(Json(order))
}
