//! Order placement, lifecycle and history endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use checkout::{CheckoutError, PaymentRequest};
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{BuyerDirectory, BuyerId, DeliveryInfo, OrderStatus, OrderView};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::error::ApiError;
use crate::state::AppState;

const BUYER_CANCEL_REASON: &str = "Cancelled by buyer";

#[derive(Deserialize)]
pub struct ListOrdersQuery {
    /// Only orders changed after this instant.
    pub since: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Default)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// Response type for event envelope data.
#[derive(Serialize)]
pub struct EventEnvelopeResponse {
    pub event_id: String,
    pub event_type: String,
    pub version: i64,
    pub timestamp: String,
    pub payload: serde_json::Value,
}

/// POST /buyers/:id/orders: Convert the cart into a `PENDING` order.
#[tracing::instrument(skip(state, delivery))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(delivery): Json<DeliveryInfo>,
) -> Result<(StatusCode, Json<OrderView>), ApiError> {
    let buyer_id: BuyerId = parse_id("buyer", &id)?;
    let order_id = state
        .engine
        .lifecycle
        .create_order(buyer_id, delivery)
        .await?;
    let order = state.engine.lifecycle.get_order(order_id).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// POST /buyers/:id/orders/payment: Place an order that waits for the
/// payment gateway; returns what the payment widget needs.
#[tracing::instrument(skip(state, delivery))]
pub async fn create_for_payment<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(delivery): Json<DeliveryInfo>,
) -> Result<(StatusCode, Json<PaymentRequest>), ApiError> {
    let buyer_id: BuyerId = parse_id("buyer", &id)?;
    let request = state
        .engine
        .lifecycle
        .create_order_for_payment(buyer_id, delivery)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /buyers/:id/orders: The buyer's orders, newest first.
#[tracing::instrument(skip(state, query))]
pub async fn list_for_buyer<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    let buyer_id: BuyerId = parse_id("buyer", &id)?;
    state
        .buyers
        .find_buyer(buyer_id)
        .await
        .map_err(CheckoutError::from)?
        .ok_or(CheckoutError::BuyerNotFound(buyer_id))?;

    state.catch_up().await?;

    let orders = match query.since {
        Some(since) => state.buyer_orders.updates_since(buyer_id, since).await,
        None => state.buyer_orders.orders_for_buyer(buyer_id).await,
    };
    Ok(Json(orders))
}

/// GET /orders/:id
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, ApiError> {
    let order_id: AggregateId = parse_id("order", &id)?;
    Ok(Json(state.engine.lifecycle.get_order(order_id).await?))
}

/// POST /orders/:id/cancel: Cancel and restore stock; refunds a captured
/// payment first.
#[tracing::instrument(skip(state, req))]
pub async fn cancel<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    req: Option<Json<CancelRequest>>,
) -> Result<Json<OrderView>, ApiError> {
    let order_id: AggregateId = parse_id("order", &id)?;
    let reason = req
        .and_then(|Json(req)| req.reason)
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| BUYER_CANCEL_REASON.to_string());

    let order = state
        .engine
        .lifecycle
        .cancel_order(order_id, &reason)
        .await?;
    Ok(Json(order))
}

/// PUT /orders/:id/status: Administrative status change.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderView>, ApiError> {
    let order_id: AggregateId = parse_id("order", &id)?;
    let target: OrderStatus = req
        .status
        .parse::<OrderStatus>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let order = state
        .engine
        .lifecycle
        .update_order_status(order_id, target)
        .await?;
    Ok(Json(order))
}

/// GET /orders/:id/events: The order's event history.
#[tracing::instrument(skip(state))]
pub async fn events<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventEnvelopeResponse>>, ApiError> {
    let order_id: AggregateId = parse_id("order", &id)?;
    state.engine.lifecycle.get_order(order_id).await?;

    let envelopes = state
        .event_store
        .get_events_for_aggregate(order_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let responses = envelopes
        .into_iter()
        .map(|e| EventEnvelopeResponse {
            event_id: e.event_id.to_string(),
            event_type: e.event_type,
            version: e.version.as_i64(),
            timestamp: e.timestamp.to_rfc3339(),
            payload: e.payload,
        })
        .collect();

    Ok(Json(responses))
}
