//! Buyer cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use checkout::CartView;
use domain::{BuyerId, CartLineId, OptionId, ProductId};
use event_store::EventStore;
use serde::Deserialize;

use super::parse_id;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddLineRequest {
    pub product_id: String,
    pub option_id: Option<String>,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: u32,
}

/// GET /buyers/:id/cart: The cart priced with current catalog data.
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<CartView>, ApiError> {
    let buyer_id: BuyerId = parse_id("buyer", &id)?;
    Ok(Json(state.engine.cart.get_cart(buyer_id).await?))
}

/// POST /buyers/:id/cart/lines: Add a product, merging with an existing line.
#[tracing::instrument(skip(state, req))]
pub async fn add_line<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<AddLineRequest>,
) -> Result<Json<CartView>, ApiError> {
    let buyer_id: BuyerId = parse_id("buyer", &id)?;
    let cart = state
        .engine
        .cart
        .add_line(
            buyer_id,
            ProductId::new(req.product_id),
            req.option_id.map(OptionId::new),
            req.quantity,
        )
        .await?;
    Ok(Json(cart))
}

/// PUT /buyers/:id/cart/lines/:line_id: Replace a line's quantity.
#[tracing::instrument(skip(state, req))]
pub async fn set_quantity<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((id, line_id)): Path<(String, String)>,
    Json(req): Json<SetQuantityRequest>,
) -> Result<Json<CartView>, ApiError> {
    let buyer_id: BuyerId = parse_id("buyer", &id)?;
    let line_id: CartLineId = parse_id("cart line", &line_id)?;
    let cart = state
        .engine
        .cart
        .set_quantity(buyer_id, line_id, req.quantity)
        .await?;
    Ok(Json(cart))
}

/// DELETE /buyers/:id/cart/lines/:line_id
#[tracing::instrument(skip(state))]
pub async fn remove_line<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((id, line_id)): Path<(String, String)>,
) -> Result<Json<CartView>, ApiError> {
    let buyer_id: BuyerId = parse_id("buyer", &id)?;
    let line_id: CartLineId = parse_id("cart line", &line_id)?;
    Ok(Json(
        state.engine.cart.remove_line(buyer_id, line_id).await?,
    ))
}
