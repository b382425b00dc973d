//! Seeding endpoints for buyers, catalog listings and stock.
//!
//! Accounts and product management belong to other services; these routes
//! feed the in-memory directory and catalog the engine reads from.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::CheckoutError;
use domain::{Buyer, BuyerId, Catalog, Money, OptionId, Product, ProductId, StockKey};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterBuyerRequest {
    pub name: String,
    pub email: String,
}

#[derive(Deserialize)]
pub struct RepriceRequest {
    pub price: Money,
    #[serde(default)]
    pub discount_rate: u8,
}

#[derive(Deserialize)]
pub struct ReceiveStockRequest {
    pub product_id: String,
    pub option_id: Option<String>,
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct StockLevelResponse {
    pub key: StockKey,
    pub available: u32,
}

/// POST /buyers
#[tracing::instrument(skip(state, req))]
pub async fn register_buyer<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<RegisterBuyerRequest>,
) -> Result<(StatusCode, Json<Buyer>), ApiError> {
    if req.name.trim().is_empty() || req.email.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "name and email are required".to_string(),
        ));
    }

    let buyer = Buyer {
        id: BuyerId::new(),
        name: req.name,
        email: req.email,
    };
    state.buyers.register(buyer.clone()).await;
    tracing::info!(buyer_id = %buyer.id, "buyer registered");
    Ok((StatusCode::CREATED, Json(buyer)))
}

/// POST /catalog/products: Create or replace a listing.
#[tracing::instrument(skip(state, product))]
pub async fn upsert_product<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(product): Json<Product>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    if product.price.is_negative() || product.discount_rate > 100 {
        return Err(ApiError::BadRequest(
            "price must not be negative and discount_rate must be at most 100".to_string(),
        ));
    }
    if let Some(option) = product.options.iter().find(|o| o.product_id != product.id) {
        return Err(ApiError::BadRequest(format!(
            "option {} belongs to product {}",
            option.id, option.product_id
        )));
    }

    state.catalog.upsert_product(product.clone()).await;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /catalog/products/:id/price: Later carts see the new price; placed
/// orders keep their snapshot.
#[tracing::instrument(skip(state, req))]
pub async fn reprice<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<RepriceRequest>,
) -> Result<Json<Product>, ApiError> {
    if req.price.is_negative() || req.discount_rate > 100 {
        return Err(ApiError::BadRequest(
            "price must not be negative and discount_rate must be at most 100".to_string(),
        ));
    }

    let product_id = ProductId::new(id);
    if !state
        .catalog
        .reprice(&product_id, req.price, req.discount_rate)
        .await
    {
        return Err(CheckoutError::ProductNotFound(product_id).into());
    }

    let product = state
        .catalog
        .find_product(&product_id)
        .await
        .map_err(CheckoutError::from)?
        .ok_or(CheckoutError::ProductNotFound(product_id))?;
    Ok(Json(product))
}

/// POST /stock/receive: Add units to a product's or option's counter.
#[tracing::instrument(skip(state, req))]
pub async fn receive_stock<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<ReceiveStockRequest>,
) -> Result<Json<StockLevelResponse>, ApiError> {
    let product_id = ProductId::new(req.product_id);
    let option_id = req.option_id.map(OptionId::new);

    let product = state
        .catalog
        .find_product(&product_id)
        .await
        .map_err(CheckoutError::from)?
        .ok_or_else(|| CheckoutError::ProductNotFound(product_id.clone()))?;
    if let Some(option_id) = option_id.as_ref().filter(|o| product.option(o).is_none()) {
        return Err(CheckoutError::OptionUnavailable {
            product_id,
            option_id: option_id.clone(),
        }
        .into());
    }

    let key = StockKey::for_line(&product_id, option_id.as_ref());
    let available = state.engine.inventory.receive(&key, req.quantity).await?;
    Ok(Json(StockLevelResponse { key, available }))
}
