//! Seller order queries.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use domain::{OrderView, SellerId};
use event_store::EventStore;
use projections::SellerScope;
use serde::Deserialize;

use super::parse_id;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SellerOrdersQuery {
    /// `active`, `completed` or `all` (default).
    pub scope: Option<String>,
}

/// GET /sellers/:id/orders: Orders containing the seller's products,
/// newest first.
#[tracing::instrument(skip(state, query))]
pub async fn list_orders<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Query(query): Query<SellerOrdersQuery>,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    let seller_id: SellerId = parse_id("seller", &id)?;
    let scope = match query.scope {
        Some(raw) => raw.parse::<SellerScope>().map_err(ApiError::BadRequest)?,
        None => SellerScope::default(),
    };

    state.catch_up().await?;
    Ok(Json(state.seller_orders.orders(seller_id, scope).await))
}
