//! HTTP API server for the marketplace checkout engine.
//!
//! Provides REST endpoints for carts, orders, payments and seller order
//! queries, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::ApiError;
pub use state::{AppState, create_state};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        // Admin seeding
        .route("/buyers", post(routes::admin::register_buyer::<S>))
        .route("/catalog/products", post(routes::admin::upsert_product::<S>))
        .route(
            "/catalog/products/{id}/price",
            put(routes::admin::reprice::<S>),
        )
        .route("/stock/receive", post(routes::admin::receive_stock::<S>))
        // Cart
        .route("/buyers/{id}/cart", get(routes::cart::get::<S>))
        .route("/buyers/{id}/cart/lines", post(routes::cart::add_line::<S>))
        .route(
            "/buyers/{id}/cart/lines/{line_id}",
            put(routes::cart::set_quantity::<S>).delete(routes::cart::remove_line::<S>),
        )
        // Orders
        .route(
            "/buyers/{id}/orders",
            get(routes::orders::list_for_buyer::<S>).post(routes::orders::create::<S>),
        )
        .route(
            "/buyers/{id}/orders/payment",
            post(routes::orders::create_for_payment::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/orders/{id}/status", put(routes::orders::update_status::<S>))
        .route("/orders/{id}/events", get(routes::orders::events::<S>))
        // Payments
        .route(
            "/payments/{token}/authorize",
            post(routes::payments::authorize::<S>),
        )
        .route("/payments/{token}/fail", post(routes::payments::fail::<S>))
        .route("/payments/confirm", post(routes::payments::confirm::<S>))
        // Sellers
        .route(
            "/sellers/{id}/orders",
            get(routes::sellers::list_orders::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
