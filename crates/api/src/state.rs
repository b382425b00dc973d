//! Shared application state.

use std::sync::Arc;

use checkout::{CheckoutConfig, CheckoutEngine, PaymentGateway};
use domain::{InMemoryBuyerDirectory, InMemoryCatalog};
use event_store::EventStore;
use projections::{BuyerOrdersView, Projection, ProjectionProcessor, SellerOrdersView};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore + Clone> {
    pub engine: CheckoutEngine<S>,
    pub catalog: InMemoryCatalog,
    pub buyers: InMemoryBuyerDirectory,
    pub buyer_orders: BuyerOrdersView,
    pub seller_orders: SellerOrdersView,
    pub projections: ProjectionProcessor<S>,
    pub event_store: S,
}

impl<S: EventStore + Clone> AppState<S> {
    /// Brings the read models up to date with the store.
    pub async fn catch_up(&self) -> Result<u64, ApiError> {
        Ok(self.projections.run_catch_up().await?)
    }
}

/// Wires the engine, the in-memory catalog and buyer directory, and the
/// order views around an event store.
pub fn create_state<S: EventStore + Clone + 'static>(
    event_store: S,
    gateway: Arc<dyn PaymentGateway>,
    config: CheckoutConfig,
) -> Arc<AppState<S>> {
    let catalog = InMemoryCatalog::new();
    let buyers = InMemoryBuyerDirectory::new();

    let engine = CheckoutEngine::new(
        event_store.clone(),
        Arc::new(catalog.clone()),
        Arc::new(buyers.clone()),
        gateway,
        config,
    );

    let buyer_orders = BuyerOrdersView::new();
    let seller_orders = SellerOrdersView::new();

    let mut processor = ProjectionProcessor::new(event_store.clone());
    processor.register(Box::new(buyer_orders.clone()) as Box<dyn Projection>);
    processor.register(Box::new(seller_orders.clone()) as Box<dyn Projection>);

    Arc::new(AppState {
        engine,
        catalog,
        buyers,
        buyer_orders,
        seller_orders,
        projections: processor,
        event_store,
    })
}
