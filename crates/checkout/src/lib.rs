//! Checkout engine for the marketplace.
//!
//! Application services on top of the `domain` aggregates:
//!
//! - [`CartService`]: cart edits checked against live stock
//! - [`OrderLifecycle`]: cart-to-order conversion, status changes, cancellation
//! - [`PaymentReconciler`]: gateway confirmation and compensation
//! - [`Inventory`]: stock receipts and availability
//!
//! Every multi-stream change is one atomic store commit. Conflicting commits
//! are re-decided from a fresh read up to
//! [`CheckoutConfig::max_commit_attempts`] times.

pub mod cart;
pub mod config;
pub mod error;
pub mod inventory;
pub mod lifecycle;
mod lookup;
pub mod payment;
pub mod reconciler;
pub mod retry;

use std::sync::Arc;

use domain::{BuyerDirectory, Catalog};
use event_store::EventStore;

pub use cart::{CartLineView, CartService, CartView};
pub use config::{CheckoutConfig, DEFAULT_MAX_COMMIT_ATTEMPTS};
pub use error::{CheckoutError, Result};
pub use inventory::Inventory;
pub use lifecycle::{OrderLifecycle, PaymentRequest, PlacementMode};
pub use payment::{
    ConfirmRequest, DEFAULT_GATEWAY_URL, GatewayError, HttpPaymentGateway, InMemoryPaymentGateway,
    PaymentApproval, PaymentCancellation, PaymentGateway,
};
pub use reconciler::PaymentReconciler;
pub use retry::with_retry;

/// All checkout services wired to one store and one set of collaborators.
pub struct CheckoutEngine<S: EventStore + Clone> {
    pub cart: CartService<S>,
    pub lifecycle: Arc<OrderLifecycle<S>>,
    pub payments: PaymentReconciler<S>,
    pub inventory: Inventory<S>,
}

impl<S: EventStore + Clone> CheckoutEngine<S> {
    pub fn new(
        store: S,
        catalog: Arc<dyn Catalog>,
        buyers: Arc<dyn BuyerDirectory>,
        gateway: Arc<dyn PaymentGateway>,
        config: CheckoutConfig,
    ) -> Self {
        let lifecycle = Arc::new(OrderLifecycle::new(
            store.clone(),
            catalog.clone(),
            buyers.clone(),
            gateway.clone(),
            config.clone(),
        ));

        Self {
            cart: CartService::new(store.clone(), catalog, buyers, config.clone()),
            payments: PaymentReconciler::new(lifecycle.clone(), gateway),
            inventory: Inventory::new(store, config),
            lifecycle,
        }
    }
}
