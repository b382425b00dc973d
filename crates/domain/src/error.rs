//! Domain error types.

use event_store::EventStoreError;
use thiserror::Error;

use crate::cart::CartError;
use crate::inventory::StockError;
use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Stock error: {0}")]
    Stock(#[from] StockError),

    /// A catalog or buyer directory lookup failed (not "not found": the
    /// collaborator itself could not answer).
    #[error("{collaborator} unavailable: {message}")]
    Collaborator {
        collaborator: &'static str,
        message: String,
    },

    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// True when the failure was a lost optimistic-concurrency race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::EventStore(e) if e.is_conflict())
    }
}
