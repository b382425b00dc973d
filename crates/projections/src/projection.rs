//! The projection contract.

use async_trait::async_trait;
use event_store::EventEnvelope;

use crate::Result;

/// Folds events into a query-side model.
///
/// The [`ProjectionProcessor`](crate::ProjectionProcessor) delivers every
/// stored event exactly once, in store order, until the next reset.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    /// Handles one event. Events of aggregates the projection does not
    /// care about are ignored.
    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    /// Drops everything so the projection can be rebuilt from scratch.
    async fn reset(&self);
}
