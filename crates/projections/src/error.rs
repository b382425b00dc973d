//! Projection error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// A stored payload no longer matches the event types this crate knows.
    #[error("Cannot decode {event_type} event: {source}")]
    Decode {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
