//! Append-only event log for the marketplace engine.
//!
//! Every aggregate (cart, stock counter, order) is a stream of events. Writers
//! state the version they read; [`EventStore::commit`] applies appends to
//! several streams atomically or rejects all of them.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, SequencedEvent, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{
    AppendOptions, EventStore, EventStoreExt, EventStream, SequencedStream, StreamAppend,
};
