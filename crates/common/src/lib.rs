//! Shared identifier types for the marketplace workspace.

mod types;

pub use types::AggregateId;
