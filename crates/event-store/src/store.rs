use std::collections::HashSet;
use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use futures_util::StreamExt;

use crate::{AggregateId, EventEnvelope, EventStoreError, Result, SequencedEvent, Version};

/// Concurrency expectation for one stream of a commit.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Version the writer read. `None` skips the check (use with caution).
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// The stream must not exist yet.
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// Events destined for a single stream inside a [`EventStore::commit`].
#[derive(Debug, Clone)]
pub struct StreamAppend {
    pub aggregate_id: AggregateId,
    pub options: AppendOptions,
    pub events: Vec<EventEnvelope>,
}

impl StreamAppend {
    /// Groups `events` for one stream, checking they are non-empty, target the
    /// same aggregate and carry consecutive versions.
    pub fn new(events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Self> {
        validate_events_for_append(&events)?;
        let aggregate_id = events[0].aggregate_id;
        Ok(Self {
            aggregate_id,
            options,
            events,
        })
    }

    /// Version of the stream once this append lands.
    pub fn last_version(&self) -> Version {
        self.events
            .last()
            .map(|e| e.version)
            .unwrap_or(Version::initial())
    }
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

pub type SequencedStream = Pin<Box<dyn Stream<Item = Result<SequencedEvent>> + Send>>;

/// Append-only event log with optimistic concurrency per stream.
///
/// Implementations must be thread-safe; every operation may be called
/// concurrently from many request tasks.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends to several streams atomically.
    ///
    /// Either every stream receives its events or none does. If any stream's
    /// current version differs from its expected version the whole commit
    /// fails with `ConcurrencyConflict`.
    ///
    /// Returns the new version of each stream, in batch order.
    async fn commit(&self, batch: Vec<StreamAppend>) -> Result<Vec<Version>>;

    /// All events of one stream, oldest first.
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Events with a sequence greater than `after`, in sequence order.
    ///
    /// An event is visible here only once every event with a smaller
    /// sequence is, so a reader that remembers the last sequence it saw never
    /// skips a commit.
    async fn stream_events_after(&self, after: u64) -> Result<SequencedStream>;

    /// Every stored event in commit order.
    async fn stream_all_events(&self) -> Result<EventStream> {
        let events = self.stream_events_after(0).await?;
        Ok(Box::pin(events.map(|event| event.map(|e| e.envelope))))
    }

    /// Current version of a stream, or `None` when it has no events.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;

    /// Appends to a single stream.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        let append = StreamAppend::new(events, options)?;
        let last = append.last_version();
        self.commit(vec![append]).await?;
        Ok(last)
    }
}

#[async_trait]
pub trait EventStoreExt: EventStore {
    async fn aggregate_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.get_aggregate_version(aggregate_id).await?.is_some())
    }
}

impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Checks that a single-stream batch is well formed.
pub fn validate_events_for_append(events: &[EventEnvelope]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "cannot append an empty event list".to_string(),
        ));
    };

    let mut expected_version = first.version;
    for event in events.iter().skip(1) {
        if event.aggregate_id != first.aggregate_id || event.aggregate_type != first.aggregate_type
        {
            return Err(EventStoreError::InvalidAppend(
                "all events must belong to the same aggregate".to_string(),
            ));
        }
        expected_version = expected_version.next();
        if event.version != expected_version {
            return Err(EventStoreError::InvalidAppend(format!(
                "event versions must be sequential: expected {expected_version}, got {}",
                event.version
            )));
        }
    }

    Ok(())
}

/// Checks a multi-stream batch: non-empty, and each stream appears once.
pub fn validate_batch(batch: &[StreamAppend]) -> Result<()> {
    if batch.is_empty() {
        return Err(EventStoreError::InvalidAppend(
            "cannot commit an empty batch".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(batch.len());
    for append in batch {
        validate_events_for_append(&append.events)?;
        if !seen.insert(append.aggregate_id) {
            return Err(EventStoreError::InvalidAppend(format!(
                "stream {} appears more than once in a commit",
                append.aggregate_id
            )));
        }
    }

    Ok(())
}
