use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, SequencedEvent, Version,
    store::{EventStore, SequencedStream, StreamAppend, validate_batch},
};

#[derive(Default)]
struct Log {
    /// Every event in commit order.
    events: Vec<EventEnvelope>,
    /// Positions in `events` per stream, in version order.
    streams: HashMap<AggregateId, Vec<usize>>,
}

impl Log {
    fn current_version(&self, aggregate_id: AggregateId) -> Version {
        self.streams
            .get(&aggregate_id)
            .and_then(|positions| positions.last())
            .map(|&pos| self.events[pos].version)
            .unwrap_or(Version::initial())
    }
}

/// Event store held in process memory.
///
/// Commits take a single write lock, so a multi-stream commit is checked and
/// applied as one step. Used by tests and by the API when no database is
/// configured.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    log: Arc<RwLock<Log>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn event_count(&self) -> usize {
        self.log.read().await.events.len()
    }

}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn commit(&self, batch: Vec<StreamAppend>) -> Result<Vec<Version>> {
        validate_batch(&batch)?;

        let mut log = self.log.write().await;

        for append in &batch {
            let current = log.current_version(append.aggregate_id);

            if let Some(expected) = append
                .options
                .expected_version
                .filter(|&expected| expected != current)
            {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: append.aggregate_id,
                    expected,
                    actual: current,
                });
            }

            // Unique (aggregate_id, version) constraint.
            if append.events[0].version != current.next() {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: append.aggregate_id,
                    expected: append.options.expected_version.unwrap_or(current),
                    actual: current,
                });
            }
        }

        let mut versions = Vec::with_capacity(batch.len());
        for append in batch {
            versions.push(append.last_version());
            for event in append.events {
                let position = log.events.len();
                log.streams
                    .entry(append.aggregate_id)
                    .or_default()
                    .push(position);
                log.events.push(event);
            }
        }

        Ok(versions)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        let events = log
            .streams
            .get(&aggregate_id)
            .map(|positions| {
                positions
                    .iter()
                    .map(|&pos| log.events[pos].clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(events)
    }

    async fn stream_events_after(&self, after: u64) -> Result<SequencedStream> {
        use futures_util::stream;

        // Sequence is the 1-based position in the log.
        let events: Vec<_> = self
            .log
            .read()
            .await
            .events
            .iter()
            .zip(1u64..)
            .skip_while(|(_, sequence)| *sequence <= after)
            .map(|(envelope, sequence)| SequencedEvent {
                sequence,
                envelope: envelope.clone(),
            })
            .collect();
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let log = self.log.read().await;
        Ok(log
            .streams
            .contains_key(&aggregate_id)
            .then(|| log.current_version(aggregate_id)))
    }
}
