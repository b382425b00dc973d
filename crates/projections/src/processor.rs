//! Feeds stored events to projections.

use event_store::{EventEnvelope, EventStore};
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::Result;
use crate::projection::Projection;

/// Delivers events from an event store to registered projections.
///
/// The processor remembers the sequence of the last event it delivered;
/// catch-up asks the store for everything after it and hands that to every
/// projection. Catch-ups are serialized, so callers may trigger one before
/// every query.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    last_sequence: Mutex<u64>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            last_sequence: Mutex::new(0),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Sequence of the last delivered event, 0 before the first.
    pub async fn position(&self) -> u64 {
        *self.last_sequence.lock().await
    }

    /// Delivers every event appended since the last catch-up and returns how
    /// many there were.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let mut last_sequence = self.last_sequence.lock().await;
        let mut stream = self.store.stream_events_after(*last_sequence).await?;
        let mut fresh: u64 = 0;

        while let Some(result) = stream.next().await {
            let event = result?;
            self.deliver(&event.envelope).await?;
            *last_sequence = event.sequence;
            fresh += 1;
        }

        if fresh > 0 {
            metrics::counter!("projections_events_processed").increment(fresh);
            tracing::debug!(fresh, position = *last_sequence, "catch-up complete");
        }

        Ok(fresh)
    }

    /// Resets every projection and replays the whole store.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        {
            let mut last_sequence = self.last_sequence.lock().await;
            for projection in &self.projections {
                projection.reset().await;
            }
            *last_sequence = 0;
        }

        let replayed = self.run_catch_up().await?;
        tracing::info!(replayed, projections = self.projections.len(), "projections rebuilt");
        Ok(replayed)
    }

    async fn deliver(&self, event: &EventEnvelope) -> Result<()> {
        for projection in &self.projections {
            projection.handle(event).await.inspect_err(|e| {
                tracing::error!(
                    projection = projection.name(),
                    event_type = %event.event_type,
                    error = %e,
                    "projection failed to handle event"
                );
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use async_trait::async_trait;
    use common::AggregateId;
    use event_store::{AppendOptions, InMemoryEventStore, Version};

    use super::*;

    #[derive(Clone, Default)]
    struct Counting {
        seen: Arc<AtomicU64>,
    }

    #[async_trait]
    impl Projection for Counting {
        fn name(&self) -> &'static str {
            "Counting"
        }

        async fn handle(&self, _event: &EventEnvelope) -> Result<()> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn reset(&self) {
            self.seen.store(0, Ordering::SeqCst);
        }
    }

    fn event(aggregate_id: AggregateId, version: i64) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Sample")
            .event_type("SampleRecorded")
            .version(Version::new(version))
            .payload_raw(serde_json::json!({ "n": version }))
            .build()
            .unwrap()
    }

    async fn store_with(count: i64) -> InMemoryEventStore {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        let events = (1..=count).map(|v| event(id, v)).collect();
        store.append(events, AppendOptions::new()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn catch_up_delivers_each_event_once() {
        let store = store_with(3).await;
        let counting = Counting::default();
        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(counting.clone()));

        assert_eq!(processor.run_catch_up().await.unwrap(), 3);
        assert_eq!(processor.run_catch_up().await.unwrap(), 0);
        assert_eq!(counting.seen.load(Ordering::SeqCst), 3);

        store
            .append(vec![event(AggregateId::new(), 1)], AppendOptions::new())
            .await
            .unwrap();
        assert_eq!(processor.run_catch_up().await.unwrap(), 1);
        assert_eq!(counting.seen.load(Ordering::SeqCst), 4);
        assert_eq!(processor.position().await, 4);
    }

    #[tokio::test]
    async fn every_projection_sees_every_event() {
        let first = Counting::default();
        let second = Counting::default();
        let mut processor = ProjectionProcessor::new(store_with(2).await);
        processor.register(Box::new(first.clone()));
        processor.register(Box::new(second.clone()));

        processor.run_catch_up().await.unwrap();

        assert_eq!(processor.projection_count(), 2);
        assert_eq!(first.seen.load(Ordering::SeqCst), 2);
        assert_eq!(second.seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rebuild_replays_from_scratch() {
        let counting = Counting::default();
        let mut processor = ProjectionProcessor::new(store_with(2).await);
        processor.register(Box::new(counting.clone()));
        processor.run_catch_up().await.unwrap();

        assert_eq!(processor.rebuild_all().await.unwrap(), 2);
        assert_eq!(counting.seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_store_delivers_nothing() {
        let counting = Counting::default();
        let mut processor = ProjectionProcessor::new(InMemoryEventStore::new());
        processor.register(Box::new(counting.clone()));

        assert_eq!(processor.run_catch_up().await.unwrap(), 0);
        assert_eq!(processor.position().await, 0);
    }

    #[tokio::test]
    async fn catch_up_resumes_after_the_last_sequence() {
        let store = store_with(2).await;
        let counting = Counting::default();
        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(counting.clone()));
        processor.run_catch_up().await.unwrap();

        let id = AggregateId::new();
        store
            .append(vec![event(id, 1), event(id, 2)], AppendOptions::new())
            .await
            .unwrap();

        assert_eq!(processor.run_catch_up().await.unwrap(), 2);
        assert_eq!(processor.position().await, 4);
        assert_eq!(counting.seen.load(Ordering::SeqCst), 4);
    }
}
