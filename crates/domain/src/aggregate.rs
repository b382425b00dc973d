//! Core aggregate and domain event traits.

use common::AggregateId;
use event_store::{EventEnvelope, Version};
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Event name used as the envelope's `event_type`.
    fn event_type(&self) -> &'static str;
}

/// Trait for event-sourced aggregates.
///
/// An aggregate is rebuilt by replaying its stream, validates commands
/// against its current state, and answers each accepted command with the
/// events that record it. `apply` must be pure and infallible.
pub trait Aggregate: Default + Send + Sync + Sized {
    type Event: DomainEvent;

    type Error: std::error::Error + Send + Sync;

    /// Aggregate name stored on every envelope of this stream.
    fn aggregate_type() -> &'static str;

    /// `None` until the first event has been applied.
    fn id(&self) -> Option<AggregateId>;

    /// Version of the last applied event; 0 for a fresh aggregate.
    fn version(&self) -> Version;

    fn set_version(&mut self, version: Version);

    fn apply(&mut self, event: Self::Event);

    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }

    /// Decodes a stored envelope and applies it, advancing the version.
    fn apply_envelope(&mut self, envelope: &EventEnvelope) -> Result<(), serde_json::Error> {
        let event: Self::Event = serde_json::from_value(envelope.payload.clone())?;
        self.apply(event);
        self.set_version(envelope.version);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum CounterEvent {
        Opened { id: AggregateId },
        Bumped { by: i32 },
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Opened { .. } => "CounterOpened",
                CounterEvent::Bumped { .. } => "CounterBumped",
            }
        }
    }

    #[derive(Debug, Default)]
    struct Counter {
        id: Option<AggregateId>,
        value: i32,
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("counter error")]
    struct CounterError;

    impl Aggregate for Counter {
        type Event = CounterEvent;
        type Error = CounterError;

        fn aggregate_type() -> &'static str {
            "Counter"
        }

        fn id(&self) -> Option<AggregateId> {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                CounterEvent::Opened { id } => self.id = Some(id),
                CounterEvent::Bumped { by } => self.value += by,
            }
        }
    }

    #[test]
    fn apply_events_folds_in_order() {
        let id = AggregateId::new();
        let mut counter = Counter::default();
        counter.apply_events(vec![
            CounterEvent::Opened { id },
            CounterEvent::Bumped { by: 2 },
            CounterEvent::Bumped { by: 40 },
        ]);

        assert_eq!(counter.id(), Some(id));
        assert_eq!(counter.value, 42);
    }

    #[test]
    fn apply_envelope_tracks_stream_version() {
        let id = AggregateId::new();
        let event = CounterEvent::Opened { id };
        let envelope = EventEnvelope::builder()
            .aggregate_id(id)
            .aggregate_type(Counter::aggregate_type())
            .event_type(event.event_type())
            .version(Version::new(7))
            .payload(&event)
            .unwrap()
            .build()
            .unwrap();

        let mut counter = Counter::default();
        counter.apply_envelope(&envelope).unwrap();

        assert_eq!(counter.id(), Some(id));
        assert_eq!(counter.version(), Version::new(7));
    }

    #[test]
    fn apply_envelope_rejects_foreign_payload() {
        let envelope = EventEnvelope::builder()
            .aggregate_id(AggregateId::new())
            .aggregate_type("Counter")
            .event_type("Unknown")
            .version(Version::first())
            .payload_raw(serde_json::json!({"nope": true}))
            .build()
            .unwrap();

        let mut counter = Counter::default();
        assert!(counter.apply_envelope(&envelope).is_err());
    }
}
