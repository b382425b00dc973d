//! Command handling infrastructure.
//!
//! [`CommandHandler`] covers the single-stream case: load, decide, append
//! with the version that was read. [`UnitOfWork`] collects decisions taken
//! against several aggregates and commits them in one atomic store commit.

use std::marker::PhantomData;

use common::AggregateId;
use event_store::{AppendOptions, EventEnvelope, EventStore, StreamAppend, Version};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    pub new_version: Version,
}

/// Loads aggregates of type `A` and executes commands against them.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Rebuilds the aggregate from its stream.
    ///
    /// A stream with no events yields `A::default()` at version 0.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let events = self.store.get_events_for_aggregate(aggregate_id).await?;

        let mut aggregate = A::default();
        for envelope in &events {
            aggregate.apply_envelope(envelope)?;
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        Ok(aggregate.id().is_some().then_some(aggregate))
    }

    /// Executes a command and persists the resulting events.
    ///
    /// The command function receives the current aggregate state and returns
    /// either a list of events to apply, or an error. The append expects the
    /// version that was loaded, so a concurrent writer surfaces as
    /// `ConcurrencyConflict`.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut aggregate = self.load(aggregate_id).await?;
        let current_version = aggregate.version();

        let events = command_fn(&aggregate)?;

        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events: vec![],
                new_version: current_version,
            });
        }

        let envelopes = build_envelopes::<A>(aggregate_id, current_version, &events)?;
        let new_version = self
            .store
            .append(envelopes, AppendOptions::expect_version(current_version))
            .await?;

        aggregate.apply_events(events.iter().cloned());
        aggregate.set_version(new_version);

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }
}

/// Wraps domain events in envelopes numbered after `current_version`.
pub fn build_envelopes<A: Aggregate>(
    aggregate_id: AggregateId,
    current_version: Version,
    events: &[A::Event],
) -> Result<Vec<EventEnvelope>, DomainError> {
    let mut envelopes = Vec::with_capacity(events.len());
    let mut version = current_version;

    for event in events {
        version = version.next();
        let envelope = EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type(A::aggregate_type())
            .event_type(event.event_type())
            .version(version)
            .payload(event)?
            .build()?;
        envelopes.push(envelope);
    }

    Ok(envelopes)
}

/// Decisions against several aggregates, committed together.
///
/// Each recorded aggregate is appended with the version it was loaded at;
/// if any of them moved in the meantime nothing is written.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    appends: Vec<StreamAppend>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages `events` for `aggregate`'s stream. Empty event lists are ignored.
    pub fn record<A: Aggregate>(
        &mut self,
        aggregate_id: AggregateId,
        aggregate: &A,
        events: &[A::Event],
    ) -> Result<(), DomainError> {
        if events.is_empty() {
            return Ok(());
        }

        let envelopes = build_envelopes::<A>(aggregate_id, aggregate.version(), events)?;
        let append = StreamAppend::new(
            envelopes,
            AppendOptions::expect_version(aggregate.version()),
        )?;
        self.appends.push(append);
        Ok(())
    }

    pub fn stream_count(&self) -> usize {
        self.appends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.appends.is_empty()
    }

    pub async fn commit<S: EventStore + ?Sized>(self, store: &S) -> Result<(), DomainError> {
        if self.appends.is_empty() {
            return Ok(());
        }
        store.commit(self.appends).await?;
        Ok(())
    }
}
