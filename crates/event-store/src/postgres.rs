use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventStoreError, Result, SequencedEvent, Version,
    store::{EventStore, SequencedStream, StreamAppend, validate_batch},
};

/// PostgreSQL-backed event store.
///
/// A commit runs in one transaction. Version checks read `MAX(version)` per
/// stream; the `unique_aggregate_version` constraint turns a racing writer
/// that passed the same check into a `ConcurrencyConflict`.
///
/// Commits are serialized by an advisory lock held until the transaction
/// ends. `sequence` values are drawn under that lock, so they become visible
/// in increasing order and a reader resuming after a sequence misses nothing.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Key of the transaction-scoped advisory lock every commit takes. Other
    /// writers to `events` must take it too.
    pub const COMMIT_LOCK_KEY: i64 = 0x6f72_6465_725f_6c6f;

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` with a bounded pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_sequenced(row: PgRow) -> Result<SequencedEvent> {
        let sequence: i64 = row.try_get("sequence")?;
        Ok(SequencedEvent {
            sequence: sequence as u64,
            envelope: Self::row_to_event(row)?,
        })
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;

        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            version: Version::new(row.try_get("version")?),
            timestamp: row.try_get("timestamp")?,
            payload: row.try_get("payload")?,
            metadata,
        })
    }

    async fn write_stream(
        tx: &mut Transaction<'_, Postgres>,
        append: &StreamAppend,
    ) -> Result<Version> {
        let aggregate_id = append.aggregate_id;

        if let Some(expected) = append.options.expected_version {
            let current: Option<i64> =
                sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                    .bind(aggregate_id.as_uuid())
                    .fetch_one(&mut **tx)
                    .await?;
            let actual = Version::new(current.unwrap_or(0));

            if actual != expected {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id,
                    expected,
                    actual,
                });
            }
        }

        for event in &append.events {
            let metadata_json = serde_json::to_value(&event.metadata)?;

            sqlx::query(
                r#"
                INSERT INTO events (id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(event.event_id.as_uuid())
            .bind(&event.event_type)
            .bind(aggregate_id.as_uuid())
            .bind(&event.aggregate_type)
            .bind(event.version.as_i64())
            .bind(event.timestamp)
            .bind(&event.payload)
            .bind(metadata_json)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                let duplicate_version = e
                    .as_database_error()
                    .and_then(|db_err| db_err.constraint())
                    == Some("unique_aggregate_version");
                if duplicate_version {
                    return EventStoreError::ConcurrencyConflict {
                        aggregate_id,
                        expected: append.options.expected_version.unwrap_or(Version::initial()),
                        actual: event.version,
                    };
                }
                EventStoreError::Database(e)
            })?;
        }

        Ok(append.last_version())
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn commit(&self, batch: Vec<StreamAppend>) -> Result<Vec<Version>> {
        validate_batch(&batch)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(Self::COMMIT_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        let mut versions = Vec::with_capacity(batch.len());

        for append in &batch {
            // Dropping `tx` on error rolls the whole batch back.
            versions.push(Self::write_stream(&mut tx, append).await?);
        }

        tx.commit().await?;
        Ok(versions)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata
            FROM events
            WHERE aggregate_id = $1
            ORDER BY version ASC
            "#,
        )
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn stream_events_after(&self, after: u64) -> Result<SequencedStream> {
        use futures_util::stream;

        let after = i64::try_from(after).unwrap_or(i64::MAX);

        // Rows are materialized so the stream does not borrow the pool.
        let rows = sqlx::query(
            r#"
            SELECT sequence, id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata
            FROM events
            WHERE sequence > $1
            ORDER BY sequence ASC
            "#,
        )
        .bind(after)
        .fetch_all(&self.pool)
        .await?;

        Ok(Box::pin(stream::iter(
            rows.into_iter().map(Self::row_to_sequenced),
        )))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }
}
