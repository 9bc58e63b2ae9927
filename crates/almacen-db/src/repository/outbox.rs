//! # Sync Outbox Repository
//!
//! Durable pending-sync markers for offline-first synchronization.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outbox Pattern Implementation                        │
//! │                                                                         │
//! │  LOCAL OPERATION (e.g., confirm_invoice)                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                   SINGLE TRANSACTION                            │    │
//! │  │                                                                 │    │
//! │  │  1. INSERT invoice + items, decrement stock, audit movements    │    │
//! │  │                                                                 │    │
//! │  │  2. INSERT INTO sync_outbox (entity_type, entity_id)            │    │
//! │  │     ON CONFLICT(entity_type, entity_id) DO UPDATE ...           │    │
//! │  │                                                                 │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← Both succeed or both fail (atomicity guaranteed)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SyncEngine::push_pending()                                             │
//! │    • loads pending markers, pushes current rows to the remote store     │
//! │    • on success: DELETE the markers                                     │
//! │    • on failure: attempts += 1, last_error recorded, markers stay       │
//! │                                                                         │
//! │  KEY GUARANTEES:                                                        │
//! │  • The sale is never lost (it's in the local DB)                        │
//! │  • The marker is never orphaned (same transaction)                      │
//! │  • (entity_type, entity_id) is UNIQUE: N edits = 1 marker = 1 push      │
//! │  • Offline? Markers queue up; back online, push drains them             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Markers carry no payload. The push reads the CURRENT row at push time,
//! so a marker enqueued three edits ago still pushes the latest state.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use almacen_core::{EntityKind, OutboxEntry};

/// Stored `last_error` messages are truncated to this many characters.
pub const MAX_ERROR_LEN: usize = 500;

// =============================================================================
// Transaction-Scoped Helper
// =============================================================================

/// Upserts a pending-sync marker inside a caller-owned transaction.
///
/// A conflict on `(entity_type, entity_id)` means the entity was already
/// pending; the marker is refreshed and its retry bookkeeping reset, since
/// the new local change supersedes whatever failed before.
pub(crate) async fn upsert_entry<'e, E>(
    executor: E,
    kind: EntityKind,
    entity_id: i64,
    now: DateTime<Utc>,
) -> DbResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO sync_outbox (entity_type, entity_id, created_at, attempts)
        VALUES (?1, ?2, ?3, 0)
        ON CONFLICT(entity_type, entity_id) DO UPDATE SET
            created_at = excluded.created_at,
            attempts = 0,
            last_attempt_at = NULL,
            last_error = NULL
        "#,
    )
    .bind(kind.as_str())
    .bind(entity_id)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(())
}

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OutboxRow {
    id: i64,
    entity_type: String,
    entity_id: i64,
    created_at: DateTime<Utc>,
    attempts: i64,
    last_attempt_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl TryFrom<OutboxRow> for OutboxEntry {
    type Error = DbError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        let entity_kind = row
            .entity_type
            .parse::<EntityKind>()
            .map_err(|e| DbError::Internal(e.to_string()))?;

        Ok(OutboxEntry {
            id: row.id,
            entity_kind,
            entity_id: row.entity_id,
            created_at: row.created_at,
            attempts: row.attempts,
            last_attempt_at: row.last_attempt_at,
            last_error: row.last_error,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sync outbox operations.
#[derive(Debug, Clone)]
pub struct OutboxRepository {
    pool: SqlitePool,
}

impl OutboxRepository {
    /// Creates a new OutboxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OutboxRepository { pool }
    }

    /// Marks an entity pending sync.
    ///
    /// Idempotent per entity: repeated calls refresh the one existing marker.
    pub async fn upsert(&self, kind: EntityKind, entity_id: i64) -> DbResult<()> {
        debug!(kind = %kind, entity_id, "Marking entity pending sync");
        upsert_entry(&self.pool, kind, entity_id, Utc::now()).await
    }

    /// Marks a batch of entities pending sync in one transaction.
    pub async fn upsert_all(&self, entries: &[(EntityKind, i64)]) -> DbResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        for (kind, entity_id) in entries {
            upsert_entry(&mut *tx, *kind, *entity_id, now).await?;
        }
        tx.commit().await?;

        debug!(count = entries.len(), "Batch marked pending sync");

        Ok(())
    }

    /// Lists pending markers of one kind, oldest first.
    pub async fn get_by_kind(&self, kind: EntityKind) -> DbResult<Vec<OutboxEntry>> {
        let rows: Vec<OutboxRow> = sqlx::query_as(
            r#"
            SELECT id, entity_type, entity_id, created_at,
                   attempts, last_attempt_at, last_error
            FROM sync_outbox
            WHERE entity_type = ?1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OutboxEntry::try_from).collect()
    }

    /// Removes markers after a successful push (or when the underlying local
    /// row no longer exists).
    pub async fn delete_by_kind_and_ids(&self, kind: EntityKind, ids: &[i64]) -> DbResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut builder = sqlx::QueryBuilder::<Sqlite>::new(
            "DELETE FROM sync_outbox WHERE entity_type = ",
        );
        builder.push_bind(kind.as_str());
        builder.push(" AND entity_id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let result = builder.build().execute(&self.pool).await?;

        debug!(kind = %kind, deleted = result.rows_affected(), "Outbox markers cleared");

        Ok(result.rows_affected())
    }

    /// Records a failed push attempt on a batch of markers.
    ///
    /// Bumps `attempts`, stamps `last_attempt_at`, and stores the error
    /// message truncated to [`MAX_ERROR_LEN`] characters. The markers stay
    /// pending: the next push retries them.
    pub async fn mark_attempt(
        &self,
        kind: EntityKind,
        ids: &[i64],
        error: &str,
    ) -> DbResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let truncated: String = error.chars().take(MAX_ERROR_LEN).collect();

        let mut builder = sqlx::QueryBuilder::<Sqlite>::new(
            "UPDATE sync_outbox SET attempts = attempts + 1, last_attempt_at = ",
        );
        builder.push_bind(now);
        builder.push(", last_error = ");
        builder.push_bind(truncated);
        builder.push(" WHERE entity_type = ");
        builder.push_bind(kind.as_str());
        builder.push(" AND entity_id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        builder.build().execute(&self.pool).await?;

        Ok(())
    }

    /// Counts all pending markers across kinds.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_outbox")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
