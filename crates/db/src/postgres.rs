//! PostgreSQL [`GroupStore`] over the `log_groups` table.
//!
//! Fuzzy search relies on the `pg_trgm` extension, installed by the initial
//! migration, and compares canonical messages. Occurrence history is stored
//! as a JSONB array.

use std::collections::HashMap;

use async_trait::async_trait;
use loggroup_core::record::GroupRecord;
use loggroup_core::types::Timestamp;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::StoreError;
use crate::models::log_group::LogGroupRow;
use crate::store::{GroupStore, GroupWrite};

/// Column list for `log_groups` SELECT queries.
const COLUMNS: &str = "\
    id, message_template, canonical_message, level, first_occurrence, last_occurrence, \
    occurrence_count, function, file, line, occurrences, expires_at";

/// Full-row upsert shared by creates and updates. Binds follow [`bind_record`].
const UPSERT: &str = "\
    INSERT INTO log_groups \
        (id, message_template, canonical_message, level, first_occurrence, last_occurrence, \
         occurrence_count, function, file, line, occurrences, expires_at) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
    ON CONFLICT (id) DO UPDATE SET \
        message_template = EXCLUDED.message_template, \
        canonical_message = EXCLUDED.canonical_message, \
        level = EXCLUDED.level, \
        first_occurrence = EXCLUDED.first_occurrence, \
        last_occurrence = EXCLUDED.last_occurrence, \
        occurrence_count = EXCLUDED.occurrence_count, \
        function = EXCLUDED.function, \
        file = EXCLUDED.file, \
        line = EXCLUDED.line, \
        occurrences = EXCLUDED.occurrences, \
        expires_at = EXCLUDED.expires_at, \
        updated_at = NOW()";

/// Predicate hiding expired rows.
const LIVE: &str = "(expires_at IS NULL OR expires_at > NOW())";

/// Upper bound on [`GroupStore::suggest`] results.
const MAX_SUGGESTIONS: i64 = 5;

/// PostgreSQL error code for a unique constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL error code for an undefined function or operator (`pg_trgm`
/// missing).
const UNDEFINED_FUNCTION: &str = "42883";

#[derive(Debug, Clone)]
pub struct PgGroupStore {
    pool: PgPool,
}

impl PgGroupStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Every live record, most recently active first.
    pub async fn list(&self) -> Result<Vec<GroupRecord>, StoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM log_groups WHERE {LIVE} \
             ORDER BY last_occurrence DESC NULLS LAST"
        );
        let rows = sqlx::query_as::<_, LogGroupRow>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(GroupRecord::from).collect())
    }

    /// Insert a new row. An expired row with the same id is replaced; a live
    /// one is a conflict.
    async fn create(
        tx: &mut Transaction<'_, Postgres>,
        record: &GroupRecord,
    ) -> Result<(), StoreError> {
        let query = format!(
            "{UPSERT} WHERE log_groups.expires_at IS NOT NULL AND log_groups.expires_at <= NOW()"
        );
        let result = bind_record(sqlx::query(&query), record)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                if has_code(&e, UNIQUE_VIOLATION) {
                    StoreError::Conflict {
                        id: record.id.clone(),
                    }
                } else {
                    StoreError::Database(e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict {
                id: record.id.clone(),
            });
        }
        Ok(())
    }

    /// Overwrite a row, recreating it if it was purged meanwhile.
    async fn update(
        tx: &mut Transaction<'_, Postgres>,
        record: &GroupRecord,
    ) -> Result<(), StoreError> {
        bind_record(sqlx::query(UPSERT), record)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

fn bind_record<'q>(
    query: Query<'q, Postgres, PgArguments>,
    record: &'q GroupRecord,
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(&record.id)
        .bind(&record.message_template)
        .bind(&record.canonical_message)
        .bind(record.level.as_str())
        .bind(record.first_occurrence)
        .bind(record.last_occurrence)
        .bind(record.occurrence_count)
        .bind(&record.function)
        .bind(&record.file)
        .bind(&record.line)
        .bind(Json(&record.occurrences))
        .bind(record.expires_at)
}

fn has_code(e: &sqlx::Error, code: &str) -> bool {
    e.as_database_error()
        .and_then(|d| d.code())
        .is_some_and(|c| c == code)
}

#[async_trait]
impl GroupStore for PgGroupStore {
    async fn load_many(&self, ids: &[String]) -> Result<HashMap<String, GroupRecord>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let query = format!("SELECT {COLUMNS} FROM log_groups WHERE id = ANY($1) AND {LIVE}");
        let rows = sqlx::query_as::<_, LogGroupRow>(&query)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.id.clone(), GroupRecord::from(row)))
            .collect())
    }

    async fn save_all(&self, writes: Vec<GroupWrite>) -> Result<(), StoreError> {
        if writes.is_empty() {
            return Ok(());
        }

        // Dropping the transaction on error rolls it back.
        let mut tx = self.pool.begin().await?;
        for write in &writes {
            match write {
                GroupWrite::Create(record) => Self::create(&mut tx, record).await?,
                GroupWrite::Update(record) => Self::update(&mut tx, record).await?,
            }
        }
        tx.commit().await?;

        tracing::debug!(writes = writes.len(), "Saved log groups");
        Ok(())
    }

    async fn suggest(&self, text: &str, accuracy: f32) -> Result<Vec<String>, StoreError> {
        let unsupported = |e: sqlx::Error| {
            if has_code(&e, UNDEFINED_FUNCTION) {
                StoreError::Unsupported("pg_trgm is not installed".into())
            } else {
                StoreError::Database(e)
            }
        };

        // `%` can use the trigram index; its threshold is scoped to this
        // transaction.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT set_config('pg_trgm.similarity_threshold', $1, true)")
            .bind(accuracy.to_string())
            .execute(&mut *tx)
            .await?;

        let query = format!(
            "SELECT canonical_message FROM log_groups \
             WHERE canonical_message % $1 AND {LIVE} \
             GROUP BY canonical_message \
             ORDER BY MAX(similarity(canonical_message, $1)) DESC \
             LIMIT $2"
        );
        let suggestions = sqlx::query_scalar::<_, String>(&query)
            .bind(text)
            .bind(MAX_SUGGESTIONS)
            .fetch_all(&mut *tx)
            .await
            .map_err(unsupported)?;
        tx.commit().await?;

        Ok(suggestions)
    }

    async fn load_by_canonical(
        &self,
        canonical: &str,
    ) -> Result<Option<GroupRecord>, StoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM log_groups \
             WHERE canonical_message = $1 AND {LIVE} \
             ORDER BY last_occurrence DESC NULLS LAST \
             LIMIT 1"
        );
        let row = sqlx::query_as::<_, LogGroupRow>(&query)
            .bind(canonical)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(GroupRecord::from))
    }

    async fn purge_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM log_groups WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            tracing::debug!(purged = result.rows_affected(), "Purged expired log groups");
        }
        Ok(result.rows_affected())
    }
}
