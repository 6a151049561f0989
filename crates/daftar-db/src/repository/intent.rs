//! # Collection Intent Repository
//!
//! Journal of multi-invoice collections. An intent row is written before
//! the first invoice is touched and finalised after the last one.
//!
//! ```text
//! pending ──all portions applied──► completed
//!    │
//!    ├──failure, nothing applied──► abandoned
//!    │
//!    └──store failure mid-way──► failed ──resume──► completed
//! ```
//! The planned portions are a JSON array fixed at insert; updates never
//! rewrite them.

use chrono::{DateTime, Utc};
use daftar_core::{CollectionIntent, IntentStatus, Money, PlannedPortion, SettlementMethod};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};

const SELECT_COLUMNS: &str = r#"
    SELECT
        id, customer_ref, amount_cents, method, status, planned,
        applied_cents, unallocated_cents, last_error, created_at, updated_at
    FROM collection_intents
"#;

#[derive(Debug, sqlx::FromRow)]
struct IntentRow {
    id: String,
    customer_ref: String,
    amount_cents: i64,
    method: SettlementMethod,
    status: IntentStatus,
    planned: String,
    applied_cents: i64,
    unallocated_cents: i64,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IntentRow {
    fn into_domain(self) -> DbResult<CollectionIntent> {
        let planned: Vec<PlannedPortion> = serde_json::from_str(&self.planned)?;
        Ok(CollectionIntent {
            id: self.id,
            customer_ref: self.customer_ref,
            amount: Money::from_cents(self.amount_cents),
            method: self.method,
            status: self.status,
            planned,
            applied: Money::from_cents(self.applied_cents),
            unallocated: Money::from_cents(self.unallocated_cents),
            last_error: self.last_error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Repository for collection intent operations.
#[derive(Debug, Clone)]
pub struct IntentRepository {
    pool: SqlitePool,
}

impl IntentRepository {
    /// Creates a new IntentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        IntentRepository { pool }
    }

    pub async fn insert(&self, intent: &CollectionIntent) -> DbResult<()> {
        let planned = serde_json::to_string(&intent.planned)?;

        sqlx::query(
            r#"
            INSERT INTO collection_intents (
                id, customer_ref, amount_cents, method, status, planned,
                applied_cents, unallocated_cents, last_error, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&intent.id)
        .bind(&intent.customer_ref)
        .bind(intent.amount.cents())
        .bind(intent.method)
        .bind(intent.status)
        .bind(planned)
        .bind(intent.applied.cents())
        .bind(intent.unallocated.cents())
        .bind(&intent.last_error)
        .bind(intent.created_at)
        .bind(intent.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(id = %intent.id, customer = %intent.customer_ref, amount = %intent.amount, "Intent recorded");
        Ok(())
    }

    /// Overwrites the progress columns. `NotFound` if the intent is unknown.
    pub async fn update(&self, intent: &CollectionIntent) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE collection_intents
            SET status = ?1, applied_cents = ?2, unallocated_cents = ?3,
                last_error = ?4, updated_at = ?5
            WHERE id = ?6
            "#,
        )
        .bind(intent.status)
        .bind(intent.applied.cents())
        .bind(intent.unallocated.cents())
        .bind(&intent.last_error)
        .bind(intent.updated_at)
        .bind(&intent.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("collection intent", intent.id.clone()));
        }

        debug!(id = %intent.id, status = ?intent.status, applied = %intent.applied, "Intent updated");
        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CollectionIntent>> {
        let row: Option<IntentRow> = sqlx::query_as(&format!("{} WHERE id = ?1", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(IntentRow::into_domain).transpose()
    }

    /// Pending and failed intents, oldest first. Completed and abandoned
    /// intents are closed and never listed.
    pub async fn list_unfinished(&self) -> DbResult<Vec<CollectionIntent>> {
        let rows: Vec<IntentRow> = sqlx::query_as(&format!(
            "{} WHERE status IN ('pending', 'failed') ORDER BY created_at ASC, id ASC",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(IntentRow::into_domain).collect()
    }
}
