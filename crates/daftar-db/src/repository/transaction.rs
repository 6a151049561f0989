//! # Transaction Repository
//!
//! Database operations for issued sales and collection records.
//!
//! ## Storage Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  transactions                                                           │
//! │  ──────────────────────────────────────────────────────────────────     │
//! │  id │ kind │ date │ line_items (JSON) │ total_cents │ payment_method   │
//! │  customer_ref │ customer_name_snapshot │ payments (JSON) │ is_paid      │
//! │  related_transaction_ref │ revision │ updated_at                        │
//! │                                                                         │
//! │  Writes after insert touch only payments, is_paid, revision and         │
//! │  updated_at, and only through compare_and_swap.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Compare-and-Swap
//! ```text
//!   UPDATE ... WHERE id = ? AND revision = <revision the caller read>
//!        │
//!        ├── 1 row affected  ──► the write won
//!        └── 0 rows affected ──► someone else wrote first (or the row is gone)
//! ```

use chrono::{DateTime, Utc};
use daftar_core::{Money, PaymentMethod, Transaction, TransactionKind};
use daftar_ledger::TransactionFilter;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

const SELECT_COLUMNS: &str = r#"
    SELECT
        id,
        kind,
        date,
        line_items,
        total_cents,
        payment_method,
        customer_ref,
        customer_name_snapshot,
        payments,
        is_paid,
        related_transaction_ref,
        revision,
        updated_at
    FROM transactions
"#;

/// Raw row; JSON columns are decoded in [`TransactionRow::into_domain`].
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: String,
    kind: TransactionKind,
    date: DateTime<Utc>,
    line_items: String,
    total_cents: i64,
    payment_method: PaymentMethod,
    customer_ref: Option<String>,
    customer_name_snapshot: Option<String>,
    payments: String,
    is_paid: bool,
    related_transaction_ref: Option<String>,
    revision: i64,
    updated_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> DbResult<Transaction> {
        Ok(Transaction {
            id: self.id,
            kind: self.kind,
            date: self.date,
            line_items: serde_json::from_str(&self.line_items)?,
            total: Money::from_cents(self.total_cents),
            payment_method: self.payment_method,
            customer_ref: self.customer_ref,
            customer_name_snapshot: self.customer_name_snapshot,
            payments: serde_json::from_str(&self.payments)?,
            is_paid: self.is_paid,
            related_transaction_ref: self.related_transaction_ref,
            revision: self.revision,
            updated_at: self.updated_at,
        })
    }
}

/// Repository for transaction database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.transactions();
/// repo.insert(&txn).await?;
/// let open = repo.select(&TransactionFilter::open_debts_of("c1"), 0, 1000).await?;
/// ```
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    /// Creates a new TransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Inserts a fully materialised transaction.
    pub async fn insert(&self, txn: &Transaction) -> DbResult<()> {
        let line_items = serde_json::to_string(&txn.line_items)?;
        let payments = serde_json::to_string(&txn.payments)?;

        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, kind, date, line_items, total_cents, payment_method,
                customer_ref, customer_name_snapshot, payments, is_paid,
                related_transaction_ref, revision, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&txn.id)
        .bind(txn.kind)
        .bind(txn.date)
        .bind(line_items)
        .bind(txn.total.cents())
        .bind(txn.payment_method)
        .bind(&txn.customer_ref)
        .bind(&txn.customer_name_snapshot)
        .bind(payments)
        .bind(txn.is_paid)
        .bind(&txn.related_transaction_ref)
        .bind(txn.revision)
        .bind(txn.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(id = %txn.id, kind = ?txn.kind, total = %txn.total, "Transaction inserted");
        Ok(())
    }

    /// Gets a transaction by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Transaction>> {
        let row: Option<TransactionRow> =
            sqlx::query_as(&format!("{} WHERE id = ?1", SELECT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(TransactionRow::into_domain).transpose()
    }

    /// Current revision of a row, or `None` if it doesn't exist.
    pub async fn current_revision(&self, id: &str) -> DbResult<Option<i64>> {
        let revision = sqlx::query_scalar("SELECT revision FROM transactions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(revision)
    }

    /// Writes the mutable columns of `txn` if the stored revision still
    /// equals `base_revision`. Returns whether the write happened.
    pub async fn compare_and_swap(&self, txn: &Transaction, base_revision: i64) -> DbResult<bool> {
        let payments = serde_json::to_string(&txn.payments)?;

        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET payments = ?1, is_paid = ?2, revision = ?3, updated_at = ?4
            WHERE id = ?5 AND revision = ?6
            "#,
        )
        .bind(payments)
        .bind(txn.is_paid)
        .bind(txn.revision)
        .bind(txn.updated_at)
        .bind(&txn.id)
        .bind(base_revision)
        .execute(&self.pool)
        .await?;

        let swapped = result.rows_affected() == 1;
        debug!(id = %txn.id, base_revision, swapped, "Transaction compare-and-swap");
        Ok(swapped)
    }

    /// Deletes a transaction. Returns whether a row was removed.
    pub async fn delete(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// One page of matching rows ordered by `(date, id)`.
    pub async fn select(
        &self,
        filter: &TransactionFilter,
        offset: u32,
        limit: u32,
    ) -> DbResult<Vec<Transaction>> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);
        query.push(" WHERE 1 = 1");

        if let Some(customer_ref) = &filter.customer_ref {
            query.push(" AND customer_ref = ").push_bind(customer_ref.clone());
        }
        if let Some(kind) = filter.kind {
            query.push(" AND kind = ").push_bind(kind);
        }
        if let Some(method) = filter.payment_method {
            query.push(" AND payment_method = ").push_bind(method);
        }
        if let Some(is_paid) = filter.is_paid {
            query.push(" AND is_paid = ").push_bind(is_paid);
        }

        query
            .push(" ORDER BY date ASC, id ASC LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(i64::from(offset));

        let rows: Vec<TransactionRow> = query.build_query_as().fetch_all(&self.pool).await?;

        debug!(count = rows.len(), offset, limit, "Transactions selected");
        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    /// Total number of stored transactions.
    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
