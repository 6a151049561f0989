//! # SQLite Ledger Store
//!
//! [`LedgerStore`] over the repositories in this crate. Durable writes are
//! broadcast to subscribers only after SQLite has accepted them.
//!
//! ## Update Path
//! ```text
//! update(id, patch)
//!      │
//!      ├─► get_by_id ─────────────── None ──► NotFound
//!      │
//!      ├─► expected_revision ≠ stored ──────► Conflict
//!      │
//!      ├─► patch.apply_to (revision + 1)
//!      │
//!      └─► compare_and_swap(base revision)
//!               ├── swapped ──► ChangeEvent::Updated
//!               └── lost race ──► Conflict (or NotFound if deleted)
//! ```

use async_trait::async_trait;
use chrono::Utc;
use daftar_core::{CollectionIntent, Transaction, TransactionDraft};
use daftar_ledger::store::CHANGE_FEED_CAPACITY;
use daftar_ledger::{
    ChangeEvent, LedgerStore, Page, StoreError, StoreResult, TransactionFilter, TransactionPatch,
};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::pool::Database;

pub struct SqliteLedgerStore {
    db: Database,
    changes: broadcast::Sender<ChangeEvent>,
}

impl SqliteLedgerStore {
    pub fn new(db: Database) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        SqliteLedgerStore { db, changes }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn publish(&self, event: ChangeEvent) {
        // no subscribers is fine
        let _ = self.changes.send(event);
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn insert(&self, draft: TransactionDraft) -> StoreResult<Transaction> {
        let txn = Transaction::from_draft(Uuid::new_v4().to_string(), draft, Utc::now());
        self.db.transactions().insert(&txn).await?;

        self.publish(ChangeEvent::Inserted(txn.clone()));
        Ok(txn)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Transaction>> {
        Ok(self.db.transactions().get_by_id(id).await?)
    }

    async fn update(&self, id: &str, patch: TransactionPatch) -> StoreResult<Transaction> {
        let repo = self.db.transactions();
        let mut txn = repo.get_by_id(id).await?.ok_or_else(|| StoreError::NotFound {
            entity: "transaction",
            id: id.to_string(),
        })?;

        let base_revision = txn.revision;
        if let Some(expected) = patch.expected_revision {
            if expected != base_revision {
                return Err(StoreError::Conflict {
                    id: id.to_string(),
                    expected,
                    actual: base_revision,
                });
            }
        }

        patch.apply_to(&mut txn, Utc::now());

        if !repo.compare_and_swap(&txn, base_revision).await? {
            // Another writer got in between our read and our write.
            return Err(match repo.current_revision(id).await? {
                Some(actual) => {
                    warn!(id = %id, expected = base_revision, actual, "Lost revision race");
                    StoreError::Conflict {
                        id: id.to_string(),
                        expected: base_revision,
                        actual,
                    }
                }
                None => StoreError::NotFound {
                    entity: "transaction",
                    id: id.to_string(),
                },
            });
        }

        debug!(id = %id, revision = txn.revision, "Updated transaction");
        self.publish(ChangeEvent::Updated(txn.clone()));
        Ok(txn)
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        if !self.db.transactions().delete(id).await? {
            return Err(StoreError::NotFound {
                entity: "transaction",
                id: id.to_string(),
            });
        }

        debug!(id = %id, "Deleted transaction");
        self.publish(ChangeEvent::Deleted { id: id.to_string() });
        Ok(())
    }

    async fn select(&self, filter: &TransactionFilter, page: Page) -> StoreResult<Vec<Transaction>> {
        Ok(self
            .db
            .transactions()
            .select(filter, page.offset, page.limit)
            .await?)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    async fn record_intent(&self, intent: &CollectionIntent) -> StoreResult<()> {
        Ok(self.db.intents().insert(intent).await?)
    }

    async fn update_intent(&self, intent: &CollectionIntent) -> StoreResult<()> {
        Ok(self.db.intents().update(intent).await?)
    }

    async fn get_intent(&self, id: &str) -> StoreResult<Option<CollectionIntent>> {
        Ok(self.db.intents().get_by_id(id).await?)
    }

    async fn pending_intents(&self) -> StoreResult<Vec<CollectionIntent>> {
        Ok(self.db.intents().list_unfinished().await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
