//! # In-Memory Ledger Store
//!
//! A [`LedgerStore`] held entirely in process memory. Used by tests and as
//! an offline scratch ledger.
//!
//! ## Fault Injection
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  set_offline(true)        every call fails with Unavailable             │
//! │  fail_updates_after(n)    the next n updates succeed, later ones fail   │
//! │  fail_intent_updates(on)  update_intent fails with Unavailable          │
//! │  heal()                   clears all three                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! This is how the partial-allocation and retry paths of the engine are
//! exercised without a real network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use daftar_core::{CollectionIntent, Transaction, TransactionDraft};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::store::{
    ChangeEvent, LedgerStore, Page, TransactionFilter, TransactionPatch, CHANGE_FEED_CAPACITY,
};

#[derive(Default)]
struct Tables {
    transactions: HashMap<String, Transaction>,
    intents: HashMap<String, CollectionIntent>,
}

pub struct MemoryLedgerStore {
    tables: RwLock<Tables>,
    changes: broadcast::Sender<ChangeEvent>,
    offline: AtomicBool,
    /// Remaining successful updates before injected failures; negative = unlimited.
    update_budget: AtomicI64,
    intent_updates_fail: AtomicBool,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        MemoryLedgerStore {
            tables: RwLock::new(Tables::default()),
            changes,
            offline: AtomicBool::new(false),
            update_budget: AtomicI64::new(-1),
            intent_updates_fail: AtomicBool::new(false),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Lets `n` more transaction updates through, then fails the rest.
    pub fn fail_updates_after(&self, n: usize) {
        self.update_budget.store(n as i64, Ordering::SeqCst);
    }

    /// Makes every `update_intent` fail while transaction writes still go
    /// through.
    pub fn fail_intent_updates(&self, fail: bool) {
        self.intent_updates_fail.store(fail, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.set_offline(false);
        self.update_budget.store(-1, Ordering::SeqCst);
        self.fail_intent_updates(false);
    }

    /// Number of stored transactions.
    pub async fn len(&self) -> usize {
        self.tables.read().await.transactions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        Ok(())
    }

    fn take_update_budget(&self) -> StoreResult<()> {
        let outcome = self
            .update_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                l if l < 0 => Some(l),
                0 => None,
                l => Some(l - 1),
            });
        match outcome {
            Ok(_) => Ok(()),
            Err(_) => Err(StoreError::Unavailable("connection lost".to_string())),
        }
    }

    fn publish(&self, event: ChangeEvent) {
        // no subscribers is fine
        let _ = self.changes.send(event);
    }
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn insert(&self, draft: TransactionDraft) -> StoreResult<Transaction> {
        self.check_online()?;
        let txn = Transaction::from_draft(Uuid::new_v4().to_string(), draft, Utc::now());

        self.tables
            .write()
            .await
            .transactions
            .insert(txn.id.clone(), txn.clone());

        debug!(id = %txn.id, total = %txn.total, "Inserted transaction");
        self.publish(ChangeEvent::Inserted(txn.clone()));
        Ok(txn)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Transaction>> {
        self.check_online()?;
        Ok(self.tables.read().await.transactions.get(id).cloned())
    }

    async fn update(&self, id: &str, patch: TransactionPatch) -> StoreResult<Transaction> {
        self.check_online()?;
        self.take_update_budget()?;

        let updated = {
            let mut tables = self.tables.write().await;
            let txn = tables
                .transactions
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound {
                    entity: "transaction",
                    id: id.to_string(),
                })?;

            if let Some(expected) = patch.expected_revision {
                if txn.revision != expected {
                    return Err(StoreError::Conflict {
                        id: id.to_string(),
                        expected,
                        actual: txn.revision,
                    });
                }
            }

            patch.apply_to(txn, Utc::now());
            txn.clone()
        };

        debug!(id = %id, revision = updated.revision, "Updated transaction");
        self.publish(ChangeEvent::Updated(updated.clone()));
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.check_online()?;
        let removed = self.tables.write().await.transactions.remove(id);
        if removed.is_none() {
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
        self.check_online()?;
        let tables = self.tables.read().await;

        let mut rows: Vec<&Transaction> = tables
            .transactions
            .values()
            .filter(|t| filter.matches(t))
            .collect();
        rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));

        Ok(rows
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    async fn record_intent(&self, intent: &CollectionIntent) -> StoreResult<()> {
        self.check_online()?;
        self.tables
            .write()
            .await
            .intents
            .insert(intent.id.clone(), intent.clone());
        Ok(())
    }

    async fn update_intent(&self, intent: &CollectionIntent) -> StoreResult<()> {
        self.check_online()?;
        if self.intent_updates_fail.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("intent journal unreachable".to_string()));
        }
        let mut tables = self.tables.write().await;
        match tables.intents.get_mut(&intent.id) {
            Some(stored) => {
                *stored = intent.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "collection intent",
                id: intent.id.clone(),
            }),
        }
    }

    async fn get_intent(&self, id: &str) -> StoreResult<Option<CollectionIntent>> {
        self.check_online()?;
        Ok(self.tables.read().await.intents.get(id).cloned())
    }

    async fn pending_intents(&self) -> StoreResult<Vec<CollectionIntent>> {
        self.check_online()?;
        let tables = self.tables.read().await;
        let mut pending: Vec<CollectionIntent> = tables
            .intents
            .values()
            .filter(|i| i.status.is_resumable())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daftar_core::{IntentStatus, Money, PaymentMethod, SettlementMethod, TransactionKind};

    fn draft(total: i64) -> TransactionDraft {
        TransactionDraft {
            kind: TransactionKind::Sale,
            date: Utc::now(),
            line_items: vec![],
            total: Money::from_cents(total),
            payment_method: PaymentMethod::Credit,
            customer_ref: Some("c1".into()),
            customer_name_snapshot: Some("Ahmed".into()),
            payments: vec![],
            is_paid: false,
            related_transaction_ref: None,
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_publishes() {
        let store = MemoryLedgerStore::new();
        let mut rx = store.subscribe();

        let txn = store.insert(draft(500)).await.unwrap();
        assert!(!txn.id.is_empty());
        assert_eq!(txn.revision, 0);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.transaction_id(), txn.id);
    }

    #[tokio::test]
    async fn test_stale_revision_conflicts() {
        let store = MemoryLedgerStore::new();
        let txn = store.insert(draft(500)).await.unwrap();

        store
            .update(&txn.id, TransactionPatch::payments(vec![], false, 0))
            .await
            .unwrap();
        let err = store
            .update(&txn.id, TransactionPatch::payments(vec![], false, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { expected: 0, actual: 1, .. }));
    }

    #[tokio::test]
    async fn test_delete_twice_is_not_found() {
        let store = MemoryLedgerStore::new();
        let txn = store.insert(draft(500)).await.unwrap();
        store.delete(&txn.id).await.unwrap();
        assert!(matches!(
            store.delete(&txn.id).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let store = MemoryLedgerStore::new();
        let txn = store.insert(draft(500)).await.unwrap();

        store.fail_updates_after(1);
        assert!(store.update(&txn.id, TransactionPatch::default()).await.is_ok());
        assert!(matches!(
            store.update(&txn.id, TransactionPatch::default()).await,
            Err(StoreError::Unavailable(_))
        ));

        store.heal();
        store.set_offline(true);
        assert!(store.get(&txn.id).await.is_err());
        store.heal();
        assert!(store.get(&txn.id).await.unwrap().is_some());
    }

    fn intent(id: &str, status: IntentStatus) -> CollectionIntent {
        CollectionIntent {
            id: id.to_string(),
            customer_ref: "c1".into(),
            amount: Money::from_major(10),
            method: SettlementMethod::Cash,
            status,
            planned: vec![],
            applied: Money::zero(),
            unallocated: Money::zero(),
            last_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_intent_update_failure_switch() {
        let store = MemoryLedgerStore::new();
        let mut i = intent("i-1", IntentStatus::Pending);
        store.record_intent(&i).await.unwrap();

        store.fail_intent_updates(true);
        i.status = IntentStatus::Completed;
        assert!(matches!(
            store.update_intent(&i).await,
            Err(StoreError::Unavailable(_))
        ));
        // transaction writes are unaffected
        let txn = store.insert(draft(500)).await.unwrap();
        assert!(store.update(&txn.id, TransactionPatch::default()).await.is_ok());

        store.heal();
        store.update_intent(&i).await.unwrap();
        assert_eq!(
            store.get_intent("i-1").await.unwrap().unwrap().status,
            IntentStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_pending_intents_exclude_closed_ones() {
        let store = MemoryLedgerStore::new();
        store.record_intent(&intent("a", IntentStatus::Pending)).await.unwrap();
        store.record_intent(&intent("b", IntentStatus::Failed)).await.unwrap();
        store.record_intent(&intent("c", IntentStatus::Completed)).await.unwrap();
        store.record_intent(&intent("d", IntentStatus::Abandoned)).await.unwrap();

        let mut ids: Vec<String> = store
            .pending_intents()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_select_pages_in_date_order() {
        let store = MemoryLedgerStore::new();
        for i in 0..5 {
            let mut d = draft(100 + i);
            d.date = Utc::now() - chrono::Duration::days(i);
            store.insert(d).await.unwrap();
        }

        let first = store.select(&TransactionFilter::all(), Page::first(3)).await.unwrap();
        let second = store
            .select(&TransactionFilter::all(), Page::first(3).next())
            .await
            .unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 2);
        assert!(first[0].date <= first[1].date);
        assert_eq!(first[0].total.cents(), 104);

        let all = crate::store::select_all(&store, &TransactionFilter::all(), 2)
            .await
            .unwrap();
        assert_eq!(all.len(), 5);
    }
}
