//! # Transaction Cache
//!
//! An in-memory projection of the ledger kept current by the store's change
//! feed. Dashboards and debtor screens read from here instead of refetching
//! the full history.
//!
//! ## Update Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  LedgerStore ──write──► ChangeEvent ──broadcast──► listener task        │
//! │                                                    │                    │
//! │                                                    ├─ Inserted/Updated  │
//! │                                                    │    upsert (newer   │
//! │                                                    │    revision wins)  │
//! │                                                    ├─ Deleted  remove   │
//! │                                                    └─ Lagged   reload   │
//! │                                                                         │
//! │  Subscribe happens before the initial load so no write is missed.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use daftar_core::aggregation::{self, DebtorSummary, LedgerSummary};
use daftar_core::{Customer, Money, Transaction};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::LedgerResult;
use crate::store::{select_all, ChangeEvent, LedgerStore, TransactionFilter};

type Rows = Arc<RwLock<HashMap<String, Transaction>>>;

pub struct TransactionCache {
    rows: Rows,
    listener: JoinHandle<()>,
}

impl TransactionCache {
    /// Loads the full history and starts following the change feed.
    pub async fn spawn<S>(store: Arc<S>, page_size: u32) -> LedgerResult<Self>
    where
        S: LedgerStore + 'static,
    {
        let mut feed = store.subscribe();
        let rows: Rows = Arc::new(RwLock::new(HashMap::new()));
        reload(store.as_ref(), &rows, page_size).await?;

        let task_rows = Arc::clone(&rows);
        let listener = tokio::spawn(async move {
            loop {
                match feed.recv().await {
                    Ok(event) => apply(&task_rows, event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Change feed lagged, reloading cache");
                        if let Err(e) = reload(store.as_ref(), &task_rows, page_size).await {
                            warn!(error = %e, "Cache reload failed");
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Change feed closed");
                        break;
                    }
                }
            }
        });

        Ok(TransactionCache { rows, listener })
    }

    /// All cached rows, ordered by `(date, id)`.
    pub async fn snapshot(&self) -> Vec<Transaction> {
        let mut rows: Vec<Transaction> = self.rows.read().await.values().cloned().collect();
        rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        rows
    }

    pub async fn get(&self, id: &str) -> Option<Transaction> {
        self.rows.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn customer_debt_total(&self, customer_id: &str) -> Money {
        aggregation::customer_debt_total(customer_id, &self.snapshot().await)
    }

    pub async fn debtors(&self, customers: &[Customer]) -> Vec<DebtorSummary> {
        aggregation::debtors_list(&self.snapshot().await, customers)
    }

    pub async fn summary(&self) -> LedgerSummary {
        aggregation::ledger_summary(&self.snapshot().await)
    }
}

impl Drop for TransactionCache {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn reload<S: LedgerStore + ?Sized>(store: &S, rows: &Rows, page_size: u32) -> LedgerResult<()> {
    let fresh = select_all(store, &TransactionFilter::all(), page_size).await?;
    let count = fresh.len();

    let mut guard = rows.write().await;
    guard.clear();
    guard.extend(fresh.into_iter().map(|t| (t.id.clone(), t)));

    info!(count, "Transaction cache loaded");
    Ok(())
}

async fn apply(rows: &Rows, event: ChangeEvent) {
    let mut guard = rows.write().await;
    match event {
        ChangeEvent::Inserted(txn) | ChangeEvent::Updated(txn) => {
            let stale = guard
                .get(&txn.id)
                .map_or(false, |current| current.revision > txn.revision);
            if !stale {
                debug!(id = %txn.id, revision = txn.revision, "Cache upsert");
                guard.insert(txn.id.clone(), txn);
            }
        }
        ChangeEvent::Deleted { id } => {
            debug!(id = %id, "Cache remove");
            guard.remove(&id);
        }
    }
}
