//! # Ledger Store Interface
//!
//! The persistence seam the engine talks to. Any durable backend can sit
//! behind it; this crate ships [`crate::memory::MemoryLedgerStore`] and
//! `daftar-db` ships the SQLite one.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  insert(draft)            ──► Transaction { id assigned, revision 0 }  │
//! │  get(id)                  ──► Option<Transaction>                      │
//! │  update(id, patch)        ──► Transaction { revision + 1 }             │
//! │                               Conflict if patch.expected_revision is   │
//! │                               stale                                    │
//! │  delete(id)               ──► () or NotFound                           │
//! │  select(filter, page)     ──► Vec<Transaction> ordered (date, id)      │
//! │  subscribe()              ──► broadcast::Receiver<ChangeEvent>         │
//! │                                                                         │
//! │  Intent journal                                                         │
//! │  record_intent / update_intent / get_intent / pending_intents          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every write emits exactly one [`ChangeEvent`] after it is durable.
//! Dropping the receiver unsubscribes.

use async_trait::async_trait;
use daftar_core::{
    CollectionIntent, PaymentMethod, PaymentRecord, Transaction, TransactionDraft,
    TransactionKind,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::StoreResult;

/// Default page size for full-history fetches.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Capacity of the change-feed channel.
pub const CHANGE_FEED_CAPACITY: usize = 256;

// =============================================================================
// Patch, Filter, Page
// =============================================================================

/// Merge-patch for a transaction. Only the payments sub-ledger may change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionPatch {
    pub payments: Option<Vec<PaymentRecord>>,
    pub is_paid: Option<bool>,
    /// Reject the update unless the stored revision still equals this.
    pub expected_revision: Option<i64>,
}

impl TransactionPatch {
    /// Patch that replaces the payments list under a revision check.
    pub fn payments(payments: Vec<PaymentRecord>, is_paid: bool, expected_revision: i64) -> Self {
        TransactionPatch {
            payments: Some(payments),
            is_paid: Some(is_paid),
            expected_revision: Some(expected_revision),
        }
    }

    /// Applies the patch to a stored row, bumping its revision.
    pub fn apply_to(&self, txn: &mut Transaction, now: chrono::DateTime<chrono::Utc>) {
        if let Some(payments) = &self.payments {
            txn.payments = payments.clone();
        }
        if let Some(is_paid) = self.is_paid {
            txn.is_paid = is_paid;
        }
        txn.revision += 1;
        txn.updated_at = now;
    }
}

/// Row filter for [`LedgerStore::select`]. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub customer_ref: Option<String>,
    pub kind: Option<TransactionKind>,
    pub payment_method: Option<PaymentMethod>,
    pub is_paid: Option<bool>,
}

impl TransactionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_customer(customer_id: impl Into<String>) -> Self {
        TransactionFilter {
            customer_ref: Some(customer_id.into()),
            ..Self::default()
        }
    }

    /// Unpaid credit sales of one customer.
    pub fn open_debts_of(customer_id: impl Into<String>) -> Self {
        TransactionFilter {
            customer_ref: Some(customer_id.into()),
            kind: Some(TransactionKind::Sale),
            payment_method: Some(PaymentMethod::Credit),
            is_paid: Some(false),
        }
    }

    pub fn matches(&self, txn: &Transaction) -> bool {
        self.customer_ref
            .as_deref()
            .map_or(true, |c| txn.customer_ref.as_deref() == Some(c))
            && self.kind.map_or(true, |k| txn.kind == k)
            && self.payment_method.map_or(true, |m| txn.payment_method == m)
            && self.is_paid.map_or(true, |p| txn.is_paid == p)
    }
}

/// Offset pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: u32,
    pub limit: u32,
}

impl Page {
    pub fn first(limit: u32) -> Self {
        Page { offset: 0, limit }
    }

    pub fn next(&self) -> Self {
        Page {
            offset: self.offset + self.limit,
            limit: self.limit,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::first(DEFAULT_PAGE_SIZE)
    }
}

// =============================================================================
// Change Feed
// =============================================================================

/// A durable change, pushed to every subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
    Inserted(Transaction),
    Updated(Transaction),
    Deleted { id: String },
}

impl ChangeEvent {
    pub fn transaction_id(&self) -> &str {
        match self {
            ChangeEvent::Inserted(t) | ChangeEvent::Updated(t) => &t.id,
            ChangeEvent::Deleted { id } => id,
        }
    }
}

// =============================================================================
// Store Trait
// =============================================================================

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persists a draft. The store assigns the canonical id.
    async fn insert(&self, draft: TransactionDraft) -> StoreResult<Transaction>;

    async fn get(&self, id: &str) -> StoreResult<Option<Transaction>>;

    /// Merge-patches a row and returns it as stored.
    async fn update(&self, id: &str, patch: TransactionPatch) -> StoreResult<Transaction>;

    /// Removes a row. `NotFound` if it does not exist.
    async fn delete(&self, id: &str) -> StoreResult<()>;

    /// One page of matching rows, ordered by `(date, id)` ascending.
    async fn select(&self, filter: &TransactionFilter, page: Page) -> StoreResult<Vec<Transaction>>;

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;

    // -------------------------------------------------------------------------
    // Collection intent journal
    // -------------------------------------------------------------------------

    async fn record_intent(&self, intent: &CollectionIntent) -> StoreResult<()>;

    async fn update_intent(&self, intent: &CollectionIntent) -> StoreResult<()>;

    async fn get_intent(&self, id: &str) -> StoreResult<Option<CollectionIntent>>;

    /// Intents that are pending or failed, oldest first. Completed and
    /// abandoned intents are never returned.
    async fn pending_intents(&self) -> StoreResult<Vec<CollectionIntent>>;
}

/// Reads every matching row page by page.
pub async fn select_all<S: LedgerStore + ?Sized>(
    store: &S,
    filter: &TransactionFilter,
    page_size: u32,
) -> StoreResult<Vec<Transaction>> {
    let mut page = Page::first(page_size.max(1));
    let mut rows = Vec::new();
    loop {
        let batch = store.select(filter, page).await?;
        let done = (batch.len() as u32) < page.limit;
        rows.extend(batch);
        if done {
            return Ok(rows);
        }
        page = page.next();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use daftar_core::Money;

    fn sale(customer: Option<&str>, method: PaymentMethod, is_paid: bool) -> Transaction {
        Transaction {
            id: "t".into(),
            kind: TransactionKind::Sale,
            date: Utc::now(),
            line_items: vec![],
            total: Money::from_cents(100),
            payment_method: method,
            customer_ref: customer.map(str::to_string),
            customer_name_snapshot: None,
            payments: vec![],
            is_paid,
            related_transaction_ref: None,
            revision: 0,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_filter_matching() {
        let debt = sale(Some("c1"), PaymentMethod::Credit, false);
        assert!(TransactionFilter::all().matches(&debt));
        assert!(TransactionFilter::open_debts_of("c1").matches(&debt));
        assert!(!TransactionFilter::open_debts_of("c2").matches(&debt));
        assert!(!TransactionFilter::open_debts_of("c1").matches(&sale(
            Some("c1"),
            PaymentMethod::Cash,
            true
        )));
    }

    #[test]
    fn test_patch_bumps_revision() {
        let mut txn = sale(Some("c1"), PaymentMethod::Credit, false);
        TransactionPatch::payments(vec![], true, 0).apply_to(&mut txn, Utc::now());
        assert_eq!(txn.revision, 1);
        assert!(txn.is_paid);
    }

    #[test]
    fn test_page_next() {
        let page = Page::first(1000).next();
        assert_eq!(page.offset, 1000);
        assert_eq!(Page::default().limit, DEFAULT_PAGE_SIZE);
    }
}
