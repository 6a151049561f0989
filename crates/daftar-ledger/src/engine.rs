//! # Debt Ledger Engine
//!
//! Issues sales, records payments against credit invoices and allocates
//! customer collections oldest-first.
//!
//! ## Consistency Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Confirm, Then Reflect                              │
//! │                                                                         │
//! │   caller ──► DebtLedger ──► LedgerStore.write ──► confirmed row         │
//! │                                   │                     │               │
//! │                                   │ failure             ▼               │
//! │                                   ▼              returned to caller     │
//! │                          error, nothing reflected        +              │
//! │                                                  ChangeEvent ──► caches │
//! │                                                                         │
//! │   The engine never edits a local copy. Projections only move when the  │
//! │   store says a write happened.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Collection Flow (Operation B)
//! ```text
//! collect_from_customer(customer, 60, cash)
//!      │
//!      ├── fetch customer's rows (paged)
//!      ├── debt == 0?                         ──► NoOutstandingDebt
//!      ├── reject policy && 60 > debt?        ──► ExceedsOutstanding
//!      │
//!      ├── plan oldest-first portions
//!      ├── record_intent { pending, planned } (durable before any invoice)
//!      │
//!      ├── for each planned portion, oldest first:
//!      │      update(invoice, payments + [portion tagged with intent id],
//!      │             expected_revision)
//!      │      failure, nothing applied ──► intent abandoned ──► plain cause
//!      │      failure, some applied    ──► intent failed    ──► PartialAllocation
//!      │
//!      └── intent completed ──► CollectionReceipt { applied, unallocated }
//! ```
//! A failed or interrupted intent is finished by [`DebtLedger::resume_collection`],
//! which applies only the journaled portions the invoices do not carry yet.
//! An abandoned intent is closed for good: the cashier was told nothing was
//! saved and will collect again.

use std::sync::Arc;

use chrono::Utc;
use daftar_core::aggregation::{self, DebtorSummary, LedgerSummary, StatementLine, StatementOrder};
use daftar_core::allocation::{plan_collection, Allocation};
use daftar_core::{
    Cart, CollectionIntent, CoreError, Customer, IntentStatus, LineItem, Money, PaymentMethod,
    SettlementMethod, Transaction, TransactionDraft, TransactionKind,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{ExcessPolicy, LedgerSettings};
use crate::error::{LedgerError, LedgerResult};
use crate::permission::{AllowAll, PermissionCheck};
use crate::store::{select_all, LedgerStore, TransactionFilter, TransactionPatch};

// =============================================================================
// Results
// =============================================================================

/// Outcome of recording a payment against one invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    /// The invoice as confirmed by the store.
    pub transaction: Transaction,
    pub applied: Money,
    /// Part of the offered amount above the outstanding balance. Not recorded.
    pub excess: Money,
}

/// Outcome of a multi-invoice collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionReceipt {
    pub intent_id: String,
    pub customer_id: String,
    pub requested: Money,
    /// Total applied under this intent, including earlier attempts.
    pub applied: Money,
    /// Part of `requested` that found no debt; hand it back.
    pub unallocated: Money,
    /// Portions applied by this call.
    pub allocations: Vec<AppliedPortion>,
    /// Invoices touched by this call, as confirmed by the store.
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedPortion {
    pub transaction_id: String,
    pub portion: Money,
    pub outstanding_before: Money,
}

impl From<&Allocation> for AppliedPortion {
    fn from(a: &Allocation) -> Self {
        AppliedPortion {
            transaction_id: a.transaction_id.clone(),
            portion: a.portion,
            outstanding_before: a.outstanding_before,
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// The ledger service. Holds a store handle; no ambient state.
pub struct DebtLedger<S: LedgerStore> {
    store: Arc<S>,
    permissions: Arc<dyn PermissionCheck>,
    settings: LedgerSettings,
}

impl<S: LedgerStore> Clone for DebtLedger<S> {
    fn clone(&self) -> Self {
        DebtLedger {
            store: Arc::clone(&self.store),
            permissions: Arc::clone(&self.permissions),
            settings: self.settings.clone(),
        }
    }
}

impl<S: LedgerStore> DebtLedger<S> {
    /// Creates a ledger with default settings that allows every operation.
    pub fn new(store: Arc<S>) -> Self {
        DebtLedger {
            store,
            permissions: Arc::new(AllowAll),
            settings: LedgerSettings::default(),
        }
    }

    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionCheck>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_settings(mut self, settings: LedgerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    // =========================================================================
    // Sales
    // =========================================================================

    /// Issues a sale and waits for the store to confirm it.
    ///
    /// The returned row carries the store-assigned id; use it, not any
    /// placeholder the caller made up.
    pub async fn create_sale_transaction(
        &self,
        cart: &[LineItem],
        method: PaymentMethod,
        customer: Option<&Customer>,
        upfront: Option<Money>,
    ) -> LedgerResult<Transaction> {
        let draft = TransactionDraft::sale(cart, method, customer, upfront, Utc::now())?;

        let txn = self.store.insert(draft).await.map_err(|e| {
            error!(error = %e, "Sale was not saved");
            LedgerError::from(e)
        })?;

        info!(
            id = %txn.id,
            total = %txn.total,
            method = ?txn.payment_method,
            customer = ?txn.customer_ref,
            is_paid = txn.is_paid,
            "Sale recorded"
        );
        Ok(txn)
    }

    /// Issues a sale from the session cart. The cart is cleared only after
    /// the store confirms the sale.
    pub async fn checkout(
        &self,
        cart: &mut Cart,
        method: PaymentMethod,
        customer: Option<&Customer>,
        upfront: Option<Money>,
    ) -> LedgerResult<Transaction> {
        let txn = self
            .create_sale_transaction(cart.items(), method, customer, upfront)
            .await?;
        cart.clear();
        Ok(txn)
    }

    /// Issues a standalone collection receipt. The allocator never looks at
    /// these; they record money received outside any invoice.
    pub async fn create_collection_record(
        &self,
        customer: &Customer,
        amount: Money,
        method: SettlementMethod,
        related_transaction: Option<String>,
    ) -> LedgerResult<Transaction> {
        let draft =
            TransactionDraft::collection(customer, amount, method, related_transaction, Utc::now())?;
        let txn = self.store.insert(draft).await?;

        info!(id = %txn.id, customer = %customer.id, amount = %amount, "Collection receipt recorded");
        Ok(txn)
    }

    // =========================================================================
    // Operation A: single-invoice payment
    // =========================================================================

    /// Appends a payment to a credit invoice.
    ///
    /// The amount is clamped to the outstanding balance; the clamped-off part
    /// comes back as `excess`. The write carries the revision the balance was
    /// read at, so a concurrent payment surfaces as `Conflict` instead of an
    /// over-payment.
    pub async fn record_payment(
        &self,
        transaction_id: &str,
        amount: Money,
        method: SettlementMethod,
    ) -> LedgerResult<PaymentOutcome> {
        let txn = self.get_transaction(transaction_id).await?;
        let application = txn.apply_payment(amount, method, None, Utc::now())?;

        if application.excess.is_positive() {
            warn!(
                id = %transaction_id,
                offered = %amount,
                applied = %application.applied,
                "Payment clamped to outstanding balance"
            );
        }

        let patch = TransactionPatch::payments(
            application.payments,
            application.is_paid,
            application.base_revision,
        );
        let confirmed = self.store.update(transaction_id, patch).await.map_err(|e| {
            warn!(id = %transaction_id, error = %e, "Payment was not saved");
            LedgerError::from(e)
        })?;

        info!(
            id = %transaction_id,
            applied = %application.applied,
            is_paid = confirmed.is_paid,
            revision = confirmed.revision,
            "Payment recorded"
        );

        Ok(PaymentOutcome {
            transaction: confirmed,
            applied: application.applied,
            excess: application.excess,
        })
    }

    // =========================================================================
    // Operation B: oldest-first collection
    // =========================================================================

    /// Collects `amount` from a customer and spreads it over their open
    /// credit invoices, oldest first.
    pub async fn collect_from_customer(
        &self,
        customer_id: &str,
        amount: Money,
        method: SettlementMethod,
    ) -> LedgerResult<CollectionReceipt> {
        if !amount.is_positive() {
            return Err(CoreError::InvalidAmount {
                amount,
                reason: "collected amount must be positive".to_string(),
            }
            .into());
        }

        let rows = self.customer_transactions(customer_id).await?;
        let outstanding = aggregation::customer_debt_total(customer_id, &rows);

        if !outstanding.is_positive() {
            return Err(LedgerError::NoOutstandingDebt(customer_id.to_string()));
        }
        if self.settings.excess_policy == ExcessPolicy::Reject && amount > outstanding {
            return Err(LedgerError::ExceedsOutstanding {
                requested: amount,
                outstanding,
            });
        }

        let plan = plan_collection(customer_id, amount, &rows);
        let now = Utc::now();
        let intent = CollectionIntent {
            id: Uuid::new_v4().to_string(),
            customer_ref: customer_id.to_string(),
            amount,
            method,
            status: IntentStatus::Pending,
            planned: plan.planned_portions(),
            applied: Money::zero(),
            unallocated: plan.unallocated,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        self.store.record_intent(&intent).await?;

        info!(
            intent = %intent.id,
            customer = %customer_id,
            amount = %amount,
            outstanding = %outstanding,
            portions = intent.planned.len(),
            "Collection started"
        );
        self.allocate(intent, &rows).await
    }

    /// Finishes a pending or failed collection.
    ///
    /// Only the portions journaled on the intent are applied, and only the
    /// part of each not yet carried by the invoice. Completed and abandoned
    /// intents come back as an empty receipt.
    pub async fn resume_collection(&self, intent_id: &str) -> LedgerResult<CollectionReceipt> {
        let intent = self
            .store
            .get_intent(intent_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound {
                entity: "collection intent",
                id: intent_id.to_string(),
            })?;

        if !intent.status.is_resumable() {
            debug!(intent = %intent_id, status = ?intent.status, "Collection already closed");
            return Ok(CollectionReceipt {
                intent_id: intent.id,
                customer_id: intent.customer_ref,
                requested: intent.amount,
                applied: intent.applied,
                unallocated: intent.unallocated,
                allocations: Vec::new(),
                transactions: Vec::new(),
            });
        }

        info!(intent = %intent_id, customer = %intent.customer_ref, "Resuming collection");
        let rows = self.customer_transactions(&intent.customer_ref).await?;
        self.allocate(intent, &rows).await
    }

    /// Collections that can still be resumed, oldest first.
    pub async fn pending_collections(&self) -> LedgerResult<Vec<CollectionIntent>> {
        Ok(self.store.pending_intents().await?)
    }

    /// Applies whatever part of the intent's plan the invoices do not carry
    /// yet. A planned invoice that was deleted or settled elsewhere keeps its
    /// share unallocated.
    async fn allocate(
        &self,
        mut intent: CollectionIntent,
        rows: &[Transaction],
    ) -> LedgerResult<CollectionReceipt> {
        let mut already_applied = Money::zero();
        let mut outstanding_work = Vec::with_capacity(intent.planned.len());

        for planned in &intent.planned {
            let Some(txn) = rows.iter().find(|t| t.id == planned.transaction_id) else {
                warn!(intent = %intent.id, id = %planned.transaction_id, "Planned invoice is gone");
                continue;
            };
            let paid = txn.paid_by_collection(&intent.id);
            already_applied += paid.min(planned.portion);

            let portion = (planned.portion - paid).floor_zero().min(txn.balance());
            if portion.is_positive() {
                outstanding_work.push(Allocation {
                    transaction_id: txn.id.clone(),
                    portion,
                    outstanding_before: txn.balance(),
                    expected_revision: txn.revision,
                });
            }
        }
        debug!(
            intent = %intent.id,
            already_applied = %already_applied,
            portions = outstanding_work.len(),
            "Allocation planned"
        );

        let mut applied_now = Money::zero();
        let mut portions = Vec::with_capacity(outstanding_work.len());
        let mut confirmed = Vec::with_capacity(outstanding_work.len());

        for allocation in &outstanding_work {
            let step = self.apply_portion(&intent, allocation, rows).await;
            match step {
                Ok(txn) => {
                    applied_now += allocation.portion;
                    portions.push(AppliedPortion::from(allocation));
                    confirmed.push(txn);
                }
                Err(cause) => {
                    let applied = already_applied + applied_now;
                    intent.applied = applied;
                    intent.last_error = Some(cause.to_string());
                    intent.updated_at = Utc::now();

                    if !applied.is_positive() {
                        intent.status = IntentStatus::Abandoned;
                        intent.unallocated = intent.amount;
                        if let Err(e) = self.store.update_intent(&intent).await {
                            error!(
                                intent = %intent.id,
                                error = %cause,
                                close_error = %e,
                                "Collection failed and could not be abandoned"
                            );
                            return Err(LedgerError::CollectionUnresolved {
                                intent_id: intent.id,
                                source: Box::new(cause),
                            });
                        }
                        warn!(intent = %intent.id, error = %cause, "Collection abandoned before any invoice was paid");
                        return Err(cause);
                    }

                    intent.status = IntentStatus::Failed;
                    if let Err(e) = self.store.update_intent(&intent).await {
                        // still pending, so still resumable
                        warn!(intent = %intent.id, error = %e, "Could not mark collection failed");
                    }
                    error!(
                        intent = %intent.id,
                        applied = %applied,
                        requested = %intent.amount,
                        failed_on = %allocation.transaction_id,
                        error = %cause,
                        "Collection partially applied"
                    );
                    return Err(LedgerError::PartialAllocation {
                        intent_id: intent.id,
                        applied,
                        source: Box::new(cause),
                    });
                }
            }
        }

        intent.status = IntentStatus::Completed;
        intent.applied = already_applied + applied_now;
        intent.unallocated = (intent.amount - intent.applied).floor_zero();
        intent.last_error = None;
        intent.updated_at = Utc::now();
        if let Err(e) = self.store.update_intent(&intent).await {
            // resuming finds every planned portion applied and only closes it
            warn!(intent = %intent.id, error = %e, "Could not mark collection completed");
        }

        info!(
            intent = %intent.id,
            applied = %intent.applied,
            unallocated = %intent.unallocated,
            invoices = confirmed.len(),
            "Collection completed"
        );

        Ok(CollectionReceipt {
            intent_id: intent.id,
            customer_id: intent.customer_ref,
            requested: intent.amount,
            applied: intent.applied,
            unallocated: intent.unallocated,
            allocations: portions,
            transactions: confirmed,
        })
    }

    async fn apply_portion(
        &self,
        intent: &CollectionIntent,
        allocation: &Allocation,
        rows: &[Transaction],
    ) -> LedgerResult<Transaction> {
        let txn = rows
            .iter()
            .find(|t| t.id == allocation.transaction_id)
            .ok_or_else(|| LedgerError::NotFound {
                entity: "transaction",
                id: allocation.transaction_id.clone(),
            })?;

        let application = txn.apply_payment(
            allocation.portion,
            intent.method,
            Some(intent.id.clone()),
            Utc::now(),
        )?;
        let patch = TransactionPatch::payments(
            application.payments,
            application.is_paid,
            allocation.expected_revision,
        );

        let confirmed = self.store.update(&txn.id, patch).await?;
        debug!(
            intent = %intent.id,
            id = %txn.id,
            portion = %allocation.portion,
            is_paid = confirmed.is_paid,
            "Portion applied"
        );
        Ok(confirmed)
    }

    // =========================================================================
    // Operation C: delete
    // =========================================================================

    /// Removes a transaction entirely. Requires the delete capability.
    pub async fn delete_transaction(&self, id: &str) -> LedgerResult<()> {
        if !self.permissions.can_delete_transaction() {
            warn!(id = %id, "Delete refused");
            return Err(LedgerError::PermissionDenied(
                "deleting transactions is not allowed for this user".to_string(),
            ));
        }

        self.store.delete(id).await?;
        info!(id = %id, "Transaction deleted");
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_transaction(&self, id: &str) -> LedgerResult<Transaction> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound {
                entity: "transaction",
                id: id.to_string(),
            })
    }

    /// Full history, fetched page by page.
    pub async fn fetch_all_transactions(&self) -> LedgerResult<Vec<Transaction>> {
        let rows = select_all(
            self.store.as_ref(),
            &TransactionFilter::all(),
            self.settings.page_size,
        )
        .await?;
        debug!(count = rows.len(), "Fetched transaction history");
        Ok(rows)
    }

    pub async fn customer_transactions(&self, customer_id: &str) -> LedgerResult<Vec<Transaction>> {
        Ok(select_all(
            self.store.as_ref(),
            &TransactionFilter::for_customer(customer_id),
            self.settings.page_size,
        )
        .await?)
    }

    pub async fn customer_debt_total(&self, customer_id: &str) -> LedgerResult<Money> {
        let rows = self.customer_transactions(customer_id).await?;
        Ok(aggregation::customer_debt_total(customer_id, &rows))
    }

    pub async fn customer_statement(
        &self,
        customer_id: &str,
        order: StatementOrder,
    ) -> LedgerResult<Vec<StatementLine>> {
        let rows = self.customer_transactions(customer_id).await?;
        Ok(aggregation::customer_statement(customer_id, &rows, order))
    }

    pub async fn debtors_list(&self, customers: &[Customer]) -> LedgerResult<Vec<DebtorSummary>> {
        let filter = TransactionFilter {
            kind: Some(TransactionKind::Sale),
            payment_method: Some(PaymentMethod::Credit),
            is_paid: Some(false),
            ..TransactionFilter::default()
        };
        let rows = select_all(self.store.as_ref(), &filter, self.settings.page_size).await?;
        Ok(aggregation::debtors_list(&rows, customers))
    }

    pub async fn ledger_summary(&self) -> LedgerResult<LedgerSummary> {
        let rows = self.fetch_all_transactions().await?;
        Ok(aggregation::ledger_summary(&rows))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLedgerStore;
    use crate::permission::StaticPermissions;
    use chrono::Duration;
    use daftar_core::{total_paid, PricingMethod, Product};

    fn ledger() -> (Arc<MemoryLedgerStore>, DebtLedger<MemoryLedgerStore>) {
        let store = Arc::new(MemoryLedgerStore::new());
        (Arc::clone(&store), DebtLedger::new(store))
    }

    fn customer(id: &str, name: &str) -> Customer {
        Customer {
            id: id.to_string(),
            name: name.to_string(),
            phone: "01001234567".to_string(),
            notes: None,
            created_at: Utc::now(),
        }
    }

    fn line(cents: i64) -> LineItem {
        let product = Product {
            id: "print".to_string(),
            name: "Print job".to_string(),
            price: Money::from_cents(cents),
            pricing_method: PricingMethod::Fixed,
        };
        LineItem::from_product(&product, 1, None, vec![])
    }

    /// Inserts an unpaid credit sale dated `days_ago` days back.
    async fn seed_debt(
        store: &MemoryLedgerStore,
        who: &Customer,
        days_ago: i64,
        cents: i64,
    ) -> Transaction {
        let mut draft = TransactionDraft::sale(
            &[line(cents)],
            PaymentMethod::Credit,
            Some(who),
            None,
            Utc::now(),
        )
        .unwrap();
        draft.date = Utc::now() - Duration::days(days_ago);
        store.insert(draft).await.unwrap()
    }

    fn assert_ledger_consistent(rows: &[Transaction]) {
        for t in rows {
            let paid = total_paid(&t.payments);
            assert!(paid <= t.total + Money::EPSILON, "{} over-paid", t.id);
            if t.payment_method.is_credit() {
                assert_eq!(t.is_paid, paid >= t.total - Money::EPSILON, "{} is_paid stale", t.id);
            } else {
                assert_eq!(t.payments.len(), 1);
                assert_eq!(t.payments[0].amount, t.total);
                assert!(t.is_paid);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Sales
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_cash_sale_of_100() {
        let (_, ledger) = ledger();
        let txn = ledger
            .create_sale_transaction(&[line(6000), line(4000)], PaymentMethod::Cash, None, None)
            .await
            .unwrap();

        assert!(txn.is_paid);
        assert_eq!(txn.payments.len(), 1);
        assert_eq!(txn.payments[0].amount, Money::from_major(100));
        assert_eq!(txn.payments[0].method, SettlementMethod::Cash);
    }

    #[tokio::test]
    async fn test_credit_sale_then_full_payment() {
        let (_, ledger) = ledger();
        let ahmed = customer("c-ahmed", "Ahmed");

        let txn = ledger
            .create_sale_transaction(&[line(20000)], PaymentMethod::Credit, Some(&ahmed), None)
            .await
            .unwrap();
        assert!(!txn.is_paid);
        assert!(txn.payments.is_empty());
        assert_eq!(aggregation::outstanding_balance(&txn), Money::from_major(200));

        let outcome = ledger
            .record_payment(&txn.id, Money::from_major(200), SettlementMethod::Cash)
            .await
            .unwrap();
        assert!(outcome.transaction.is_paid);
        assert_eq!(aggregation::outstanding_balance(&outcome.transaction), Money::zero());
        assert_eq!(outcome.transaction.revision, 1);
    }

    #[tokio::test]
    async fn test_round_trip_preserves_submitted_fields() {
        let (_, ledger) = ledger();
        let ahmed = customer("c-ahmed", "Ahmed");
        let cart = vec![line(1234), line(999)];

        let created = ledger
            .create_sale_transaction(&cart, PaymentMethod::Credit, Some(&ahmed), Some(Money::from_cents(500)))
            .await
            .unwrap();
        let fetched = ledger.get_transaction(&created.id).await.unwrap();

        assert_eq!(fetched.total, Money::from_cents(2233));
        assert_eq!(fetched.line_items, cart);
        assert_eq!(fetched.payment_method, PaymentMethod::Credit);
        assert_eq!(fetched.customer_name_snapshot.as_deref(), Some("Ahmed"));
        assert_eq!(total_paid(&fetched.payments), Money::from_cents(500));
    }

    #[tokio::test]
    async fn test_credit_sale_without_customer_is_rejected() {
        let (store, ledger) = ledger();
        let err = ledger
            .create_sale_transaction(&[line(100)], PaymentMethod::Credit, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::CustomerRequired)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_checkout_keeps_cart() {
        let (store, ledger) = ledger();
        let mut cart = Cart::new();
        cart.add_item(line(5000)).unwrap();

        store.set_offline(true);
        let err = ledger
            .checkout(&mut cart, PaymentMethod::Cash, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::PersistenceFailure(_)));
        assert_eq!(err.user_message(), "Nothing was saved, please retry.");
        assert_eq!(cart.len(), 1);

        store.heal();
        ledger
            .checkout(&mut cart, PaymentMethod::Cash, None, None)
            .await
            .unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_collection_record_is_ignored_by_allocator() {
        let (store, ledger) = ledger();
        let ahmed = customer("c-ahmed", "Ahmed");
        seed_debt(&store, &ahmed, 1, 1000).await;

        let receipt = ledger
            .create_collection_record(&ahmed, Money::from_cents(700), SettlementMethod::Cash, None)
            .await
            .unwrap();
        assert_eq!(receipt.kind, TransactionKind::Collection);
        assert_eq!(ledger.customer_debt_total("c-ahmed").await.unwrap(), Money::from_cents(1000));
    }

    // -------------------------------------------------------------------------
    // Operation A
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_record_payment_clamps_overpayment() {
        let (store, ledger) = ledger();
        let ahmed = customer("c-ahmed", "Ahmed");
        let debt = seed_debt(&store, &ahmed, 0, 4000).await;

        let outcome = ledger
            .record_payment(&debt.id, Money::from_cents(5000), SettlementMethod::MobileWallet)
            .await
            .unwrap();
        assert_eq!(outcome.applied, Money::from_cents(4000));
        assert_eq!(outcome.excess, Money::from_cents(1000));
        assert!(outcome.transaction.is_paid);
        assert_eq!(total_paid(&outcome.transaction.payments), outcome.transaction.total);

        let err = ledger
            .record_payment(&debt.id, Money::from_cents(1), SettlementMethod::Cash)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::OverAllocation { .. })));
    }

    #[tokio::test]
    async fn test_record_payment_rejects_cash_sale_and_bad_amounts() {
        let (_, ledger) = ledger();
        let cash = ledger
            .create_sale_transaction(&[line(100)], PaymentMethod::Cash, None, None)
            .await
            .unwrap();

        assert!(matches!(
            ledger.record_payment(&cash.id, Money::from_cents(10), SettlementMethod::Cash).await,
            Err(LedgerError::Core(CoreError::NotCreditTransaction(_)))
        ));
        assert!(matches!(
            ledger.record_payment("missing", Money::from_cents(10), SettlementMethod::Cash).await,
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_record_payment_failure_leaves_invoice_unchanged() {
        let (store, ledger) = ledger();
        let ahmed = customer("c-ahmed", "Ahmed");
        let debt = seed_debt(&store, &ahmed, 0, 4000).await;

        store.fail_updates_after(0);
        let err = ledger
            .record_payment(&debt.id, Money::from_cents(1000), SettlementMethod::Cash)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::PersistenceFailure(_)));

        store.heal();
        let stored = ledger.get_transaction(&debt.id).await.unwrap();
        assert!(stored.payments.is_empty());
        assert_eq!(stored.revision, 0);
    }

    // -------------------------------------------------------------------------
    // Operation B
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_oldest_first_allocation_50_30_20() {
        let (store, ledger) = ledger();
        let c = customer("c1", "Mona");
        let d3 = seed_debt(&store, &c, 1, 2000).await;
        let d1 = seed_debt(&store, &c, 3, 5000).await;
        let d2 = seed_debt(&store, &c, 2, 3000).await;

        let receipt = ledger
            .collect_from_customer("c1", Money::from_major(60), SettlementMethod::Cash)
            .await
            .unwrap();
        assert_eq!(receipt.applied, Money::from_major(60));
        assert_eq!(receipt.unallocated, Money::zero());
        assert_eq!(receipt.allocations.len(), 2);

        let d1 = ledger.get_transaction(&d1.id).await.unwrap();
        let d2 = ledger.get_transaction(&d2.id).await.unwrap();
        let d3 = ledger.get_transaction(&d3.id).await.unwrap();
        assert!(d1.is_paid);
        assert_eq!(aggregation::outstanding_balance(&d2), Money::from_major(20));
        assert!(d3.payments.is_empty());
        assert_eq!(ledger.customer_debt_total("c1").await.unwrap(), Money::from_major(40));

        // every portion is traceable to the collection
        assert_eq!(d1.paid_by_collection(&receipt.intent_id), Money::from_major(50));
        assert_eq!(d2.paid_by_collection(&receipt.intent_id), Money::from_major(10));
    }

    #[tokio::test]
    async fn test_collect_50_over_40_and_60() {
        let (store, ledger) = ledger();
        let c = customer("c1", "Mona");
        let older = seed_debt(&store, &c, 2, 4000).await;
        let newer = seed_debt(&store, &c, 1, 6000).await;

        ledger
            .collect_from_customer("c1", Money::from_major(50), SettlementMethod::Cash)
            .await
            .unwrap();

        assert!(ledger.get_transaction(&older.id).await.unwrap().is_paid);
        let newer = ledger.get_transaction(&newer.id).await.unwrap();
        assert_eq!(aggregation::outstanding_balance(&newer), Money::from_major(50));
    }

    #[tokio::test]
    async fn test_excess_is_returned_by_default() {
        let (store, ledger) = ledger();
        let c = customer("c1", "Mona");
        seed_debt(&store, &c, 2, 4000).await;

        let receipt = ledger
            .collect_from_customer("c1", Money::from_major(100), SettlementMethod::Cash)
            .await
            .unwrap();
        assert_eq!(receipt.applied, Money::from_major(40));
        assert_eq!(receipt.unallocated, Money::from_major(60));
        assert_eq!(ledger.customer_debt_total("c1").await.unwrap(), Money::zero());

        let intent = store.get_intent(&receipt.intent_id).await.unwrap().unwrap();
        assert_eq!(intent.status, IntentStatus::Completed);
        assert_eq!(intent.unallocated, Money::from_major(60));

        assert_ledger_consistent(&ledger.fetch_all_transactions().await.unwrap());
    }

    #[tokio::test]
    async fn test_excess_rejected_under_reject_policy() {
        let (store, ledger) = ledger();
        let ledger = ledger.with_settings(LedgerSettings {
            excess_policy: ExcessPolicy::Reject,
            ..LedgerSettings::default()
        });
        let c = customer("c1", "Mona");
        let debt = seed_debt(&store, &c, 2, 4000).await;

        let err = ledger
            .collect_from_customer("c1", Money::from_major(100), SettlementMethod::Cash)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ExceedsOutstanding { .. }));
        assert!(ledger.get_transaction(&debt.id).await.unwrap().payments.is_empty());
        assert!(store.pending_intents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_collect_without_debt() {
        let (_, ledger) = ledger();
        assert!(matches!(
            ledger
                .collect_from_customer("ghost", Money::from_major(10), SettlementMethod::Cash)
                .await,
            Err(LedgerError::NoOutstandingDebt(_))
        ));
        assert!(matches!(
            ledger
                .collect_from_customer("ghost", Money::zero(), SettlementMethod::Cash)
                .await,
            Err(LedgerError::Core(CoreError::InvalidAmount { .. }))
        ));
    }

    #[tokio::test]
    async fn test_partial_allocation_then_resume() {
        let (store, ledger) = ledger();
        let c = customer("c1", "Mona");
        let d1 = seed_debt(&store, &c, 3, 2000).await;
        let d2 = seed_debt(&store, &c, 2, 2000).await;
        let d3 = seed_debt(&store, &c, 1, 2000).await;

        store.fail_updates_after(1);
        let err = ledger
            .collect_from_customer("c1", Money::from_major(50), SettlementMethod::Cash)
            .await
            .unwrap_err();

        let intent_id = match &err {
            LedgerError::PartialAllocation { intent_id, applied, .. } => {
                assert_eq!(*applied, Money::from_major(20));
                intent_id.clone()
            }
            other => panic!("expected PartialAllocation, got {other:?}"),
        };
        assert_eq!(
            err.user_message(),
            "Payment partially recorded, please verify the invoice list."
        );

        let pending = ledger.pending_collections().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, IntentStatus::Failed);
        assert_eq!(pending[0].amount, Money::from_major(50));

        store.heal();
        let receipt = ledger.resume_collection(&intent_id).await.unwrap();
        assert_eq!(receipt.applied, Money::from_major(50));
        assert_eq!(receipt.allocations.len(), 2);

        assert!(ledger.get_transaction(&d1.id).await.unwrap().is_paid);
        assert!(ledger.get_transaction(&d2.id).await.unwrap().is_paid);
        let d3 = ledger.get_transaction(&d3.id).await.unwrap();
        assert_eq!(aggregation::outstanding_balance(&d3), Money::from_major(10));

        // resuming again applies nothing more
        let again = ledger.resume_collection(&intent_id).await.unwrap();
        assert!(again.allocations.is_empty());
        assert_eq!(ledger.customer_debt_total("c1").await.unwrap(), Money::from_major(10));
        assert!(ledger.pending_collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_before_first_portion_abandons_intent() {
        let (store, ledger) = ledger();
        let c = customer("c1", "Mona");
        seed_debt(&store, &c, 1, 2000).await;

        store.fail_updates_after(0);
        let err = ledger
            .collect_from_customer("c1", Money::from_major(10), SettlementMethod::Cash)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::PersistenceFailure(_)));
        assert!(ledger.pending_collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retry_after_failed_collection_charges_once() {
        let (store, ledger) = ledger();
        let c = customer("c1", "Mona");
        let debt = seed_debt(&store, &c, 1, 2000).await;

        store.fail_updates_after(0);
        let err = ledger
            .collect_from_customer("c1", Money::from_major(10), SettlementMethod::Cash)
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Nothing was saved, please retry.");

        // cashier retries as told, then a recovery sweep resumes whatever is pending
        store.heal();
        ledger
            .collect_from_customer("c1", Money::from_major(10), SettlementMethod::Cash)
            .await
            .unwrap();
        for intent in ledger.pending_collections().await.unwrap() {
            ledger.resume_collection(&intent.id).await.unwrap();
        }

        let stored = ledger.get_transaction(&debt.id).await.unwrap();
        assert_eq!(total_paid(&stored.payments), Money::from_major(10));
        assert_ledger_consistent(&ledger.fetch_all_transactions().await.unwrap());
    }

    #[tokio::test]
    async fn test_abandoned_intent_resumes_to_nothing() {
        let (store, ledger) = ledger();
        let c = customer("c1", "Mona");
        let debt = seed_debt(&store, &c, 1, 2000).await;

        let now = Utc::now();
        let abandoned = CollectionIntent {
            id: "i-abandoned".to_string(),
            customer_ref: "c1".to_string(),
            amount: Money::from_major(10),
            method: SettlementMethod::Cash,
            status: IntentStatus::Abandoned,
            planned: vec![daftar_core::PlannedPortion {
                transaction_id: debt.id.clone(),
                portion: Money::from_major(10),
            }],
            applied: Money::zero(),
            unallocated: Money::from_major(10),
            last_error: Some("connection lost".to_string()),
            created_at: now,
            updated_at: now,
        };
        store.record_intent(&abandoned).await.unwrap();

        let receipt = ledger.resume_collection("i-abandoned").await.unwrap();
        assert!(receipt.allocations.is_empty());
        assert_eq!(receipt.applied, Money::zero());
        assert!(ledger.get_transaction(&debt.id).await.unwrap().payments.is_empty());
        assert!(ledger.pending_collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unclosable_failure_must_be_resumed_not_retried() {
        let (store, ledger) = ledger();
        let c = customer("c1", "Mona");
        let debt = seed_debt(&store, &c, 1, 2000).await;

        store.fail_updates_after(0);
        store.fail_intent_updates(true);
        let err = ledger
            .collect_from_customer("c1", Money::from_major(10), SettlementMethod::Cash)
            .await
            .unwrap_err();
        let intent_id = match &err {
            LedgerError::CollectionUnresolved { intent_id, .. } => intent_id.clone(),
            other => panic!("expected CollectionUnresolved, got {other:?}"),
        };
        assert!(!err.is_retryable());
        assert_ne!(err.user_message(), "Nothing was saved, please retry.");

        store.heal();
        let pending = ledger.pending_collections().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, intent_id);
        assert_eq!(pending[0].status, IntentStatus::Pending);

        let receipt = ledger.resume_collection(&intent_id).await.unwrap();
        assert_eq!(receipt.applied, Money::from_major(10));
        assert!(ledger.resume_collection(&intent_id).await.unwrap().allocations.is_empty());

        let stored = ledger.get_transaction(&debt.id).await.unwrap();
        assert_eq!(total_paid(&stored.payments), Money::from_major(10));
        assert!(ledger.pending_collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_completion_mark_failure_never_reapplies_returned_excess() {
        let (store, ledger) = ledger();
        let c = customer("c1", "Mona");
        seed_debt(&store, &c, 2, 4000).await;

        store.fail_intent_updates(true);
        let receipt = ledger
            .collect_from_customer("c1", Money::from_major(100), SettlementMethod::Cash)
            .await
            .unwrap();
        assert_eq!(receipt.applied, Money::from_major(40));
        assert_eq!(receipt.unallocated, Money::from_major(60));

        // the cashier handed back 60; a new credit sale follows
        store.heal();
        let later = seed_debt(&store, &c, 0, 4000).await;

        let pending = ledger.pending_collections().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].unallocated, Money::from_major(60));
        for intent in pending {
            let resumed = ledger.resume_collection(&intent.id).await.unwrap();
            assert!(resumed.allocations.is_empty());
            assert_eq!(resumed.applied, Money::from_major(40));
            assert_eq!(resumed.unallocated, Money::from_major(60));
        }

        let later = ledger.get_transaction(&later.id).await.unwrap();
        assert!(later.payments.is_empty());
        assert!(!later.is_paid);
        assert_eq!(ledger.customer_debt_total("c1").await.unwrap(), Money::from_major(40));

        let intent = store.get_intent(&receipt.intent_id).await.unwrap().unwrap();
        assert_eq!(intent.status, IntentStatus::Completed);
        assert!(ledger.pending_collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resume_only_finishes_journaled_plan() {
        let (store, ledger) = ledger();
        let c = customer("c1", "Mona");
        let d1 = seed_debt(&store, &c, 3, 2000).await;
        let d2 = seed_debt(&store, &c, 2, 2000).await;

        store.fail_updates_after(1);
        let err = ledger
            .collect_from_customer("c1", Money::from_major(30), SettlementMethod::Cash)
            .await
            .unwrap_err();
        let intent_id = match err {
            LedgerError::PartialAllocation { intent_id, .. } => intent_id,
            other => panic!("expected PartialAllocation, got {other:?}"),
        };

        // an older invoice shows up before the resume
        store.heal();
        let backdated = seed_debt(&store, &c, 10, 5000).await;

        let receipt = ledger.resume_collection(&intent_id).await.unwrap();
        assert_eq!(receipt.applied, Money::from_major(30));
        assert_eq!(receipt.allocations.len(), 1);
        assert_eq!(receipt.allocations[0].transaction_id, d2.id);

        assert!(ledger.get_transaction(&d1.id).await.unwrap().is_paid);
        let d2 = ledger.get_transaction(&d2.id).await.unwrap();
        assert_eq!(aggregation::outstanding_balance(&d2), Money::from_major(10));
        assert!(ledger.get_transaction(&backdated.id).await.unwrap().payments.is_empty());
    }

    #[tokio::test]
    async fn test_resume_leaves_share_of_settled_invoice_unallocated() {
        let (store, ledger) = ledger();
        let c = customer("c1", "Mona");
        seed_debt(&store, &c, 3, 2000).await;
        let d2 = seed_debt(&store, &c, 2, 2000).await;

        store.fail_updates_after(1);
        let intent_id = match ledger
            .collect_from_customer("c1", Money::from_major(40), SettlementMethod::Cash)
            .await
        {
            Err(LedgerError::PartialAllocation { intent_id, .. }) => intent_id,
            other => panic!("expected PartialAllocation, got {other:?}"),
        };

        // d2 is paid at the counter before the resume
        store.heal();
        ledger
            .record_payment(&d2.id, Money::from_major(20), SettlementMethod::Cash)
            .await
            .unwrap();

        let receipt = ledger.resume_collection(&intent_id).await.unwrap();
        assert!(receipt.allocations.is_empty());
        assert_eq!(receipt.applied, Money::from_major(20));
        assert_eq!(receipt.unallocated, Money::from_major(20));
        assert_ledger_consistent(&ledger.fetch_all_transactions().await.unwrap());
    }

    #[tokio::test]
    async fn test_resume_unknown_intent() {
        let (_, ledger) = ledger();
        assert!(matches!(
            ledger.resume_collection("nope").await,
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_collectors_cannot_double_allocate() {
        let (store, ledger) = ledger();
        let c = customer("c1", "Mona");
        let debt = seed_debt(&store, &c, 1, 4000).await;

        // second cashier's stale snapshot
        let stale = ledger.customer_transactions("c1").await.unwrap();

        ledger
            .collect_from_customer("c1", Money::from_major(40), SettlementMethod::Cash)
            .await
            .unwrap();

        let plan = plan_collection("c1", Money::from_major(40), &stale);
        let application = stale[0]
            .apply_payment(plan.allocations[0].portion, SettlementMethod::Cash, None, Utc::now())
            .unwrap();
        let err = store
            .update(
                &debt.id,
                TransactionPatch::payments(
                    application.payments,
                    application.is_paid,
                    plan.allocations[0].expected_revision,
                ),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::StoreError::Conflict { .. }));

        let stored = ledger.get_transaction(&debt.id).await.unwrap();
        assert_eq!(total_paid(&stored.payments), Money::from_major(40));
    }

    // -------------------------------------------------------------------------
    // Operation C and reads
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_delete_twice_is_not_found() {
        let (_, ledger) = ledger();
        let txn = ledger
            .create_sale_transaction(&[line(100)], PaymentMethod::Cash, None, None)
            .await
            .unwrap();

        ledger.delete_transaction(&txn.id).await.unwrap();
        assert!(matches!(
            ledger.delete_transaction(&txn.id).await,
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_requires_permission() {
        let (store, ledger) = ledger();
        let ledger = ledger.with_permissions(Arc::new(StaticPermissions::none()));
        let txn = ledger
            .create_sale_transaction(&[line(100)], PaymentMethod::Cash, None, None)
            .await
            .unwrap();

        assert!(matches!(
            ledger.delete_transaction(&txn.id).await,
            Err(LedgerError::PermissionDenied(_))
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_paged_history_and_debtors() {
        let (store, ledger) = ledger();
        let ledger = ledger.with_settings(LedgerSettings {
            page_size: 2,
            ..LedgerSettings::default()
        });
        let mona = customer("c1", "Mona");
        let ahmed = customer("c2", "Ahmed");
        seed_debt(&store, &mona, 4, 1000).await;
        seed_debt(&store, &mona, 3, 1500).await;
        seed_debt(&store, &ahmed, 2, 9000).await;
        ledger
            .create_sale_transaction(&[line(700)], PaymentMethod::MobileWallet, None, None)
            .await
            .unwrap();

        assert_eq!(ledger.fetch_all_transactions().await.unwrap().len(), 4);

        let debtors = ledger.debtors_list(&[mona.clone(), ahmed.clone()]).await.unwrap();
        assert_eq!(debtors.len(), 2);
        assert_eq!(debtors[0].name, "Ahmed");
        assert_eq!(debtors[1].invoice_count, 2);
        assert_eq!(debtors[1].total_debt, Money::from_major(25));

        let statement = ledger
            .customer_statement("c1", StatementOrder::NewestFirst)
            .await
            .unwrap();
        assert_eq!(statement[0].outstanding, Money::from_major(15));

        let summary = ledger.ledger_summary().await.unwrap();
        assert_eq!(summary.open_invoices, 3);
        assert_eq!(summary.total_collected, Money::from_major(7));
    }
}
