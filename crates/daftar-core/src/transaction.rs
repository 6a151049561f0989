//! # Transaction Record Model
//!
//! Settlement rules for issued transactions and construction of new ones.
//!
//! ## Settlement Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  payment_method != credit                                               │
//! │    payments = [ { amount: total, method } ]   is_paid = true            │
//! │                                                                         │
//! │  payment_method == credit                                               │
//! │    payments = [] or [ upfront deposit (cash) ]                          │
//! │    is_paid  = Σ payments >= total - 0.01                                │
//! │                                                                         │
//! │  Always: Σ payments <= total + 0.01 (payments are clamped)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here mutates an issued [`Transaction`]. [`Transaction::apply_payment`]
//! returns the next payments list; the caller persists it and only then
//! reflects the store's confirmed row.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::cart::cart_total;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{
    Customer, LineItem, PaymentMethod, PaymentRecord, SettlementMethod, Transaction,
    TransactionDraft, TransactionKind,
};

/// Sum of all payment amounts.
pub fn total_paid(payments: &[PaymentRecord]) -> Money {
    payments.iter().map(|p| p.amount).sum()
}

/// `paid >= total - 0.01`.
#[inline]
pub fn is_settled(paid: Money, total: Money) -> bool {
    paid >= total - Money::EPSILON
}

/// Generates a fresh payment id.
pub fn new_payment_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Drafts
// =============================================================================

impl TransactionDraft {
    /// Builds a sale from a cart.
    ///
    /// ## Rules
    /// - `cart` must be non-empty
    /// - credit requires a customer
    /// - a positive `upfront` on a credit sale is recorded as a cash deposit,
    ///   clamped to the total
    /// - `upfront` is ignored for non-credit sales (they are paid in full)
    pub fn sale(
        cart: &[LineItem],
        method: PaymentMethod,
        customer: Option<&Customer>,
        upfront: Option<Money>,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        if cart.is_empty() {
            return Err(CoreError::EmptyCart);
        }
        if method.is_credit() && customer.is_none() {
            return Err(CoreError::CustomerRequired);
        }

        let total = cart_total(cart);

        let payments = match method.instrument() {
            Some(instrument) => vec![PaymentRecord {
                id: new_payment_id(),
                amount: total,
                method: instrument,
                date: now,
                collection_ref: None,
            }],
            None => match upfront {
                Some(deposit) if deposit.is_positive() => vec![PaymentRecord {
                    id: new_payment_id(),
                    amount: deposit.min(total),
                    method: SettlementMethod::Cash,
                    date: now,
                    collection_ref: None,
                }],
                _ => Vec::new(),
            },
        };

        let is_paid = match method {
            PaymentMethod::Credit => is_settled(total_paid(&payments), total),
            _ => true,
        };

        Ok(TransactionDraft {
            kind: TransactionKind::Sale,
            date: now,
            line_items: cart.to_vec(),
            total,
            payment_method: method,
            customer_ref: customer.map(|c| c.id.clone()),
            customer_name_snapshot: customer.map(|c| c.name.clone()),
            payments,
            is_paid,
            related_transaction_ref: None,
        })
    }

    /// Builds a standalone collection receipt, fully paid at creation.
    pub fn collection(
        customer: &Customer,
        amount: Money,
        method: SettlementMethod,
        related: Option<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        if !amount.is_positive() {
            return Err(CoreError::InvalidAmount {
                amount,
                reason: "collected amount must be positive".to_string(),
            });
        }

        Ok(TransactionDraft {
            kind: TransactionKind::Collection,
            date: now,
            line_items: Vec::new(),
            total: amount,
            payment_method: method.into(),
            customer_ref: Some(customer.id.clone()),
            customer_name_snapshot: Some(customer.name.clone()),
            payments: vec![PaymentRecord {
                id: new_payment_id(),
                amount,
                method,
                date: now,
                collection_ref: None,
            }],
            is_paid: true,
            related_transaction_ref: related,
        })
    }
}

// =============================================================================
// Issued Transactions
// =============================================================================

/// Result of applying a payment to a transaction, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentApplication {
    /// The appended record (amount already clamped).
    pub record: PaymentRecord,
    /// Full payments list after the append.
    pub payments: Vec<PaymentRecord>,
    pub is_paid: bool,
    /// Amount actually applied.
    pub applied: Money,
    /// Part of the requested amount that exceeded the outstanding balance.
    pub excess: Money,
    /// Revision the application was computed against.
    pub base_revision: i64,
}

impl Transaction {
    /// Sum of recorded payments.
    pub fn paid(&self) -> Money {
        total_paid(&self.payments)
    }

    /// `total - paid`, unfloored.
    pub fn balance(&self) -> Money {
        self.total - self.paid()
    }

    /// Settlement status derived from the payments list.
    pub fn settled(&self) -> bool {
        match self.payment_method {
            PaymentMethod::Credit => is_settled(self.paid(), self.total),
            _ => true,
        }
    }

    /// An unpaid credit sale.
    pub fn is_open_debt(&self) -> bool {
        self.kind == TransactionKind::Sale && self.payment_method.is_credit() && !self.settled()
    }

    /// Whether this debt belongs to `customer_id`.
    pub fn is_open_debt_of(&self, customer_id: &str) -> bool {
        self.is_open_debt() && self.customer_ref.as_deref() == Some(customer_id)
    }

    /// Sum of payments produced by a given collection intent.
    pub fn paid_by_collection(&self, intent_id: &str) -> Money {
        self.payments
            .iter()
            .filter(|p| p.collection_ref.as_deref() == Some(intent_id))
            .map(|p| p.amount)
            .sum()
    }

    /// Computes the payments list after appending a payment of up to `amount`.
    ///
    /// The amount is clamped to the outstanding balance. Fails when the
    /// transaction is not on credit, the amount is not positive, or nothing
    /// is outstanding.
    pub fn apply_payment(
        &self,
        amount: Money,
        method: SettlementMethod,
        collection_ref: Option<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<PaymentApplication> {
        if !amount.is_positive() {
            return Err(CoreError::InvalidAmount {
                amount,
                reason: "payment amount must be positive".to_string(),
            });
        }
        if !self.payment_method.is_credit() {
            return Err(CoreError::NotCreditTransaction(self.id.clone()));
        }

        let outstanding = self.balance();
        if self.settled() || !outstanding.is_positive() {
            return Err(CoreError::OverAllocation {
                transaction_id: self.id.clone(),
                outstanding: outstanding.floor_zero(),
                attempted: amount,
            });
        }

        let applied = amount.min(outstanding);
        let record = PaymentRecord {
            id: new_payment_id(),
            amount: applied,
            method,
            date: now,
            collection_ref,
        };

        let mut payments = self.payments.clone();
        payments.push(record.clone());
        let is_paid = is_settled(total_paid(&payments), self.total);

        Ok(PaymentApplication {
            record,
            payments,
            is_paid,
            applied,
            excess: amount - applied,
            base_revision: self.revision,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PricingMethod;

    fn line(cents: i64, qty: i64) -> LineItem {
        LineItem {
            product_ref: "p".to_string(),
            name: "Flyer".to_string(),
            unit_price: Money::from_cents(cents),
            quantity: qty,
            pricing_method: PricingMethod::Fixed,
            dimensions: None,
            wasted_dimensions: None,
            selected_services: vec![],
            final_unit_price: Money::from_cents(cents),
            notes: None,
        }
    }

    fn ahmed() -> Customer {
        Customer {
            id: "cust-ahmed".to_string(),
            name: "Ahmed".to_string(),
            phone: "0100000000".to_string(),
            notes: None,
            created_at: Utc::now(),
        }
    }

    fn issue(draft: TransactionDraft) -> Transaction {
        Transaction::from_draft("t-1", draft, Utc::now())
    }

    #[test]
    fn test_cash_sale_is_paid_in_full() {
        let draft =
            TransactionDraft::sale(&[line(5000, 2)], PaymentMethod::Cash, None, None, Utc::now()).unwrap();
        assert!(draft.is_paid);
        assert_eq!(draft.total, Money::from_major(100));
        assert_eq!(draft.payments.len(), 1);
        assert_eq!(draft.payments[0].amount, draft.total);
        assert_eq!(draft.payments[0].method, SettlementMethod::Cash);
    }

    #[test]
    fn test_mobile_wallet_sale_ignores_upfront() {
        let draft = TransactionDraft::sale(
            &[line(1000, 1)],
            PaymentMethod::MobileWallet,
            None,
            Some(Money::from_cents(300)),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(draft.payments.len(), 1);
        assert_eq!(draft.payments[0].amount.cents(), 1000);
        assert_eq!(draft.payments[0].method, SettlementMethod::MobileWallet);
    }

    #[test]
    fn test_credit_sale_requires_customer() {
        let err = TransactionDraft::sale(&[line(1000, 1)], PaymentMethod::Credit, None, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, CoreError::CustomerRequired));
    }

    #[test]
    fn test_empty_cart_rejected() {
        let err = TransactionDraft::sale(&[], PaymentMethod::Cash, None, None, Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::EmptyCart));
    }

    #[test]
    fn test_credit_sale_with_deposit() {
        let customer = ahmed();
        let draft = TransactionDraft::sale(
            &[line(20000, 1)],
            PaymentMethod::Credit,
            Some(&customer),
            Some(Money::from_major(50)),
            Utc::now(),
        )
        .unwrap();
        assert!(!draft.is_paid);
        assert_eq!(draft.payments.len(), 1);
        assert_eq!(draft.payments[0].method, SettlementMethod::Cash);
        assert_eq!(draft.customer_name_snapshot.as_deref(), Some("Ahmed"));
    }

    #[test]
    fn test_credit_deposit_covering_total_is_paid() {
        let customer = ahmed();
        let draft = TransactionDraft::sale(
            &[line(20000, 1)],
            PaymentMethod::Credit,
            Some(&customer),
            Some(Money::from_major(250)),
            Utc::now(),
        )
        .unwrap();
        assert!(draft.is_paid);
        assert_eq!(total_paid(&draft.payments), draft.total);
    }

    #[test]
    fn test_apply_payment_clamps_to_outstanding() {
        let customer = ahmed();
        let txn = issue(
            TransactionDraft::sale(&[line(20000, 1)], PaymentMethod::Credit, Some(&customer), None, Utc::now())
                .unwrap(),
        );

        let app = txn
            .apply_payment(Money::from_major(250), SettlementMethod::Cash, None, Utc::now())
            .unwrap();
        assert_eq!(app.applied, Money::from_major(200));
        assert_eq!(app.excess, Money::from_major(50));
        assert!(app.is_paid);
        assert_eq!(total_paid(&app.payments), txn.total);
        // the issued record is untouched
        assert!(txn.payments.is_empty());
    }

    #[test]
    fn test_apply_payment_on_settled_invoice_fails() {
        let customer = ahmed();
        let mut txn = issue(
            TransactionDraft::sale(&[line(1000, 1)], PaymentMethod::Credit, Some(&customer), None, Utc::now())
                .unwrap(),
        );
        let app = txn
            .apply_payment(Money::from_cents(1000), SettlementMethod::Cash, None, Utc::now())
            .unwrap();
        txn.payments = app.payments;
        txn.is_paid = app.is_paid;

        let err = txn
            .apply_payment(Money::from_cents(1), SettlementMethod::Cash, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, CoreError::OverAllocation { .. }));
    }

    #[test]
    fn test_apply_payment_rejects_cash_sale() {
        let txn = issue(
            TransactionDraft::sale(&[line(1000, 1)], PaymentMethod::Cash, None, None, Utc::now()).unwrap(),
        );
        let err = txn
            .apply_payment(Money::from_cents(100), SettlementMethod::Cash, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, CoreError::NotCreditTransaction(_)));
    }

    #[test]
    fn test_one_cent_short_counts_as_settled() {
        assert!(is_settled(Money::from_cents(9999), Money::from_cents(10000)));
        assert!(!is_settled(Money::from_cents(9998), Money::from_cents(10000)));
    }

    #[test]
    fn test_collection_record_is_paid() {
        let draft = TransactionDraft::collection(
            &ahmed(),
            Money::from_major(30),
            SettlementMethod::MobileWallet,
            Some("sale-9".to_string()),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(draft.kind, TransactionKind::Collection);
        assert!(draft.is_paid);
        assert!(draft.line_items.is_empty());
        assert_eq!(draft.payment_method, PaymentMethod::MobileWallet);
        assert_eq!(draft.related_transaction_ref.as_deref(), Some("sale-9"));
    }
}
