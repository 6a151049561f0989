//! # Debtor Aggregation
//!
//! Read-only projections over a fetched transaction set. Balances are
//! recomputed from the payments list on every call and never cached.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Customer, Transaction, TransactionKind};

/// `total - Σ payments`, floored at zero.
pub fn outstanding_balance(transaction: &Transaction) -> Money {
    transaction.balance().floor_zero()
}

/// Sum of outstanding balances over the customer's unpaid credit sales.
pub fn customer_debt_total(customer_id: &str, transactions: &[Transaction]) -> Money {
    transactions
        .iter()
        .filter(|t| t.is_open_debt_of(customer_id))
        .map(outstanding_balance)
        .sum()
}

// =============================================================================
// Debtors List
// =============================================================================

/// One row of the debtors list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DebtorSummary {
    pub customer_id: String,
    /// Registry name, falling back to the snapshot on the newest invoice.
    pub name: String,
    pub phone: Option<String>,
    pub total_debt: Money,
    pub invoice_count: usize,
}

/// Groups unpaid credit sales by customer, largest debt first.
///
/// Customers whose aggregate debt is zero are left out. Ties are broken by
/// customer id so the list is stable.
pub fn debtors_list(transactions: &[Transaction], customers: &[Customer]) -> Vec<DebtorSummary> {
    let registry: HashMap<&str, &Customer> = customers.iter().map(|c| (c.id.as_str(), c)).collect();
    let mut grouped: HashMap<&str, DebtorSummary> = HashMap::new();

    for txn in transactions.iter().filter(|t| t.is_open_debt()) {
        let Some(customer_id) = txn.customer_ref.as_deref() else {
            continue;
        };

        let entry = grouped.entry(customer_id).or_insert_with(|| {
            let known = registry.get(customer_id);
            DebtorSummary {
                customer_id: customer_id.to_string(),
                name: known
                    .map(|c| c.name.clone())
                    .or_else(|| txn.customer_name_snapshot.clone())
                    .unwrap_or_default(),
                phone: known.map(|c| c.phone.clone()),
                total_debt: Money::zero(),
                invoice_count: 0,
            }
        });
        entry.total_debt += outstanding_balance(txn);
        entry.invoice_count += 1;
    }

    let mut list: Vec<DebtorSummary> = grouped
        .into_values()
        .filter(|d| d.total_debt.is_positive())
        .collect();
    list.sort_by(|a, b| {
        b.total_debt
            .cmp(&a.total_debt)
            .then_with(|| a.customer_id.cmp(&b.customer_id))
    });
    list
}

// =============================================================================
// Statements
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StatementOrder {
    #[default]
    OldestFirst,
    NewestFirst,
}

/// An open invoice with its balance as of read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatementLine {
    pub transaction: Transaction,
    pub outstanding: Money,
}

/// All unpaid credit sales of a customer, in the requested order.
pub fn customer_statement(
    customer_id: &str,
    transactions: &[Transaction],
    order: StatementOrder,
) -> Vec<StatementLine> {
    let mut lines: Vec<StatementLine> = transactions
        .iter()
        .filter(|t| t.is_open_debt_of(customer_id))
        .map(|t| StatementLine {
            outstanding: outstanding_balance(t),
            transaction: t.clone(),
        })
        .collect();

    lines.sort_by(|a, b| {
        a.transaction
            .date
            .cmp(&b.transaction.date)
            .then_with(|| a.transaction.id.cmp(&b.transaction.id))
    });
    if order == StatementOrder::NewestFirst {
        lines.reverse();
    }
    lines
}

// =============================================================================
// Dashboard Summary
// =============================================================================

/// Shop-wide totals for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerSummary {
    /// Sum of sale totals.
    pub total_sales: Money,
    /// Everything received: sale payments plus collection receipts.
    pub total_collected: Money,
    pub total_outstanding: Money,
    pub open_invoices: usize,
}

pub fn ledger_summary(transactions: &[Transaction]) -> LedgerSummary {
    let mut summary = LedgerSummary::default();
    for txn in transactions {
        summary.total_collected += txn.paid();
        if txn.kind == TransactionKind::Sale {
            summary.total_sales += txn.total;
        }
        if txn.is_open_debt() {
            summary.total_outstanding += outstanding_balance(txn);
            summary.open_invoices += 1;
        }
    }
    summary
}

// =============================================================================
// Unit Tests
// =============================================================================
