//! # Allocation Planning
//!
//! Pure oldest-first allocation of a collected amount across a customer's
//! open credit sales. The engine in `daftar-ledger` executes the plan one
//! invoice at a time.
//!
//! ## Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  open debts of customer, sorted (date, id) ascending                    │
//! │                                                                         │
//! │    D1 (50) ──► D2 (30) ──► D3 (20)          collect 60                  │
//! │                                                                         │
//! │    remaining = 60                                                       │
//! │    D1: portion = min(50, 60) = 50   remaining = 10                      │
//! │    D2: portion = min(30, 10) = 10   remaining = 0    stop               │
//! │    D3: untouched                                                        │
//! │                                                                         │
//! │    unallocated = remaining after the last open debt                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The id is a tiebreaker so two invoices issued in the same instant are
//! always allocated in the same order.

use crate::money::Money;
use crate::types::{PlannedPortion, Transaction};

/// One invoice's share of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub transaction_id: String,
    pub portion: Money,
    pub outstanding_before: Money,
    /// Revision the portion was computed against.
    pub expected_revision: i64,
}

/// A complete oldest-first allocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AllocationPlan {
    pub allocations: Vec<Allocation>,
    pub requested: Money,
    pub allocated: Money,
    /// Part of `requested` left after every open debt was covered.
    pub unallocated: Money,
}

impl AllocationPlan {
    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    /// The plan in the form journaled on a collection intent.
    pub fn planned_portions(&self) -> Vec<PlannedPortion> {
        self.allocations
            .iter()
            .map(|a| PlannedPortion {
                transaction_id: a.transaction_id.clone(),
                portion: a.portion,
            })
            .collect()
    }
}

/// Returns the customer's open credit sales, oldest first.
pub fn open_debts_oldest_first<'a>(
    customer_id: &str,
    transactions: &'a [Transaction],
) -> Vec<&'a Transaction> {
    let mut debts: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| t.is_open_debt_of(customer_id))
        .collect();
    debts.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
    debts
}

/// Plans the allocation of `amount` across the customer's open debts.
pub fn plan_collection(
    customer_id: &str,
    amount: Money,
    transactions: &[Transaction],
) -> AllocationPlan {
    let mut remaining = amount.floor_zero();
    let mut allocations = Vec::new();

    for txn in open_debts_oldest_first(customer_id, transactions) {
        if !remaining.is_positive() {
            break;
        }
        let outstanding = txn.balance();
        let portion = outstanding.min(remaining);
        if portion.is_positive() {
            allocations.push(Allocation {
                transaction_id: txn.id.clone(),
                portion,
                outstanding_before: outstanding,
                expected_revision: txn.revision,
            });
            remaining -= portion;
        }
    }

    AllocationPlan {
        allocated: allocations.iter().map(|a| a.portion).sum(),
        allocations,
        requested: amount,
        unallocated: remaining,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
