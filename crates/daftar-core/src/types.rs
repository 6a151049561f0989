//! # Domain Types
//!
//! Core domain types used throughout Daftar.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐   ┌─────────────────┐      │
//! │  │    LineItem     │   │   Transaction    │   │  PaymentRecord  │      │
//! │  │  ─────────────  │   │  ──────────────  │   │  ─────────────  │      │
//! │  │  product_ref    │──►│  id (store)      │◄──│  id (UUID)      │      │
//! │  │  pricing_method │   │  kind            │   │  amount         │      │
//! │  │  dimensions     │   │  total           │   │  method         │      │
//! │  │  services       │   │  payment_method  │   │  collection_ref │      │
//! │  │  final_unit_... │   │  payments[]      │   └─────────────────┘      │
//! │  └─────────────────┘   │  is_paid         │                             │
//! │                        │  revision        │   ┌─────────────────┐      │
//! │  ┌─────────────────┐   └──────────────────┘   │CollectionIntent │      │
//! │  │    Customer     │                          │  amount         │      │
//! │  │  id, name,phone │                          │  status         │      │
//! │  └─────────────────┘                          └─────────────────┘      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Line items and the customer name are frozen into the transaction at
//! creation. Later catalog or registry edits never change issued records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Catalog Records
// =============================================================================

/// How a product is priced on a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PricingMethod {
    /// Flat price per unit.
    Fixed,
    /// Price per square unit, multiplied by width × height.
    Area,
}

impl Default for PricingMethod {
    fn default() -> Self {
        PricingMethod::Fixed
    }
}

/// Width and height of a printed item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub fn new(width: f64, height: f64) -> Self {
        Dimensions { width, height }
    }

    /// Returns `width × height`.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// An add-on service (lamination, eyelets, design...) priced per unit or per area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SelectedService {
    pub name: String,
    pub unit_price: Money,
}

/// A catalog product as the ledger sees it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Unit price, or price per square unit for area pricing.
    pub price: Money,
    pub pricing_method: PricingMethod,
}

// =============================================================================
// Line Item
// =============================================================================

/// A line on a cart or invoice.
///
/// `final_unit_price` is derived; see [`crate::cart::recompute_final_unit_price`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItem {
    pub product_ref: String,
    /// Product name at time of sale (frozen).
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub pricing_method: PricingMethod,
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
    /// Offcut material, tracked for reporting only; never priced.
    #[serde(default)]
    pub wasted_dimensions: Option<Dimensions>,
    #[serde(default)]
    pub selected_services: Vec<SelectedService>,
    pub final_unit_price: Money,
    #[serde(default)]
    pub notes: Option<String>,
}

// =============================================================================
// Payment Methods
// =============================================================================

/// How a transaction is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    MobileWallet,
    /// Deferred settlement tracked through the payments sub-ledger.
    Credit,
}

impl PaymentMethod {
    /// Returns the payment instrument, or `None` for credit.
    pub fn instrument(&self) -> Option<SettlementMethod> {
        match self {
            PaymentMethod::Cash => Some(SettlementMethod::Cash),
            PaymentMethod::MobileWallet => Some(SettlementMethod::MobileWallet),
            PaymentMethod::Credit => None,
        }
    }

    #[inline]
    pub fn is_credit(&self) -> bool {
        matches!(self, PaymentMethod::Credit)
    }
}

/// A payment instrument. Credit is not one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SettlementMethod {
    Cash,
    MobileWallet,
}

impl From<SettlementMethod> for PaymentMethod {
    fn from(method: SettlementMethod) -> Self {
        match method {
            SettlementMethod::Cash => PaymentMethod::Cash,
            SettlementMethod::MobileWallet => PaymentMethod::MobileWallet,
        }
    }
}

// =============================================================================
// Payment Record
// =============================================================================

/// One installment in a transaction's payments sub-ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentRecord {
    pub id: String,
    /// Always positive.
    pub amount: Money,
    pub method: SettlementMethod,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    /// Collection intent that produced this payment, if any.
    #[serde(default)]
    pub collection_ref: Option<String>,
}

// =============================================================================
// Transaction
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Sale,
    /// Standalone collection receipt. The allocator never produces these.
    Collection,
}

/// A transaction before the store has assigned its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionDraft {
    pub kind: TransactionKind,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub line_items: Vec<LineItem>,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub customer_ref: Option<String>,
    pub customer_name_snapshot: Option<String>,
    pub payments: Vec<PaymentRecord>,
    pub is_paid: bool,
    pub related_transaction_ref: Option<String>,
}

/// An issued sale or collection record.
///
/// ## Lifecycle
/// ```text
/// TransactionDraft ──insert──► Transaction { revision: 0 }
///                                   │
///                                   │ update (append payment)
///                                   ▼
///                              Transaction { revision: n + 1 }
///                                   │
///                                   │ delete (permission-gated)
///                                   ▼
///                                 gone
/// ```
/// Only `payments`, `is_paid`, `revision` and `updated_at` ever change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Transaction {
    pub id: String,
    pub kind: TransactionKind,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub line_items: Vec<LineItem>,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub customer_ref: Option<String>,
    pub customer_name_snapshot: Option<String>,
    pub payments: Vec<PaymentRecord>,
    pub is_paid: bool,
    pub related_transaction_ref: Option<String>,
    /// Optimistic-concurrency token, bumped by every store update.
    pub revision: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Materialises a draft with a store-assigned id.
    pub fn from_draft(id: impl Into<String>, draft: TransactionDraft, now: DateTime<Utc>) -> Self {
        Transaction {
            id: id.into(),
            kind: draft.kind,
            date: draft.date,
            line_items: draft.line_items,
            total: draft.total,
            payment_method: draft.payment_method,
            customer_ref: draft.customer_ref,
            customer_name_snapshot: draft.customer_name_snapshot,
            payments: draft.payments,
            is_paid: draft.is_paid,
            related_transaction_ref: draft.related_transaction_ref,
            revision: 0,
            updated_at: now,
        }
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer from the customer registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Collection Intent
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    /// Recorded; allocation in progress or interrupted.
    Pending,
    Completed,
    /// Allocation stopped part-way; resumable.
    Failed,
    /// Stopped before any portion was applied. The cashier was told to
    /// retry, so this intent must never be applied.
    Abandoned,
}

impl IntentStatus {
    /// Pending and failed intents still owe planned portions.
    pub fn is_resumable(self) -> bool {
        matches!(self, IntentStatus::Pending | IntentStatus::Failed)
    }
}

/// One invoice's share of a collection, fixed when the intent is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PlannedPortion {
    pub transaction_id: String,
    pub portion: Money,
}

/// Durable record of a multi-invoice collection, written before any invoice
/// is touched so an interrupted allocation can be resumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CollectionIntent {
    pub id: String,
    pub customer_ref: String,
    /// Amount the cashier intended to collect.
    pub amount: Money,
    pub method: SettlementMethod,
    pub status: IntentStatus,
    /// Oldest-first plan computed at collection time. Resuming finishes
    /// this plan; it is never recomputed.
    pub planned: Vec<PlannedPortion>,
    /// Sum of portions applied so far.
    pub applied: Money,
    /// Part of `amount` that found no outstanding debt.
    pub unallocated: Money,
    pub last_error: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_instrument() {
        assert_eq!(PaymentMethod::Cash.instrument(), Some(SettlementMethod::Cash));
        assert_eq!(
            PaymentMethod::MobileWallet.instrument(),
            Some(SettlementMethod::MobileWallet)
        );
        assert_eq!(PaymentMethod::Credit.instrument(), None);
        assert!(PaymentMethod::Credit.is_credit());
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::MobileWallet).unwrap(),
            "\"mobile_wallet\""
        );
        assert_eq!(
            serde_json::to_string(&TransactionKind::Collection).unwrap(),
            "\"collection\""
        );
        assert_eq!(
            serde_json::to_string(&IntentStatus::Abandoned).unwrap(),
            "\"abandoned\""
        );
    }

    #[test]
    fn test_only_pending_and_failed_intents_resume() {
        assert!(IntentStatus::Pending.is_resumable());
        assert!(IntentStatus::Failed.is_resumable());
        assert!(!IntentStatus::Completed.is_resumable());
        assert!(!IntentStatus::Abandoned.is_resumable());
    }

    #[test]
    fn test_dimensions_area() {
        assert!((Dimensions::new(2.0, 1.5).area() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_line_item_defaults_when_fields_missing() {
        let json = r#"{
            "product_ref": "p1",
            "name": "Business cards",
            "unit_price": 500,
            "quantity": 2,
            "pricing_method": "fixed",
            "final_unit_price": 500
        }"#;
        let item: LineItem = serde_json::from_str(json).unwrap();
        assert!(item.selected_services.is_empty());
        assert!(item.dimensions.is_none());
    }
}
