//! # daftar-core: Pure Ledger Logic for Daftar
//!
//! Money, cart pricing, the transaction record model, oldest-first
//! allocation planning and debtor aggregation. No I/O lives here.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Daftar Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │             POS session (cart, checkout, collections)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │      daftar-ledger: DebtLedger engine, LedgerStore trait        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ daftar-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────────┐ ┌──────────────┐     │   │
//! │  │   │  money  │ │  cart   │ │ transaction │ │  allocation  │     │   │
//! │  │   └─────────┘ └─────────┘ └─────────────┘ └──────────────┘     │   │
//! │  │   ┌─────────┐ ┌─────────────┐ ┌──────────────┐                 │   │
//! │  │   │  types  │ │ aggregation │ │  validation  │                 │   │
//! │  │   └─────────┘ └─────────────┘ └──────────────┘                 │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │           daftar-db: SQLite LedgerStore, migrations             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (LineItem, Transaction, Customer, CollectionIntent)
//! - [`money`] - Integer-cent Money with the one-cent tolerance
//! - [`cart`] - Line pricing and the POS cart
//! - [`transaction`] - Sale/collection drafts and payment settlement
//! - [`allocation`] - Oldest-first collection planning
//! - [`aggregation`] - Debtor list, statements, balances
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use daftar_core::{Cart, LineItem, Money, PaymentMethod, PricingMethod, Product, TransactionDraft};
//!
//! let flyers = Product {
//!     id: "flyer-a5".into(),
//!     name: "A5 flyers (100)".into(),
//!     price: Money::from_major(50),
//!     pricing_method: PricingMethod::Fixed,
//! };
//!
//! let mut cart = Cart::new();
//! cart.add_item(LineItem::from_product(&flyers, 2, None, vec![])).unwrap();
//!
//! let draft = TransactionDraft::sale(cart.items(), PaymentMethod::Cash, None, None, Utc::now()).unwrap();
//! assert!(draft.is_paid);
//! assert_eq!(draft.total, Money::from_major(100));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod aggregation;
pub mod allocation;
pub mod cart;
pub mod error;
pub mod money;
pub mod transaction;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use aggregation::{
    customer_debt_total, customer_statement, debtors_list, ledger_summary, outstanding_balance,
    DebtorSummary, LedgerSummary, StatementLine, StatementOrder,
};
pub use allocation::{plan_collection, Allocation, AllocationPlan};
pub use cart::{cart_total, line_item_total, recompute_final_unit_price, Cart};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use transaction::{is_settled, total_paid, PaymentApplication};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity on a single line.
///
/// Print runs go into the thousands, so this is higher than a retail till.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;
