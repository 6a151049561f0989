//! # daftar-ledger: Debt Ledger Engine for Daftar
//!
//! The async half of the ledger. [`DebtLedger`] issues sales, records
//! payments on credit invoices and allocates customer collections
//! oldest-first, talking to persistence only through [`LedgerStore`].
//!
//! ## Modules
//!
//! - [`engine`] - DebtLedger operations
//! - [`store`] - LedgerStore trait, patches, filters, change events
//! - [`memory`] - In-memory store with fault injection
//! - [`cache`] - Change-feed projection for dashboards
//! - [`permission`] - Capability checks
//! - [`config`] - TOML/env configuration
//! - [`error`] - StoreError and LedgerError
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use daftar_ledger::{DebtLedger, MemoryLedgerStore};
//! use daftar_core::{Money, SettlementMethod};
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! rt.block_on(async {
//!     let ledger = DebtLedger::new(Arc::new(MemoryLedgerStore::new()));
//!     let err = ledger
//!         .collect_from_customer("nobody", Money::from_major(10), SettlementMethod::Cash)
//!         .await
//!         .unwrap_err();
//!     assert_eq!(err.to_string(), "Customer nobody has no outstanding debt");
//! });
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod memory;
pub mod permission;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use cache::TransactionCache;
pub use config::{ExcessPolicy, LedgerConfig, LedgerSettings, StoreSettings};
pub use engine::{AppliedPortion, CollectionReceipt, DebtLedger, PaymentOutcome};
pub use error::{LedgerError, LedgerResult, StoreError, StoreResult};
pub use memory::MemoryLedgerStore;
pub use permission::{AllowAll, Capability, PermissionCheck, StaticPermissions};
pub use store::{ChangeEvent, LedgerStore, Page, TransactionFilter, TransactionPatch};
