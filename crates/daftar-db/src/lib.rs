//! # daftar-db: SQLite Storage for Daftar
//!
//! Durable storage for the debt ledger. [`SqliteLedgerStore`] is the
//! production [`daftar_ledger::LedgerStore`]; the repositories underneath
//! are also usable directly for the customer registry and reporting.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Daftar Data Flow                                 │
//! │                                                                         │
//! │  DebtLedger (daftar-ledger)                                            │
//! │       │  LedgerStore trait                                              │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     daftar-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ SqliteLedger- │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │ Store         │───►│ Transaction   │    │  (embedded)  │  │   │
//! │  │   │ change feed   │    │ Customer      │    │ 001_init.sql │  │   │
//! │  │   └───────────────┘    │ Intent        │    └──────────────┘  │   │
//! │  │                        └───────┬───────┘                       │   │
//! │  │                     Database (pool.rs)                         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (WAL)                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Transaction, customer and intent repositories
//! - [`store`] - LedgerStore implementation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use daftar_db::{Database, DbConfig, SqliteLedgerStore};
//! use daftar_ledger::{DebtLedger, LedgerConfig};
//!
//! let config = LedgerConfig::load_or_default(None);
//! let db = Database::new(DbConfig::from_settings(&config.store)).await?;
//! let ledger = DebtLedger::new(Arc::new(SqliteLedgerStore::new(db)))
//!     .with_settings(config.ledger);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use store::SqliteLedgerStore;

pub use repository::customer::CustomerRepository;
pub use repository::intent::IntentRepository;
pub use repository::transaction::TransactionRepository;
