//! # Repository Module
//!
//! Database repository implementations for the Daftar ledger.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SqliteLedgerStore / seed / dashboards                                 │
//! │       │                                                                 │
//! │       │  db.transactions().select(&filter, 0, 1000)                    │
//! │       ▼                                                                 │
//! │  TransactionRepository   CustomerRepository   IntentRepository         │
//! │  ├── insert              ├── create           ├── insert               │
//! │  ├── get_by_id           ├── get_by_id        ├── update               │
//! │  ├── compare_and_swap    ├── list_all         ├── get_by_id            │
//! │  ├── delete              ├── search           └── list_unfinished      │
//! │  └── select              └── update                                    │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod customer;
pub mod intent;
pub mod transaction;
