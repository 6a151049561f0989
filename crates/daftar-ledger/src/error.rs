//! # Ledger Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Ledger Error Categories                          │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │     Domain      │  │   Persistence   │  │      Collection         │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Core(..)       │  │  NotFound       │  │  ExceedsOutstanding     │ │
//! │  │  Permission-    │  │  Persistence-   │  │  NoOutstandingDebt      │ │
//! │  │   Denied        │  │   Failure       │  │  PartialAllocation      │ │
//! │  │                 │  │  Conflict       │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                    │
//! │  │  Configuration  │   StoreError (what a LedgerStore returns)         │
//! │  │  InvalidConfig  │   is folded into LedgerError by the engine.       │
//! │  │  ConfigLoad...  │                                                    │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use daftar_core::{CoreError, Money};
use thiserror::Error;

// =============================================================================
// Store Error
// =============================================================================

/// Failures reported by a [`crate::store::LedgerStore`].
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// No row with this id.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The row changed since the caller read it.
    ///
    /// ## When This Occurs
    /// - Two cashiers collect from the same debtor at once and the second
    ///   update carries a stale `expected_revision`
    #[error("{id} was modified concurrently: expected revision {expected}, found {actual}")]
    Conflict { id: String, expected: i64, actual: i64 },

    /// The backend cannot be reached (offline, pool closed).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure.
    #[error("Store error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Ledger Error
// =============================================================================

/// Errors returned by the [`crate::engine::DebtLedger`].
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A ledger rule was violated before anything was written.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The referenced transaction or intent does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The store rejected or failed a write. Nothing from this operation
    /// was saved.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    /// A revision check failed; re-fetch and retry.
    #[error("Transaction {id} changed since it was read (expected revision {expected}, found {actual})")]
    Conflict { id: String, expected: i64, actual: i64 },

    /// The permission collaborator refused the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Raised under the reject excess policy.
    #[error("Collected {requested} exceeds outstanding debt {outstanding}")]
    ExceedsOutstanding { requested: Money, outstanding: Money },

    #[error("Customer {0} has no outstanding debt")]
    NoOutstandingDebt(String),

    /// A collection stopped part-way. Portions already applied stay applied;
    /// the intent can be resumed.
    ///
    /// ## Recovery
    /// ```text
    /// PartialAllocation { intent_id, applied, .. }
    ///      │
    ///      ▼
    /// cashier verifies the invoice list
    ///      │
    ///      ▼
    /// DebtLedger::resume_collection(intent_id)  (finishes the journaled plan only)
    /// ```
    #[error("Collection {intent_id} partially applied ({applied} recorded): {source}")]
    PartialAllocation {
        intent_id: String,
        applied: Money,
        #[source]
        source: Box<LedgerError>,
    },

    /// A collection failed before any portion was applied, and the intent
    /// could not be closed either. It stays pending; resuming it is the only
    /// safe way forward, since collecting again would charge twice.
    #[error("Collection {intent_id} is unresolved: {source}")]
    CollectionUnresolved {
        intent_id: String,
        #[source]
        source: Box<LedgerError>,
    },

    #[error("Invalid ledger configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Error Conversions
// =============================================================================

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => LedgerError::NotFound { entity, id },
            StoreError::Conflict { id, expected, actual } => {
                LedgerError::Conflict { id, expected, actual }
            }
            StoreError::Unavailable(msg) | StoreError::Backend(msg) => {
                LedgerError::PersistenceFailure(msg)
            }
        }
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::ConfigLoadFailed(err.to_string())
    }
}

// =============================================================================
// User-Facing Messages
// =============================================================================

impl LedgerError {
    /// Text a cashier sees. Never claims success for a partial collection.
    pub fn user_message(&self) -> String {
        match self {
            LedgerError::PartialAllocation { .. } => {
                "Payment partially recorded, please verify the invoice list.".to_string()
            }
            LedgerError::CollectionUnresolved { .. } => {
                "Collection was not confirmed. Resume it from pending collections; do not collect again."
                    .to_string()
            }
            LedgerError::PersistenceFailure(_) => "Nothing was saved, please retry.".to_string(),
            LedgerError::Conflict { .. } => {
                "This invoice was just updated elsewhere. Nothing was saved, please retry."
                    .to_string()
            }
            LedgerError::Core(CoreError::CustomerRequired) => {
                "Select a customer for this credit sale.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// True when retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::PersistenceFailure(_) | LedgerError::Conflict { .. }
        )
    }
}
