//! # Error Types
//!
//! Domain-specific error types for daftar-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  daftar-core errors (this file)                                        │
//! │  ├── CoreError        - Ledger rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  daftar-ledger errors                                                  │
//! │  ├── StoreError       - LedgerStore failures                           │
//! │  └── LedgerError      - What engine callers see                        │
//! │                                                                         │
//! │  daftar-db errors                                                      │
//! │  └── DbError          - SQLite failures                                │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError ← StoreError ← DbError│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Ledger business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A credit sale was attempted without a customer bound to it.
    ///
    /// ## User Workflow
    /// ```text
    /// Cashier picks "credit" ──► no customer selected
    ///      │
    ///      ▼
    /// CustomerRequired
    ///      │
    ///      ▼
    /// UI re-prompts for a customer (never silently defaults)
    /// ```
    #[error("A customer is required for credit sales")]
    CustomerRequired,

    /// The cart has no items.
    #[error("Cart is empty")]
    EmptyCart,

    /// An amount that must be positive was zero or negative.
    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount { amount: Money, reason: String },

    /// Payments can only be recorded against credit transactions.
    #[error("Transaction {0} is not a credit transaction")]
    NotCreditTransaction(String),

    /// The payment would push the transaction past its total.
    ///
    /// ## When This Occurs
    /// - Recording a payment on an invoice that is already settled
    #[error("Transaction {transaction_id} would be over-paid: outstanding {outstanding}, attempted {attempted}")]
    OverAllocation {
        transaction_id: String,
        outstanding: Money,
        attempted: Money,
    },

    /// Cart has exceeded maximum allowed items.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Item quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Cart line index is out of range.
    #[error("No cart line at position {0}")]
    ItemNotInCart(usize),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid phone).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
