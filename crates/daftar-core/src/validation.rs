//! # Validation Module
//!
//! Input checks applied before anything reaches the ledger engine.
//!
//! ## Where Validation Runs
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POS session input                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  THIS MODULE: names, phones, quantities, prices, amounts, sizes         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DebtLedger: ledger rules (credit needs customer, clamping, ...)        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  LedgerStore: NOT NULL / CHECK constraints, revision checks             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use daftar_core::validation::{validate_customer_name, validate_quantity};
//!
//! validate_customer_name("Ahmed").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{Dimensions, LineItem};
use crate::MAX_ITEM_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest printable dimension in metres.
pub const MAX_DIMENSION: f64 = 100.0;

// =============================================================================
// Customer Registry
// =============================================================================

/// Validates a customer name.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 120 characters
pub fn validate_customer_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > 120 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 120,
        });
    }

    Ok(())
}

/// Validates a phone number used for statements and reminders.
///
/// ## Rules
/// - Must not be empty
/// - Digits with an optional leading `+`; spaces and hyphens are ignored
/// - 6 to 20 digits
///
/// ## Example
/// ```rust
/// use daftar_core::validation::validate_phone;
///
/// assert!(validate_phone("+20 100 123 4567").is_ok());
/// assert!(validate_phone("0100-123-4567").is_ok());
/// assert!(validate_phone("call me").is_err());
/// ```
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = phone.trim();

    if phone.is_empty() {
        return Err(ValidationError::Required {
            field: "phone".to_string(),
        });
    }

    let body = phone.strip_prefix('+').unwrap_or(phone);
    if !body.chars().all(|c| c.is_ascii_digit() || c == ' ' || c == '-') {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must contain only digits, spaces and hyphens".to_string(),
        });
    }

    let digits = body.chars().filter(|c| c.is_ascii_digit()).count();
    if !(6..=20).contains(&digits) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must have between 6 and 20 digits".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed `MAX_ITEM_QUANTITY`
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price. Zero is allowed (free add-ons).
pub fn validate_price(price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a payment or collection amount. Must be positive.
pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a printed size.
///
/// ## Rules
/// - Both sides finite and positive
/// - Neither side larger than [`MAX_DIMENSION`]
pub fn validate_dimensions(dimensions: &Dimensions) -> ValidationResult<()> {
    for (field, value) in [("width", dimensions.width), ("height", dimensions.height)] {
        if !value.is_finite() || value <= 0.0 {
            return Err(ValidationError::MustBePositive {
                field: field.to_string(),
            });
        }
        if value > MAX_DIMENSION {
            return Err(ValidationError::OutOfRange {
                field: field.to_string(),
                min: 0,
                max: MAX_DIMENSION as i64,
            });
        }
    }

    Ok(())
}

/// Validates everything about a line before it joins a cart.
pub fn validate_line_item(item: &LineItem) -> ValidationResult<()> {
    if item.name.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "item name".to_string(),
        });
    }
    validate_quantity(item.quantity)?;
    validate_price(item.unit_price)?;
    for service in &item.selected_services {
        validate_price(service.unit_price)?;
    }
    if let Some(dimensions) = &item.dimensions {
        validate_dimensions(dimensions)?;
    }
    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string (payment ids, intent ids).
///
/// ## Example
/// ```rust
/// use daftar_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
