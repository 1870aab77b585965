//! # Validation Module
//!
//! Field-level validators shared by every create/patch payload.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: HTTP extraction (serde)       → malformed JSON rejected      │
//! │  Layer 2: THIS MODULE                   → business-rule checks (422)   │
//! │  Layer 3: SQLite constraints            → UNIQUE / FOREIGN KEY / CHECK │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use kho_core::validation::{validate_quantity, validate_uuid};
//!
//! assert!(validate_quantity(5).is_ok());
//! assert!(validate_uuid("not-a-uuid").is_err());
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::{MAX_ITEM_QUANTITY, MAX_ORDER_ITEMS, MAX_ORDER_TOTAL, MAX_PRICE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Implemented by every request payload that can be checked without I/O.
pub trait Validate {
    fn validate(&self) -> ValidationResult<()>;
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required display name (product, supplier, category, person).
///
/// ## Rules
/// - Must not be blank
/// - At most 200 characters
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required(field));
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates an optional e-mail address (loose check: `local@domain`).
pub fn validate_email(email: Option<&str>) -> ValidationResult<()> {
    let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) else {
        return Ok(());
    };

    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ValidationError::invalid_format("email", "must look like name@example.com")),
    }
}

/// Validates a username for login.
///
/// ## Rules
/// - 3 to 50 characters
/// - Letters, digits, dots, hyphens and underscores only
pub fn validate_username(username: &str) -> ValidationResult<()> {
    let username = username.trim();

    if username.len() < 3 {
        return Err(ValidationError::OutOfRange {
            field: "username length".to_string(),
            min: 3,
            max: 50,
        });
    }

    if username.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "username".to_string(),
            max: 50,
        });
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        return Err(ValidationError::invalid_format(
            "username",
            "must contain only letters, digits, '.', '-' and '_'",
        ));
    }

    Ok(())
}

/// Validates a new password (at least 6 characters).
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.chars().count() < 6 {
        return Err(ValidationError::OutOfRange {
            field: "password length".to_string(),
            min: 6,
            max: 128,
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
/// - Must not exceed MAX_ITEM_QUANTITY
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

/// Validates a price in đồng. Zero is allowed (free items, gifts).
pub fn validate_price(field: &str, dong: i64) -> ValidationResult<()> {
    validate_amount(field, dong, MAX_PRICE)
}

/// Validates an order total in đồng.
pub fn validate_total(field: &str, dong: i64) -> ValidationResult<()> {
    validate_amount(field, dong, MAX_ORDER_TOTAL)
}

fn validate_amount(field: &str, dong: i64, max: i64) -> ValidationResult<()> {
    if !(0..=max).contains(&dong) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max,
        });
    }

    Ok(())
}

/// Validates batch quantities against the batch invariant.
///
/// ## Rules
/// - `input_quantity >= 0`
/// - `0 <= output_quantity <= input_quantity`
pub fn validate_batch_quantities(input_quantity: i64, output_quantity: i64) -> ValidationResult<()> {
    if input_quantity < 0 {
        return Err(ValidationError::OutOfRange {
            field: "input_quantity".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    if output_quantity < 0 || output_quantity > input_quantity {
        return Err(ValidationError::OutOfRange {
            field: "output_quantity".to_string(),
            min: 0,
            max: input_quantity,
        });
    }

    Ok(())
}

/// Validates that a batch does not expire before it was made.
pub fn validate_batch_dates(
    manufactured: Option<NaiveDate>,
    expires: Option<NaiveDate>,
) -> ValidationResult<()> {
    if let (Some(made), Some(expiry)) = (manufactured, expires) {
        if expiry < made {
            return Err(ValidationError::invalid_format(
                "expiry_date",
                "must not be earlier than date_of_manufacture",
            ));
        }
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines on an order or purchase document.
pub fn validate_item_count(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::required("items"));
    }

    if count > MAX_ORDER_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_ORDER_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a UUID string format.
///
/// Invalid ids are a validation failure (422), not a lookup miss (404).
///
/// ```rust
/// use kho_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    validate_reference("id", id)
}

/// Validates a UUID carried in a named field (`product_id`, `supplier_id`, …).
pub fn validate_reference(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required(field));
    }

    uuid::Uuid::parse_str(id)
        .map_err(|_| ValidationError::invalid_format(field, "must be a valid UUID"))?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
