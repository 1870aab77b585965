//! # Error Types
//!
//! Domain-specific error types for kho-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kho-core errors (this file)                                           │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  kho-db errors (separate crate)                                        │
//! │  └── DbError          - Database failures, wraps CoreError             │
//! │                                                                         │
//! │  kho-api errors                                                        │
//! │  └── ApiError         - HTTP status + JSON body                        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::settlement::Shortfall;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Total available stock for a product cannot cover an order line.
    ///
    /// Only raised when the shortfall policy is `reject`; under `allow`
    /// the shortfall travels in the settlement outcome instead.
    #[error(
        "Insufficient stock for product {}: requested {}, available {}",
        .0.product_id, .0.requested, .0.fulfilled
    )]
    InsufficientStock(Shortfall),

    /// Order is not in a state that allows the requested transition.
    ///
    /// ## When This Occurs
    /// - Completing a draft that is already paid
    /// - Settling an order that is still a draft
    #[error("Order {order_id} is {current_state}, cannot {operation}")]
    InvalidOrderState {
        order_id: String,
        current_state: String,
        operation: String,
    },

    /// Inventory for the order was already decremented.
    #[error("Order {0} has already been settled against inventory")]
    AlreadySettled(String),

    /// A batch update would break `output_quantity <= input_quantity`.
    #[error("Batch {batch_id}: output quantity {output_quantity} exceeds input quantity {input_quantity}")]
    BatchOverdrawn {
        batch_id: String,
        input_quantity: i64,
        output_quantity: i64,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when request input doesn't meet requirements.
/// Used for early validation before anything touches the database.
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

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock(Shortfall {
            line: 0,
            product_id: "p-1".to_string(),
            requested: 6,
            fulfilled: 4,
        });
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product p-1: requested 6, available 4"
        );

        let err = CoreError::InvalidOrderState {
            order_id: "o-1".to_string(),
            current_state: "paid".to_string(),
            operation: "complete draft".to_string(),
        };
        assert_eq!(err.to_string(), "Order o-1 is paid, cannot complete draft");
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(ValidationError::required("name").to_string(), "name is required");
        assert_eq!(
            ValidationError::invalid_format("date", "expected YYYY-MM-DD").to_string(),
            "date has invalid format: expected YYYY-MM-DD"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("items").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
