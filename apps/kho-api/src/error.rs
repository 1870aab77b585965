//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Kho                                    │
//! │                                                                         │
//! │  Handler: Result<Json<T>, ApiError>                                     │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  DbError::NotFound ───────────────────────────► 404 NOT_FOUND          │
//! │  ValidationError / InvalidReference / CHECK ──► 422 VALIDATION_ERROR   │
//! │  InvalidOrderState / BatchOverdrawn ──────────► 422 BUSINESS_LOGIC     │
//! │  UniqueViolation ─────────────────────────────► 409 DUPLICATE          │
//! │  AlreadySettled / Conflict ───────────────────► 409 CONFLICT           │
//! │  InsufficientStock (reject policy) ───────────► 409 INSUFFICIENT_STOCK │
//! │  InvalidCredentials / bad token ──────────────► 401 UNAUTHORIZED       │
//! │  SQLITE_BUSY past the busy timeout ───────────► 503 BUSY               │
//! │  anything else ───────────────────────────────► 500 DATABASE_ERROR     │
//! │                                                  (generic message +    │
//! │                                                   support contact)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Response Body
//! ```json
//! {
//!   "error": "Unprocessable Entity",
//!   "code": "VALIDATION_ERROR",
//!   "message": "quantity must be positive",
//!   "timestamp": "2024-05-01T08:30:00+00:00"
//! }
//! ```

use std::sync::OnceLock;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use kho_core::{CoreError, ValidationError};
use kho_db::DbError;

/// Error returned from every handler.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: ErrorCode,
    pub message: String,
}

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (422)
    ValidationError,

    /// Business rule refused the operation (422)
    BusinessLogic,

    /// Unique constraint (409)
    Duplicate,

    /// Concurrent change or repeated settlement (409)
    Conflict,

    /// Stock cannot cover the order under the reject policy (409)
    InsufficientStock,

    /// Another writer held the database too long; safe to retry (503)
    Busy,

    /// Missing or bad credentials (401)
    Unauthorized,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: ErrorCode,
    message: String,
    timestamp: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

static SUPPORT_CONTACT: OnceLock<String> = OnceLock::new();

/// Sets the contact shown in 500 responses. First call wins.
pub fn set_support_contact(contact: impl Into<String>) {
    let _ = SUPPORT_CONTACT.set(contact.into());
}

fn support_contact() -> &'static str {
    SUPPORT_CONTACT.get().map(String::as_str).unwrap_or("your administrator")
}

impl ApiError {
    pub fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::ValidationError, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Internal, message)
    }

    /// Generic 500 carrying the support contact instead of the cause.
    pub fn database(support_contact: &str) -> Self {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::DatabaseError,
            format!(
                "The operation could not be completed. Please contact {} if the problem persists.",
                support_contact
            ),
        )
    }

    /// Maps a database error, hiding internals behind `support_contact`.
    pub fn from_db(err: DbError, support_contact: &str) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::new(
                StatusCode::NOT_FOUND,
                ErrorCode::NotFound,
                format!("{} not found: {}", entity, id),
            ),
            DbError::UniqueViolation { field, value } => ApiError::new(
                StatusCode::CONFLICT,
                ErrorCode::Duplicate,
                format!("{} '{}' already exists", field, value),
            ),
            err @ DbError::InvalidReference { .. } => ApiError::validation(err.to_string()),
            DbError::ForeignKeyViolation { message } => {
                tracing::warn!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            err @ DbError::InvariantViolation(_) => {
                tracing::warn!(error = %err, "Constraint rejected write");
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::BusinessLogic, err.to_string())
            }
            DbError::Busy(message) => {
                tracing::warn!(%message, "Database busy");
                ApiError::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorCode::Busy,
                    "The store is busy with other writes, please retry",
                )
            }
            DbError::Conflict(message) => {
                ApiError::new(StatusCode::CONFLICT, ErrorCode::Conflict, message)
            }
            DbError::InvalidCredentials => ApiError::unauthorized("Invalid username or password"),
            DbError::Core(core) => ApiError::from(core),
            other => {
                // Log the actual error but return a generic message
                tracing::error!(error = %other, "Database operation failed");
                ApiError::database(support_contact)
            }
        }
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        ApiError::from_db(err, support_contact())
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::Validation(e) => ApiError::validation(e.to_string()),
            CoreError::InsufficientStock(_) => {
                ApiError::new(StatusCode::CONFLICT, ErrorCode::InsufficientStock, message)
            }
            CoreError::AlreadySettled(_) => {
                ApiError::new(StatusCode::CONFLICT, ErrorCode::Conflict, message)
            }
            CoreError::InvalidOrderState { .. } | CoreError::BatchOverdrawn { .. } => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::BusinessLogic, message)
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.status.canonical_reason().unwrap_or("Error").to_string(),
            code: self.code,
            message: self.message,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (self.status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;
    use kho_core::settlement::Shortfall;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (DbError::not_found("Order", "x"), StatusCode::NOT_FOUND),
            (DbError::duplicate("username", "admin"), StatusCode::CONFLICT),
            (DbError::invalid_reference("supplier_id", "x"), StatusCode::UNPROCESSABLE_ENTITY),
            (DbError::InvariantViolation("CHECK".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (DbError::Busy("database is locked".into()), StatusCode::SERVICE_UNAVAILABLE),
            (DbError::Conflict("batch".into()), StatusCode::CONFLICT),
            (DbError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (ValidationError::required("items").into(), StatusCode::UNPROCESSABLE_ENTITY),
            (
                CoreError::AlreadySettled("o-1".into()).into(),
                StatusCode::CONFLICT,
            ),
            (
                CoreError::InsufficientStock(Shortfall {
                    line: 0,
                    product_id: "p-1".into(),
                    requested: 5,
                    fulfilled: 2,
                })
                .into(),
                StatusCode::CONFLICT,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from_db(err, "x").status, status);
        }
    }

    #[test]
    fn test_constraint_message_names_the_constraint() {
        let err = ApiError::from_db(DbError::InvariantViolation("total_amount >= 0".into()), "x");
        assert_eq!(err.code, ErrorCode::BusinessLogic);
        assert!(err.message.contains("total_amount >= 0"));
        assert!(!err.message.contains("Batch"));
    }

    #[test]
    fn test_database_errors_hide_details() {
        let err = ApiError::from_db(DbError::QueryFailed("no such table: orders".into()), "0909 000 000");
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("orders"));
        assert!(err.message.contains("0909 000 000"));
    }
}
