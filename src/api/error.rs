// ==========================================
// Job-Shop APS - API layer error types
// ==========================================
// Responsibility: convert repository/engine errors into business-facing
// errors; every message names its cause explicitly.
// ==========================================

use crate::domain::types::OrderStatus;
use crate::engine::SchedulingError;
use crate::repository::error::RepositoryError;
use chrono::NaiveDate;
use thiserror::Error;

/// API layer errors
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // Assignment rules
    // ==========================================
    #[error("work order {order_code} is already assigned to this program")]
    DuplicateAssignment { order_code: u32 },

    #[error("work order {order_code} is not releasable in status {status}")]
    IneligibleOrderStatus {
        order_code: u32,
        status: OrderStatus,
    },

    // ==========================================
    // Day-close rules
    // ==========================================
    #[error("day {date} is already closed")]
    DayAlreadyClosed { date: NaiveDate },

    #[error("report is locked for editing by {editor}")]
    ReportLocked { editor: String },

    // ==========================================
    // Scheduling
    // ==========================================
    #[error(transparent)]
    Scheduling(#[from] SchedulingError),

    // ==========================================
    // Business rules
    // ==========================================
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("business rule violated: {0}")]
    BusinessRuleViolation(String),

    #[error("invalid state transition: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ==========================================
    // Data access
    // ==========================================
    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("database connection failed: {0}")]
    DatabaseConnectionError(String),

    #[error("database transaction failed: {0}")]
    DatabaseTransactionError(String),

    #[error("validation failed: {0}")]
    ValidationError(String),

    // ==========================================
    // Generic
    // ==========================================
    #[error("internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// Conversion from RepositoryError
// ==========================================
// Purpose: surface technical errors as business errors without losing
// the explicit cause
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} (id={})", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("lock acquisition failed: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("unique constraint violated: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("foreign key violated: {}", msg))
            }
            RepositoryError::BusinessRuleViolation(msg) => ApiError::BusinessRuleViolation(msg),
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("field {}: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

/// Result type alias
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_conversion() {
        let repo_err = RepositoryError::NotFound {
            entity: "ProductionProgram".to_string(),
            id: "7".to_string(),
        };
        let api_err: ApiError = repo_err.into();
        match api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("ProductionProgram"));
                assert!(msg.contains("7"));
            }
            _ => panic!("expected NotFound"),
        }
    }

    #[test]
    fn test_duplicate_assignment_message() {
        let err = ApiError::DuplicateAssignment { order_code: 4711 };
        assert!(err.to_string().contains("4711"));
    }
}
