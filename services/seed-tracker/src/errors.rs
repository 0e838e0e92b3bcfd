use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SeedTrackerError>;

#[derive(Error, Debug)]
pub enum SeedTrackerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Quantity must be a positive amount in grams, got {0}")]
    InvalidQuantity(Decimal),

    #[error("Quantity exceeds current batch weight: requested {requested} g, available {available} g")]
    InsufficientInventory { requested: Decimal, available: Decimal },

    #[error("Batch not found: {0}")]
    BatchNotFound(i64),

    #[error("Batch number already exists: {0}")]
    DuplicateBatchNumber(String),

    #[error("Batch {batch_id} has {transactions} outgoing transaction(s) and cannot be deleted")]
    ProtectedDelete { batch_id: i64, transactions: i64 },

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Report rendering error: {0}")]
    Report(String),

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<csv::Error> for SeedTrackerError {
    fn from(err: csv::Error) -> Self {
        SeedTrackerError::Report(format!("CSV error: {}", err))
    }
}

impl From<validator::ValidationErrors> for SeedTrackerError {
    fn from(err: validator::ValidationErrors) -> Self {
        SeedTrackerError::Validation(err.to_string())
    }
}

impl ResponseError for SeedTrackerError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let error_message = self.to_string();

        HttpResponse::build(status_code).json(json!({
            "error": {
                "code": status_code.as_u16(),
                "message": error_message,
                "type": self.error_type()
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            SeedTrackerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SeedTrackerError::Migration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SeedTrackerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SeedTrackerError::Validation(_) => StatusCode::BAD_REQUEST,
            SeedTrackerError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
            SeedTrackerError::InsufficientInventory { .. } => StatusCode::CONFLICT,
            SeedTrackerError::BatchNotFound(_) => StatusCode::NOT_FOUND,
            SeedTrackerError::DuplicateBatchNumber(_) => StatusCode::CONFLICT,
            SeedTrackerError::ProtectedDelete { .. } => StatusCode::CONFLICT,
            SeedTrackerError::Upload(_) => StatusCode::BAD_REQUEST,
            SeedTrackerError::Report(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SeedTrackerError::Unauthorized => StatusCode::UNAUTHORIZED,
            SeedTrackerError::Forbidden(_) => StatusCode::FORBIDDEN,
            SeedTrackerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl SeedTrackerError {
    pub fn error_type(&self) -> &str {
        match self {
            SeedTrackerError::Database(_) => "storage_failure",
            SeedTrackerError::Migration(_) => "storage_failure",
            SeedTrackerError::Io(_) => "storage_failure",
            SeedTrackerError::Validation(_) => "validation_error",
            SeedTrackerError::InvalidQuantity(_) => "invalid_quantity",
            SeedTrackerError::InsufficientInventory { .. } => "insufficient_inventory",
            SeedTrackerError::BatchNotFound(_) => "not_found",
            SeedTrackerError::DuplicateBatchNumber(_) => "duplicate_error",
            SeedTrackerError::ProtectedDelete { .. } => "protected_delete",
            SeedTrackerError::Upload(_) => "upload_error",
            SeedTrackerError::Report(_) => "internal_error",
            SeedTrackerError::Unauthorized => "unauthorized",
            SeedTrackerError::Forbidden(_) => "forbidden",
            SeedTrackerError::Internal(_) => "internal_error",
        }
    }

    /// Business-rule rejections that leave state untouched and are safe to re-prompt.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            SeedTrackerError::Validation(_)
                | SeedTrackerError::InvalidQuantity(_)
                | SeedTrackerError::InsufficientInventory { .. }
                | SeedTrackerError::BatchNotFound(_)
                | SeedTrackerError::DuplicateBatchNumber(_)
                | SeedTrackerError::ProtectedDelete { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rejections_map_to_client_errors() {
        let err = SeedTrackerError::InsufficientInventory {
            requested: dec!(75.00),
            available: dec!(70.00),
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.error_type(), "insufficient_inventory");
        assert!(err.is_rejection());

        let err = SeedTrackerError::InvalidQuantity(dec!(0));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = SeedTrackerError::ProtectedDelete { batch_id: 1, transactions: 2 };
        assert_eq!(err.error_type(), "protected_delete");
    }

    #[test]
    fn test_storage_failure_is_generic() {
        let err = SeedTrackerError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_type(), "storage_failure");
        assert!(!err.is_rejection());
    }
}
