//! Store Error Types

use thiserror::Error;

/// PostgreSQL SQLSTATE for a detected deadlock.
const SQLSTATE_DEADLOCK: &str = "40P01";

/// Errors raised by the ledger data-access layer and the transactional executor.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("unique violation: {0}")]
    UniqueViolation(String),

    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("check violation: {0}")]
    CheckViolation(String),

    #[error("deadlock detected: {0}")]
    Deadlock(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// The unit of work failed for a reason outside the store (e.g. an after-create hook).
    #[error("transaction aborted: {0}")]
    Aborted(String),

    /// Rollback failed after the unit of work had already failed.
    #[error("tx err: {source}, rollback err: {rollback}")]
    Rollback {
        source: Box<StoreError>,
        rollback: Box<StoreError>,
    },
}

impl StoreError {
    /// Error code for API responses and logs
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound => "NOT_FOUND",
            StoreError::UniqueViolation(_) => "UNIQUE_VIOLATION",
            StoreError::ForeignKeyViolation(_) => "FOREIGN_KEY_VIOLATION",
            StoreError::CheckViolation(_) => "CHECK_VIOLATION",
            StoreError::Deadlock(_) => "DEADLOCK",
            StoreError::Database(_) => "DATABASE_ERROR",
            StoreError::Aborted(_) => "ABORTED",
            StoreError::Rollback { .. } => "ROLLBACK_FAILED",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }

    pub fn is_deadlock(&self) -> bool {
        match self {
            StoreError::Deadlock(_) => true,
            StoreError::Rollback { source, .. } => source.is_deadlock(),
            _ => false,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        if let sqlx::Error::RowNotFound = err {
            return StoreError::NotFound;
        }

        let Some(db_err) = err.as_database_error() else {
            return StoreError::Database(err);
        };

        let message = db_err.message().to_string();
        if db_err.code().as_deref() == Some(SQLSTATE_DEADLOCK) {
            return StoreError::Deadlock(message);
        }

        match db_err.kind() {
            ErrorKind::UniqueViolation => StoreError::UniqueViolation(message),
            ErrorKind::ForeignKeyViolation => StoreError::ForeignKeyViolation(message),
            ErrorKind::CheckViolation => StoreError::CheckViolation(message),
            _ => StoreError::Database(err),
        }
    }
}
