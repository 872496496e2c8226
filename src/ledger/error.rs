//! Transfer Error Types

use thiserror::Error;

use crate::store::StoreError;

/// Errors of the transfer engine, the balance guard and the ledger service.
#[derive(Error, Debug)]
pub enum TransferError {
    // === Validation Errors (no transaction opened) ===
    #[error("invalid transfer: {0}")]
    Validation(String),

    #[error("account [{account_id}] balance {balance} is insufficient for amount {amount}")]
    InsufficientFunds {
        account_id: i64,
        balance: i64,
        amount: i64,
    },

    #[error("account [{account_id}] currency mismatch: {actual} vs {expected}")]
    CurrencyMismatch {
        account_id: i64,
        expected: String,
        actual: String,
    },

    #[error("account [{0}] not found")]
    AccountNotFound(i64),

    #[error("account doesn't belong to the authenticated user")]
    Forbidden,

    // === Store Errors ===
    #[error("transfer transaction failed: {0}")]
    Transaction(#[from] StoreError),
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::Validation(_) => "INVALID_TRANSFER",
            TransferError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            TransferError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            TransferError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            TransferError::Forbidden => "FORBIDDEN",
            TransferError::Transaction(e) => e.code(),
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::Validation(_)
            | TransferError::InsufficientFunds { .. }
            | TransferError::CurrencyMismatch { .. } => 400,
            TransferError::Forbidden => 403,
            TransferError::AccountNotFound(_) => 404,
            TransferError::Transaction(StoreError::NotFound) => 404,
            TransferError::Transaction(StoreError::CheckViolation(_))
            | TransferError::Transaction(StoreError::ForeignKeyViolation(_))
            | TransferError::Transaction(StoreError::UniqueViolation(_)) => 403,
            TransferError::Transaction(_) => 500,
        }
    }
}
