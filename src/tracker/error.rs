//! Tracker Error Types

use thiserror::Error;

use crate::ledger::LedgerError;

/// Persistence errors
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction hash already recorded: {0}")]
    Duplicate(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e
            && db_err.is_unique_violation()
        {
            return StoreError::Duplicate(db_err.message().to_string());
        }
        StoreError::Database(e.to_string())
    }
}

/// Status tracking errors
#[derive(Error, Debug, Clone)]
pub enum TrackerError {
    #[error("Transaction not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl TrackerError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TrackerError::NotFound(_) => "TRANSACTION_NOT_FOUND",
            TrackerError::Store(StoreError::Duplicate(_)) => "DUPLICATE_TRANSACTION",
            TrackerError::Store(_) => "DATABASE_ERROR",
            TrackerError::Ledger(_) => "LEDGER_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TrackerError::NotFound(_) => 404,
            TrackerError::Store(StoreError::Duplicate(_)) => 409,
            TrackerError::Store(_) => 500,
            TrackerError::Ledger(_) => 502,
        }
    }
}
