//! Transfer Error Types

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::tracker::{StoreError, TrackerError};

/// Transfer error types
///
/// Error codes are stable strings for API responses.
#[derive(Error, Debug, Clone)]
pub enum TransferError {
    // === Validation Errors ===
    #[error("Missing user identity")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0} wallet address is missing")]
    MissingWallet(&'static str),

    #[error("Invalid {field} address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid token parameters: {0}")]
    InvalidToken(String),

    // === Ledger Errors ===
    #[error("Submission failed: {0}")]
    Submission(LedgerError),

    // === Tracking Errors ===
    #[error("Transfer not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal system error: {0}")]
    SystemError(String),
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::Unauthorized => "UNAUTHORIZED",
            TransferError::InvalidRequest(_) => "INVALID_REQUEST",
            TransferError::MissingWallet(_) => "MISSING_WALLET",
            TransferError::InvalidAddress { .. } => "INVALID_ADDRESS",
            TransferError::InvalidAmount(_) => "INVALID_AMOUNT",
            TransferError::InvalidToken(_) => "INVALID_TOKEN",
            TransferError::Submission(_) => "SUBMISSION_FAILED",
            TransferError::NotFound(_) => "TRANSFER_NOT_FOUND",
            TransferError::Database(_) => "DATABASE_ERROR",
            TransferError::SystemError(_) => "SYSTEM_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::Unauthorized => 401,
            TransferError::InvalidRequest(_)
            | TransferError::MissingWallet(_)
            | TransferError::InvalidAddress { .. }
            | TransferError::InvalidAmount(_)
            | TransferError::InvalidToken(_) => 400,
            TransferError::NotFound(_) => 404,
            TransferError::Submission(e) => match e {
                LedgerError::SubmissionRejected(_) => 422,
                _ => 502,
            },
            TransferError::Database(_) | TransferError::SystemError(_) => 500,
        }
    }
}

impl From<StoreError> for TransferError {
    fn from(e: StoreError) -> Self {
        TransferError::Database(e.to_string())
    }
}

impl From<TrackerError> for TransferError {
    fn from(e: TrackerError) -> Self {
        match e {
            TrackerError::NotFound(hash) => TransferError::NotFound(hash),
            TrackerError::Store(e) => e.into(),
            TrackerError::Ledger(e) => TransferError::SystemError(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(TransferError::MissingWallet("sender").code(), "MISSING_WALLET");
        assert_eq!(
            TransferError::NotFound("0x1".into()).code(),
            "TRANSFER_NOT_FOUND"
        );
        assert_eq!(TransferError::Unauthorized.code(), "UNAUTHORIZED");
    }

    #[test]
    fn test_http_status() {
        assert_eq!(TransferError::Unauthorized.http_status(), 401);
        assert_eq!(TransferError::InvalidAmount("0".into()).http_status(), 400);
        assert_eq!(TransferError::NotFound("0x1".into()).http_status(), 404);
        assert_eq!(
            TransferError::Submission(LedgerError::SubmissionRejected("no funds".into()))
                .http_status(),
            422
        );
        assert_eq!(
            TransferError::Submission(LedgerError::RpcConnection("down".into())).http_status(),
            502
        );
    }

    #[test]
    fn test_display() {
        let err = TransferError::MissingWallet("Recipient");
        assert_eq!(err.to_string(), "Recipient wallet address is missing");
    }

    #[test]
    fn test_tracker_not_found_maps_to_404() {
        let err: TransferError = TrackerError::NotFound("0xabc".into()).into();
        assert_eq!(err.http_status(), 404);
    }
}
