use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Transaction not found: {0}")]
    NotFound(String),

    #[error("RPC connection failed: {0}")]
    RpcConnection(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    /// Starknet RPC code for TXN_HASH_NOT_FOUND
    pub const TXN_HASH_NOT_FOUND: i64 = 29;

    /// The ledger has not (yet) indexed the hash
    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound(_))
    }

    /// Classify a JSON-RPC error object
    pub fn from_rpc(code: i64, message: String, tx_hash: Option<&str>) -> Self {
        let not_found =
            code == Self::TXN_HASH_NOT_FOUND || message.to_lowercase().contains("not found");
        match (not_found, tx_hash) {
            (true, Some(hash)) => LedgerError::NotFound(hash.to_string()),
            _ => LedgerError::Rpc { code, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        let err = LedgerError::from_rpc(29, "Transaction hash not found".into(), Some("0x1"));
        assert!(err.is_not_found());

        let err = LedgerError::from_rpc(-32603, "Transaction not found in mempool".into(), Some("0x1"));
        assert!(err.is_not_found());

        let err = LedgerError::from_rpc(-32603, "Internal error".into(), Some("0x1"));
        assert!(!err.is_not_found());

        // Without a hash context a not-found code stays a plain RPC error
        let err = LedgerError::from_rpc(29, "not found".into(), None);
        assert!(!err.is_not_found());
    }
}
