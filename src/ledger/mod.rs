//! Ledger Client Boundary
//!
//! The tracker only ever talks to the ledger through [`LedgerClient`]:
//! - `submit` hands a call to the ledger and returns its hash (never retried)
//! - `get_status` reads the eventually-consistent status of a hash
//!
//! Implementations:
//! - [`StarknetRpcClient`]: JSON-RPC node + signing relayer over HTTP
//! - [`SimulatedLedger`]: scripted in-process ledger (feature `mock-ledger`)

pub mod error;
pub mod rpc;
#[cfg(feature = "mock-ledger")]
pub mod simulated;

pub use error::LedgerError;
pub use rpc::StarknetRpcClient;
#[cfg(feature = "mock-ledger")]
pub use simulated::SimulatedLedger;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single contract invocation, executed from `sender_address`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerCall {
    pub sender_address: String,
    pub contract_address: String,
    pub entrypoint: String,
    pub calldata: Vec<String>,
}

/// Failure reason object attached to a status read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

/// Raw status payload as returned by the ledger.
///
/// Fields may be simultaneously present and contradictory; interpretation
/// is the job of [`crate::tracker::StatusMapper`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTxStatus {
    /// Coarse status (`RECEIVED`, `PENDING`, `REJECTED`, ...)
    #[serde(default)]
    pub status: Option<String>,
    /// Finality tier (`ACCEPTED_ON_L2`, `ACCEPTED_ON_L1`, ...)
    #[serde(default)]
    pub finality_status: Option<String>,
    /// Execution result (`SUCCEEDED`, `REVERTED`)
    #[serde(default)]
    pub execution_status: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<FailureReason>,
    #[serde(default)]
    pub revert_reason: Option<String>,
    #[serde(default)]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub receipt: Option<serde_json::Value>,
}

impl RawTxStatus {
    /// Payload carrying only a finality tier
    pub fn finality(finality_status: &str) -> Self {
        Self {
            finality_status: Some(finality_status.to_string()),
            ..Default::default()
        }
    }

    /// Payload carrying only a coarse status
    pub fn status(status: &str) -> Self {
        Self {
            status: Some(status.to_string()),
            ..Default::default()
        }
    }

    pub fn with_block(mut self, block_number: u64, block_hash: &str) -> Self {
        self.block_number = Some(block_number);
        self.block_hash = Some(block_hash.to_string());
        self
    }

    pub fn with_receipt(mut self, receipt: serde_json::Value) -> Self {
        self.receipt = Some(receipt);
        self
    }

    pub fn with_execution(mut self, execution_status: &str) -> Self {
        self.execution_status = Some(execution_status.to_string());
        self
    }

    pub fn with_failure(mut self, message: &str) -> Self {
        self.failure_reason = Some(FailureReason {
            code: None,
            message: message.to_string(),
        });
        self
    }
}

/// Ledger client trait
///
/// Every method is a network I/O boundary. Implementations must not retry
/// `submit`: resubmitting a payment risks moving funds twice.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Get client name for logging
    fn name(&self) -> &'static str;

    /// Submit a call and return the ledger-assigned transaction hash
    async fn submit(&self, call: &LedgerCall) -> Result<String, LedgerError>;

    /// Read the current status of a transaction.
    ///
    /// Returns [`LedgerError::NotFound`] when the hash is not (yet) indexed.
    async fn get_status(&self, tx_hash: &str) -> Result<RawTxStatus, LedgerError>;
}
