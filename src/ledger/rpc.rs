//! Starknet JSON-RPC Client
//!
//! Status reads go to a Starknet node:
//! - `starknet_getTransactionStatus` for finality / execution status
//! - `starknet_getTransactionReceipt` for inclusion data once accepted
//!
//! Submissions go to a signing account relayer, which owns keys and fee
//! estimation and answers with the assigned transaction hash.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::error::LedgerError;
use super::{FailureReason, LedgerCall, LedgerClient, RawTxStatus};
use crate::config::LedgerConfig;

/// JSON-RPC request structure
#[derive(Serialize)]
struct JsonRpcRequest<T> {
    jsonrpc: &'static str,
    method: &'static str,
    params: T,
    id: u64,
}

/// JSON-RPC response structure
#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// `starknet_getTransactionStatus` result
#[derive(Deserialize, Debug)]
struct TransactionStatusResult {
    finality_status: String,
    #[serde(default)]
    execution_status: Option<String>,
    #[serde(default)]
    failure_reason: Option<String>,
}

impl TransactionStatusResult {
    /// Only accepted transactions have a receipt to read
    fn is_accepted(&self) -> bool {
        self.finality_status.starts_with("ACCEPTED_ON_")
    }

    /// The node reports one tier; it fills both status fields
    fn into_raw(self) -> RawTxStatus {
        RawTxStatus {
            status: Some(self.finality_status.clone()),
            finality_status: Some(self.finality_status),
            execution_status: self.execution_status,
            failure_reason: self.failure_reason.map(|message| FailureReason {
                code: None,
                message,
            }),
            ..Default::default()
        }
    }
}

/// Copy inclusion data out of a `starknet_getTransactionReceipt` result
fn apply_receipt(raw: &mut RawTxStatus, receipt: serde_json::Value) {
    raw.block_number = receipt.get("block_number").and_then(|v| v.as_u64());
    raw.block_hash = receipt
        .get("block_hash")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    raw.revert_reason = receipt
        .get("revert_reason")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    raw.receipt = Some(receipt);
}

/// Relayer submission body
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest<'a> {
    sender_address: &'a str,
    calls: [RelayerCall<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayerCall<'a> {
    contract_address: &'a str,
    entrypoint: &'a str,
    calldata: &'a [String],
}

#[derive(Deserialize)]
struct SubmitResponse {
    transaction_hash: String,
}

/// Ledger client speaking Starknet JSON-RPC
pub struct StarknetRpcClient {
    client: reqwest::Client,
    rpc_url: String,
    relayer_url: String,
}

impl StarknetRpcClient {
    /// Create a new client with the given request timeout
    pub fn new(
        rpc_url: impl Into<String>,
        relayer_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                LedgerError::RpcConnection(format!("Failed to create HTTP client: {}", e))
            })?;

        let rpc_url = rpc_url.into();
        info!("Initializing Starknet RPC client at {}", rpc_url);

        Ok(Self {
            client,
            rpc_url,
            relayer_url: relayer_url.into(),
        })
    }

    /// Build from the `ledger` config section (requires both URLs)
    pub fn from_config(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let rpc_url = config
            .rpc_url
            .clone()
            .ok_or_else(|| LedgerError::Config("ledger.rpc_url is not set".to_string()))?;
        let relayer_url = config
            .relayer_url
            .clone()
            .ok_or_else(|| LedgerError::Config("ledger.relayer_url is not set".to_string()))?;

        Self::new(
            rpc_url,
            relayer_url,
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    /// Make a JSON-RPC call. `tx_hash` gives not-found errors their context.
    async fn rpc_call<T, R>(
        &self,
        method: &'static str,
        params: T,
        tx_hash: Option<&str>,
    ) -> Result<R, LedgerError>
    where
        T: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LedgerError::RpcConnection(format!("HTTP request failed: {}", e)))?;

        let rpc_response: JsonRpcResponse<R> = response
            .json()
            .await
            .map_err(|e| LedgerError::Parse(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = rpc_response.error {
            return Err(LedgerError::from_rpc(error.code, error.message, tx_hash));
        }

        rpc_response
            .result
            .ok_or_else(|| LedgerError::Parse(format!("No result in {} response", method)))
    }

    /// Attach block and receipt data to an accepted transaction
    async fn attach_receipt(&self, tx_hash: &str, raw: &mut RawTxStatus) {
        let receipt: serde_json::Value = match self
            .rpc_call(
                "starknet_getTransactionReceipt",
                json!({ "transaction_hash": tx_hash }),
                Some(tx_hash),
            )
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(tx_hash = %tx_hash, error = %e, "Receipt lookup failed");
                return;
            }
        };

        apply_receipt(raw, receipt);
    }
}

#[async_trait]
impl LedgerClient for StarknetRpcClient {
    fn name(&self) -> &'static str {
        "starknet-rpc"
    }

    async fn submit(&self, call: &LedgerCall) -> Result<String, LedgerError> {
        let body = SubmitRequest {
            sender_address: &call.sender_address,
            calls: [RelayerCall {
                contract_address: &call.contract_address,
                entrypoint: &call.entrypoint,
                calldata: &call.calldata,
            }],
        };

        let response = self
            .client
            .post(&self.relayer_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::RpcConnection(format!("Relayer request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LedgerError::SubmissionRejected(format!(
                "relayer returned {}: {}",
                status, text
            )));
        }

        let submitted: SubmitResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Parse(format!("Failed to parse relayer response: {}", e)))?;

        debug!(
            tx_hash = %submitted.transaction_hash,
            entrypoint = %call.entrypoint,
            "Call submitted"
        );
        Ok(submitted.transaction_hash.to_lowercase())
    }

    async fn get_status(&self, tx_hash: &str) -> Result<RawTxStatus, LedgerError> {
        let result: TransactionStatusResult = self
            .rpc_call(
                "starknet_getTransactionStatus",
                json!({ "transaction_hash": tx_hash }),
                Some(tx_hash),
            )
            .await?;

        let accepted = result.is_accepted();
        let mut raw = result.into_raw();
        if accepted {
            self.attach_receipt(tx_hash, &mut raw).await;
        }

        Ok(raw)
    }
}
