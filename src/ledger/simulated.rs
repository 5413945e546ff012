//! Simulated Ledger
//!
//! In-process ledger with scripted status reads, used in dev mode (no
//! `ledger.rpc_url` configured) and by tests.
//!
//! Each hash owns a queue of responses. Reads pop the front until one
//! response is left, which then repeats forever. Hashes without a script
//! read as [`LedgerError::NotFound`].

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::error::LedgerError;
use super::{LedgerCall, LedgerClient, RawTxStatus};

pub type ScriptedResponse = Result<RawTxStatus, LedgerError>;

pub struct SimulatedLedger {
    /// Script installed for every newly submitted hash
    progression: Mutex<Vec<ScriptedResponse>>,
    scripts: Mutex<HashMap<String, VecDeque<ScriptedResponse>>>,
    submitted: Mutex<Vec<LedgerCall>>,
    status_calls: Mutex<HashMap<String, usize>>,
    fail_submit: Mutex<Option<String>>,
    latency: Mutex<Duration>,
    next_nonce: AtomicU64,
}

impl SimulatedLedger {
    /// Ledger where every submission walks RECEIVED -> ACCEPTED_ON_L2 -> ACCEPTED_ON_L1
    pub fn new() -> Self {
        Self::with_progression(Self::default_progression())
    }

    /// Ledger where every submission follows `progression`
    pub fn with_progression(progression: Vec<ScriptedResponse>) -> Self {
        Self {
            progression: Mutex::new(progression),
            scripts: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            status_calls: Mutex::new(HashMap::new()),
            fail_submit: Mutex::new(None),
            latency: Mutex::new(Duration::ZERO),
            next_nonce: AtomicU64::new(1),
        }
    }

    pub fn default_progression() -> Vec<ScriptedResponse> {
        vec![
            Ok(RawTxStatus {
                status: Some("RECEIVED".to_string()),
                ..RawTxStatus::finality("RECEIVED")
            }),
            Ok(RawTxStatus::finality("ACCEPTED_ON_L2")
                .with_execution("SUCCEEDED")
                .with_block(1, "0xb1")),
            Ok(RawTxStatus::finality("ACCEPTED_ON_L1")
                .with_execution("SUCCEEDED")
                .with_block(1, "0xb1")
                .with_receipt(json!({ "execution_status": "SUCCEEDED", "block_number": 1 }))),
        ]
    }

    /// Replace the script of one hash
    pub fn script(&self, tx_hash: &str, responses: Vec<ScriptedResponse>) {
        self.lock_scripts()
            .insert(tx_hash.to_string(), responses.into_iter().collect());
    }

    /// Replace the script used for future submissions
    pub fn set_progression(&self, progression: Vec<ScriptedResponse>) {
        *lock(&self.progression) = progression;
    }

    /// Make every submission fail with `reason` (None restores success)
    pub fn set_fail_submit(&self, reason: Option<&str>) {
        *lock(&self.fail_submit) = reason.map(str::to_string);
    }

    /// Delay applied to every status read
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = latency;
    }

    pub fn submitted_calls(&self) -> Vec<LedgerCall> {
        lock(&self.submitted).clone()
    }

    pub fn status_calls(&self, tx_hash: &str) -> usize {
        lock(&self.status_calls).get(tx_hash).copied().unwrap_or(0)
    }

    fn lock_scripts(&self) -> std::sync::MutexGuard<'_, HashMap<String, VecDeque<ScriptedResponse>>> {
        lock(&self.scripts)
    }
}

impl Default for SimulatedLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Poisoning only happens if a holder panicked; the data is still usable.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl LedgerClient for SimulatedLedger {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn submit(&self, call: &LedgerCall) -> Result<String, LedgerError> {
        if let Some(reason) = lock(&self.fail_submit).clone() {
            return Err(LedgerError::SubmissionRejected(reason));
        }

        let nonce = self.next_nonce.fetch_add(1, Ordering::SeqCst);
        let tx_hash = format!("0x{:064x}", nonce);

        lock(&self.submitted).push(call.clone());
        let progression = lock(&self.progression).clone();
        self.script(&tx_hash, progression);

        Ok(tx_hash)
    }

    async fn get_status(&self, tx_hash: &str) -> Result<RawTxStatus, LedgerError> {
        *lock(&self.status_calls)
            .entry(tx_hash.to_string())
            .or_insert(0) += 1;

        let latency = *lock(&self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut scripts = self.lock_scripts();
        match scripts.get_mut(tx_hash) {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| Err(LedgerError::NotFound(tx_hash.to_string()))),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(LedgerError::NotFound(tx_hash.to_string()))),
            None => Err(LedgerError::NotFound(tx_hash.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call() -> LedgerCall {
        LedgerCall {
            sender_address: "0x1".into(),
            contract_address: "0x2".into(),
            entrypoint: "transfer".into(),
            calldata: vec![],
        }
    }

    #[tokio::test]
    async fn test_progression_then_sticky_last() {
        let ledger = SimulatedLedger::new();
        let hash = ledger.submit(&call()).await.unwrap();

        let first = ledger.get_status(&hash).await.unwrap();
        assert_eq!(first.finality_status.as_deref(), Some("RECEIVED"));
        let second = ledger.get_status(&hash).await.unwrap();
        assert_eq!(second.finality_status.as_deref(), Some("ACCEPTED_ON_L2"));
        for _ in 0..3 {
            let last = ledger.get_status(&hash).await.unwrap();
            assert_eq!(last.finality_status.as_deref(), Some("ACCEPTED_ON_L1"));
        }
        assert_eq!(ledger.status_calls(&hash), 5);
    }

    #[tokio::test]
    async fn test_unknown_hash_not_found() {
        let ledger = SimulatedLedger::new();
        let err = ledger.get_status("0xdead").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_submit_failure() {
        let ledger = SimulatedLedger::new();
        ledger.set_fail_submit(Some("insufficient balance"));
        let err = ledger.submit(&call()).await.unwrap_err();
        assert!(matches!(err, LedgerError::SubmissionRejected(_)));
        assert!(ledger.submitted_calls().is_empty());
    }

    #[tokio::test]
    async fn test_hashes_are_unique() {
        let ledger = SimulatedLedger::new();
        let a = ledger.submit(&call()).await.unwrap();
        let b = ledger.submit(&call()).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(ledger.submitted_calls().len(), 2);
    }
}
