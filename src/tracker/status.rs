//! Status Tracker
//!
//! The only writer of transaction status after creation. A refresh reads
//! the stored record, asks the ledger, maps the answer and persists it with
//! a CAS against the status read at the start, so a stale read racing a
//! fresher write is discarded instead of regressing the record.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::ledger::LedgerClient;

use super::error::TrackerError;
use super::events::{EventBus, TransferEvent};
use super::mapper::StatusMapper;
use super::pending::PendingSet;
use super::state::TxStatus;
use super::store::TransactionStore;
use super::types::StatusUpdate;

pub const LOOKUP_EXHAUSTED_REASON: &str = "Transaction not found after multiple attempts";
pub const LOOKUP_FAILED_REASON: &str = "Status lookup failed after multiple attempts";

/// Result of one refresh
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// A higher-ranked status was committed and published
    Updated(StatusUpdate),
    /// Nothing committed; carries the stored status
    Unchanged(TxStatus),
    /// The ledger lookup failed; carries the consecutive failure count,
    /// 0 for a hash outside the pending set
    LookupFailed { failures: u32 },
    /// Another refresh of this hash is already running
    InFlight,
}

pub struct StatusTracker {
    store: Arc<dyn TransactionStore>,
    ledger: Arc<dyn LedgerClient>,
    pending: Arc<PendingSet>,
    bus: Arc<EventBus>,
    lookup_failure_threshold: u32,
}

impl StatusTracker {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        ledger: Arc<dyn LedgerClient>,
        pending: Arc<PendingSet>,
        bus: Arc<EventBus>,
        lookup_failure_threshold: u32,
    ) -> Self {
        Self {
            store,
            ledger,
            pending,
            bus,
            lookup_failure_threshold,
        }
    }

    pub fn pending(&self) -> &Arc<PendingSet> {
        &self.pending
    }

    /// Start tracking a freshly submitted hash
    pub fn track(&self, tx_hash: &str) {
        if self.pending.insert(tx_hash) {
            debug!(tx_hash = %tx_hash, pending = self.pending.len(), "Tracking transaction");
        }
    }

    /// Reconcile one hash with the ledger
    pub async fn refresh(&self, tx_hash: &str) -> Result<RefreshOutcome, TrackerError> {
        let Some(_guard) = self.pending.claim(tx_hash) else {
            debug!(tx_hash = %tx_hash, "Refresh already in flight");
            return Ok(RefreshOutcome::InFlight);
        };

        let record = self
            .store
            .get_by_hash(tx_hash)
            .await?
            .ok_or_else(|| TrackerError::NotFound(tx_hash.to_string()))?;

        if record.status.is_terminal() {
            self.pending.remove(tx_hash);
            return Ok(RefreshOutcome::Unchanged(record.status));
        }

        let raw = match self.ledger.get_status(tx_hash).await {
            Ok(raw) => raw,
            Err(e) => {
                let failures = self.pending.record_lookup_failure(tx_hash);
                if e.is_not_found() {
                    debug!(tx_hash = %tx_hash, failures = ?failures, "Transaction not indexed yet");
                } else {
                    warn!(tx_hash = %tx_hash, failures = ?failures, error = %e, "Status lookup failed");
                }
                // Untracked hashes keep no counter and are never forced
                let Some(failures) = failures else {
                    return Ok(RefreshOutcome::LookupFailed { failures: 0 });
                };

                if failures > self.lookup_failure_threshold {
                    warn!(tx_hash = %tx_hash, failures, "Lookup failures exhausted, rejecting");
                    let reason = if e.is_not_found() {
                        LOOKUP_EXHAUSTED_REASON
                    } else {
                        LOOKUP_FAILED_REASON
                    };
                    if let Some(update) = self
                        .force_terminal(tx_hash, TxStatus::Rejected, reason)
                        .await?
                    {
                        return Ok(RefreshOutcome::Updated(update));
                    }
                }
                return Ok(RefreshOutcome::LookupFailed { failures });
            }
        };
        self.pending.reset_lookup_failures(tx_hash);

        let mapped = StatusMapper::map(&raw);
        if !record.status.can_advance_to(mapped.status) {
            return Ok(RefreshOutcome::Unchanged(record.status));
        }

        let update = StatusUpdate {
            tx_hash: tx_hash.to_string(),
            status: mapped.status,
            block_number: mapped.block_number,
            block_hash: mapped.block_hash,
            receipt: mapped.receipt,
            error: mapped.error,
            timestamp: Utc::now(),
        };

        if !self.store.apply_status(record.status, &update).await? {
            debug!(
                tx_hash = %tx_hash,
                read = %record.status,
                mapped = %update.status,
                "Stale status read discarded"
            );
            return Ok(RefreshOutcome::Unchanged(record.status));
        }

        self.commit(record.status, &update);
        Ok(RefreshOutcome::Updated(update))
    }

    /// Write a locally decided terminal state.
    ///
    /// The caller must hold the hash's in-flight claim. Returns None when
    /// the record already reached a terminal state.
    pub async fn force_terminal(
        &self,
        tx_hash: &str,
        status: TxStatus,
        reason: &str,
    ) -> Result<Option<StatusUpdate>, TrackerError> {
        loop {
            let record = self
                .store
                .get_by_hash(tx_hash)
                .await?
                .ok_or_else(|| TrackerError::NotFound(tx_hash.to_string()))?;

            if !record.status.can_advance_to(status) {
                self.pending.remove(tx_hash);
                return Ok(None);
            }

            let update = StatusUpdate::forced(tx_hash, status, reason, Utc::now());
            // Each failed CAS means the stored rank went up, so this terminates
            if self.store.apply_status(record.status, &update).await? {
                self.commit(record.status, &update);
                return Ok(Some(update));
            }
        }
    }

    fn commit(&self, previous: TxStatus, update: &StatusUpdate) {
        info!(
            tx_hash = %update.tx_hash,
            from = %previous,
            to = %update.status,
            block_number = ?update.block_number,
            "Transaction status updated"
        );
        if update.status.is_terminal() {
            self.pending.remove(&update.tx_hash);
        }
        self.bus.publish(TransferEvent::StatusUpdated(update.clone()));
    }
}

#[cfg(all(test, feature = "mock-ledger"))]
mod tests {
    use super::*;
    use crate::ledger::{LedgerError, RawTxStatus, SimulatedLedger};
    use crate::tracker::store::MemoryTransactionStore;
    use crate::tracker::types::{NewTransaction, TokenType, TransactionRecord};

    struct Fixture {
        store: Arc<MemoryTransactionStore>,
        ledger: Arc<SimulatedLedger>,
        bus: Arc<EventBus>,
        tracker: StatusTracker,
    }

    fn fixture(threshold: u32) -> Fixture {
        let store = Arc::new(MemoryTransactionStore::new());
        let ledger = Arc::new(SimulatedLedger::new());
        let bus = Arc::new(EventBus::new());
        let tracker = StatusTracker::new(
            store.clone(),
            ledger.clone(),
            Arc::new(PendingSet::new()),
            bus.clone(),
            threshold,
        );
        Fixture {
            store,
            ledger,
            bus,
            tracker,
        }
    }

    async fn seed(f: &Fixture, hash: &str) {
        let record = TransactionRecord::pending(
            NewTransaction {
                sender_id: "u1".into(),
                recipient_id: "u2".into(),
                conversation_id: "c1".into(),
                message_id: None,
                token_type: TokenType::Native,
                token_address: None,
                token_id: None,
                amount: "10".into(),
                tx_hash: hash.into(),
                metadata: None,
            },
            Utc::now(),
        );
        f.store.insert(&record).await.unwrap();
        f.tracker.track(hash);
    }

    #[tokio::test]
    async fn test_refresh_advances_and_publishes() {
        let f = fixture(10);
        seed(&f, "0x1").await;
        f.ledger
            .script("0x1", vec![Ok(RawTxStatus::finality("ACCEPTED_ON_L2"))]);
        let (_, mut rx) = f.bus.subscribe();

        let outcome = f.tracker.refresh("0x1").await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::Updated(ref u) if u.status == TxStatus::AcceptedOnL2));
        assert_eq!(rx.recv().await.unwrap().name(), "transaction.status.updated");
        assert!(f.tracker.pending().contains("0x1"));

        // Same answer again: no write, no event
        let outcome = f.tracker.refresh("0x1").await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Unchanged(TxStatus::AcceptedOnL2));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_never_downgrades() {
        let f = fixture(10);
        seed(&f, "0x1").await;
        f.ledger.script(
            "0x1",
            vec![
                Ok(RawTxStatus::finality("ACCEPTED_ON_L2")),
                Ok(RawTxStatus::status("RECEIVED")),
            ],
        );
        f.tracker.refresh("0x1").await.unwrap();
        let outcome = f.tracker.refresh("0x1").await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Unchanged(TxStatus::AcceptedOnL2));
        let stored = f.store.get_by_hash("0x1").await.unwrap().unwrap();
        assert_eq!(stored.status, TxStatus::AcceptedOnL2);
    }

    #[tokio::test]
    async fn test_terminal_evicts() {
        let f = fixture(10);
        seed(&f, "0x1").await;
        f.ledger.script(
            "0x1",
            vec![Ok(RawTxStatus::default()
                .with_execution("REVERTED")
                .with_failure("Out of gas"))],
        );
        let outcome = f.tracker.refresh("0x1").await.unwrap();
        let RefreshOutcome::Updated(update) = outcome else {
            panic!("expected update, got {:?}", outcome);
        };
        assert_eq!(update.status, TxStatus::Reverted);
        assert_eq!(update.error.as_deref(), Some("Out of gas"));
        assert!(!f.tracker.pending().contains("0x1"));

        let stored = f.store.get_by_hash("0x1").await.unwrap().unwrap();
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_lookup_failures_reject_after_threshold() {
        let f = fixture(3);
        seed(&f, "0x1").await;
        f.ledger.script("0x1", vec![Err(LedgerError::NotFound("0x1".into()))]);

        for expected in 1..=3 {
            let outcome = f.tracker.refresh("0x1").await.unwrap();
            assert_eq!(outcome, RefreshOutcome::LookupFailed { failures: expected });
        }
        let outcome = f.tracker.refresh("0x1").await.unwrap();
        let RefreshOutcome::Updated(update) = outcome else {
            panic!("expected forced rejection, got {:?}", outcome);
        };
        assert_eq!(update.status, TxStatus::Rejected);
        assert_eq!(update.error.as_deref(), Some(LOOKUP_EXHAUSTED_REASON));
        assert!(!f.tracker.pending().contains("0x1"));
    }

    #[tokio::test]
    async fn test_transport_failures_reject_with_lookup_reason() {
        let f = fixture(2);
        seed(&f, "0x1").await;
        f.ledger.script(
            "0x1",
            vec![
                Err(LedgerError::NotFound("0x1".into())),
                Err(LedgerError::RpcConnection("connection refused".into())),
            ],
        );

        for _ in 0..2 {
            f.tracker.refresh("0x1").await.unwrap();
        }
        let outcome = f.tracker.refresh("0x1").await.unwrap();
        let RefreshOutcome::Updated(update) = outcome else {
            panic!("expected forced rejection, got {:?}", outcome);
        };
        assert_eq!(update.status, TxStatus::Rejected);
        assert_eq!(update.error.as_deref(), Some(LOOKUP_FAILED_REASON));
    }

    #[tokio::test]
    async fn test_refresh_does_not_register_untracked_hash() {
        let f = fixture(0);
        let mut record = TransactionRecord::pending(
            NewTransaction {
                sender_id: "u1".into(),
                recipient_id: "u2".into(),
                conversation_id: "c1".into(),
                message_id: None,
                token_type: TokenType::Native,
                token_address: None,
                token_id: None,
                amount: "10".into(),
                tx_hash: "0xold".into(),
                metadata: None,
            },
            Utc::now(),
        );
        record.created_at = Utc::now() - chrono::Duration::days(30);
        f.store.insert(&record).await.unwrap();
        f.ledger.script(
            "0xold",
            vec![
                Err(LedgerError::NotFound("0xold".into())),
                Ok(RawTxStatus::status("RECEIVED")),
            ],
        );

        // Past a zero threshold, but untracked hashes are never forced
        let outcome = f.tracker.refresh("0xold").await.unwrap();
        assert_eq!(outcome, RefreshOutcome::LookupFailed { failures: 0 });
        assert!(f.tracker.pending().is_empty());

        let outcome = f.tracker.refresh("0xold").await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::Updated(ref u) if u.status == TxStatus::Received));
        assert!(f.tracker.pending().is_empty());
    }

    #[tokio::test]
    async fn test_successful_lookup_resets_failures() {
        let f = fixture(2);
        seed(&f, "0x1").await;
        f.ledger.script(
            "0x1",
            vec![
                Err(LedgerError::NotFound("0x1".into())),
                Err(LedgerError::NotFound("0x1".into())),
                Ok(RawTxStatus::status("RECEIVED")),
                Err(LedgerError::RpcConnection("timeout".into())),
            ],
        );
        for _ in 0..3 {
            f.tracker.refresh("0x1").await.unwrap();
        }
        let outcome = f.tracker.refresh("0x1").await.unwrap();
        assert_eq!(outcome, RefreshOutcome::LookupFailed { failures: 1 });
        let stored = f.store.get_by_hash("0x1").await.unwrap().unwrap();
        assert_eq!(stored.status, TxStatus::Received);
    }

    #[tokio::test]
    async fn test_refresh_in_flight_is_skipped() {
        let f = fixture(10);
        seed(&f, "0x1").await;
        let _guard = f.tracker.pending().claim("0x1").unwrap();
        assert_eq!(
            f.tracker.refresh("0x1").await.unwrap(),
            RefreshOutcome::InFlight
        );
        assert_eq!(f.ledger.status_calls("0x1"), 0);
    }

    #[tokio::test]
    async fn test_force_terminal_on_terminal_record_is_noop() {
        let f = fixture(10);
        seed(&f, "0x1").await;
        let first = f
            .tracker
            .force_terminal("0x1", TxStatus::Rejected, "first")
            .await
            .unwrap();
        assert!(first.is_some());
        let second = f
            .tracker
            .force_terminal("0x1", TxStatus::Rejected, "second")
            .await
            .unwrap();
        assert!(second.is_none());
        let stored = f.store.get_by_hash("0x1").await.unwrap().unwrap();
        assert_eq!(stored.error.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_unknown_hash_is_not_found() {
        let f = fixture(10);
        let err = f.tracker.refresh("0xnope").await.unwrap_err();
        assert!(matches!(err, TrackerError::NotFound(_)));
    }
}
