//! Transfer Initiator
//!
//! Submit-then-record: the call is submitted first, and only an accepted
//! submission produces a PENDING record. A submission is never retried.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::LedgerConfig;
use crate::ledger::LedgerClient;
use crate::tracker::{
    EventBus, NewTransaction, RefreshOutcome, StatusTracker, TokenType, TransactionRecord,
    TransactionStore, TransferEvent,
};

use super::call::{build_call, normalize_address, parse_amount};
use super::error::TransferError;

/// A transfer request whose users are already resolved to wallets
#[derive(Debug, Clone)]
pub struct TransferIntent {
    pub sender_id: String,
    pub recipient_id: String,
    pub conversation_id: String,
    pub message_id: Option<String>,
    pub sender_address: Option<String>,
    pub recipient_address: Option<String>,
    pub token_type: TokenType,
    pub token_address: Option<String>,
    pub token_id: Option<String>,
    /// Decimal integer string in the token's base unit
    pub amount: String,
    pub metadata: Option<serde_json::Value>,
}

/// Successful initiation result
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub record: TransactionRecord,
    pub explorer_url: String,
}

pub struct TransferInitiator {
    ledger: Arc<dyn LedgerClient>,
    store: Arc<dyn TransactionStore>,
    tracker: Arc<StatusTracker>,
    bus: Arc<EventBus>,
    ledger_config: LedgerConfig,
    initial_check_delay: Option<Duration>,
}

impl TransferInitiator {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        store: Arc<dyn TransactionStore>,
        tracker: Arc<StatusTracker>,
        bus: Arc<EventBus>,
        ledger_config: LedgerConfig,
        initial_check_delay: Option<Duration>,
    ) -> Self {
        Self {
            ledger,
            store,
            tracker,
            bus,
            ledger_config,
            initial_check_delay,
        }
    }

    pub fn explorer_url(&self, tx_hash: &str) -> String {
        self.ledger_config.explorer_url(tx_hash)
    }

    pub async fn initiate(&self, intent: TransferIntent) -> Result<TransferReceipt, TransferError> {
        if intent.sender_id.trim().is_empty()
            || intent.recipient_id.trim().is_empty()
            || intent.conversation_id.trim().is_empty()
        {
            return Err(TransferError::InvalidRequest(
                "sender, recipient and conversation are required".into(),
            ));
        }

        let call = build_call(&intent, &self.ledger_config.native_token_address)?;
        // Canonical forms: no leading zeros, lowercase hex
        let amount = parse_amount(&intent.amount)?.to_string();
        let token_address = intent
            .token_address
            .as_deref()
            .map(|a| normalize_address("token", a))
            .transpose()?;

        let tx_hash = self.ledger.submit(&call).await.map_err(|e| {
            warn!(
                sender_id = %intent.sender_id,
                token_type = %intent.token_type,
                ledger = self.ledger.name(),
                error = %e,
                "Transfer submission failed"
            );
            TransferError::Submission(e)
        })?;

        let record = TransactionRecord::pending(
            NewTransaction {
                sender_id: intent.sender_id,
                recipient_id: intent.recipient_id,
                conversation_id: intent.conversation_id,
                message_id: intent.message_id,
                token_type: intent.token_type,
                token_address,
                token_id: intent.token_id,
                amount,
                tx_hash: tx_hash.clone(),
                metadata: intent.metadata,
            },
            Utc::now(),
        );

        if let Err(e) = self.store.insert(&record).await {
            // Funds may be moving; the hash must not vanish from the logs
            error!(
                tx_hash = %tx_hash,
                sender_id = %record.sender_id,
                error = %e,
                "CRITICAL: submitted transfer could not be recorded"
            );
            return Err(e.into());
        }

        self.tracker.track(&tx_hash);

        let explorer_url = self.explorer_url(&tx_hash);
        info!(
            tx_hash = %tx_hash,
            sender_id = %record.sender_id,
            recipient_id = %record.recipient_id,
            token_type = %record.token_type,
            amount = %record.amount,
            "Transfer initiated"
        );
        self.bus.publish(TransferEvent::Initiated {
            record: record.clone(),
            explorer_url: explorer_url.clone(),
        });

        if let Some(delay) = self.initial_check_delay {
            self.schedule_initial_check(tx_hash, delay);
        }

        Ok(TransferReceipt {
            record,
            explorer_url,
        })
    }

    /// Detached one-shot refresh so fast transfers don't wait for a tick
    fn schedule_initial_check(&self, tx_hash: String, delay: Duration) {
        let tracker = Arc::clone(&self.tracker);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match tracker.refresh(&tx_hash).await {
                Ok(RefreshOutcome::Updated(update)) => {
                    debug!(tx_hash = %tx_hash, status = %update.status, "Initial check updated status");
                }
                Ok(outcome) => {
                    debug!(tx_hash = %tx_hash, ?outcome, "Initial check");
                }
                Err(e) => {
                    warn!(tx_hash = %tx_hash, error = %e, "Initial check failed");
                }
            }
        });
    }
}
