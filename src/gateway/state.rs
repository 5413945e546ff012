use std::sync::Arc;
use std::time::Instant;

use crate::tracker::{StatusTracker, TransactionStore};
use crate::transfer::TransferInitiator;

/// Shared gateway state
#[derive(Clone)]
pub struct AppState {
    pub initiator: Arc<TransferInitiator>,
    pub tracker: Arc<StatusTracker>,
    pub store: Arc<dyn TransactionStore>,
    /// Ledger backend name reported by /health
    pub ledger_name: &'static str,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        initiator: Arc<TransferInitiator>,
        tracker: Arc<StatusTracker>,
        store: Arc<dyn TransactionStore>,
        ledger_name: &'static str,
    ) -> Self {
        Self {
            initiator,
            tracker,
            store,
            ledger_name,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
