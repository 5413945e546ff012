//! Recovery Worker
//!
//! Rebuilds the in-memory pending set from the store: once at startup and
//! then on a fixed interval. Only non-terminal records created within the
//! recovery window are resumed; counters restart at zero. Hashes tracked
//! while a scan is running are kept even if the scan missed them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::config::TrackerConfig;

use super::error::TrackerError;
use super::pending::PendingSet;
use super::store::TransactionStore;

/// Configuration for the recovery worker
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    pub scan_interval: Duration,
    pub window: chrono::Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self::from(&TrackerConfig::default())
    }
}

impl From<&TrackerConfig> for RecoveryConfig {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            scan_interval: Duration::from_secs(config.recovery_interval_secs),
            window: chrono::Duration::days(config.recovery_window_days),
        }
    }
}

pub struct RecoveryWorker {
    store: Arc<dyn TransactionStore>,
    pending: Arc<PendingSet>,
    config: RecoveryConfig,
}

impl RecoveryWorker {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        pending: Arc<PendingSet>,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            store,
            pending,
            config,
        }
    }

    /// Run the recovery loop until `shutdown` flips to true.
    ///
    /// The first scan runs immediately.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            scan_interval_secs = self.config.scan_interval.as_secs(),
            window_days = self.config.window.num_days(),
            "Starting recovery worker"
        );

        let mut interval = tokio::time::interval(self.config.scan_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.scan_and_recover().await {
                        error!(error = %e, "Recovery scan failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Recovery worker stopped");
    }

    /// Run a single scan. Returns the number of hashes now pending.
    pub async fn scan_and_recover(&self) -> Result<usize, TrackerError> {
        let since = self.pending.generation();
        let created_after = Utc::now() - self.config.window;
        let hashes = self.store.find_in_flight(created_after).await?;
        let count = self.pending.replace_all(hashes, since);

        info!(pending = count, store = self.store.name(), "Pending set recovered");
        Ok(count)
    }
}
