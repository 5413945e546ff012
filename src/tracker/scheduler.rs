//! Reconciliation Scheduler
//!
//! Background worker that periodically refreshes every pending hash and
//! enforces the upper bound on how long a hash may stay in flight.
//!
//! Each pass snapshots the pending set and refreshes entries concurrently
//! (bounded by `worker_concurrency`). A pass is awaited before the next
//! tick, and the tracker's in-flight marker keeps refreshes of one hash
//! from overlapping with the post-submit check.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::TrackerConfig;

use super::state::TxStatus;
use super::status::{RefreshOutcome, StatusTracker};

pub const RETRIES_EXHAUSTED_REASON: &str =
    "Transaction status could not be determined after maximum retries";

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    pub max_retries: u32,
    pub worker_concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&TrackerConfig::default())
    }
}

impl From<&TrackerConfig> for SchedulerConfig {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            max_retries: config.max_retries,
            worker_concurrency: config.worker_concurrency.max(1),
        }
    }
}

/// Counters of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub attempted: usize,
    pub updated: usize,
    pub forced: usize,
    pub errors: usize,
}

pub struct ReconciliationScheduler {
    tracker: Arc<StatusTracker>,
    config: SchedulerConfig,
}

impl ReconciliationScheduler {
    pub fn new(tracker: Arc<StatusTracker>, config: SchedulerConfig) -> Self {
        Self { tracker, config }
    }

    /// Run until `shutdown` flips to true
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            max_retries = self.config.max_retries,
            worker_concurrency = self.config.worker_concurrency,
            "Starting reconciliation scheduler"
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so submissions get a full period
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let summary = self.reconcile_once().await;
                    if summary.attempted > 0 {
                        info!(
                            attempted = summary.attempted,
                            updated = summary.updated,
                            forced = summary.forced,
                            errors = summary.errors,
                            "Reconciliation pass complete"
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Reconciliation scheduler stopped");
    }

    /// Run a single reconciliation pass
    pub async fn reconcile_once(&self) -> PassSummary {
        let hashes = self.tracker.pending().snapshot();
        if hashes.is_empty() {
            debug!("No pending transactions");
            return PassSummary::default();
        }

        let attempted = hashes.len();
        let updated = AtomicUsize::new(0);
        let forced = AtomicUsize::new(0);
        let errors = AtomicUsize::new(0);

        futures::stream::iter(hashes)
            .for_each_concurrent(self.config.worker_concurrency, |tx_hash| {
                let (updated, forced, errors) = (&updated, &forced, &errors);
                async move {
                    match self.tracker.refresh(&tx_hash).await {
                        Ok(RefreshOutcome::Updated(_)) => {
                            updated.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            errors.fetch_add(1, Ordering::Relaxed);
                            error!(tx_hash = %tx_hash, error = %e, "Refresh failed");
                        }
                    }

                    if self.enforce_retry_bound(&tx_hash).await {
                        forced.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
            .await;

        PassSummary {
            attempted,
            updated: updated.into_inner(),
            forced: forced.into_inner(),
            errors: errors.into_inner(),
        }
    }

    /// Count this tick for a still-pending hash; reject it past the bound
    async fn enforce_retry_bound(&self, tx_hash: &str) -> bool {
        let Some(retries) = self.tracker.pending().bump_retry(tx_hash) else {
            return false;
        };
        if retries <= self.config.max_retries {
            return false;
        }
        let Some(_guard) = self.tracker.pending().claim(tx_hash) else {
            debug!(tx_hash = %tx_hash, retries, "Refresh in flight, deferring rejection");
            return false;
        };

        warn!(tx_hash = %tx_hash, retries, "Retry bound exceeded, rejecting");
        match self
            .tracker
            .force_terminal(tx_hash, TxStatus::Rejected, RETRIES_EXHAUSTED_REASON)
            .await
        {
            Ok(update) => {
                self.tracker.pending().remove(tx_hash);
                update.is_some()
            }
            Err(e) => {
                error!(tx_hash = %tx_hash, error = %e, "Failed to force rejection");
                false
            }
        }
    }
}
