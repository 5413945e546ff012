//! Transfer Tracker service
//!
//! ```text
//! ┌──────────┐    ┌────────────┐    ┌──────────┐    ┌───────────┐
//! │ Gateway  │───▶│ Initiator  │───▶│  Ledger  │    │ EventBus  │
//! │ (axum)   │    │ (submit)   │    └────▲─────┘    └─────▲─────┘
//! └──────────┘    └─────┬──────┘         │                │
//!                       ▼                │                │
//!                 ┌────────────┐    ┌────┴──────┐         │
//!                 │ PendingSet │◀──▶│ Scheduler │──▶ StatusTracker
//!                 └─────▲──────┘    └───────────┘
//!                       │
//!                 ┌─────┴──────┐
//!                 │  Recovery  │ (rebuilds from the store)
//!                 └────────────┘
//! ```
//!
//! Usage: `transfer_tracker [--env dev] [--port 8080]` (or `APP_ENV=prod`)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};

use transfer_tracker::config::{AppConfig, LedgerConfig};
use transfer_tracker::db::Database;
use transfer_tracker::gateway::{self, AppState};
use transfer_tracker::ledger::{LedgerClient, StarknetRpcClient};
use transfer_tracker::tracker::{
    EventBus, MemoryTransactionStore, PendingSet, PgTransactionStore, ReconciliationScheduler,
    RecoveryConfig, RecoveryWorker, SchedulerConfig, StatusTracker, TransactionStore,
};
use transfer_tracker::transfer::TransferInitiator;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    std::env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string())
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn TransactionStore>> {
    match &config.postgres_url {
        Some(url) => {
            let db = Database::connect(url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            let store = PgTransactionStore::new(db.pool().clone());
            store
                .init_schema()
                .await
                .context("Failed to initialise transactions schema")?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("postgres_url not set: records are kept in memory and lost on restart");
            Ok(Arc::new(MemoryTransactionStore::new()))
        }
    }
}

fn build_ledger(config: &LedgerConfig) -> anyhow::Result<Arc<dyn LedgerClient>> {
    match &config.rpc_url {
        Some(_) => Ok(Arc::new(StarknetRpcClient::from_config(config)?)),
        #[cfg(feature = "mock-ledger")]
        None => {
            warn!("ledger.rpc_url not set: using the simulated ledger");
            Ok(Arc::new(transfer_tracker::ledger::SimulatedLedger::new()))
        }
        #[cfg(not(feature = "mock-ledger"))]
        None => anyhow::bail!("ledger.rpc_url is required when built without mock-ledger"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut app_config = AppConfig::load(&env).context("Failed to load configuration")?;
    if let Some(port) = get_port_override() {
        app_config.gateway.port = port;
    }
    let _log_guard = transfer_tracker::logging::init_logging(&app_config);

    info!(env = %env, version = env!("CARGO_PKG_VERSION"), git = env!("GIT_HASH"), "Starting transfer tracker");

    let store = build_store(&app_config).await?;
    let ledger = build_ledger(&app_config.ledger)?;
    info!(store = store.name(), ledger = ledger.name(), "Backends ready");

    let bus = Arc::new(EventBus::new());
    let (event_log_id, mut events) = bus.subscribe();
    let event_log = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!(event = event.name(), tx_hash = %event.tx_hash(), "Transfer event");
        }
    });

    let pending = Arc::new(PendingSet::new());
    let tracker = Arc::new(StatusTracker::new(
        store.clone(),
        ledger.clone(),
        pending.clone(),
        bus.clone(),
        app_config.tracker.lookup_failure_threshold,
    ));

    let initial_check_delay = (app_config.tracker.initial_check_delay_ms > 0)
        .then(|| Duration::from_millis(app_config.tracker.initial_check_delay_ms));
    let initiator = Arc::new(TransferInitiator::new(
        ledger.clone(),
        store.clone(),
        tracker.clone(),
        bus.clone(),
        app_config.ledger.clone(),
        initial_check_delay,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let recovery = RecoveryWorker::new(
        store.clone(),
        pending.clone(),
        RecoveryConfig::from(&app_config.tracker),
    );
    let recovery_handle = tokio::spawn({
        let shutdown = shutdown_rx.clone();
        async move { recovery.run(shutdown).await }
    });

    let scheduler =
        ReconciliationScheduler::new(tracker.clone(), SchedulerConfig::from(&app_config.tracker));
    let scheduler_handle = tokio::spawn({
        let shutdown = shutdown_rx.clone();
        async move { scheduler.run(shutdown).await }
    });

    tokio::spawn({
        let shutdown_tx = shutdown_tx.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Ctrl-C received, shutting down"),
                Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
            }
            let _ = shutdown_tx.send(true);
        }
    });

    let state = Arc::new(AppState::new(initiator, tracker, store, ledger.name()));
    let served = gateway::run_server(&app_config.gateway, state, shutdown_rx).await;

    // Stop the workers even when the server failed
    let _ = shutdown_tx.send(true);
    for handle in [recovery_handle, scheduler_handle] {
        if let Err(e) = handle.await {
            error!(error = %e, "Background worker panicked");
        }
    }
    bus.unsubscribe(event_log_id);
    if let Err(e) = event_log.await {
        error!(error = %e, "Event log task panicked");
    }
    info!(pending = pending.len(), "Transfer tracker stopped");
    served
}
