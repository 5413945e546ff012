//! Transfer Tracker - lifecycle tracking for Starknet value transfers
//!
//! Submits transfers to an eventually-consistent ledger and follows each
//! one from submission to an immutable outcome.
//!
//! # Modules
//!
//! - [`transfer`] - Intent validation, call building, submission
//! - [`tracker`] - Finality state machine, reconciliation, recovery, events
//! - [`ledger`] - Ledger boundary (JSON-RPC client, simulated ledger)
//! - [`gateway`] - REST surface and OpenAPI docs
//! - [`db`] - PostgreSQL connection pool
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod db;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod tracker;
pub mod transfer;

// Convenient re-exports at crate root
pub use config::AppConfig;
pub use tracker::{StatusTracker, TransactionRecord, TxStatus};
pub use transfer::{TransferError, TransferInitiator, TransferIntent};
