//! Transaction Lifecycle Tracker
//!
//! Follows every submitted transfer from its ledger hash to an immutable
//! outcome, using only polling status reads.
//!
//! # State Machine
//!
//! ```text
//! PENDING → RECEIVED → ACCEPTED_ON_L2 → ACCEPTED_ON_L1 | COMPLETED
//!    ↓          ↓            ↓
//!    └──────────┴────────────┴──→ FAILED | REJECTED | REVERTED
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Monotone**: a record only moves to a strictly higher rank; terminal is final
//! 2. **Single Writer**: only [`StatusTracker`] writes status after creation
//! 3. **CAS Writes**: status writes compare against the status read at refresh start
//! 4. **Bounded**: a hash leaves the pending set within `max_retries` ticks
//! 5. **One In Flight**: at most one refresh per hash at any moment

pub mod db;
pub mod error;
pub mod events;
pub mod mapper;
pub mod pending;
pub mod recovery;
pub mod scheduler;
pub mod state;
pub mod status;
pub mod store;
pub mod types;


pub use db::PgTransactionStore;
pub use error::{StoreError, TrackerError};
pub use events::{EventBus, TransferEvent};
pub use mapper::{MappedStatus, StatusMapper};
pub use pending::PendingSet;
pub use recovery::{RecoveryConfig, RecoveryWorker};
pub use scheduler::{ReconciliationScheduler, SchedulerConfig};
pub use state::TxStatus;
pub use status::{RefreshOutcome, StatusTracker};
pub use store::{MemoryTransactionStore, TransactionStore};
pub use types::{NewTransaction, Page, PageRequest, StatusUpdate, TokenType, TransactionRecord};
