//! Transfer Initiation
//!
//! Validates a transfer intent, builds the token-specific ledger call,
//! submits it and hands the resulting hash to the tracker.

pub mod call;
pub mod error;
pub mod initiator;

pub use error::TransferError;
pub use initiator::{TransferInitiator, TransferIntent, TransferReceipt};
