//! Status Mapper
//!
//! Translates one raw ledger payload into one finality state. Payloads can
//! carry several signals that each look true, so the most authoritative
//! signal wins in a fixed order:
//!
//! 1. finality ACCEPTED_ON_L1          → ACCEPTED_ON_L1
//! 2. finality ACCEPTED_ON_L2          → ACCEPTED_ON_L2
//! 3. status RECEIVED/PENDING/REJECTED → same
//! 4. execution REVERTED               → REVERTED
//! 5. failure reason present           → FAILED
//! 6. block number + receipt           → COMPLETED
//! 7. anything else                    → PENDING
//!
//! The output is advisory: the tracker never applies a mapped state whose
//! rank does not exceed the stored one.

use crate::ledger::RawTxStatus;

use super::state::TxStatus;

/// Mapped status plus the inclusion data worth persisting
#[derive(Debug, Clone, PartialEq)]
pub struct MappedStatus {
    pub status: TxStatus,
    pub block_number: Option<u64>,
    pub block_hash: Option<String>,
    pub receipt: Option<serde_json::Value>,
    pub error: Option<String>,
}

pub struct StatusMapper;

impl StatusMapper {
    pub fn map(raw: &RawTxStatus) -> MappedStatus {
        let status = Self::map_status(raw);

        let error = match status {
            TxStatus::Failed => raw.failure_reason.as_ref().map(|f| f.message.clone()),
            TxStatus::Reverted => raw
                .revert_reason
                .clone()
                .or_else(|| raw.failure_reason.as_ref().map(|f| f.message.clone())),
            _ => None,
        };

        MappedStatus {
            status,
            block_number: raw.block_number,
            block_hash: raw.block_hash.clone(),
            receipt: raw.receipt.clone(),
            error,
        }
    }

    fn map_status(raw: &RawTxStatus) -> TxStatus {
        let finality = raw.finality_status.as_deref();
        if is(finality, "ACCEPTED_ON_L1") {
            return TxStatus::AcceptedOnL1;
        }
        if is(finality, "ACCEPTED_ON_L2") {
            return TxStatus::AcceptedOnL2;
        }

        let status = raw.status.as_deref();
        if is(status, "RECEIVED") {
            return TxStatus::Received;
        }
        if is(status, "PENDING") {
            return TxStatus::Pending;
        }
        if is(status, "REJECTED") {
            return TxStatus::Rejected;
        }

        if is(raw.execution_status.as_deref(), "REVERTED") {
            return TxStatus::Reverted;
        }

        if raw.failure_reason.is_some() {
            return TxStatus::Failed;
        }

        // Provisional: inclusion evidence without an explicit failure is
        // read as success. Correctness depends on the ledger's payload shape.
        if raw.block_number.is_some() && raw.receipt.is_some() {
            return TxStatus::Completed;
        }

        TxStatus::Pending
    }
}

fn is(field: Option<&str>, expected: &str) -> bool {
    field.is_some_and(|value| value.trim().eq_ignore_ascii_case(expected))
}
