//! Finality State Definitions
//!
//! Status names match the ledger's own vocabulary and are stored verbatim
//! in PostgreSQL.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Transaction finality states
///
/// ```text
/// PENDING → RECEIVED → ACCEPTED_ON_L2 → ACCEPTED_ON_L1 | COMPLETED
///     └──────────┴────────────┴──→ FAILED | REJECTED | REVERTED
/// ```
///
/// Terminal states: ACCEPTED_ON_L1, COMPLETED, FAILED, REJECTED, REVERTED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    /// Submitted, not yet seen by the sequencer
    Pending,
    /// Seen by the sequencer, not yet in a block
    Received,
    /// Included in an L2 block (reversible)
    #[serde(rename = "ACCEPTED_ON_L2")]
    AcceptedOnL2,
    /// Terminal: settled on L1
    #[serde(rename = "ACCEPTED_ON_L1")]
    AcceptedOnL1,
    /// Terminal: inclusion evidence without explicit failure
    Completed,
    /// Terminal: ledger reported a failure reason
    Failed,
    /// Terminal: rejected by the ledger, or given up on locally
    Rejected,
    /// Terminal: included but execution reverted
    Reverted,
}

impl TxStatus {
    pub const ALL: [TxStatus; 8] = [
        TxStatus::Pending,
        TxStatus::Received,
        TxStatus::AcceptedOnL2,
        TxStatus::AcceptedOnL1,
        TxStatus::Completed,
        TxStatus::Failed,
        TxStatus::Rejected,
        TxStatus::Reverted,
    ];

    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TxStatus::AcceptedOnL1
                | TxStatus::Completed
                | TxStatus::Failed
                | TxStatus::Rejected
                | TxStatus::Reverted
        )
    }

    /// Terminal success (callers treat either tier as "done")
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, TxStatus::AcceptedOnL1 | TxStatus::Completed)
    }

    /// Ordering used to refuse regressions.
    ///
    /// terminal (3) > ACCEPTED_ON_L2 (2) > RECEIVED (1) > PENDING (0)
    #[inline]
    pub fn rank(&self) -> u8 {
        match self {
            TxStatus::Pending => 0,
            TxStatus::Received => 1,
            TxStatus::AcceptedOnL2 => 2,
            _ => 3,
        }
    }

    /// Whether moving from `self` to `next` is a forward transition
    #[inline]
    pub fn can_advance_to(&self, next: TxStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    /// Get the stored status name
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "PENDING",
            TxStatus::Received => "RECEIVED",
            TxStatus::AcceptedOnL2 => "ACCEPTED_ON_L2",
            TxStatus::AcceptedOnL1 => "ACCEPTED_ON_L1",
            TxStatus::Completed => "COMPLETED",
            TxStatus::Failed => "FAILED",
            TxStatus::Rejected => "REJECTED",
            TxStatus::Reverted => "REVERTED",
        }
    }

    /// Names of every terminal status, for SQL `IN (...)` filters
    pub fn terminal_names() -> Vec<&'static str> {
        Self::ALL
            .iter()
            .filter(|s| s.is_terminal())
            .map(|s| s.as_str())
            .collect()
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TxStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown transaction status: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TxStatus::AcceptedOnL1.is_terminal());
        assert!(TxStatus::Completed.is_terminal());
        assert!(TxStatus::Failed.is_terminal());
        assert!(TxStatus::Rejected.is_terminal());
        assert!(TxStatus::Reverted.is_terminal());

        assert!(!TxStatus::Pending.is_terminal());
        assert!(!TxStatus::Received.is_terminal());
        assert!(!TxStatus::AcceptedOnL2.is_terminal());
    }

    #[test]
    fn test_rank_order() {
        assert!(TxStatus::Pending.rank() < TxStatus::Received.rank());
        assert!(TxStatus::Received.rank() < TxStatus::AcceptedOnL2.rank());
        assert!(TxStatus::AcceptedOnL2.rank() < TxStatus::AcceptedOnL1.rank());
        assert_eq!(TxStatus::AcceptedOnL1.rank(), TxStatus::Rejected.rank());
    }

    #[test]
    fn test_terminal_never_advances() {
        for from in TxStatus::ALL.iter().filter(|s| s.is_terminal()) {
            for to in TxStatus::ALL {
                assert!(!from.can_advance_to(to), "{} -> {}", from, to);
            }
        }
        assert!(TxStatus::AcceptedOnL2.can_advance_to(TxStatus::Reverted));
        assert!(!TxStatus::AcceptedOnL2.can_advance_to(TxStatus::Received));
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("accepted_on_l2".parse::<TxStatus>(), Ok(TxStatus::AcceptedOnL2));
        assert_eq!(TxStatus::AcceptedOnL1.to_string(), "ACCEPTED_ON_L1");
        assert!("SETTLED".parse::<TxStatus>().is_err());
    }

    #[test]
    fn test_serde_names_match_display() {
        for status in TxStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }
}
