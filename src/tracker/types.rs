//! Transaction Record Types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::state::TxStatus;

/// Token standard of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenType {
    /// Chain fee token (ETH on Starknet)
    Native,
    /// ERC-20 style token
    Fungible,
    /// ERC-721 style token
    NonFungibleUnique,
    /// ERC-1155 style token
    NonFungibleSemiFungible,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Native => "NATIVE",
            TokenType::Fungible => "FUNGIBLE",
            TokenType::NonFungibleUnique => "NON_FUNGIBLE_UNIQUE",
            TokenType::NonFungibleSemiFungible => "NON_FUNGIBLE_SEMI_FUNGIBLE",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NATIVE" => Ok(TokenType::Native),
            "FUNGIBLE" => Ok(TokenType::Fungible),
            "NON_FUNGIBLE_UNIQUE" => Ok(TokenType::NonFungibleUnique),
            "NON_FUNGIBLE_SEMI_FUNGIBLE" => Ok(TokenType::NonFungibleSemiFungible),
            _ => Err(format!("Unknown token type: {}", s)),
        }
    }
}

/// Persistent record of one submitted transfer.
///
/// Created PENDING by the initiator; only the status tracker writes the
/// status, inclusion, receipt, error and completion fields afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: Uuid,
    pub sender_id: String,
    pub recipient_id: String,
    pub conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub token_type: TokenType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    /// Decimal integer string, never parsed into a float
    #[schema(example = "1000000000000000000")]
    pub amount: String,
    pub tx_hash: String,
    pub status: TxStatus,
    pub status_updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub receipt: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Fields of a record known at submission time
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub sender_id: String,
    pub recipient_id: String,
    pub conversation_id: String,
    pub message_id: Option<String>,
    pub token_type: TokenType,
    pub token_address: Option<String>,
    pub token_id: Option<String>,
    pub amount: String,
    pub tx_hash: String,
    pub metadata: Option<serde_json::Value>,
}

impl TransactionRecord {
    /// Create a fresh PENDING record
    pub fn pending(tx: NewTransaction, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id: tx.sender_id,
            recipient_id: tx.recipient_id,
            conversation_id: tx.conversation_id,
            message_id: tx.message_id,
            token_type: tx.token_type,
            token_address: tx.token_address,
            token_id: tx.token_id,
            amount: tx.amount,
            tx_hash: tx.tx_hash,
            status: TxStatus::Pending,
            status_updated_at: now,
            block_number: None,
            block_hash: None,
            receipt: None,
            error: None,
            completed_at: None,
            metadata: tx.metadata,
            created_at: now,
        }
    }

    /// Apply a committed status update in memory.
    ///
    /// `completed_at` is only ever set on the first terminal entry; inclusion
    /// fields keep their previous value when the update carries none.
    pub fn apply(&mut self, update: &StatusUpdate) {
        self.status = update.status;
        self.status_updated_at = update.timestamp;
        if update.block_number.is_some() {
            self.block_number = update.block_number;
        }
        if update.block_hash.is_some() {
            self.block_hash = update.block_hash.clone();
        }
        if update.receipt.is_some() {
            self.receipt = update.receipt.clone();
        }
        if update.error.is_some() {
            self.error = update.error.clone();
        }
        if update.status.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(update.timestamp);
        }
    }
}

/// Status change payload, persisted and published as
/// `transaction.status.updated`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub tx_hash: String,
    pub status: TxStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub receipt: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl StatusUpdate {
    /// Locally synthesised terminal state carrying only a reason
    pub fn forced(tx_hash: &str, status: TxStatus, reason: &str, now: DateTime<Utc>) -> Self {
        Self {
            tx_hash: tx_hash.to_string(),
            status,
            block_number: None,
            block_hash: None,
            receipt: None,
            error: Some(reason.to_string()),
            timestamp: now,
        }
    }
}

/// Offset pagination for listing reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    /// Clamp user input to sane bounds
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of records, newest first
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_tx() -> NewTransaction {
        NewTransaction {
            sender_id: "u1".into(),
            recipient_id: "u2".into(),
            conversation_id: "c1".into(),
            message_id: None,
            token_type: TokenType::Native,
            token_address: None,
            token_id: None,
            amount: "1000000000000000000".into(),
            tx_hash: "0xabc".into(),
            metadata: None,
        }
    }

    #[test]
    fn test_token_type_parse() {
        assert_eq!("native".parse::<TokenType>(), Ok(TokenType::Native));
        assert_eq!(
            "NON_FUNGIBLE_SEMI_FUNGIBLE".parse::<TokenType>(),
            Ok(TokenType::NonFungibleSemiFungible)
        );
        assert!("ERC20".parse::<TokenType>().is_err());
    }

    #[test]
    fn test_completed_at_set_once() {
        let t0 = Utc::now();
        let mut record = TransactionRecord::pending(new_tx(), t0);
        assert!(record.completed_at.is_none());

        let l2 = StatusUpdate {
            tx_hash: "0xabc".into(),
            status: TxStatus::AcceptedOnL2,
            block_number: Some(7),
            block_hash: Some("0xb7".into()),
            receipt: None,
            error: None,
            timestamp: t0,
        };
        record.apply(&l2);
        assert!(record.completed_at.is_none());

        let t1 = t0 + chrono::Duration::seconds(30);
        let l1 = StatusUpdate {
            status: TxStatus::AcceptedOnL1,
            block_number: None,
            block_hash: None,
            timestamp: t1,
            ..l2
        };
        record.apply(&l1);
        assert_eq!(record.completed_at, Some(t1));
        // Inclusion data survives an update that carries none
        assert_eq!(record.block_number, Some(7));

        let t2 = t1 + chrono::Duration::seconds(30);
        record.apply(&StatusUpdate::forced("0xabc", TxStatus::Rejected, "late", t2));
        assert_eq!(record.completed_at, Some(t1));
    }

    #[test]
    fn test_record_json_keeps_amount_string() {
        let mut tx = new_tx();
        tx.amount = "115792089237316195423570985008687907853269984665640564039457584007913129639935".into();
        let record = TransactionRecord::pending(tx.clone(), Utc::now());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["amount"], serde_json::Value::String(tx.amount.clone()));
        assert_eq!(json["txHash"], "0xabc");
        assert_eq!(json["tokenType"], "NATIVE");

        let back: TransactionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.amount, tx.amount);
    }

    #[test]
    fn test_page_request_clamps() {
        let page = PageRequest::new(Some(0), Some(1000));
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, PageRequest::MAX_LIMIT);
        assert_eq!(PageRequest::new(Some(3), Some(10)).offset(), 20);
    }
}
