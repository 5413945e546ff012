//! Transaction Store
//!
//! Durable record of every submitted transfer. Status writes are CAS:
//! `apply_status` only succeeds while the stored status still equals the
//! caller's expectation, so concurrent writers cannot regress a record.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StoreError;
use super::state::TxStatus;
use super::types::{Page, PageRequest, StatusUpdate, TransactionRecord};

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Get store name for logging
    fn name(&self) -> &'static str;

    /// Insert a new record. Fails with [`StoreError::Duplicate`] on a known hash.
    async fn insert(&self, record: &TransactionRecord) -> Result<(), StoreError>;

    async fn get_by_hash(&self, tx_hash: &str) -> Result<Option<TransactionRecord>, StoreError>;

    /// Atomic CAS status write.
    ///
    /// Returns true if the update was committed, false if the stored status
    /// no longer equals `expected` (another writer got there first).
    async fn apply_status(
        &self,
        expected: TxStatus,
        update: &StatusUpdate,
    ) -> Result<bool, StoreError>;

    /// Hashes of non-terminal records created after `created_after`
    async fn find_in_flight(&self, created_after: DateTime<Utc>)
    -> Result<Vec<String>, StoreError>;

    /// Records where the user is sender or recipient, newest first
    async fn list_by_user(
        &self,
        user_id: &str,
        page: PageRequest,
    ) -> Result<Page<TransactionRecord>, StoreError>;

    /// Records of a conversation, newest first
    async fn list_by_conversation(
        &self,
        conversation_id: &str,
        page: PageRequest,
    ) -> Result<Page<TransactionRecord>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// In-memory store for dev mode and tests
#[derive(Default)]
pub struct MemoryTransactionStore {
    records: RwLock<HashMap<String, TransactionRecord>>,
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, TransactionRecord>> {
        self.records.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, TransactionRecord>> {
        self.records.write().unwrap_or_else(|p| p.into_inner())
    }
}

fn paginate(mut records: Vec<TransactionRecord>, page: PageRequest) -> Page<TransactionRecord> {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    let total = records.len() as u64;
    let items = records
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect();

    Page {
        items,
        page: page.page,
        limit: page.limit,
        total,
    }
}

#[async_trait]
impl TransactionStore for MemoryTransactionStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, record: &TransactionRecord) -> Result<(), StoreError> {
        let mut records = self.write();
        if records.contains_key(&record.tx_hash) {
            return Err(StoreError::Duplicate(record.tx_hash.clone()));
        }
        records.insert(record.tx_hash.clone(), record.clone());
        Ok(())
    }

    async fn get_by_hash(&self, tx_hash: &str) -> Result<Option<TransactionRecord>, StoreError> {
        Ok(self.read().get(tx_hash).cloned())
    }

    async fn apply_status(
        &self,
        expected: TxStatus,
        update: &StatusUpdate,
    ) -> Result<bool, StoreError> {
        let mut records = self.write();
        match records.get_mut(&update.tx_hash) {
            Some(record) if record.status == expected => {
                record.apply(update);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_in_flight(
        &self,
        created_after: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let mut in_flight: Vec<(DateTime<Utc>, String)> = self
            .read()
            .values()
            .filter(|r| !r.status.is_terminal() && r.created_at > created_after)
            .map(|r| (r.created_at, r.tx_hash.clone()))
            .collect();
        in_flight.sort();
        Ok(in_flight.into_iter().map(|(_, hash)| hash).collect())
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        page: PageRequest,
    ) -> Result<Page<TransactionRecord>, StoreError> {
        let matching: Vec<TransactionRecord> = self
            .read()
            .values()
            .filter(|r| r.sender_id == user_id || r.recipient_id == user_id)
            .cloned()
            .collect();
        Ok(paginate(matching, page))
    }

    async fn list_by_conversation(
        &self,
        conversation_id: &str,
        page: PageRequest,
    ) -> Result<Page<TransactionRecord>, StoreError> {
        let matching: Vec<TransactionRecord> = self
            .read()
            .values()
            .filter(|r| r.conversation_id == conversation_id)
            .cloned()
            .collect();
        Ok(paginate(matching, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::types::{NewTransaction, TokenType};

    fn record(hash: &str, sender: &str, recipient: &str, conversation: &str) -> TransactionRecord {
        TransactionRecord::pending(
            NewTransaction {
                sender_id: sender.into(),
                recipient_id: recipient.into(),
                conversation_id: conversation.into(),
                message_id: None,
                token_type: TokenType::Native,
                token_address: None,
                token_id: None,
                amount: "1".into(),
                tx_hash: hash.into(),
                metadata: None,
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_hash() {
        let store = MemoryTransactionStore::new();
        store.insert(&record("0x1", "a", "b", "c")).await.unwrap();
        let err = store.insert(&record("0x1", "a", "b", "c")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_apply_status_is_cas() {
        let store = MemoryTransactionStore::new();
        store.insert(&record("0x1", "a", "b", "c")).await.unwrap();

        let update = StatusUpdate::forced("0x1", TxStatus::Rejected, "gone", Utc::now());
        assert!(!store.apply_status(TxStatus::Received, &update).await.unwrap());
        assert!(store.apply_status(TxStatus::Pending, &update).await.unwrap());
        // Second writer with the stale expectation loses
        assert!(!store.apply_status(TxStatus::Pending, &update).await.unwrap());

        let stored = store.get_by_hash("0x1").await.unwrap().unwrap();
        assert_eq!(stored.status, TxStatus::Rejected);
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_in_flight_excludes_terminal_and_old() {
        let store = MemoryTransactionStore::new();
        store.insert(&record("0x1", "a", "b", "c")).await.unwrap();
        store.insert(&record("0x2", "a", "b", "c")).await.unwrap();
        let mut old = record("0x3", "a", "b", "c");
        old.created_at = Utc::now() - chrono::Duration::days(30);
        store.insert(&old).await.unwrap();

        let update = StatusUpdate::forced("0x2", TxStatus::Failed, "x", Utc::now());
        store.apply_status(TxStatus::Pending, &update).await.unwrap();

        let hashes = store
            .find_in_flight(Utc::now() - chrono::Duration::days(7))
            .await
            .unwrap();
        assert_eq!(hashes, vec!["0x1".to_string()]);
    }

    #[tokio::test]
    async fn test_list_by_user_matches_both_sides_and_pages() {
        let store = MemoryTransactionStore::new();
        let base = Utc::now();
        for (i, (sender, recipient)) in [("u1", "u2"), ("u2", "u1"), ("u3", "u4"), ("u1", "u3")]
            .into_iter()
            .enumerate()
        {
            let mut r = record(&format!("0x{}", i), sender, recipient, "c");
            r.created_at = base + chrono::Duration::seconds(i as i64);
            store.insert(&r).await.unwrap();
        }

        let page = store
            .list_by_user("u1", PageRequest::new(Some(1), Some(2)))
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        let hashes: Vec<_> = page.items.iter().map(|r| r.tx_hash.as_str()).collect();
        assert_eq!(hashes, vec!["0x3", "0x1"]);

        let page = store
            .list_by_user("u1", PageRequest::new(Some(2), Some(2)))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].tx_hash, "0x0");
    }

    #[tokio::test]
    async fn test_list_by_conversation() {
        let store = MemoryTransactionStore::new();
        store.insert(&record("0x1", "a", "b", "c1")).await.unwrap();
        store.insert(&record("0x2", "a", "b", "c2")).await.unwrap();
        let page = store
            .list_by_conversation("c1", PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].tx_hash, "0x1");
        let empty = store
            .list_by_conversation("none", PageRequest::default())
            .await
            .unwrap();
        assert!(empty.items.is_empty());
    }
}
