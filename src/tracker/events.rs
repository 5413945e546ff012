//! Transfer Event Bus
//!
//! Fan-out of transfer events to live subscribers. Each subscriber owns an
//! unbounded channel; closed subscribers are pruned on the next publish.
//! Delivery is at-least-once to subscribers alive at publish time, with
//! per-hash order following commit order.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;

use super::types::{StatusUpdate, TransactionRecord};

pub type EventSender = mpsc::UnboundedSender<TransferEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<TransferEvent>;

/// Unique subscriber identifier
pub type SubscriberId = u64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum TransferEvent {
    #[serde(rename = "transaction.initiated")]
    #[serde(rename_all = "camelCase")]
    Initiated {
        record: TransactionRecord,
        explorer_url: String,
    },
    #[serde(rename = "transaction.status.updated")]
    StatusUpdated(StatusUpdate),
}

impl TransferEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TransferEvent::Initiated { .. } => "transaction.initiated",
            TransferEvent::StatusUpdated(_) => "transaction.status.updated",
        }
    }

    pub fn tx_hash(&self) -> &str {
        match self {
            TransferEvent::Initiated { record, .. } => &record.tx_hash,
            TransferEvent::StatusUpdated(update) => &update.tx_hash,
        }
    }
}

pub struct EventBus {
    subscribers: DashMap<SubscriberId, EventSender>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self) -> (SubscriberId, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(id, tx);
        tracing::debug!(subscriber_id = id, "Event subscriber added");
        (id, rx)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.remove(&id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver to every live subscriber. Returns the number reached.
    pub fn publish(&self, event: TransferEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in self.subscribers.iter() {
            if entry.value().send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                closed.push(*entry.key());
            }
        }

        for id in closed {
            self.subscribers.remove(&id);
            tracing::debug!(subscriber_id = id, "Pruned closed event subscriber");
        }

        tracing::debug!(
            event = event.name(),
            tx_hash = %event.tx_hash(),
            delivered,
            "Event published"
        );
        delivered
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::state::TxStatus;
    use chrono::Utc;

    fn update() -> TransferEvent {
        TransferEvent::StatusUpdated(StatusUpdate::forced(
            "0xabc",
            TxStatus::Rejected,
            "nope",
            Utc::now(),
        ))
    }

    #[tokio::test]
    async fn test_fan_out() {
        let bus = EventBus::new();
        let (_, mut a) = bus.subscribe();
        let (_, mut b) = bus.subscribe();

        assert_eq!(bus.publish(update()), 2);
        assert_eq!(a.recv().await.unwrap().name(), "transaction.status.updated");
        assert_eq!(b.recv().await.unwrap().tx_hash(), "0xabc");
    }

    #[test]
    fn test_closed_subscriber_pruned() {
        let bus = EventBus::new();
        let (_, rx) = bus.subscribe();
        let (_keep_id, _keep) = bus.subscribe();
        drop(rx);

        assert_eq!(bus.publish(update()), 1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_closes_receiver() {
        let bus = EventBus::new();
        let (id, mut rx) = bus.subscribe();
        let (_other_id, _other) = bus.subscribe();

        bus.unsubscribe(id);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(bus.publish(update()), 1);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(update()).unwrap();
        assert_eq!(json["event"], "transaction.status.updated");
        assert_eq!(json["data"]["txHash"], "0xabc");
        assert_eq!(json["data"]["status"], "REJECTED");
        assert_eq!(json["data"]["error"], "nope");
        assert!(json["data"].get("blockNumber").is_none());
    }
}
