//! Pending Set
//!
//! In-memory registry of hashes awaiting a terminal state, with per-hash
//! counters. Membership is not durable; the recovery worker rebuilds it
//! from the store after a restart.
//!
//! Claims are separate from membership: a hash being refreshed is marked
//! in-flight so the scheduler and the post-submit check never issue two
//! concurrent lookups for it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};

/// Per-hash bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingEntry {
    /// Reconciliation ticks spent without reaching a terminal state
    pub retries: u32,
    /// Consecutive failed lookups
    pub lookup_failures: u32,
    /// Set generation at insertion; 0 for entries restored by a scan
    pub tracked_at: u64,
}

#[derive(Default)]
pub struct PendingSet {
    entries: DashMap<String, PendingEntry>,
    in_flight: Arc<DashSet<String>>,
    generation: AtomicU64,
}

/// Releases an in-flight claim on drop
#[derive(Debug)]
pub struct InFlightGuard {
    tx_hash: String,
    in_flight: Arc<DashSet<String>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.tx_hash);
    }
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hash. Returns false if it was already present.
    pub fn insert(&self, tx_hash: &str) -> bool {
        match self.entries.entry(tx_hash.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(PendingEntry {
                    tracked_at: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
                    ..PendingEntry::default()
                });
                true
            }
        }
    }

    pub fn remove(&self, tx_hash: &str) -> bool {
        self.entries.remove(tx_hash).is_some()
    }

    pub fn contains(&self, tx_hash: &str) -> bool {
        self.entries.contains_key(tx_hash)
    }

    pub fn get(&self, tx_hash: &str) -> Option<PendingEntry> {
        self.entries.get(tx_hash).map(|e| *e.value())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Point-in-time copy of the member hashes
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    /// Count one more tick for a member. Returns the new count.
    pub fn bump_retry(&self, tx_hash: &str) -> Option<u32> {
        self.entries.get_mut(tx_hash).map(|mut e| {
            e.retries += 1;
            e.retries
        })
    }

    /// Count one more not-found lookup. Returns the new count.
    pub fn record_lookup_failure(&self, tx_hash: &str) -> Option<u32> {
        self.entries.get_mut(tx_hash).map(|mut e| {
            e.lookup_failures += 1;
            e.lookup_failures
        })
    }

    pub fn reset_lookup_failures(&self, tx_hash: &str) {
        if let Some(mut e) = self.entries.get_mut(tx_hash) {
            e.lookup_failures = 0;
        }
    }

    /// Current insertion generation. Pass it to [`Self::replace_all`] to
    /// keep hashes inserted after this point.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Repopulate from a store scan. Entries inserted after `since` survive
    /// with their counters; every other member is replaced by `hashes` with
    /// fresh counters. Returns the new size.
    pub fn replace_all(&self, hashes: Vec<String>, since: u64) -> usize {
        self.entries.retain(|_, entry| entry.tracked_at > since);
        for hash in hashes {
            self.entries.entry(hash).or_default();
        }
        self.entries.len()
    }

    /// Mark a hash in-flight. None if another task already holds it.
    pub fn claim(&self, tx_hash: &str) -> Option<InFlightGuard> {
        if self.in_flight.insert(tx_hash.to_string()) {
            Some(InFlightGuard {
                tx_hash: tx_hash.to_string(),
                in_flight: Arc::clone(&self.in_flight),
            })
        } else {
            None
        }
    }

    pub fn is_in_flight(&self, tx_hash: &str) -> bool {
        self.in_flight.contains(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_idempotent() {
        let set = PendingSet::new();
        assert!(set.insert("0x1"));
        set.bump_retry("0x1");
        assert!(!set.insert("0x1"));
        assert_eq!(set.get("0x1").unwrap().retries, 1);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_counters() {
        let set = PendingSet::new();
        set.insert("0x1");
        assert_eq!(set.record_lookup_failure("0x1"), Some(1));
        assert_eq!(set.record_lookup_failure("0x1"), Some(2));
        set.reset_lookup_failures("0x1");
        assert_eq!(set.get("0x1").unwrap().lookup_failures, 0);
        assert_eq!(set.bump_retry("0x1"), Some(1));
        assert_eq!(set.bump_retry("0xmissing"), None);
    }

    #[test]
    fn test_claim_is_exclusive_and_released_on_drop() {
        let set = PendingSet::new();
        let guard = set.claim("0x1").unwrap();
        assert!(set.claim("0x1").is_none());
        assert!(set.is_in_flight("0x1"));
        drop(guard);
        assert!(!set.is_in_flight("0x1"));
        assert!(set.claim("0x1").is_some());
    }

    #[test]
    fn test_replace_all_resets_counters() {
        let set = PendingSet::new();
        set.insert("0x1");
        set.insert("0x2");
        set.bump_retry("0x1");

        let since = set.generation();
        let size = set.replace_all(vec!["0x1".into(), "0x3".into(), "0x3".into()], since);
        assert_eq!(size, 2);
        assert!(!set.contains("0x2"));
        assert_eq!(set.get("0x1").unwrap().retries, 0);

        let mut hashes = set.snapshot();
        hashes.sort();
        assert_eq!(hashes, vec!["0x1".to_string(), "0x3".to_string()]);
    }

    #[test]
    fn test_replace_all_keeps_hashes_tracked_since_generation() {
        let set = PendingSet::new();
        set.insert("0xold");
        let since = set.generation();
        set.insert("0xnew");
        set.record_lookup_failure("0xnew");

        let size = set.replace_all(vec!["0xscanned".into()], since);
        assert_eq!(size, 2);
        assert!(!set.contains("0xold"));
        assert!(set.contains("0xscanned"));
        assert_eq!(set.get("0xnew").unwrap().lookup_failures, 1);

        // A later scan that misses it drops it again
        let size = set.replace_all(vec!["0xscanned".into()], set.generation());
        assert_eq!(size, 1);
        assert!(!set.contains("0xnew"));
    }
}
