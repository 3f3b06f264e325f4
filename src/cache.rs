//! A bounded, time-expiring set of message fingerprints.
//!
//! The cache is the memory behind deduplication: a fingerprint is inserted
//! whenever a message is transmitted or overheard, and `is_seen` answers
//! whether the same alert was delivered within the TTL window. Entries are
//! expired lazily and the cache additionally enforces a hard entry count,
//! evicting the oldest-inserted entries first.

use std::time::Duration;

use indexmap::IndexMap;
use tokio::time::Instant;

/// Insertion-ordered set of fingerprints with per-entry TTL and a maximum
/// entry count.
///
/// Not internally synchronized; the router owns a single instance behind its
/// own lock.
#[derive(Debug)]
pub struct SeenCache {
    ttl: Duration,
    capacity: usize,
    entries: IndexMap<String, Instant>,
}

impl SeenCache {
    /// Creates an empty cache remembering entries for `ttl`, holding at most
    /// `capacity` entries.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self { ttl, capacity, entries: IndexMap::new() }
    }

    /// Records or refreshes `fingerprint` with the current time and runs the
    /// opportunistic eviction pass.
    ///
    /// A refreshed entry moves to the back of the insertion order, so it is
    /// the last candidate for capacity eviction.
    pub fn insert(&mut self, fingerprint: &str) {
        let now = Instant::now();
        self.entries.shift_remove(fingerprint);
        self.entries.insert(fingerprint.to_string(), now);
        self.evict(now);
    }

    /// Returns whether `fingerprint` was recorded within the TTL window.
    ///
    /// An entry older than the TTL is logically absent; it is also removed
    /// here (lazy expiry).
    pub fn is_seen(&mut self, fingerprint: &str) -> bool {
        let Some(inserted_at) = self.entries.get(fingerprint).copied() else {
            return false;
        };
        if Instant::now().duration_since(inserted_at) > self.ttl {
            self.entries.shift_remove(fingerprint);
            return false;
        }
        true
    }

    /// Number of physically present entries, including not-yet-evicted stale
    /// ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the cache holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Capacity eviction (oldest-inserted first), then a full expiry scan.
    /// Both are O(len); the workload is alerts, not firehose traffic.
    fn evict(&mut self, now: Instant) {
        while self.entries.len() > self.capacity {
            self.entries.shift_remove_index(0);
        }
        let ttl = self.ttl;
        self.entries.retain(|_, inserted_at| now.duration_since(*inserted_at) <= ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn entry_is_seen_within_ttl() {
        let mut cache = SeenCache::new(TTL, 10);
        cache.insert("storm warning");

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.is_seen("storm warning"));
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_after_ttl_without_explicit_removal() {
        let mut cache = SeenCache::new(TTL, 10);
        cache.insert("storm warning");

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!cache.is_seen("storm warning"));
        // Lazy expiry also removed the stale entry.
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_fingerprint_is_not_seen() {
        let mut cache = SeenCache::new(TTL, 10);
        assert!(!cache.is_seen("never inserted"));
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_evicts_oldest_inserted_first() {
        let mut cache = SeenCache::new(TTL, 3);
        cache.insert("a");
        cache.insert("b");
        cache.insert("c");
        cache.insert("d");

        assert_eq!(cache.len(), 3);
        assert!(!cache.is_seen("a"));
        assert!(cache.is_seen("b"));
        assert!(cache.is_seen("d"));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_moves_entry_to_back_of_eviction_order() {
        let mut cache = SeenCache::new(TTL, 2);
        cache.insert("a");
        cache.insert("b");
        // Refreshing "a" makes "b" the oldest-inserted entry.
        cache.insert("a");
        cache.insert("c");

        assert!(cache.is_seen("a"));
        assert!(!cache.is_seen("b"));
        assert!(cache.is_seen("c"));
    }

    #[tokio::test(start_paused = true)]
    async fn insert_scans_out_stale_entries() {
        let mut cache = SeenCache::new(TTL, 10);
        cache.insert("old");
        tokio::time::advance(Duration::from_secs(61)).await;
        cache.insert("new");

        assert_eq!(cache.len(), 1);
        assert!(cache.is_seen("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_restarts_ttl() {
        let mut cache = SeenCache::new(TTL, 10);
        cache.insert("storm warning");
        tokio::time::advance(Duration::from_secs(45)).await;
        cache.insert("storm warning");
        tokio::time::advance(Duration::from_secs(45)).await;

        assert!(cache.is_seen("storm warning"));
    }
}
