// SPDX-License-Identifier: MIT

//! The parent-resident DNS cache — keyed by `hostname:family` for
//! lookups and `resolve4:hostname` / `resolve6:hostname` for the resolve-all
//! calls, with TTL expiry on read and FIFO-by-insertion eviction once
//! `maxEntries` is reached. Statistics accumulate within a rolling
//! `ttl`-length window that resets opportunistically on each access.

use ao_core::{Clock, DnsCacheEntrySnapshot, DnsCacheValue, DnsStats};
use indexmap::IndexMap;
use parking_lot::Mutex;

struct Entry {
    value: DnsCacheValue,
    inserted_at_ms: u64,
}

struct Inner {
    entries: IndexMap<String, Entry>,
    stats: DnsStats,
    ttl_period_start_ms: u64,
}

/// Cache + stats, guarded by a single mutex — statistics are always mutated
/// together with the cache they describe. `IndexMap` gives us FIFO-by-
/// insertion eviction order for free via `shift_remove_index(0)`.
pub struct DnsCache<C: Clock> {
    clock: C,
    ttl_ms: parking_lot::RwLock<u64>,
    max_entries: parking_lot::RwLock<usize>,
    inner: Mutex<Inner>,
}

impl<C: Clock> DnsCache<C> {
    pub fn new(clock: C, ttl_ms: u64, max_entries: usize) -> Self {
        let start = clock.epoch_ms();
        Self {
            clock,
            ttl_ms: parking_lot::RwLock::new(ttl_ms),
            max_entries: parking_lot::RwLock::new(max_entries),
            inner: Mutex::new(Inner { entries: IndexMap::new(), stats: DnsStats::default(), ttl_period_start_ms: start }),
        }
    }

    pub fn ttl_ms(&self) -> u64 {
        *self.ttl_ms.read()
    }

    pub fn max_entries(&self) -> usize {
        *self.max_entries.read()
    }

    /// `updateConfig` may change `ttl`/`maxEntries`; changing `ttl` resets
    /// statistics so the new window starts clean.
    pub fn reconfigure(&self, ttl_ms: u64, max_entries: usize) {
        let ttl_changed = *self.ttl_ms.read() != ttl_ms;
        *self.ttl_ms.write() = ttl_ms;
        *self.max_entries.write() = max_entries;
        if ttl_changed {
            let mut inner = self.inner.lock();
            inner.stats = DnsStats::default();
            inner.ttl_period_start_ms = self.clock.epoch_ms();
        }
    }

    fn check_and_reset_ttl_period(&self, inner: &mut Inner) {
        let ttl = self.ttl_ms();
        let now = self.clock.epoch_ms();
        if ttl == 0 {
            return;
        }
        if now.saturating_sub(inner.ttl_period_start_ms) >= ttl {
            inner.stats = DnsStats::default();
            inner.ttl_period_start_ms = now;
        }
    }

    /// Returns the cached value if present and not expired. An expired read
    /// deletes the entry and counts as a miss right here (the caller still
    /// goes on to resolve and re-insert).
    pub fn get(&self, key: &str) -> Option<DnsCacheValue> {
        let ttl = self.ttl_ms();
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        self.check_and_reset_ttl_period(&mut inner);

        let expired = inner.entries.get(key).is_some_and(|e| now.saturating_sub(e.inserted_at_ms) >= ttl);
        if expired {
            inner.entries.shift_remove(key);
            inner.stats.misses += 1;
            return None;
        }
        let value = inner.entries.get(key).map(|e| e.value.clone());
        if value.is_some() {
            inner.stats.hits += 1;
        } else {
            inner.stats.misses += 1;
        }
        value
    }

    /// Inserts `value` under `key` with the current timestamp. If the cache
    /// is already at `maxEntries`, evicts the earliest-inserted entry first
    /// (FIFO, regardless of whether it has been re-read since).
    pub fn insert(&self, key: String, value: DnsCacheValue) {
        let now = self.clock.epoch_ms();
        let max = self.max_entries();
        let mut inner = self.inner.lock();
        self.check_and_reset_ttl_period(&mut inner);

        if !inner.entries.contains_key(&key) && inner.entries.len() >= max && max > 0 {
            inner.entries.shift_remove_index(0);
            inner.stats.evictions += 1;
        }
        inner.entries.insert(key, Entry { value, inserted_at_ms: now });
    }

    pub fn record_miss(&self) {
        let mut inner = self.inner.lock();
        self.check_and_reset_ttl_period(&mut inner);
        inner.stats.misses += 1;
    }

    pub fn record_error(&self) {
        let mut inner = self.inner.lock();
        self.check_and_reset_ttl_period(&mut inner);
        inner.stats.errors += 1;
    }

    /// Removes every entry and returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let n = inner.entries.len();
        inner.entries.clear();
        n
    }

    pub fn stats(&self) -> DnsStats {
        let mut inner = self.inner.lock();
        self.check_and_reset_ttl_period(&mut inner);
        inner.stats
    }

    /// Snapshot of every entry with derived `age`/`remainingTTL`/`expired`
    /// fields, newest insertion first.
    pub fn entries(&self) -> Vec<DnsCacheEntrySnapshot> {
        let ttl = self.ttl_ms() as i64;
        let now = self.clock.epoch_ms();
        let inner = self.inner.lock();
        inner
            .entries
            .iter()
            .rev()
            .map(|(key, entry)| {
                let age_ms = now.saturating_sub(entry.inserted_at_ms);
                let remaining_ttl = ttl - age_ms as i64;
                DnsCacheEntrySnapshot {
                    key: key.clone(),
                    value: entry.value.clone(),
                    age_ms,
                    remaining_ttl_ms: remaining_ttl,
                    expired: remaining_ttl <= 0,
                    source: "cache",
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache key for a plain lookup, scoped by requested address family.
pub fn lookup_key(hostname: &str, family: ao_core::AddressFamily) -> String {
    format!("{hostname}:{family:?}")
}

pub fn resolve4_key(hostname: &str) -> String {
    format!("resolve4:{hostname}")
}

pub fn resolve6_key(hostname: &str) -> String {
    format!("resolve6:{hostname}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ao_core::{AddressFamily, FakeClock};

    fn value(addr: &str) -> DnsCacheValue {
        DnsCacheValue::Lookup { address: addr.to_string(), family: AddressFamily::V4 }
    }

    #[test]
    fn maxentries_one_second_insertion_evicts_first() {
        let cache = DnsCache::new(FakeClock::new(), 60_000, 1);
        cache.insert("a.example".into(), value("1.1.1.1"));
        cache.insert("b.example".into(), value("2.2.2.2"));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("a.example").is_none());
        assert!(cache.get("b.example").is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn ttl_zero_means_every_read_misses() {
        let cache = DnsCache::new(FakeClock::new(), 0, 10);
        cache.insert("a.example".into(), value("1.1.1.1"));
        assert!(cache.get("a.example").is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn expired_entry_is_deleted_and_counts_as_miss() {
        let clock = FakeClock::new();
        let cache = DnsCache::new(clock.clone(), 1_000, 10);
        cache.insert("a.example".into(), value("1.1.1.1"));
        clock.advance(std::time::Duration::from_millis(1001));
        assert!(cache.get("a.example").is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn hit_then_miss_then_evict_scenario() {
        // ttl=60000, maxEntries=2: two inserts, a hit, a miss, then an
        // insert that evicts the earliest entry
        let cache = DnsCache::new(FakeClock::new(), 60_000, 2);
        cache.insert("a.example".into(), value("1.1.1.1")); // insert
        cache.insert("b.example".into(), value("2.2.2.2")); // insert
        assert!(cache.get("a.example").is_some()); // hit
        assert!(cache.get("not-cached.example").is_none()); // miss (not inserted)
        cache.record_miss();
        cache.insert("c.example".into(), value("3.3.3.3")); // evicts a (inserted first)
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 1);
        assert!(cache.get("a.example").is_none());
    }

    #[test]
    fn clear_returns_removed_count() {
        let cache = DnsCache::new(FakeClock::new(), 60_000, 10);
        cache.insert("a.example".into(), value("1.1.1.1"));
        cache.insert("b.example".into(), value("2.2.2.2"));
        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn stats_reset_when_ttl_window_elapses() {
        let clock = FakeClock::new();
        let cache = DnsCache::new(clock.clone(), 1_000, 10);
        cache.insert("a.example".into(), value("1.1.1.1"));
        cache.get("a.example");
        assert_eq!(cache.stats().hits, 1);

        clock.advance(std::time::Duration::from_millis(1001));
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn reconfiguring_ttl_resets_stats_immediately() {
        let cache = DnsCache::new(FakeClock::new(), 60_000, 10);
        cache.insert("a.example".into(), value("1.1.1.1"));
        cache.get("a.example");
        assert_eq!(cache.stats().hits, 1);
        cache.reconfigure(120_000, 10);
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn entries_snapshot_is_newest_first_with_derived_fields() {
        let clock = FakeClock::new();
        let cache = DnsCache::new(clock.clone(), 10_000, 10);
        cache.insert("a.example".into(), value("1.1.1.1"));
        clock.advance(std::time::Duration::from_millis(100));
        cache.insert("b.example".into(), value("2.2.2.2"));

        let entries = cache.entries();
        assert_eq!(entries[0].key, "b.example");
        assert_eq!(entries[1].key, "a.example");
        assert!(!entries[0].expired);
        assert!(entries[1].age_ms >= 100);
    }
}
