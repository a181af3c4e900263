//! TTL-bounded DNS cache with oldest-entry eviction and short-lived
//! negative entries.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// A cached resolution result.
#[derive(Debug, Clone)]
pub struct DnsCacheEntry {
    /// Resolved addresses, in resolver order.
    pub ips: Vec<IpAddr>,
    /// When this entry was stored.
    pub cached_at: Instant,
    /// Insertion sequence; breaks ties between equal timestamps.
    seq: u64,
}

impl DnsCacheEntry {
    pub fn age(&self) -> Duration {
        self.cached_at.elapsed()
    }
}

#[derive(Debug)]
struct NegativeEntry {
    reason: String,
    failed_at: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, DnsCacheEntry>,
    failures: HashMap<String, NegativeEntry>,
    next_seq: u64,
}

/// Thread-safe hostname → addresses cache.
#[derive(Debug)]
pub struct DnsCache {
    state: Mutex<CacheState>,
    ttl: Duration,
    negative_ttl: Duration,
    max_size: usize,
}

impl DnsCache {
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            ttl,
            negative_ttl: Duration::ZERO,
            max_size: max_size.max(1),
        }
    }

    /// Remember failed resolutions for `negative_ttl`.
    pub fn with_negative_ttl(mut self, negative_ttl: Duration) -> Self {
        self.negative_ttl = negative_ttl;
        self
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Entry younger than the TTL.
    pub fn get_fresh(&self, hostname: &str) -> Option<Vec<IpAddr>> {
        let state = self.lock();
        state
            .entries
            .get(hostname)
            .filter(|entry| entry.age() < self.ttl)
            .map(|entry| entry.ips.clone())
    }

    /// Entry of any age still held, for degraded fallback.
    pub fn get_stale(&self, hostname: &str) -> Option<DnsCacheEntry> {
        self.lock().entries.get(hostname).cloned()
    }

    /// Insert or refresh an entry. Returns the hostname evicted to make room.
    pub fn insert(&self, hostname: &str, ips: Vec<IpAddr>) -> Option<String> {
        let mut state = self.lock();

        let mut evicted = None;
        if !state.entries.contains_key(hostname) && state.entries.len() >= self.max_size {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| (entry.cached_at, entry.seq))
                .map(|(key, _)| key.clone());
            if let Some(key) = oldest {
                state.entries.remove(&key);
                evicted = Some(key);
            }
        }

        state.failures.remove(hostname);
        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(
            hostname.to_string(),
            DnsCacheEntry {
                ips,
                cached_at: Instant::now(),
                seq,
            },
        );
        evicted
    }

    /// Record that resolving `hostname` just failed.
    pub fn insert_failure(&self, hostname: &str, reason: &str) {
        if self.negative_ttl.is_zero() {
            return;
        }
        let mut state = self.lock();
        if state.failures.len() >= self.max_size {
            let window = self.negative_ttl;
            state.failures.retain(|_, entry| entry.failed_at.elapsed() < window);
        }
        if state.failures.len() < self.max_size {
            state.failures.insert(
                hostname.to_string(),
                NegativeEntry {
                    reason: reason.to_string(),
                    failed_at: Instant::now(),
                },
            );
        }
    }

    /// Reason of a failure recorded less than `negative_ttl` ago.
    pub fn recent_failure(&self, hostname: &str) -> Option<String> {
        self.lock()
            .failures
            .get(hostname)
            .filter(|entry| entry.failed_at.elapsed() < self.negative_ttl)
            .map(|entry| entry.reason.clone())
    }

    /// Drop entries older than twice the TTL, and lapsed negative entries.
    /// Returns how many positive entries were removed.
    pub fn purge_expired(&self) -> usize {
        let limit = self.ttl.saturating_mul(2);
        let negative_ttl = self.negative_ttl;
        let mut state = self.lock();
        state.failures.retain(|_, entry| entry.failed_at.elapsed() < negative_ttl);
        let before = state.entries.len();
        state.entries.retain(|_, entry| entry.age() <= limit);
        before - state.entries.len()
    }

    pub fn contains(&self, hostname: &str) -> bool {
        self.lock().entries.contains_key(hostname)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}
