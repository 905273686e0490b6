//! In-memory response cache with TTL and FIFO eviction.
//!
//! - SHA256-based cache keys over the normalized request payload
//! - Only successful responses are ever stored
//! - TTL-based expiration, checked on read and by a periodic sweep
//! - Size bound enforced on insert by evicting the oldest *inserted* entry
//!   (insertion order, not access order)
//!
//! The cache is deliberately not persisted: a cold-started gateway begins empty.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::time::Instant;

use dialectic_types::Request;

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Entries older than this are never served.
    pub ttl: Duration,
    /// Hard upper bound on stored entries.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            max_entries: 100,
        }
    }
}

/// A stored successful response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    pub inserted_at: Instant,
}

impl CacheEntry {
    fn is_stale(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) > ttl
    }
}

/// Running counters, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    max_entries: usize,
    entries: HashMap<String, CacheEntry>,
    /// Keys in insertion order, oldest first.
    order: VecDeque<String>,
    stats: CacheStats,
}

impl ResponseCache {
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            ttl: config.ttl,
            max_entries: config.max_entries.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
            stats: CacheStats::default(),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Look up a fresh entry. Stale entries are dropped and count as a miss.
    pub fn get(&mut self, key: &str, now: Instant) -> Option<Value> {
        let stale = match self.entries.get(key) {
            None => {
                self.stats.misses += 1;
                return None;
            }
            Some(entry) => entry.is_stale(now, self.ttl),
        };

        if stale {
            self.remove(key);
            self.stats.expirations += 1;
            self.stats.misses += 1;
            return None;
        }

        self.stats.hits += 1;
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Store a successful response.
    ///
    /// Re-inserting an existing key replaces it (last write wins) and moves it
    /// to the back of the eviction queue. Returns the key evicted to make room,
    /// if any.
    pub fn insert(&mut self, key: String, value: Value, now: Instant) -> Option<String> {
        if self.entries.contains_key(&key) {
            self.order.retain(|k| k != &key);
        }

        let mut evicted = None;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            evicted = self.order.pop_front();
            if let Some(old) = &evicted {
                self.entries.remove(old);
                self.stats.evictions += 1;
                tracing::debug!(cache_key = %old, "Evicted oldest cache entry");
            }
        }

        self.order.push_back(key.clone());
        self.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                value,
                inserted_at: now,
            },
        );
        evicted
    }

    /// Drop every entry whose age exceeds the TTL. Returns how many were removed.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_stale(now, ttl));
        let entries = &self.entries;
        self.order.retain(|k| entries.contains_key(k));
        let removed = before - self.entries.len();
        self.stats.expirations += removed as u64;
        removed
    }

    /// Reset to the cold-start state. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }
}

/// Compute the cache key for a request, or `None` if its action is not cacheable.
///
/// The payload is normalized first (string values trimmed, internal whitespace
/// runs collapsed) so that cosmetic differences in the submitted text map to
/// the same entry. Field order is fixed by the request types, so the hashed
/// form is canonical.
#[must_use]
pub fn cache_key(request: &Request) -> Option<String> {
    if !request.action().is_cacheable() {
        return None;
    }

    let mut payload = serde_json::to_value(request).ok()?;
    normalize(&mut payload);
    let canonical = serde_json::to_string(&payload).ok()?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Some(hex_encode(&hasher.finalize()))
}

fn normalize(value: &mut Value) {
    match value {
        Value::String(s) => {
            let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
            *s = collapsed;
        }
        Value::Array(items) => items.iter_mut().for_each(normalize),
        Value::Object(map) => map.values_mut().for_each(normalize),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
