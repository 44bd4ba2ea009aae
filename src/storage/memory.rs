use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::clock::Clock;
use crate::errors::Result;

use super::{SessionStore, StoreConfig, StoreStats, keys};

struct Entry {
    value: Value,
    /// Last second at which the entry is readable.
    expires_at: Option<i64>,
    seq: u64,
}

/// Deadline `ttl_secs` after `now`, clamped instead of wrapping.
fn deadline(now: i64, ttl_secs: u64) -> i64 {
    now.saturating_add(i64::try_from(ttl_secs).unwrap_or(i64::MAX))
}

impl Entry {
    fn is_live(&self, now: i64) -> bool {
        self.expires_at.is_none_or(|at| now <= at)
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    /// Insertion order; pairs whose seq no longer matches the entry are stale.
    order: VecDeque<(String, u64)>,
    next_seq: u64,
    blacklist: HashMap<String, i64>,
    hits: u64,
    misses: u64,
    evictions: u64,
    swept: u64,
}

impl Inner {
    fn live_entry(&mut self, key: &str, now: i64) -> Option<&Entry> {
        let expired = self.entries.get(key).is_some_and(|e| !e.is_live(now));
        if expired {
            self.entries.remove(key);
        }
        self.entries.get(key)
    }

    fn evict_oldest(&mut self) -> bool {
        while let Some((key, seq)) = self.order.pop_front() {
            if self.entries.get(&key).is_some_and(|e| e.seq == seq) {
                self.entries.remove(&key);
                self.evictions += 1;
                debug!(key = %key, "storage.memory.evicted");
                return true;
            }
        }
        false
    }

    fn compact_order(&mut self) {
        let entries = &self.entries;
        self.order
            .retain(|(key, seq)| entries.get(key).is_some_and(|e| e.seq == *seq));
    }
}

/// Bounded in-process store with FIFO eviction.
///
/// Blacklist entries are kept apart from the bounded map and are never evicted.
pub struct MemoryStore {
    prefix: String,
    limit: usize,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new(config: StoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            prefix: config.prefix,
            limit: config.limit,
            clock,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn set(&self, key: &str, value: Value, ttl_secs: u64) -> Result<bool> {
        let now = self.clock.now();
        let key = self.full_key(key);
        let expires_at = (ttl_secs > 0).then(|| deadline(now, ttl_secs));
        let mut inner = self.inner.lock().await;

        if let Some(entry) = inner.entries.get_mut(&key) {
            entry.value = value;
            entry.expires_at = expires_at;
            return Ok(true);
        }

        if self.limit > 0 {
            while inner.entries.len() >= self.limit && inner.evict_oldest() {}
            if inner.order.len() > self.limit * 2 {
                inner.compact_order();
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.push_back((key.clone(), seq));
        inner.entries.insert(
            key,
            Entry {
                value,
                expires_at,
                seq,
            },
        );
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let now = self.clock.now();
        let key = self.full_key(key);
        let mut inner = self.inner.lock().await;
        let value = inner.live_entry(&key, now).map(|e| e.value.clone());
        if value.is_some() {
            inner.hits += 1;
        } else {
            inner.misses += 1;
        }
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let key = self.full_key(key);
        self.inner.lock().await.entries.remove(&key);
        Ok(true)
    }

    async fn has(&self, key: &str) -> Result<bool> {
        let now = self.clock.now();
        let key = self.full_key(key);
        Ok(self.inner.lock().await.live_entry(&key, now).is_some())
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        let now = self.clock.now();
        let key = self.full_key(key);
        let mut inner = self.inner.lock().await;
        Ok(inner.live_entry(&key, now).map(|e| match e.expires_at {
            Some(at) => at.saturating_sub(now).max(1) as u64,
            None => 0,
        }))
    }

    async fn blacklist(&self, jti: &str, ttl_secs: u64) -> Result<bool> {
        let until = deadline(self.clock.now(), ttl_secs);
        let key = self.full_key(&keys::blacklist_key(jti));
        let mut inner = self.inner.lock().await;
        let until = inner.blacklist.get(&key).map_or(until, |&at| at.max(until));
        inner.blacklist.insert(key, until);
        Ok(true)
    }

    async fn is_blacklisted(&self, jti: &str) -> Result<bool> {
        let now = self.clock.now();
        let key = self.full_key(&keys::blacklist_key(jti));
        let mut inner = self.inner.lock().await;
        match inner.blacklist.get(&key).copied() {
            Some(until) if now > until => {
                inner.blacklist.remove(&key);
                inner.swept += 1;
                Ok(false)
            }
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    async fn clean_expired(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().await;
        let before = inner.entries.len() + inner.blacklist.len();
        inner.entries.retain(|_, e| e.is_live(now));
        inner.blacklist.retain(|_, &mut until| now <= until);
        inner.compact_order();
        let removed = before - (inner.entries.len() + inner.blacklist.len());
        inner.swept += removed as u64;
        if removed > 0 {
            debug!(removed, "storage.memory.swept");
        }
        Ok(removed)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let inner = self.inner.lock().await;
        Ok(StoreStats::new("memory")
            .with("entries", inner.entries.len() as u64)
            .with("blacklisted", inner.blacklist.len() as u64)
            .with("limit", self.limit as u64)
            .with("hits", inner.hits)
            .with("misses", inner.misses)
            .with("evictions", inner.evictions)
            .with("expired_swept", inner.swept))
    }
}
