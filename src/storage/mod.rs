//! Persistence contract for session records, indexes and the revocation list.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::clock::Clock;
use crate::errors::{Error, Result};

pub mod keys;
mod memory;
mod null;

pub use memory::MemoryStore;
pub use null::NullStore;

/// Backend names accepted by [`build`].
pub const SUPPORTED_BACKENDS: &[&str] = &["memory", "null"];

/// TTL-aware key-value store plus a jti blacklist.
///
/// Keys passed in are logical (`token:{jti}`, `sso:{uid}:{platform}`, ...); a backend
/// places them under its own configured prefix. A ttl of 0 means no expiry, except for
/// `blacklist` where it means "through the current second". An entry written with
/// ttl > 0 must become unreadable strictly after ttl seconds even if no sweep runs.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Upserts `key`. Returns whether the write was accepted.
    async fn set(&self, key: &str, value: Value, ttl_secs: u64) -> Result<bool>;

    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Idempotent; deleting an absent key still succeeds.
    async fn delete(&self, key: &str) -> Result<bool>;

    async fn has(&self, key: &str) -> Result<bool>;

    /// Seconds left on a live `key`, `Some(0)` when it never expires, `None` when absent
    /// or when the backend cannot tell.
    async fn ttl(&self, _key: &str) -> Result<Option<u64>> {
        Ok(None)
    }

    /// Best effort: keys written before a failure stay written.
    async fn set_multiple(&self, entries: Vec<(String, Value)>, ttl_secs: u64) -> Result<bool> {
        let mut all_accepted = true;
        for (key, value) in entries {
            all_accepted &= self.set(&key, value, ttl_secs).await?;
        }
        Ok(all_accepted)
    }

    /// Returns only the keys that are present.
    async fn get_multiple(&self, keys: &[String]) -> Result<HashMap<String, Value>> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get(key).await? {
                found.insert(key.clone(), value);
            }
        }
        Ok(found)
    }

    async fn delete_multiple(&self, keys: &[String]) -> Result<bool> {
        let mut all_deleted = true;
        for key in keys {
            all_deleted &= self.delete(key).await?;
        }
        Ok(all_deleted)
    }

    async fn blacklist(&self, jti: &str, ttl_secs: u64) -> Result<bool>;

    async fn is_blacklisted(&self, jti: &str) -> Result<bool>;

    /// Sweeps expired entries and returns how many were removed.
    async fn clean_expired(&self) -> Result<usize>;

    async fn stats(&self) -> Result<StoreStats>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub backend: String,
    pub counters: BTreeMap<String, u64>,
}

impl StoreStats {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            counters: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: &str, value: u64) -> Self {
        self.counters.insert(name.to_string(), value);
        self
    }

    pub fn counter(&self, name: &str) -> Option<u64> {
        self.counters.get(name).copied()
    }
}

/// Backend-independent store settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    pub prefix: String,
    /// Entry capacity for bounded backends; 0 disables the bound.
    pub limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            prefix: "jwt:".to_string(),
            limit: 10_000,
        }
    }
}

/// Builds a store backend by name.
pub fn build(
    name: &str,
    config: &StoreConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn SessionStore>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "memory" => Ok(Arc::new(MemoryStore::new(config.clone(), clock))),
        "null" => Ok(Arc::new(NullStore)),
        other => Err(Error::Config(format!(
            "unknown storage backend '{other}', expected one of: {}",
            SUPPORTED_BACKENDS.join(", ")
        ))),
    }
}
