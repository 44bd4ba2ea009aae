use async_trait::async_trait;
use serde_json::Value;

use crate::errors::Result;

use super::{SessionStore, StoreStats};

/// Accepts every write and remembers nothing. Nothing is ever blacklisted.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullStore;

#[async_trait]
impl SessionStore for NullStore {
    async fn set(&self, _key: &str, _value: Value, _ttl_secs: u64) -> Result<bool> {
        Ok(true)
    }

    async fn get(&self, _key: &str) -> Result<Option<Value>> {
        Ok(None)
    }

    async fn delete(&self, _key: &str) -> Result<bool> {
        Ok(true)
    }

    async fn has(&self, _key: &str) -> Result<bool> {
        Ok(false)
    }

    async fn blacklist(&self, _jti: &str, _ttl_secs: u64) -> Result<bool> {
        Ok(true)
    }

    async fn is_blacklisted(&self, _jti: &str) -> Result<bool> {
        Ok(false)
    }

    async fn clean_expired(&self) -> Result<usize> {
        Ok(0)
    }

    async fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats::new("null"))
    }
}
