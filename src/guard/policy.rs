//! Session policies: which tokens may coexist for one identity and platform.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::Driver;
use crate::errors::Result;
use crate::storage::{SessionStore, keys};
use crate::token::Uid;

/// The part of the guard that differs between single- and multi-session modes.
#[async_trait]
pub trait SessionPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Called before a token is issued. Returning `false` aborts the issue.
    ///
    /// `retire_ttl` is how long any token this policy displaces must stay blacklisted.
    async fn is_unique(
        &self,
        store: &dyn SessionStore,
        uid: Option<&Uid>,
        platform: &str,
        retire_ttl: u64,
    ) -> Result<bool>;

    /// Records a freshly issued (or refreshed) jti. `ttl_secs` bounds the index lifetime.
    async fn register(
        &self,
        store: &dyn SessionStore,
        uid: Option<&Uid>,
        platform: &str,
        jti: &str,
        ttl_secs: u64,
    ) -> Result<()>;
}

/// One live token per (uid, platform); issuing again retires the previous one.
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleSession;

#[async_trait]
impl SessionPolicy for SingleSession {
    fn name(&self) -> &'static str {
        "single"
    }

    async fn is_unique(
        &self,
        store: &dyn SessionStore,
        uid: Option<&Uid>,
        platform: &str,
        retire_ttl: u64,
    ) -> Result<bool> {
        let sso_key = keys::sso_key(uid, platform);
        if let Some(Value::String(previous)) = store.get(&sso_key).await? {
            store.blacklist(&previous, retire_ttl).await?;
            store.delete(&sso_key).await?;
            info!(jti = %previous, platform = %platform, "session.replaced");
        }
        Ok(true)
    }

    async fn register(
        &self,
        store: &dyn SessionStore,
        uid: Option<&Uid>,
        platform: &str,
        jti: &str,
        ttl_secs: u64,
    ) -> Result<()> {
        store
            .set(&keys::sso_key(uid, platform), Value::from(jti), ttl_secs)
            .await?;
        store
            .set(
                &keys::user_tokens_key(uid, platform),
                Value::from(vec![jti]),
                ttl_secs,
            )
            .await?;
        Ok(())
    }
}

/// Any number of concurrent tokens. The per-user index is only kept when
/// `track_user_tokens` is set; without it user enumeration sees nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct MultiSession {
    pub track_user_tokens: bool,
}

#[async_trait]
impl SessionPolicy for MultiSession {
    fn name(&self) -> &'static str {
        "multi"
    }

    async fn is_unique(
        &self,
        _store: &dyn SessionStore,
        _uid: Option<&Uid>,
        _platform: &str,
        _retire_ttl: u64,
    ) -> Result<bool> {
        Ok(true)
    }

    async fn register(
        &self,
        store: &dyn SessionStore,
        uid: Option<&Uid>,
        platform: &str,
        jti: &str,
        ttl_secs: u64,
    ) -> Result<()> {
        if !self.track_user_tokens {
            return Ok(());
        }
        let index_key = keys::user_tokens_key(uid, platform);
        let mut live = Vec::new();
        for known in read_jti_index(store, &index_key).await? {
            if known != jti && !store.is_blacklisted(&known).await? {
                live.push(known);
            }
        }
        live.push(jti.to_string());
        // Never shorten the index below what an older, longer-lived entry still needs.
        let ttl_secs = match store.ttl(&index_key).await? {
            Some(0) => 0,
            Some(existing) => existing.max(ttl_secs),
            None => ttl_secs,
        };
        store.set(&index_key, Value::from(live), ttl_secs).await?;
        Ok(())
    }
}

pub fn policy_for(driver: Driver, track_user_tokens: bool) -> Arc<dyn SessionPolicy> {
    match driver {
        Driver::Single => Arc::new(SingleSession),
        Driver::Multi => Arc::new(MultiSession { track_user_tokens }),
    }
}

/// Reads a jti index. A value that is not a list of strings is treated as empty.
pub(crate) async fn read_jti_index(store: &dyn SessionStore, key: &str) -> Result<Vec<String>> {
    match store.get(key).await? {
        None => Ok(Vec::new()),
        Some(value) => match serde_json::from_value::<Vec<String>>(value) {
            Ok(jtis) => Ok(jtis),
            Err(e) => {
                warn!(key = %key, error = %e, "session.index_unreadable");
                Ok(Vec::new())
            }
        },
    }
}
