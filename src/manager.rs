//! Per-user operations spanning many sessions.
//!
//! Enumeration goes through the per-(uid, platform) jti index. A policy that never
//! writes that index (multi-session without `track_user_tokens`) leaves every user
//! looking empty here.

use std::sync::Arc;

use tracing::info;

use crate::errors::Result;
use crate::guard::{Guard, SessionRecord, read_jti_index};
use crate::storage::{StoreStats, keys};
use crate::token::Uid;

const REVOKED_FOR_USER: &str = "All user tokens revoked";

pub struct TokenManager {
    guard: Arc<Guard>,
}

impl TokenManager {
    pub fn new(guard: Arc<Guard>) -> Self {
        Self { guard }
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    /// Live session records for `uid`, on one platform or on every configured one.
    pub async fn user_tokens(
        &self,
        uid: impl Into<Uid>,
        platform: Option<&str>,
    ) -> Result<Vec<SessionRecord>> {
        let uid = uid.into();
        let mut records = Vec::new();
        for platform in self.platforms(platform) {
            for jti in self.live_jtis(&uid, &platform).await? {
                if let Some(record) = self.guard.token_info(&jti).await? {
                    records.push(record);
                }
            }
        }
        Ok(records)
    }

    /// Revokes every live token of `uid` and clears its indexes. Returns how many were revoked.
    pub async fn revoke_user_tokens(&self, uid: impl Into<Uid>, platform: Option<&str>) -> Result<usize> {
        let uid = uid.into();
        let store = self.guard.store();
        let mut revoked = 0;
        for platform in self.platforms(platform) {
            for jti in self.live_jtis(&uid, &platform).await? {
                let done = match self.guard.token_info(&jti).await? {
                    Some(record) => self.guard.invalidate(&record.token).await,
                    None => {
                        self.guard.revoke_jti(&jti, REVOKED_FOR_USER).await?;
                        true
                    }
                };
                if done {
                    revoked += 1;
                }
            }
            store
                .delete_multiple(&[
                    keys::user_tokens_key(Some(&uid), &platform),
                    keys::sso_key(Some(&uid), &platform),
                ])
                .await?;
        }
        info!(uid = %uid, revoked, "manager.user_tokens_revoked");
        Ok(revoked)
    }

    pub async fn user_token_count(&self, uid: impl Into<Uid>, platform: &str) -> Result<usize> {
        Ok(self.live_jtis(&uid.into(), platform).await?.len())
    }

    /// Live token count across every configured platform.
    pub async fn user_total_token_count(&self, uid: impl Into<Uid>) -> Result<usize> {
        let uid = uid.into();
        let mut total = 0;
        for platform in self.platforms(None) {
            total += self.live_jtis(&uid, &platform).await?.len();
        }
        Ok(total)
    }

    pub async fn is_token_valid(&self, token: &str) -> bool {
        self.guard.authenticate(token).await.is_ok()
    }

    /// Session record of a currently valid token.
    pub async fn token_info(&self, token: &str) -> Option<SessionRecord> {
        let payload = self.guard.authenticate(token).await.ok()?;
        self.guard.token_info(&payload.jti).await.ok().flatten()
    }

    pub async fn clean_expired(&self) -> Result<usize> {
        self.guard.store().clean_expired().await
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.guard.store().stats().await
    }

    fn platforms(&self, platform: Option<&str>) -> Vec<String> {
        match platform {
            Some(platform) => vec![platform.to_string()],
            None => self.guard.config().platforms.clone(),
        }
    }

    async fn live_jtis(&self, uid: &Uid, platform: &str) -> Result<Vec<String>> {
        let store = self.guard.store();
        let index = read_jti_index(store.as_ref(), &keys::user_tokens_key(Some(uid), platform)).await?;
        let mut live = Vec::with_capacity(index.len());
        for jti in index {
            if !store.is_blacklisted(&jti).await? {
                live.push(jti);
            }
        }
        Ok(live)
    }
}
