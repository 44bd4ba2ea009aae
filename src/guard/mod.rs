//! The token lifecycle: issue, authenticate, refresh, invalidate.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::GuardConfig;
use crate::errors::{Error, ExpiryKind, Result};
use crate::events::{EventSink, LifecycleEvent};
use crate::storage::{self, SessionStore, keys};
use crate::token::payload::after;
use crate::token::{ClaimValidator, Payload, TokenCodec};

mod policy;

pub use policy::{MultiSession, SessionPolicy, SingleSession, policy_for};
pub(crate) use policy::read_jti_index;

/// Reason attached to revocations requested through [`Guard::invalidate`].
pub const INVALIDATED_BY_USER: &str = "Token invalidated by user";

/// What a caller gets back from `issue` and `refresh`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub token: String,
    /// Seconds until the token expires.
    pub expires_in: u64,
    /// Seconds after expiry during which it can still be refreshed.
    pub refresh_ttl: u64,
}

/// Stored under `token:{jti}` while the token is valid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(flatten)]
    pub payload: Payload,
    pub token: String,
}

pub struct Guard {
    config: GuardConfig,
    codec: TokenCodec,
    validator: ClaimValidator,
    store: Arc<dyn SessionStore>,
    policy: Arc<dyn SessionPolicy>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl Guard {
    /// Builds a guard from explicit collaborators. Key material is parsed here.
    pub fn new(
        config: GuardConfig,
        store: Arc<dyn SessionStore>,
        policy: Arc<dyn SessionPolicy>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let codec = TokenCodec::new(&config.signing())?;
        let validator = ClaimValidator::new(config.leeway_secs);
        debug!(
            policy = policy.name(),
            algorithm = %codec.algorithm(),
            "guard.created"
        );
        Ok(Self {
            config,
            codec,
            validator,
            store,
            policy,
            events,
            clock,
        })
    }

    /// Store and policy come from the configured backend name and driver.
    pub fn from_config(config: GuardConfig, events: Arc<dyn EventSink>) -> Result<Self> {
        Self::with_clock(config, events, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: GuardConfig,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let store = storage::build(&config.storage, &config.store_config(), clock.clone())?;
        let policy = policy_for(config.driver, config.track_user_tokens);
        Self::new(config, store, policy, events, clock)
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// A payload for `platform` valid from now for the configured ttl.
    pub fn payload(&self, platform: impl Into<String>) -> Payload {
        Payload::for_ttl(platform, self.clock.now(), self.config.ttl_secs())
    }

    pub async fn issue(&self, payload: Payload) -> Result<IssuedToken> {
        payload.validate()?;
        let uid = payload.uid.as_ref();
        let platform = payload.platform.as_str();

        let unique = self
            .policy
            .is_unique(self.store.as_ref(), uid, platform, self.max_life())
            .await?;
        if !unique {
            return Err(Error::NotUnique {
                uid: uid.map(ToString::to_string).unwrap_or_default(),
                platform: platform.to_string(),
            });
        }

        let token = self.codec.encode(&payload)?;
        let now = self.clock.now();
        self.store_record(&payload, &token, now).await?;
        self.policy
            .register(
                self.store.as_ref(),
                uid,
                platform,
                &payload.jti,
                self.retire_ttl(&payload, now).max(1),
            )
            .await?;

        let issued = IssuedToken {
            token,
            expires_in: payload.remaining_ttl(now),
            refresh_ttl: self.config.refresh_ttl_secs(),
        };
        self.events.emit(&LifecycleEvent::Issued {
            payload,
            token: issued.token.clone(),
            expires_in: issued.expires_in,
            refresh_ttl: issued.refresh_ttl,
        });
        Ok(issued)
    }

    /// Verifies `token` and returns its payload.
    ///
    /// Revocation is checked before expiry, so a revoked token is always reported as
    /// `Blacklisted`. An expired token reports whether it can still be refreshed.
    pub async fn authenticate(&self, token: &str) -> Result<Payload> {
        let payload = self.verified_payload(token)?;
        if self.store.is_blacklisted(&payload.jti).await? {
            return Err(Error::Blacklisted { jti: payload.jti });
        }
        let now = self.clock.now();
        if let Err(violation) = self.validator.validate_payload(&payload, now) {
            let kind = if self.refresh_window_open(&payload, now) {
                ExpiryKind::Refreshable
            } else {
                ExpiryKind::Terminal
            };
            return Err(violation.into_error(&payload.jti, kind));
        }
        Ok(payload)
    }

    /// Refresh enabled, signature valid, not revoked, and still inside the refresh window.
    pub async fn can_refresh(&self, token: &str) -> bool {
        let Ok(payload) = self.verified_payload(token) else {
            return false;
        };
        match self.store.is_blacklisted(&payload.jti).await {
            Ok(false) => self.refresh_window_open(&payload, self.clock.now()),
            _ => false,
        }
    }

    /// Exchanges a valid or recently expired token for a new one and revokes the old one.
    pub async fn refresh(&self, token: &str) -> Result<IssuedToken> {
        let old = match self.authenticate(token).await {
            Ok(payload) => payload,
            Err(err) if err.is_refreshable() => self.verified_payload(token)?,
            Err(err) => return Err(err),
        };

        let now = self.clock.now();
        let early = !old.is_expired(now);
        if !self.refresh_window_open(&old, now) || (early && !self.config.allow_early_refresh) {
            debug!(jti = %old.jti, early, "guard.refresh_rejected");
            return Err(Error::NotRefreshable { jti: old.jti });
        }

        let renewed = old.renewed(now, self.config.ttl_secs());
        let new_token = self.codec.encode(&renewed)?;

        self.store
            .blacklist(&old.jti, self.retire_ttl(&old, now))
            .await?;
        self.store.delete(&keys::token_key(&old.jti)).await?;
        self.store_record(&renewed, &new_token, now).await?;
        self.policy
            .register(
                self.store.as_ref(),
                renewed.uid.as_ref(),
                &renewed.platform,
                &renewed.jti,
                self.retire_ttl(&renewed, now).max(1),
            )
            .await?;

        let issued = IssuedToken {
            token: new_token,
            expires_in: renewed.remaining_ttl(now),
            refresh_ttl: self.config.refresh_ttl_secs(),
        };
        self.events.emit(&LifecycleEvent::Refreshed {
            old_payload: old,
            new_payload: renewed,
            old_token: token.to_string(),
            new_token: issued.token.clone(),
        });
        Ok(issued)
    }

    /// Revokes `token`. Works on expired tokens; never fails, reporting problems as `false`.
    pub async fn invalidate(&self, token: &str) -> bool {
        let payload = match self.verified_payload(token) {
            Ok(payload) => payload,
            Err(err) => {
                debug!(error = %err, "guard.invalidate_rejected");
                return false;
            }
        };
        match self.revoke(payload, INVALIDATED_BY_USER).await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "guard.invalidate_failed");
                false
            }
        }
    }

    /// Revokes a jti known only from an index. Uses the stored record for the
    /// blacklist lifetime when there is one, otherwise the longest possible token life.
    pub async fn revoke_jti(&self, jti: &str, reason: &str) -> Result<()> {
        match self.token_info(jti).await? {
            Some(record) => self.revoke(record.payload, reason).await,
            None => {
                self.store.blacklist(jti, self.max_life()).await?;
                Ok(())
            }
        }
    }

    pub async fn token_info(&self, jti: &str) -> Result<Option<SessionRecord>> {
        match self.store.get(&keys::token_key(jti)).await? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| Error::Storage(format!("unreadable session record for {jti}: {e}"))),
        }
    }

    /// Signature-verified payload with no temporal checks.
    pub fn verified_payload(&self, token: &str) -> Result<Payload> {
        let decoded = self.codec.decode_verified(token)?;
        Payload::from_claims(&decoded.claims)
    }

    async fn revoke(&self, payload: Payload, reason: &str) -> Result<()> {
        if self.store.is_blacklisted(&payload.jti).await? {
            return Ok(());
        }
        let ttl = self.retire_ttl(&payload, self.clock.now());
        self.store.blacklist(&payload.jti, ttl).await?;
        self.events.emit(&LifecycleEvent::Revoked {
            jti: payload.jti.clone(),
            payload,
            reason: reason.to_string(),
        });
        Ok(())
    }

    async fn store_record(&self, payload: &Payload, token: &str, now: i64) -> Result<()> {
        let ttl = payload.remaining_ttl(now);
        if !self.config.blacklist_enabled || ttl == 0 {
            return Ok(());
        }
        let record = SessionRecord {
            payload: payload.clone(),
            token: token.to_string(),
        };
        let value: Value = serde_json::to_value(&record)?;
        self.store
            .set(&keys::token_key(&payload.jti), value, ttl)
            .await?;
        Ok(())
    }

    fn refresh_window_open(&self, payload: &Payload, now: i64) -> bool {
        self.config.refresh_enabled && now <= after(payload.exp, self.config.refresh_ttl_secs())
    }

    /// How long a token must stay blacklisted so neither it nor a refresh of it can be used.
    fn retire_ttl(&self, payload: &Payload, now: i64) -> u64 {
        payload
            .remaining_ttl(now)
            .saturating_add(self.config.refresh_ttl_secs())
    }

    fn max_life(&self) -> u64 {
        self.config
            .ttl_secs()
            .saturating_add(self.config.refresh_ttl_secs())
    }
}
