//! Guard settings and where to read them from.

use std::fmt;
use std::str::FromStr;

use aws_config::BehaviorVersion;
use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::storage::StoreConfig;
use crate::token::SigningConfig;

pub enum ConfigLocation {
    File(String),
    Env,
    Secret,
}

/// Session policy selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    /// One live token per uid and platform.
    #[default]
    #[serde(alias = "sso")]
    Single,
    /// Any number of live tokens.
    #[serde(alias = "mlo")]
    Multi,
}

impl FromStr for Driver {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" | "sso" => Ok(Driver::Single),
            "multi" | "mlo" => Ok(Driver::Multi),
            other => Err(Error::Config(format!(
                "unknown driver '{other}', expected single/sso or multi/mlo"
            ))),
        }
    }
}

pub const DEFAULT_PLATFORMS: &[&str] = &["web", "h5", "pc", "app", "wx_mini", "ali_mini", "tt_mini"];

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub driver: Driver,
    pub storage: String,
    pub storage_prefix: String,
    pub storage_limit: usize,
    /// Keep a session record per issued token.
    pub blacklist_enabled: bool,
    pub refresh_enabled: bool,
    /// Whether a token may be refreshed before it has expired.
    pub allow_early_refresh: bool,
    pub ttl_minutes: u64,
    /// Refresh window after `exp`.
    pub refresh_ttl_minutes: u64,
    pub algo: String,
    pub secret: Option<String>,
    pub public_key: Option<String>,
    pub private_key: Option<String>,
    pub private_key_passphrase: Option<String>,
    pub leeway_secs: u64,
    /// Maintain the per-user jti index under the multi-session driver.
    pub track_user_tokens: bool,
    pub platforms: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            driver: Driver::Single,
            storage: "memory".to_string(),
            storage_prefix: "jwt:".to_string(),
            storage_limit: 10_000,
            blacklist_enabled: true,
            refresh_enabled: true,
            allow_early_refresh: true,
            ttl_minutes: 60,
            refresh_ttl_minutes: 20_160,
            algo: "HS256".to_string(),
            secret: None,
            public_key: None,
            private_key: None,
            private_key_passphrase: None,
            leeway_secs: 0,
            track_user_tokens: false,
            platforms: DEFAULT_PLATFORMS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl fmt::Debug for GuardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardConfig")
            .field("driver", &self.driver)
            .field("storage", &self.storage)
            .field("storage_prefix", &self.storage_prefix)
            .field("storage_limit", &self.storage_limit)
            .field("blacklist_enabled", &self.blacklist_enabled)
            .field("refresh_enabled", &self.refresh_enabled)
            .field("allow_early_refresh", &self.allow_early_refresh)
            .field("ttl_minutes", &self.ttl_minutes)
            .field("refresh_ttl_minutes", &self.refresh_ttl_minutes)
            .field("algo", &self.algo)
            .field("leeway_secs", &self.leeway_secs)
            .field("track_user_tokens", &self.track_user_tokens)
            .field("platforms", &self.platforms)
            .finish_non_exhaustive()
    }
}

impl GuardConfig {
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_driver(mut self, driver: Driver) -> Self {
        self.driver = driver;
        self
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_minutes.saturating_mul(60)
    }

    /// Zero when refresh is disabled.
    pub fn refresh_ttl_secs(&self) -> u64 {
        if self.refresh_enabled {
            self.refresh_ttl_minutes.saturating_mul(60)
        } else {
            0
        }
    }

    pub fn signing(&self) -> SigningConfig {
        SigningConfig {
            algorithm: self.algo.clone(),
            secret: self.secret.clone(),
            private_key: self.private_key.clone(),
            public_key: self.public_key.clone(),
            private_key_passphrase: self.private_key_passphrase.clone(),
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            prefix: self.storage_prefix.clone(),
            limit: self.storage_limit,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.ttl_minutes == 0 {
            return Err(Error::Config("ttl_minutes must be > 0".into()));
        }
        if self.platforms.is_empty() {
            return Err(Error::Config("platforms must not be empty".into()));
        }
        if self.platforms.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::Config("platform names must not be blank".into()));
        }
        Ok(())
    }

    /// Builds a config from `JWT_*` variables via `lookup`. Unset variables keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = GuardConfig::default();
        if let Some(v) = lookup("JWT_DRIVER") {
            config.driver = v.parse()?;
        }
        if let Some(v) = lookup("JWT_STORAGE") {
            config.storage = v;
        }
        if let Some(v) = lookup("JWT_STORAGE_PREFIX") {
            config.storage_prefix = v;
        }
        if let Some(v) = lookup("JWT_STORAGE_LIMIT") {
            config.storage_limit = parse_var("JWT_STORAGE_LIMIT", &v)?;
        }
        if let Some(v) = lookup("JWT_BLACKLIST_ENABLED") {
            config.blacklist_enabled = parse_flag("JWT_BLACKLIST_ENABLED", &v)?;
        }
        if let Some(v) = lookup("JWT_REFRESH_ENABLED") {
            config.refresh_enabled = parse_flag("JWT_REFRESH_ENABLED", &v)?;
        }
        if let Some(v) = lookup("JWT_ALLOW_EARLY_REFRESH") {
            config.allow_early_refresh = parse_flag("JWT_ALLOW_EARLY_REFRESH", &v)?;
        }
        if let Some(v) = lookup("JWT_TTL") {
            config.ttl_minutes = parse_var("JWT_TTL", &v)?;
        }
        if let Some(v) = lookup("JWT_REFRESH_TTL") {
            config.refresh_ttl_minutes = parse_var("JWT_REFRESH_TTL", &v)?;
        }
        if let Some(v) = lookup("JWT_ALGO") {
            config.algo = v;
        }
        config.secret = lookup("JWT_SECRET").or(config.secret);
        config.public_key = lookup("JWT_PUBLIC_KEY").or(config.public_key);
        config.private_key = lookup("JWT_PRIVATE_KEY").or(config.private_key);
        config.private_key_passphrase = lookup("JWT_PASSPHRASE").or(config.private_key_passphrase);
        if let Some(v) = lookup("JWT_LEEWAY") {
            config.leeway_secs = parse_var("JWT_LEEWAY", &v)?;
        }
        if let Some(v) = lookup("JWT_TRACK_USER_TOKENS") {
            config.track_user_tokens = parse_flag("JWT_TRACK_USER_TOKENS", &v)?;
        }
        if let Some(v) = lookup("JWT_PLATFORMS") {
            config.platforms = v
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }
        Ok(config)
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T, Error> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("Invalid {name} env var: '{value}'")))
}

fn parse_flag(name: &str, value: &str) -> Result<bool, Error> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("Invalid {name} env var: '{value}'"))),
    }
}

/// Loads and validates a [`GuardConfig`].
pub async fn read_config(loc: ConfigLocation) -> Result<GuardConfig, Error> {
    let config = match loc {
        ConfigLocation::File(path) => {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str(&contents)?
        }
        ConfigLocation::Env => GuardConfig::from_lookup(|name| std::env::var(name).ok())?,
        ConfigLocation::Secret => read_config_from_secret().await?,
    };
    config.validate()?;
    Ok(config)
}

async fn read_config_from_secret() -> Result<GuardConfig, Error> {
    let secret_arn = std::env::var("JWT_CONFIG_SECRET_ARN")
        .map_err(|_| Error::Config("Missing JWT_CONFIG_SECRET_ARN env var".to_string()))?;
    let client = aws_sdk_secretsmanager::Client::new(
        &aws_config::load_defaults(BehaviorVersion::latest()).await,
    );
    let resp = client
        .get_secret_value()
        .secret_id(secret_arn)
        .send()
        .await
        .map_err(|e| Error::Config(format!("Failed to get secret: {}", e)))?;
    let secret = resp
        .secret_string()
        .ok_or_else(|| Error::Config("Failed to get secret string, returned None".to_string()))?;
    Ok(serde_json::from_str(secret)?)
}
