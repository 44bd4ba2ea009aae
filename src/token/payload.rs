use std::collections::BTreeSet;
use std::fmt;

use jiff::Timestamp;
use serde::de::Error as _;
use serde::ser::SerializeMap as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::errors::{Error, Result};

/// Reserved custom-claims slot carrying an opaque (typically encrypted) string.
pub const ENCRYPTED_DATA: &str = "encrypted_data";

/// Account identifier; numeric ids and string ids (snowflake ids, UUIDs) are both common.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Uid {
    Int(i64),
    Str(String),
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Uid::Int(id) => write!(f, "{id}"),
            Uid::Str(id) => f.write_str(id),
        }
    }
}

impl From<i64> for Uid {
    fn from(id: i64) -> Self {
        Uid::Int(id)
    }
}

impl From<i32> for Uid {
    fn from(id: i32) -> Self {
        Uid::Int(id as i64)
    }
}

impl From<u32> for Uid {
    fn from(id: u32) -> Self {
        Uid::Int(id as i64)
    }
}

impl From<String> for Uid {
    fn from(id: String) -> Self {
        Uid::Str(id)
    }
}

impl From<&str> for Uid {
    fn from(id: &str) -> Self {
        Uid::Str(id.to_string())
    }
}

/// Application-defined claims: either a free-form map or one opaque string.
#[derive(Clone, Debug, PartialEq)]
pub enum CustomClaims {
    Structured(Map<String, Value>),
    Opaque(String),
}

impl Default for CustomClaims {
    fn default() -> Self {
        CustomClaims::Structured(Map::new())
    }
}

impl CustomClaims {
    pub fn is_empty(&self) -> bool {
        matches!(self, CustomClaims::Structured(map) if map.is_empty())
    }

    /// Looks up a structured field. Opaque claims have no fields.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            CustomClaims::Structured(map) => map.get(key),
            CustomClaims::Opaque(_) => None,
        }
    }

    pub fn opaque(&self) -> Option<&str> {
        match self {
            CustomClaims::Opaque(data) => Some(data),
            CustomClaims::Structured(_) => None,
        }
    }
}

impl Serialize for CustomClaims {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            CustomClaims::Structured(map) => map.serialize(serializer),
            CustomClaims::Opaque(data) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(ENCRYPTED_DATA, data)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for CustomClaims {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(CustomClaims::default()),
            // Some issuers serialize an empty map as an empty list.
            Value::Array(items) if items.is_empty() => Ok(CustomClaims::default()),
            Value::Object(map) => {
                if map.len() == 1
                    && let Some(Value::String(data)) = map.get(ENCRYPTED_DATA)
                {
                    return Ok(CustomClaims::Opaque(data.clone()));
                }
                Ok(CustomClaims::Structured(map))
            }
            other => Err(D::Error::custom(format!(
                "custom claims must be an object, got {other}"
            ))),
        }
    }
}

/// `now + secs`, clamped at the far end of the timeline.
pub(crate) fn after(now: i64, secs: u64) -> i64 {
    now.saturating_add(i64::try_from(secs).unwrap_or(i64::MAX))
}

/// The claims carried by every token. Never modified after issue; refresh derives a new one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub platform: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    pub jti: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perms: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "CustomClaims::is_empty")]
    pub custom: CustomClaims,
}

impl Payload {
    /// Creates a payload with a freshly minted jti.
    pub fn new(platform: impl Into<String>, iat: i64, exp: i64) -> Self {
        Self {
            uid: None,
            username: None,
            platform: platform.into(),
            exp,
            iat,
            nbf: None,
            jti: mint_jti(),
            roles: None,
            perms: None,
            custom: CustomClaims::default(),
        }
    }

    /// Payload valid from `now` for `ttl_secs` seconds.
    pub fn for_ttl(platform: impl Into<String>, now: i64, ttl_secs: u64) -> Self {
        Self::new(platform, now, after(now, ttl_secs))
    }

    pub fn with_uid(mut self, uid: impl Into<Uid>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_jti(mut self, jti: impl Into<String>) -> Self {
        self.jti = jti.into();
        self
    }

    pub fn with_not_before(mut self, nbf: i64) -> Self {
        self.nbf = Some(nbf);
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_perms<I, S>(mut self, perms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.perms = Some(perms.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_custom(mut self, custom: Map<String, Value>) -> Self {
        self.custom = CustomClaims::Structured(custom);
        self
    }

    pub fn with_encrypted_data(mut self, data: impl Into<String>) -> Self {
        self.custom = CustomClaims::Opaque(data.into());
        self
    }

    /// Same identity and grants, new jti/iat/exp. `nbf` is not carried over.
    pub fn renewed(&self, now: i64, ttl_secs: u64) -> Self {
        Self {
            uid: self.uid.clone(),
            username: self.username.clone(),
            platform: self.platform.clone(),
            exp: after(now, ttl_secs),
            iat: now,
            nbf: None,
            jti: mint_jti(),
            roles: self.roles.clone(),
            perms: self.perms.clone(),
            custom: self.custom.clone(),
        }
    }

    /// Checks the invariants an issuable payload must hold.
    pub fn validate(&self) -> Result<()> {
        if self.platform.is_empty() {
            return Err(Error::MissingClaim("platform"));
        }
        if self.jti.is_empty() {
            return Err(Error::MissingClaim("jti"));
        }
        if self.exp <= self.iat {
            return Err(Error::InvalidClaim(format!(
                "exp ({}) must be after iat ({})",
                self.exp, self.iat
            )));
        }
        if let CustomClaims::Structured(map) = &self.custom
            && map.len() == 1
            && map.get(ENCRYPTED_DATA).is_some_and(Value::is_string)
        {
            return Err(Error::InvalidClaim(format!(
                "a custom map holding only a string '{ENCRYPTED_DATA}' is reserved for encrypted data"
            )));
        }
        Ok(())
    }

    /// Builds a payload from verified claims, requiring platform/exp/iat/jti.
    pub fn from_claims(claims: &Map<String, Value>) -> Result<Self> {
        for field in ["platform", "exp", "iat", "jti"] {
            match claims.get(field) {
                None | Some(Value::Null) => return Err(Error::MissingClaim(field)),
                Some(Value::String(s)) if s.is_empty() => return Err(Error::MissingClaim(field)),
                _ => {}
            }
        }
        serde_json::from_value(Value::Object(claims.clone()))
            .map_err(|e| Error::InvalidClaim(e.to_string()))
    }

    pub fn to_claims(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::InvalidClaim(format!(
                "payload serialized to non-object {other}"
            ))),
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now > self.exp
    }

    /// Seconds left before `exp`, zero once expired.
    pub fn remaining_ttl(&self, now: i64) -> u64 {
        self.exp.saturating_sub(now).max(0) as u64
    }

    pub fn expires_at(&self) -> Option<Timestamp> {
        Timestamp::from_second(self.exp).ok()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.as_ref().is_some_and(|roles| roles.contains(role))
    }

    pub fn has_permission(&self, perm: &str) -> bool {
        self.perms.as_ref().is_some_and(|perms| perms.contains(perm))
    }

    /// `"{uid}:{platform}"`, with an empty uid when none is set.
    pub fn user_identifier(&self) -> String {
        let uid = self.uid.as_ref().map(Uid::to_string).unwrap_or_default();
        format!("{}:{}", uid, self.platform)
    }

    pub fn encrypted_data(&self) -> Option<&str> {
        self.custom.opaque()
    }
}

fn mint_jti() -> String {
    Uuid::new_v4().to_string()
}
