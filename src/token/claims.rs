//! Temporal claim checks (`exp`, `nbf`, `iat`).

use serde_json::{Map, Value};

use crate::errors::{Error, ExpiryKind};

use super::Payload;

/// First temporal rule a set of claims broke.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClaimViolation {
    Missing(&'static str),
    NotNumeric(&'static str),
    Expired { exp: i64 },
    NotYetValid { nbf: i64 },
    IssuedInFuture { iat: i64 },
}

impl ClaimViolation {
    /// Lifts the violation into the crate error. `kind` only matters for `Expired`.
    pub fn into_error(self, jti: &str, kind: ExpiryKind) -> Error {
        match self {
            ClaimViolation::Missing(claim) => Error::MissingClaim(claim),
            ClaimViolation::NotNumeric(claim) => {
                Error::InvalidClaim(format!("{claim} must be an integer timestamp"))
            }
            ClaimViolation::Expired { exp } => Error::Expired {
                jti: jti.to_string(),
                expired_at: exp,
                kind,
            },
            ClaimViolation::NotYetValid { nbf } => Error::NotYetValid { not_before: nbf },
            ClaimViolation::IssuedInFuture { iat } => Error::IssuedInFuture { issued_at: iat },
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ClaimValidator {
    leeway: i64,
}

impl ClaimValidator {
    pub fn new(leeway_secs: u64) -> Self {
        Self {
            leeway: i64::try_from(leeway_secs).unwrap_or(i64::MAX),
        }
    }

    pub fn leeway(&self) -> u64 {
        self.leeway as u64
    }

    pub fn validate(&self, claims: &Map<String, Value>, now: i64) -> Result<(), ClaimViolation> {
        let exp = timestamp(claims, "exp")?.ok_or(ClaimViolation::Missing("exp"))?;
        let nbf = timestamp(claims, "nbf")?;
        let iat = timestamp(claims, "iat")?;
        self.check(exp, nbf, iat, now)
    }

    pub fn validate_payload(&self, payload: &Payload, now: i64) -> Result<(), ClaimViolation> {
        self.check(payload.exp, payload.nbf, Some(payload.iat), now)
    }

    fn check(
        &self,
        exp: i64,
        nbf: Option<i64>,
        iat: Option<i64>,
        now: i64,
    ) -> Result<(), ClaimViolation> {
        if now > exp.saturating_add(self.leeway) {
            return Err(ClaimViolation::Expired { exp });
        }
        if let Some(nbf) = nbf
            && now.saturating_add(self.leeway) < nbf
        {
            return Err(ClaimViolation::NotYetValid { nbf });
        }
        if let Some(iat) = iat
            && now.saturating_add(self.leeway) < iat
        {
            return Err(ClaimViolation::IssuedInFuture { iat });
        }
        Ok(())
    }
}

fn timestamp(
    claims: &Map<String, Value>,
    claim: &'static str,
) -> Result<Option<i64>, ClaimViolation> {
    match claims.get(claim) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or(ClaimViolation::NotNumeric(claim)),
    }
}
