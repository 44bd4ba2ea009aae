use std::fmt;

/// Whether an expired token can still be exchanged through `refresh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryKind {
    /// Inside the refresh window; callers should attempt a refresh.
    Refreshable,
    /// Past the refresh window (or refresh disabled); callers must re-authenticate.
    Terminal,
}

impl fmt::Display for ExpiryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpiryKind::Refreshable => write!(f, "refreshable"),
            ExpiryKind::Terminal => write!(f, "terminal"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("key error: {0}")]
    Key(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("storage error: {0}")]
    Storage(String),

    #[error("malformed token: {0}")]
    MalformedToken(String),
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("missing key material: {0}")]
    MissingKeyMaterial(&'static str),
    #[error("missing required claim: {0}")]
    MissingClaim(&'static str),
    #[error("invalid claim: {0}")]
    InvalidClaim(String),
    #[error("token {jti} expired at {expired_at} ({kind})")]
    Expired {
        jti: String,
        expired_at: i64,
        kind: ExpiryKind,
    },
    #[error("token is not valid before {not_before}")]
    NotYetValid { not_before: i64 },
    #[error("token issued in the future ({issued_at})")]
    IssuedInFuture { issued_at: i64 },
    #[error("token {jti} has been blacklisted")]
    Blacklisted { jti: String },
    #[error("token {jti} cannot be refreshed")]
    NotRefreshable { jti: String },
    #[error("token is not unique for uid '{uid}' on platform '{platform}'")]
    NotUnique { uid: String, platform: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for errors a transport should answer with "unauthorized".
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Error::MalformedToken(_)
                | Error::InvalidSignature
                | Error::UnsupportedAlgorithm(_)
                | Error::MissingClaim(_)
                | Error::InvalidClaim(_)
                | Error::Expired { .. }
                | Error::NotYetValid { .. }
                | Error::IssuedInFuture { .. }
                | Error::Blacklisted { .. }
        )
    }

    /// True when the token expired but is still inside its refresh window.
    pub fn is_refreshable(&self) -> bool {
        matches!(
            self,
            Error::Expired {
                kind: ExpiryKind::Refreshable,
                ..
            }
        )
    }
}
