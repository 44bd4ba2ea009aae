//! Compact token encoding/decoding and signature dispatch.

use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{DecodingKey, EncodingKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::errors::{Error, Result};

use super::Payload;
use super::keys;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    HS256,
    HS384,
    HS512,
    RS256,
    RS384,
    RS512,
}

/// Key family of an algorithm. Verification never crosses families.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlgorithmFamily {
    Hmac,
    Rsa,
}

impl SignatureAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::HS256 => "HS256",
            SignatureAlgorithm::HS384 => "HS384",
            SignatureAlgorithm::HS512 => "HS512",
            SignatureAlgorithm::RS256 => "RS256",
            SignatureAlgorithm::RS384 => "RS384",
            SignatureAlgorithm::RS512 => "RS512",
        }
    }

    pub fn family(&self) -> AlgorithmFamily {
        match self {
            SignatureAlgorithm::HS256 | SignatureAlgorithm::HS384 | SignatureAlgorithm::HS512 => {
                AlgorithmFamily::Hmac
            }
            SignatureAlgorithm::RS256 | SignatureAlgorithm::RS384 | SignatureAlgorithm::RS512 => {
                AlgorithmFamily::Rsa
            }
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "HS256" => Ok(SignatureAlgorithm::HS256),
            "HS384" => Ok(SignatureAlgorithm::HS384),
            "HS512" => Ok(SignatureAlgorithm::HS512),
            "RS256" => Ok(SignatureAlgorithm::RS256),
            "RS384" => Ok(SignatureAlgorithm::RS384),
            "RS512" => Ok(SignatureAlgorithm::RS512),
            other => Err(Error::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

impl From<SignatureAlgorithm> for jsonwebtoken::Algorithm {
    fn from(alg: SignatureAlgorithm) -> Self {
        match alg {
            SignatureAlgorithm::HS256 => jsonwebtoken::Algorithm::HS256,
            SignatureAlgorithm::HS384 => jsonwebtoken::Algorithm::HS384,
            SignatureAlgorithm::HS512 => jsonwebtoken::Algorithm::HS512,
            SignatureAlgorithm::RS256 => jsonwebtoken::Algorithm::RS256,
            SignatureAlgorithm::RS384 => jsonwebtoken::Algorithm::RS384,
            SignatureAlgorithm::RS512 => jsonwebtoken::Algorithm::RS512,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub typ: String,
    pub alg: String,
}

impl Header {
    pub fn new(alg: SignatureAlgorithm) -> Self {
        Self {
            typ: "JWT".to_string(),
            alg: alg.as_str().to_string(),
        }
    }
}

/// A token split into its parts. Nothing in here is trusted until verified.
#[derive(Clone, Debug)]
pub struct DecodedToken {
    pub header: Header,
    pub claims: Map<String, Value>,
    /// `header.claims` exactly as it appeared in the token.
    pub signed_part: String,
    /// base64url signature segment.
    pub signature: String,
}

/// Algorithm and key material. Keys are inline PEM or a path to a PEM file.
#[derive(Clone, Default)]
pub struct SigningConfig {
    pub algorithm: String,
    pub secret: Option<String>,
    pub private_key: Option<String>,
    pub public_key: Option<String>,
    pub private_key_passphrase: Option<String>,
}

impl fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningConfig")
            .field("algorithm", &self.algorithm)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("public_key", &self.public_key.is_some())
            .finish()
    }
}

/// Signs and verifies tokens for one configured algorithm.
pub struct TokenCodec {
    algorithm: SignatureAlgorithm,
    encoding: Option<EncodingKey>,
    decoding: Option<DecodingKey>,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .field("can_sign", &self.encoding.is_some())
            .field("can_verify", &self.decoding.is_some())
            .finish()
    }
}

impl TokenCodec {
    /// Parses the algorithm and loads whatever key material is present.
    ///
    /// Absent keys are not an error here; `encode`/`verify` report them as
    /// `MissingKeyMaterial` when the operation needs them. For RSA, a missing
    /// public key is derived from the private key.
    pub fn new(config: &SigningConfig) -> Result<Self> {
        let algorithm: SignatureAlgorithm = config.algorithm.parse()?;
        let (encoding, decoding) = match algorithm.family() {
            AlgorithmFamily::Hmac => {
                let secret = non_empty(config.secret.as_deref());
                (
                    secret.map(|s| EncodingKey::from_secret(s.as_bytes())),
                    secret.map(|s| DecodingKey::from_secret(s.as_bytes())),
                )
            }
            AlgorithmFamily::Rsa => {
                let private = match non_empty(config.private_key.as_deref()) {
                    Some(source) => {
                        let pem = keys::read_pem_source(source)?;
                        Some(keys::load_rsa_private_key_from_pem(
                            &pem,
                            config.private_key_passphrase.as_deref(),
                        )?)
                    }
                    None => None,
                };
                let public = match non_empty(config.public_key.as_deref()) {
                    Some(source) => {
                        let pem = keys::read_pem_source(source)?;
                        Some(keys::load_rsa_public_key_from_pem(&pem)?)
                    }
                    None => private.as_ref().map(|key| key.to_public_key()),
                };
                (
                    private.as_ref().map(keys::rsa_encoding_key).transpose()?,
                    public.as_ref().map(keys::rsa_decoding_key).transpose()?,
                )
            }
        };
        Ok(Self {
            algorithm,
            encoding,
            decoding,
        })
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    pub fn encode(&self, payload: &Payload) -> Result<String> {
        self.encode_claims(&payload.to_claims()?)
    }

    /// Signs an arbitrary claims object. `exp` is mandatory.
    pub fn encode_claims(&self, claims: &Map<String, Value>) -> Result<String> {
        if matches!(claims.get("exp"), None | Some(Value::Null)) {
            return Err(Error::MissingClaim("exp"));
        }
        let key = self.encoding.as_ref().ok_or(match self.algorithm.family() {
            AlgorithmFamily::Hmac => Error::MissingKeyMaterial("secret"),
            AlgorithmFamily::Rsa => Error::MissingKeyMaterial("private_key"),
        })?;

        let header = encode_segment(&serde_json::to_vec(&Header::new(self.algorithm))?);
        let body = encode_segment(&serde_json::to_vec(claims)?);
        let signed_part = format!("{header}.{body}");
        let signature =
            jsonwebtoken::crypto::sign(signed_part.as_bytes(), key, self.algorithm.into())
                .map_err(|e| Error::Signing(format!("{} signing failed: {e}", self.algorithm)))?;
        Ok(format!("{signed_part}.{signature}"))
    }

    /// Splits and parses a token without checking its signature.
    pub fn decode(token: &str) -> Result<DecodedToken> {
        let parts: Vec<&str> = token.split('.').collect();
        let [header_b64, claims_b64, signature_b64] = parts.as_slice() else {
            return Err(Error::MalformedToken(format!(
                "expected 3 segments, got {}",
                parts.len()
            )));
        };

        let header: Value = decode_json_segment(header_b64, "header")?;
        let header: Header = serde_json::from_value(header)
            .map_err(|e| Error::MalformedToken(format!("header: {e}")))?;
        let claims = match decode_json_segment(claims_b64, "claims")? {
            Value::Object(map) => map,
            _ => return Err(Error::MalformedToken("claims must be a JSON object".into())),
        };
        let signature = signature_b64.trim_end_matches('=');
        decode_segment(signature, "signature")?;

        Ok(DecodedToken {
            header,
            claims,
            signed_part: format!("{header_b64}.{claims_b64}"),
            signature: signature.to_string(),
        })
    }

    pub fn verify(&self, decoded: &DecodedToken) -> Result<()> {
        self.verify_parts(&decoded.signed_part, &decoded.signature, &decoded.header.alg)
    }

    /// Checks `signature` over `signed_part` using the token's `alg`, which must
    /// belong to the configured family.
    pub fn verify_parts(&self, signed_part: &str, signature: &str, alg: &str) -> Result<()> {
        let claimed: SignatureAlgorithm = alg.parse()?;
        if claimed.family() != self.algorithm.family() {
            warn!(
                configured = %self.algorithm,
                claimed = %claimed,
                "token.algorithm_mismatch"
            );
            return Err(Error::InvalidSignature);
        }
        let key = self.decoding.as_ref().ok_or(match self.algorithm.family() {
            AlgorithmFamily::Hmac => Error::MissingKeyMaterial("secret"),
            AlgorithmFamily::Rsa => Error::MissingKeyMaterial("public_key"),
        })?;
        match jsonwebtoken::crypto::verify(signature, signed_part.as_bytes(), key, claimed.into()) {
            Ok(true) => Ok(()),
            Ok(false) | Err(_) => Err(Error::InvalidSignature),
        }
    }

    /// `decode` followed by `verify`.
    pub fn decode_verified(&self, token: &str) -> Result<DecodedToken> {
        let decoded = Self::decode(token)?;
        self.verify(&decoded)?;
        Ok(decoded)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn encode_segment(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

fn decode_segment(segment: &str, part: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| Error::MalformedToken(format!("{part} is not base64url: {e}")))
}

fn decode_json_segment(segment: &str, part: &str) -> Result<Value> {
    let bytes = decode_segment(segment, part)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::MalformedToken(format!("{part} is not JSON: {e}")))
}
