mod claims;
mod codec;
mod keys;
pub(crate) mod payload;

pub use claims::{ClaimValidator, ClaimViolation};
pub use codec::{
    AlgorithmFamily, DecodedToken, Header, SignatureAlgorithm, SigningConfig, TokenCodec,
};
pub use payload::{CustomClaims, ENCRYPTED_DATA, Payload, Uid};
