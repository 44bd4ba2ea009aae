//! RSA key material loading for the codec.

use std::path::Path;

use jsonwebtoken::{DecodingKey, EncodingKey};
use pkcs8::{DecodePrivateKey as _, DecodePublicKey as _};
use rsa::pkcs1::{
    DecodeRsaPrivateKey as _, DecodeRsaPublicKey as _, EncodeRsaPrivateKey as _,
    EncodeRsaPublicKey as _,
};
use tracing::debug;

use crate::errors::{Error, Result};

const PEM_MARKER: &str = "-----BEGIN";

/// Returns PEM text for a key given either inline or as a filesystem path.
pub(crate) fn read_pem_source(source: &str) -> Result<String> {
    let trimmed = source.trim_start();
    if trimmed.starts_with(PEM_MARKER) {
        return Ok(source.to_string());
    }
    let path = Path::new(source);
    if !path.is_file() {
        return Err(Error::Key(format!(
            "key is neither inline PEM nor a readable file: '{}'",
            source
        )));
    }
    debug!(path = %path.display(), "loading key material from file");
    Ok(std::fs::read_to_string(path)?)
}

pub(crate) fn load_rsa_private_key_from_pem(
    pem_str: &str,
    passphrase: Option<&str>,
) -> Result<rsa::RsaPrivateKey> {
    if let Ok(blocks) = pem::parse_many(pem_str.as_bytes()) {
        for block in &blocks {
            match block.tag() {
                "ENCRYPTED PRIVATE KEY" => {
                    let pass = passphrase.ok_or_else(|| {
                        Error::Key("Encrypted private key provided but no passphrase set".into())
                    })?;
                    return rsa::RsaPrivateKey::from_pkcs8_encrypted_der(block.contents(), pass)
                        .map_err(|e| Error::Key(format!("PKCS#8 decryption failed: {e}")));
                }
                "PRIVATE KEY" => {
                    return rsa::RsaPrivateKey::from_pkcs8_der(block.contents())
                        .map_err(|e| Error::Key(format!("PKCS#8 parse failed: {e}")));
                }
                "RSA PRIVATE KEY" => {
                    return rsa::RsaPrivateKey::from_pkcs1_der(block.contents())
                        .map_err(|e| Error::Key(format!("PKCS#1 parse failed: {e}")));
                }
                _ => continue,
            }
        }
    }

    Err(Error::Key(
        "Invalid RSA private key: unsupported format or incorrect passphrase".into(),
    ))
}

pub(crate) fn load_rsa_public_key_from_pem(pem_str: &str) -> Result<rsa::RsaPublicKey> {
    if let Ok(key) = rsa::RsaPublicKey::from_public_key_pem(pem_str) {
        return Ok(key);
    }
    if let Ok(key) = rsa::RsaPublicKey::from_pkcs1_pem(pem_str) {
        return Ok(key);
    }
    Err(Error::Key(
        "Invalid RSA public key: expected SPKI or PKCS#1 PEM".into(),
    ))
}

/// Signing key for the RS* family.
pub(crate) fn rsa_encoding_key(key: &rsa::RsaPrivateKey) -> Result<EncodingKey> {
    let pkcs1 = key
        .to_pkcs1_der()
        .map_err(|e| Error::Key(format!("PKCS#1 DER encode failed: {e}")))?;
    Ok(EncodingKey::from_rsa_der(pkcs1.as_bytes()))
}

/// Verification key for the RS* family.
pub(crate) fn rsa_decoding_key(key: &rsa::RsaPublicKey) -> Result<DecodingKey> {
    let pkcs1 = key
        .to_pkcs1_der()
        .map_err(|e| Error::Key(format!("PKCS#1 public DER encode failed: {e}")))?;
    Ok(DecodingKey::from_rsa_der(pkcs1.as_bytes()))
}
