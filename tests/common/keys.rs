use std::sync::OnceLock;

use pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;

pub const PASSPHRASE: &str = "test-pass";

pub struct RsaFixture {
    pub key: RsaPrivateKey,
    pub private_pem: String,
    pub public_pem: String,
    pub encrypted_pem: String,
}

/// One 2048-bit key per test binary; generation is slow.
pub fn rsa() -> &'static RsaFixture {
    static KEY: OnceLock<RsaFixture> = OnceLock::new();
    KEY.get_or_init(|| {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).expect("keygen");
        let private_pem = key.to_pkcs8_pem(LineEnding::LF).expect("pkcs8 pem").to_string();
        let public_pem = key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .expect("spki pem");
        let encrypted_pem = key
            .to_pkcs8_encrypted_pem(&mut rng, PASSPHRASE, LineEnding::LF)
            .expect("encrypted pem")
            .to_string();
        RsaFixture {
            key,
            private_pem,
            public_pem,
            encrypted_pem,
        }
    })
}
