//! Logical key layout shared by every backend.
//!
//! `uid` and `platform` are percent-encoded so a `:` inside either cannot collide with
//! another identity. A missing uid renders as the empty string.

use urlencoding::encode;

use crate::token::Uid;

pub fn token_key(jti: &str) -> String {
    format!("token:{jti}")
}

pub fn blacklist_key(jti: &str) -> String {
    format!("blacklist:{jti}")
}

pub fn sso_key(uid: Option<&Uid>, platform: &str) -> String {
    format!("sso:{}:{}", uid_component(uid), encode(platform))
}

pub fn user_tokens_key(uid: Option<&Uid>, platform: &str) -> String {
    format!("user:{}:{}:tokens", uid_component(uid), encode(platform))
}

fn uid_component(uid: Option<&Uid>) -> String {
    uid.map(|uid| encode(&uid.to_string()).into_owned())
        .unwrap_or_default()
}
