use jwt_sessions::{Error, Payload, SessionRecord, TokenCodec};

use crate::common::harness::{self, START};

#[tokio::test(flavor = "current_thread")]
async fn authenticate_right_after_issue_returns_equal_payload() {
    let h = harness::single();
    let payload = h.guard.payload("app").with_uid(7).with_roles(["admin"]);
    let issued = h.guard.issue(payload.clone()).await.unwrap();
    assert_eq!(h.guard.authenticate(&issued.token).await.unwrap(), payload);
}

#[tokio::test(flavor = "current_thread")]
async fn issue_writes_session_record_with_remaining_ttl() {
    let h = harness::multi(false);
    let payload = Payload::new("web", START, START + 100);
    let issued = h.guard.issue(payload.clone()).await.unwrap();
    assert_eq!(issued.expires_in, 100);

    let record: SessionRecord = h.guard.token_info(&payload.jti).await.unwrap().unwrap();
    assert_eq!(record.token, issued.token);
    h.clock.advance(101);
    assert!(h.guard.token_info(&payload.jti).await.unwrap().is_none());
}

#[tokio::test(flavor = "current_thread")]
async fn issue_rejects_broken_payloads() {
    let h = harness::single();
    let err = h
        .guard
        .issue(Payload::new("", START, START + 10))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingClaim("platform")));

    let err = h
        .guard
        .issue(Payload::new("web", START, START))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidClaim(_)));

    let mut custom = serde_json::Map::new();
    custom.insert("encrypted_data".into(), serde_json::json!("x"));
    let err = h
        .guard
        .issue(h.guard.payload("web").with_custom(custom))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidClaim(_)));
    assert!(h.events().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn custom_claims_survive_authenticate() {
    let h = harness::single();
    let mut custom = serde_json::Map::new();
    custom.insert("encrypted_data".into(), serde_json::json!(["x"]));
    let structured = h.guard.payload("web").with_custom(custom);
    let opaque = h.guard.payload("app").with_encrypted_data("x");
    for payload in [structured, opaque] {
        let issued = h.guard.issue(payload.clone()).await.unwrap();
        assert_eq!(h.guard.authenticate(&issued.token).await.unwrap(), payload);
    }
}

#[tokio::test(flavor = "current_thread")]
async fn issued_token_has_compact_jwt_shape() {
    let h = harness::single();
    let issued = h.guard.issue(h.guard.payload("pc")).await.unwrap();
    assert_eq!(issued.token.split('.').count(), 3);
    assert!(!issued.token.contains('='));
    let decoded = TokenCodec::decode(&issued.token).unwrap();
    assert_eq!(decoded.header.typ, "JWT");
    assert_eq!(decoded.header.alg, "HS256");
    assert_eq!(h.event_names(), vec!["token.issued"]);
}

#[tokio::test(flavor = "current_thread")]
async fn already_expired_payload_issues_without_record() {
    let h = harness::single();
    let payload = Payload::new("web", START - 100, START - 10);
    let issued = h.guard.issue(payload.clone()).await.unwrap();
    assert_eq!(issued.expires_in, 0);
    assert!(h.guard.token_info(&payload.jti).await.unwrap().is_none());
}
