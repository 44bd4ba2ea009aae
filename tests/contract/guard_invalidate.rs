use jwt_sessions::{Error, GuardConfig, LifecycleEvent};

use crate::common::harness::{self, Harness};

#[tokio::test(flavor = "current_thread")]
async fn invalidate_then_authenticate_is_blacklisted() {
    let h = harness::single();
    let payload = h.guard.payload("web").with_uid(1);
    let issued = h.guard.issue(payload.clone()).await.unwrap();
    assert!(h.guard.invalidate(&issued.token).await);
    let err = h.guard.authenticate(&issued.token).await.unwrap_err();
    assert!(matches!(err, Error::Blacklisted { ref jti } if *jti == payload.jti));
    assert!(!h.guard.can_refresh(&issued.token).await);
}

#[tokio::test(flavor = "current_thread")]
async fn invalidate_is_idempotent() {
    let h = harness::single();
    let issued = h.guard.issue(h.guard.payload("web")).await.unwrap();
    assert!(h.guard.invalidate(&issued.token).await);
    assert!(h.guard.invalidate(&issued.token).await);
    assert_eq!(h.event_names(), vec!["token.issued", "token.revoked"]);
}

#[tokio::test(flavor = "current_thread")]
async fn invalidate_rejects_garbage_without_raising() {
    let h = harness::single();
    assert!(!h.guard.invalidate("").await);
    assert!(!h.guard.invalidate("not.a.token").await);
    let other = Harness::new(GuardConfig::default().with_secret("other"));
    let foreign = other.guard.issue(other.guard.payload("web")).await.unwrap();
    assert!(!h.guard.invalidate(&foreign.token).await);
    assert_eq!(h.event_names(), Vec::<&str>::new());
}

#[tokio::test(flavor = "current_thread")]
async fn expired_token_can_still_be_logged_out() {
    let h = Harness::new(GuardConfig {
        ttl_minutes: 1,
        refresh_ttl_minutes: 5,
        ..harness::hs256()
    });
    let issued = h.guard.issue(h.guard.payload("web")).await.unwrap();
    h.clock.advance(120);
    assert!(h.guard.invalidate(&issued.token).await);
    let err = h.guard.refresh(&issued.token).await.unwrap_err();
    assert!(matches!(err, Error::Blacklisted { .. }));
}

#[tokio::test(flavor = "current_thread")]
async fn revoked_event_names_the_reason() {
    let h = harness::single();
    let issued = h.guard.issue(h.guard.payload("web")).await.unwrap();
    h.guard.invalidate(&issued.token).await;
    match h.events().last() {
        Some(LifecycleEvent::Revoked { reason, jti, payload }) => {
            assert_eq!(reason, "Token invalidated by user");
            assert_eq!(jti, &payload.jti);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}
