use jwt_sessions::{Error, GuardConfig, LifecycleEvent};

use crate::common::harness::{self, Harness};

#[tokio::test(flavor = "current_thread")]
async fn revoke_user_tokens_revokes_everything_for_that_user() {
    let h = harness::multi(true);
    let mut tokens = Vec::new();
    for platform in ["web", "app", "app"] {
        tokens.push(
            h.guard
                .issue(h.guard.payload(platform).with_uid(7))
                .await
                .unwrap()
                .token,
        );
    }
    let bystander = h
        .guard
        .issue(h.guard.payload("app").with_uid(8))
        .await
        .unwrap();

    let manager = h.manager();
    assert_eq!(manager.revoke_user_tokens(7, None).await.unwrap(), 3);
    for token in &tokens {
        assert!(matches!(
            h.guard.authenticate(token).await,
            Err(Error::Blacklisted { .. })
        ));
    }
    assert!(h.guard.authenticate(&bystander.token).await.is_ok());
    assert_eq!(manager.user_total_token_count(7).await.unwrap(), 0);
    assert_eq!(manager.revoke_user_tokens(7, None).await.unwrap(), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn revoke_on_one_platform_leaves_the_rest() {
    let h = harness::single();
    let web = h
        .guard
        .issue(h.guard.payload("web").with_uid(7))
        .await
        .unwrap();
    let app = h
        .guard
        .issue(h.guard.payload("app").with_uid(7))
        .await
        .unwrap();
    let manager = h.manager();
    assert_eq!(manager.revoke_user_tokens(7, Some("app")).await.unwrap(), 1);
    assert!(manager.is_token_valid(&web.token).await);
    assert!(!manager.is_token_valid(&app.token).await);
}

#[tokio::test(flavor = "current_thread")]
async fn revoke_blacklists_jtis_whose_record_is_gone() {
    let h = Harness::new(GuardConfig {
        blacklist_enabled: false,
        ..harness::hs256()
    });
    let issued = h
        .guard
        .issue(h.guard.payload("web").with_uid(7))
        .await
        .unwrap();
    let manager = h.manager();
    assert!(manager.user_tokens(7, Some("web")).await.unwrap().is_empty());
    assert_eq!(manager.user_token_count(7, "web").await.unwrap(), 1);

    assert_eq!(manager.revoke_user_tokens(7, Some("web")).await.unwrap(), 1);
    assert!(!manager.is_token_valid(&issued.token).await);
    // No record, so no payload to report.
    assert_eq!(h.event_names(), vec!["token.issued"]);
}

#[tokio::test(flavor = "current_thread")]
async fn revoke_emits_one_event_per_token() {
    let h = harness::multi(true);
    for _ in 0..2 {
        h.guard
            .issue(h.guard.payload("web").with_uid(7))
            .await
            .unwrap();
    }
    h.manager().revoke_user_tokens(7, Some("web")).await.unwrap();
    let revoked = h
        .events()
        .into_iter()
        .filter(|e| matches!(e, LifecycleEvent::Revoked { .. }))
        .count();
    assert_eq!(revoked, 2);
}

#[tokio::test(flavor = "current_thread")]
async fn clean_expired_and_stats_pass_through() {
    let h = Harness::new(GuardConfig {
        ttl_minutes: 1,
        refresh_ttl_minutes: 1,
        ..harness::hs256()
    });
    let issued = h
        .guard
        .issue(h.guard.payload("web").with_uid(7))
        .await
        .unwrap();
    h.guard.invalidate(&issued.token).await;
    let manager = h.manager();
    let stats = manager.stats().await.unwrap();
    assert_eq!(stats.backend, "memory");
    assert_eq!(stats.counter("blacklisted"), Some(1));

    h.clock.advance(10_000);
    assert!(manager.clean_expired().await.unwrap() >= 2);
    assert_eq!(manager.stats().await.unwrap().counter("entries"), Some(0));
}
