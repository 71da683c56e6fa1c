//! Session resolution against an in-memory backend
//!
//! Covers the generation race between overlapping identity events, the
//! degradation table, and the run loop fed by an identity provider.

mod helpers;

use helpers::{identity, user, Endpoint, FakeBackend};
use phub_client::{ApiError, IdentityEvent, SessionResolver, StaticIdentityProvider};
use phub_common::{ClientEvent, DegradeReason, EventBus, SessionStatus};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_newest_identity_event_wins_over_slow_resolution() {
    let backend = FakeBackend::new();
    backend.add_user(user("u1", "First"));
    backend.add_user(user("u2", "Second"));

    let events = EventBus::default();
    let mut bus = events.subscribe();
    let resolver = Arc::new(SessionResolver::new(backend.clone(), events));
    let mut session = resolver.watch();

    let (provider, identity_events) = StaticIdentityProvider::new();
    let driver = tokio::spawn(Arc::clone(&resolver).run(identity_events));

    // first resolution hangs inside GET /users/me
    backend.sign_in_as("u1");
    let release = backend.gate_next(Endpoint::FetchCurrentUser);
    provider.sign_in(identity("u1"), None);
    backend.wait_for_calls(Endpoint::FetchCurrentUser, 1).await;

    backend.sign_in_as("u2");
    provider.sign_in(identity("u2"), None);

    let settled = session.settled_at(2).await.unwrap();
    assert_eq!(settled.status(), &SessionStatus::Authenticated);
    assert_eq!(settled.user().unwrap().uid(), "u2");

    // now let the stale resolution finish
    release.send(()).unwrap();
    let discarded = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let ClientEvent::StaleResolutionDiscarded { generation, current, .. } =
                bus.recv().await.unwrap()
            {
                return (generation, current);
            }
        }
    })
    .await
    .expect("stale resolution was not discarded");
    assert_eq!(discarded, (1, 2));

    let current = resolver.current();
    assert_eq!(current.generation(), 2);
    assert_eq!(current.user().unwrap().uid(), "u2");
    assert_eq!(current.user().unwrap().display_name(), "Second");

    driver.abort();
}

#[tokio::test]
async fn test_sign_out_during_resolution_stays_signed_out() {
    let backend = FakeBackend::new();
    backend.add_user(user("u1", "First"));
    backend.sign_in_as("u1");
    let release = backend.gate_next(Endpoint::FetchCurrentUser);

    let resolver = Arc::new(SessionResolver::new(backend.clone(), EventBus::default()));
    let pending = {
        let resolver = Arc::clone(&resolver);
        tokio::spawn(async move { resolver.handle(IdentityEvent::SignedIn(identity("u1"))).await })
    };
    backend.wait_for_calls(Endpoint::FetchCurrentUser, 1).await;
    assert!(resolver.current().is_loading());

    resolver.sign_out().await;
    release.send(()).unwrap();

    assert!(!pending.await.unwrap(), "stale resolution must not commit");
    let session = resolver.current();
    assert_eq!(session.status(), &SessionStatus::Unauthenticated);
    assert!(session.user().is_none());
}

#[tokio::test]
async fn test_every_failure_leaves_a_usable_user() {
    let cases = vec![
        (
            vec![
                (Endpoint::FetchCurrentUser, ApiError::NotFound("User not found".to_string())),
                (
                    Endpoint::CreateUser,
                    ApiError::ValidationError("duplicate email".to_string()),
                ),
            ],
            DegradeReason::ProfileCreationFailed,
        ),
        (
            vec![(
                Endpoint::FetchCurrentUser,
                ApiError::ServerUnavailable("Internal Server Error".to_string()),
            )],
            DegradeReason::ServerUnavailable,
        ),
        (
            vec![(
                Endpoint::FetchCurrentUser,
                ApiError::NetworkUnreachable("connection refused".to_string()),
            )],
            DegradeReason::Offline,
        ),
        (
            vec![(
                Endpoint::FetchCurrentUser,
                ApiError::Unknown {
                    status: Some(418),
                    message: "teapot".to_string(),
                },
            )],
            DegradeReason::Unknown,
        ),
    ];

    for (failures, reason) in cases {
        let backend = FakeBackend::new();
        backend.add_user(user("u1", "Ada"));
        backend.sign_in_as("u1");
        for (endpoint, err) in failures {
            backend.fail_next(endpoint, err);
        }

        let resolver = SessionResolver::new(backend.clone(), EventBus::default());
        resolver
            .handle(IdentityEvent::SignedIn(identity("u1").with_display_name("Ada L")))
            .await;

        let session = resolver.current();
        assert_eq!(session.status(), &SessionStatus::Degraded(reason));
        assert!(session.warning().is_some());
        let user = session.user().expect("degraded session has a user");
        assert!(user.is_degraded());
        assert_eq!(user.uid(), "u1");
        assert_eq!(user.email(), "u1@x.com");
        assert_eq!(user.display_name(), "Ada L");
    }
}

#[tokio::test]
async fn test_missing_profile_is_created_with_email_local_part() {
    let backend = FakeBackend::new();
    backend.sign_in_as("u1");

    let resolver = SessionResolver::new(backend.clone(), EventBus::default());
    resolver
        .handle(IdentityEvent::SignedIn(phub_common::Identity::new("u1", "a@x.com")))
        .await;

    let session = resolver.current();
    assert_eq!(session.status(), &SessionStatus::Authenticated);
    assert_eq!(session.user().unwrap().display_name(), "a");
    assert!(!session.user().unwrap().is_degraded());
    assert_eq!(backend.calls(Endpoint::CreateUser), 1);
}

#[tokio::test]
async fn test_authenticated_clears_previous_warning() {
    let backend = FakeBackend::new();
    backend.add_user(user("u1", "Ada"));
    backend.sign_in_as("u1");
    backend.fail_next(
        Endpoint::FetchCurrentUser,
        ApiError::NetworkUnreachable("offline".to_string()),
    );

    let resolver = SessionResolver::new(backend.clone(), EventBus::default());
    resolver.handle(IdentityEvent::SignedIn(identity("u1"))).await;
    assert_eq!(
        resolver.current().warning(),
        Some(DegradeReason::Offline.warning())
    );

    resolver.handle(IdentityEvent::SignedIn(identity("u1"))).await;
    let session = resolver.current();
    assert_eq!(session.status(), &SessionStatus::Authenticated);
    assert!(session.warning().is_none());
}

#[tokio::test]
async fn test_new_sign_in_hides_previous_warning_while_loading() {
    let backend = FakeBackend::new();
    backend.add_user(user("u1", "Ada"));
    backend.add_user(user("u2", "Bea"));
    backend.sign_in_as("u1");
    backend.fail_next(
        Endpoint::FetchCurrentUser,
        ApiError::ServerUnavailable("Internal Server Error".to_string()),
    );

    let resolver = Arc::new(SessionResolver::new(backend.clone(), EventBus::default()));
    resolver.handle(IdentityEvent::SignedIn(identity("u1"))).await;
    assert!(resolver.current().warning().is_some());

    backend.sign_in_as("u2");
    let release = backend.gate_next(Endpoint::FetchCurrentUser);
    let pending = {
        let resolver = Arc::clone(&resolver);
        tokio::spawn(async move { resolver.handle(IdentityEvent::SignedIn(identity("u2"))).await })
    };
    backend.wait_for_calls(Endpoint::FetchCurrentUser, 2).await;

    let loading = resolver.current();
    assert!(loading.is_loading());
    assert!(loading.warning().is_none());

    release.send(()).unwrap();
    assert!(pending.await.unwrap());
    assert_eq!(resolver.current().user().unwrap().uid(), "u2");
}

#[tokio::test]
async fn test_provider_failure_then_recovery() {
    let backend = FakeBackend::new();
    backend.add_user(user("u1", "Ada"));
    backend.sign_in_as("u1");

    let resolver = Arc::new(SessionResolver::new(backend.clone(), EventBus::default()));
    let mut session = resolver.watch();
    let (provider, identity_events) = StaticIdentityProvider::new();
    let driver = tokio::spawn(Arc::clone(&resolver).run(identity_events));

    provider.fail("token refresh failed");
    let failed = session.settled_at(1).await.unwrap();
    assert!(matches!(failed.status(), SessionStatus::Error(_)));
    assert!(failed.user().is_none());

    provider.sign_in(identity("u1"), None);
    let recovered = session.settled_at(2).await.unwrap();
    assert_eq!(recovered.status(), &SessionStatus::Authenticated);

    driver.abort();
}

#[tokio::test]
async fn test_run_returns_when_identity_stream_closes() {
    let backend = FakeBackend::new();
    let resolver = Arc::new(SessionResolver::new(backend.clone(), EventBus::default()));
    let (provider, identity_events) = StaticIdentityProvider::new();

    provider.sign_out();
    drop(provider);

    tokio::time::timeout(Duration::from_secs(5), Arc::clone(&resolver).run(identity_events))
        .await
        .expect("run should stop once the provider is gone");
    assert_eq!(resolver.current().generation(), 1);
}
