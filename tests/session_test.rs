//! Integration tests for SessionObserver

use school_portal::account::{AuthGateway, IdentityProvider, ProfileStore, SessionObserver};
use school_portal::backend::memory::StoreOp;
use school_portal::backend::{InMemoryDocumentStore, InMemoryIdentityProvider};
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(2);

fn setup() -> (
    Arc<InMemoryIdentityProvider>,
    Arc<InMemoryDocumentStore>,
    AuthGateway,
    ProfileStore,
) {
    let provider = Arc::new(InMemoryIdentityProvider::new());
    let store = Arc::new(InMemoryDocumentStore::new());
    let profiles = ProfileStore::new(store.clone(), "users");
    let gateway = AuthGateway::new(provider.clone(), profiles.clone());
    (provider, store, gateway, profiles)
}

#[tokio::test]
async fn test_loading_until_first_notification() {
    let (provider, _, _, profiles) = setup();
    let observer = SessionObserver::start(provider.as_ref(), profiles);

    let initial = observer.state();
    assert!(initial.loading);
    assert!(initial.identity.is_none());
    assert!(!observer.is_authenticated());

    let settled = tokio::time::timeout(TIMEOUT, observer.wait_until(|s| !s.loading))
        .await
        .unwrap();
    assert!(settled.identity.is_none());
    assert!(settled.profile.is_none());
    assert!(!settled.is_authenticated());
}

#[tokio::test]
async fn test_sign_in_loads_profile() {
    let (provider, _, gateway, profiles) = setup();
    let observer = SessionObserver::start(provider.as_ref(), profiles);

    let identity = gateway
        .register("s@x.com", "Abcd123!", "Sam", "+15551234567")
        .await
        .unwrap();

    let state = tokio::time::timeout(
        TIMEOUT,
        observer.wait_until(|s| !s.loading && s.profile.is_some()),
    )
    .await
    .unwrap();

    assert_eq!(
        state.identity.as_ref().map(|i| i.uid.as_str()),
        Some(identity.uid.as_str())
    );
    assert_eq!(state.profile.as_ref().map(|p| p.name.as_str()), Some("Sam"));
    assert!(state.error.is_none());
    assert!(observer.is_authenticated());
}

#[tokio::test]
async fn test_sign_out_clears_profile() {
    let (provider, _, gateway, profiles) = setup();
    let observer = SessionObserver::start(provider.as_ref(), profiles);
    gateway
        .register("s@x.com", "Abcd123!", "Sam", "+15551234567")
        .await
        .unwrap();
    tokio::time::timeout(TIMEOUT, observer.wait_until(|s| s.profile.is_some()))
        .await
        .unwrap();

    gateway.sign_out().await.unwrap();

    let state = tokio::time::timeout(
        TIMEOUT,
        observer.wait_until(|s| !s.loading && s.identity.is_none()),
    )
    .await
    .unwrap();
    assert!(state.profile.is_none());
    assert!(!observer.is_authenticated());
}

#[tokio::test]
async fn test_profile_fetch_failure_keeps_identity() {
    let (provider, store, _, profiles) = setup();
    let seeded = provider.add_password_account("s@x.com", "Abcd123!", "Sam");
    let observer = SessionObserver::start(provider.as_ref(), profiles);
    tokio::time::timeout(TIMEOUT, observer.wait_until(|s| !s.loading))
        .await
        .unwrap();

    store.fail_next(StoreOp::Get, "store offline");
    provider
        .sign_in_with_password("s@x.com", "Abcd123!")
        .await
        .unwrap();

    let state = tokio::time::timeout(
        TIMEOUT,
        observer.wait_until(|s| !s.loading && s.identity.is_some()),
    )
    .await
    .unwrap();
    assert_eq!(state.identity.map(|i| i.uid), Some(seeded.uid));
    assert!(state.profile.is_none());
    assert!(state.error.unwrap().contains("store offline"));
}

#[tokio::test]
async fn test_refresh_is_idempotent() {
    let (provider, _, gateway, profiles) = setup();
    let observer = SessionObserver::start(provider.as_ref(), profiles);
    gateway
        .register("s@x.com", "Abcd123!", "Sam", "+15551234567")
        .await
        .unwrap();
    let loaded = tokio::time::timeout(
        TIMEOUT,
        observer.wait_until(|s| !s.loading && s.profile.is_some()),
    )
    .await
    .unwrap();

    observer.refresh().await;
    let once = observer.state();
    observer.refresh().await;
    let twice = observer.state();

    assert_eq!(once, loaded);
    assert_eq!(once, twice);
}

#[tokio::test]
async fn test_refresh_picks_up_profile_edits() {
    let (provider, _, gateway, profiles) = setup();
    let observer = SessionObserver::start(provider.as_ref(), profiles);
    gateway
        .register("s@x.com", "Abcd123!", "Sam", "+15551234567")
        .await
        .unwrap();
    tokio::time::timeout(TIMEOUT, observer.wait_until(|s| s.profile.is_some()))
        .await
        .unwrap();

    gateway.update_profile("Samuel", "").await.unwrap();
    observer.refresh().await;

    let profile = observer.state().profile.unwrap();
    assert_eq!(profile.name, "Samuel");
    assert_eq!(profile.phone, None);
}

#[tokio::test]
async fn test_teardown_stops_updates() {
    let (provider, _, gateway, profiles) = setup();
    let observer = SessionObserver::start(provider.as_ref(), profiles);
    gateway
        .register("s@x.com", "Abcd123!", "Sam", "+15551234567")
        .await
        .unwrap();
    tokio::time::timeout(TIMEOUT, observer.wait_until(|s| s.profile.is_some()))
        .await
        .unwrap();
    let rx = observer.watch();

    observer.teardown();
    gateway.sign_out().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(rx.borrow().identity.is_some());
}

#[tokio::test]
async fn test_refresh_discards_profile_of_previous_identity() {
    let (_, store, gateway, profiles) = setup();
    let observer = SessionObserver::start(gateway.provider().as_ref(), profiles);
    gateway
        .register("b@x.com", "Abcd123!", "Bea", "+15551234567")
        .await
        .unwrap();
    gateway.sign_out().await.unwrap();
    gateway
        .register("a@x.com", "Abcd123!", "Al", "+15557654321")
        .await
        .unwrap();
    tokio::time::timeout(
        TIMEOUT,
        observer.wait_until(|s| !s.loading && profile_email(s) == Some("a@x.com")),
    )
    .await
    .unwrap();

    // A's refresh stalls in the store while the session switches to B.
    let gate = store.hold_next(StoreOp::Get);
    let switch = async {
        gateway.sign_out().await.unwrap();
        gateway.login("b@x.com", "Abcd123!").await.unwrap();
        let state = tokio::time::timeout(
            TIMEOUT,
            observer.wait_until(|s| !s.loading && profile_email(s) == Some("b@x.com")),
        )
        .await
        .unwrap();
        gate.notify_one();
        state
    };
    let (_, switched) = tokio::join!(observer.refresh(), switch);

    let state = observer.state();
    assert_eq!(state, switched);
    assert_eq!(state.identity.map(|i| i.email).as_deref(), Some("b@x.com"));
    assert_eq!(state.profile.map(|p| p.email).as_deref(), Some("b@x.com"));
}

fn profile_email(state: &school_portal::SessionState) -> Option<&str> {
    state.profile.as_ref().map(|p| p.email.as_str())
}
