//! Integration tests for the email verification poller

use school_portal::account::{AuthGateway, ProfileStore, VerificationPoller, VerificationState};
use school_portal::backend::memory::{AuthOp, StoreOp};
use school_portal::backend::{InMemoryDocumentStore, InMemoryIdentityProvider};
use std::sync::Arc;
use std::time::Duration;

const INTERVAL: Duration = Duration::from_millis(10);
const TIMEOUT: Duration = Duration::from_secs(2);

fn setup() -> (
    Arc<InMemoryIdentityProvider>,
    Arc<InMemoryDocumentStore>,
    AuthGateway,
) {
    let provider = Arc::new(InMemoryIdentityProvider::new());
    let store = Arc::new(InMemoryDocumentStore::new());
    let gateway = AuthGateway::new(provider.clone(), ProfileStore::new(store.clone(), "users"));
    (provider, store, gateway)
}

async fn register(gateway: &AuthGateway) -> String {
    gateway
        .register("s@x.com", "Abcd123!", "Sam", "+15551234567")
        .await
        .unwrap()
        .uid
}

#[tokio::test]
async fn test_signed_out_immediately_without_identity() {
    let (provider, _, gateway) = setup();
    let mut poller = VerificationPoller::start(gateway, INTERVAL);

    assert_eq!(poller.state(), VerificationState::SignedOut);
    assert_eq!(poller.wait_for_terminal().await, VerificationState::SignedOut);
    assert_eq!(provider.calls(AuthOp::Reload), 0);
}

#[tokio::test]
async fn test_stays_unverified_until_link_clicked() {
    let (provider, store, gateway) = setup();
    let uid = register(&gateway).await;
    let mut poller = VerificationPoller::start(gateway.clone(), INTERVAL);

    tokio::time::sleep(INTERVAL * 5).await;
    assert_eq!(poller.state(), VerificationState::Unverified);
    assert!(provider.calls(AuthOp::Reload) >= 2);
    assert_eq!(store.calls(StoreOp::Update), 0);

    provider.mark_email_verified(&uid);
    let state = tokio::time::timeout(TIMEOUT, poller.wait_for_terminal())
        .await
        .unwrap();

    assert_eq!(state, VerificationState::Synced);
    let profile = gateway.profiles().get(&uid).await.unwrap().unwrap();
    assert!(profile.verified);
}

#[tokio::test]
async fn test_stops_polling_after_sync() {
    let (provider, _, gateway) = setup();
    let uid = register(&gateway).await;
    provider.mark_email_verified(&uid);
    let mut poller = VerificationPoller::start(gateway, INTERVAL);

    tokio::time::timeout(TIMEOUT, poller.wait_for_terminal())
        .await
        .unwrap();
    let reloads = provider.calls(AuthOp::Reload);
    tokio::time::sleep(INTERVAL * 5).await;

    assert_eq!(provider.calls(AuthOp::Reload), reloads);
}

#[tokio::test]
async fn test_failed_profile_sync_is_retried() {
    let (provider, store, gateway) = setup();
    let uid = register(&gateway).await;
    provider.mark_email_verified(&uid);
    store.fail_next(StoreOp::Update, "store offline");

    let mut poller = VerificationPoller::start(gateway.clone(), INTERVAL);
    let state = tokio::time::timeout(TIMEOUT, poller.wait_for_terminal())
        .await
        .unwrap();

    assert_eq!(state, VerificationState::Synced);
    assert_eq!(store.calls(StoreOp::Update), 2);
    assert!(gateway.profiles().get(&uid).await.unwrap().unwrap().verified);
}

#[tokio::test]
async fn test_reload_errors_keep_polling() {
    let (provider, _, gateway) = setup();
    let uid = register(&gateway).await;
    provider.fail_next(
        AuthOp::Reload,
        school_portal::account::AuthErrorCode::NetworkRequestFailed,
    );
    provider.mark_email_verified(&uid);

    let mut poller = VerificationPoller::start(gateway, INTERVAL);
    let state = tokio::time::timeout(TIMEOUT, poller.wait_for_terminal())
        .await
        .unwrap();

    assert_eq!(state, VerificationState::Synced);
    assert!(provider.calls(AuthOp::Reload) >= 2);
}

#[tokio::test]
async fn test_sign_out_ends_polling() {
    let (_, _, gateway) = setup();
    register(&gateway).await;
    let mut poller = VerificationPoller::start(gateway.clone(), INTERVAL);

    gateway.sign_out().await.unwrap();
    let state = tokio::time::timeout(TIMEOUT, poller.wait_for_terminal())
        .await
        .unwrap();

    assert_eq!(state, VerificationState::SignedOut);
}

#[tokio::test]
async fn test_stop_cancels_polling() {
    let (provider, _, gateway) = setup();
    register(&gateway).await;
    let poller = VerificationPoller::start(gateway, INTERVAL);
    tokio::time::sleep(INTERVAL * 2).await;

    poller.stop();
    tokio::time::sleep(INTERVAL).await;
    let reloads = provider.calls(AuthOp::Reload);
    tokio::time::sleep(INTERVAL * 5).await;

    assert_eq!(provider.calls(AuthOp::Reload), reloads);
}

#[tokio::test]
async fn test_slow_check_is_never_overlapped() {
    let (provider, store, gateway) = setup();
    let uid = register(&gateway).await;
    provider.mark_email_verified(&uid);
    let gate = store.hold_next(StoreOp::Update);

    let mut poller = VerificationPoller::start(gateway, INTERVAL);
    tokio::time::sleep(INTERVAL * 6).await;

    // The first check is stuck syncing the profile; later ticks are skipped.
    assert_eq!(provider.calls(AuthOp::Reload), 1);
    assert_eq!(store.calls(StoreOp::Update), 0);
    assert_eq!(poller.state(), VerificationState::Unverified);

    gate.notify_one();
    let state = tokio::time::timeout(TIMEOUT, poller.wait_for_terminal())
        .await
        .unwrap();

    assert_eq!(state, VerificationState::Synced);
    assert_eq!(provider.calls(AuthOp::Reload), 1);
    assert_eq!(store.calls(StoreOp::Update), 1);
}

#[tokio::test]
async fn test_failed_sync_passes_through_pending_state() {
    let (provider, store, gateway) = setup();
    let uid = register(&gateway).await;
    provider.mark_email_verified(&uid);
    store.fail_next(StoreOp::Update, "store offline");

    let poller = VerificationPoller::start(gateway, INTERVAL);
    let mut rx = poller.watch();
    let mut seen = vec![rx.borrow_and_update().clone()];
    tokio::time::timeout(TIMEOUT, async {
        while !seen.last().is_some_and(VerificationState::is_terminal) {
            if rx.changed().await.is_err() {
                break;
            }
            seen.push(rx.borrow_and_update().clone());
        }
    })
    .await
    .unwrap();

    assert_eq!(
        seen,
        vec![
            VerificationState::Unverified,
            VerificationState::VerifiedPendingSync { uid },
            VerificationState::Synced,
        ]
    );
}
