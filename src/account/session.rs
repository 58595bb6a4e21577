//! Session observer: follows the provider's auth state and keeps the matching profile loaded

use crate::account::identity::{AuthStateReceiver, Identity, IdentityProvider};
use crate::account::profile::ProfileDocument;
use crate::account::profile_store::ProfileStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub identity: Option<Identity>,
    pub profile: Option<ProfileDocument>,
    pub loading: bool,
    pub error: Option<String>,
}

impl SessionState {
    /// Nothing is known until the provider's first notification lands.
    pub fn initial() -> Self {
        Self {
            identity: None,
            profile: None,
            loading: true,
            error: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

/// Holds the auth-state subscription for as long as it lives.
///
/// Dropping the observer (or calling [`SessionObserver::teardown`]) releases the
/// subscription; results of fetches still in flight at that point are discarded.
pub struct SessionObserver {
    state: Arc<watch::Sender<SessionState>>,
    profiles: ProfileStore,
    closed: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl SessionObserver {
    /// Registers exactly one listener with the provider. Must be called inside a Tokio runtime.
    pub fn start(provider: &dyn IdentityProvider, profiles: ProfileStore) -> Self {
        let auth_state = provider.subscribe();
        let (tx, _) = watch::channel(SessionState::initial());
        let state = Arc::new(tx);
        let closed = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(listen(
            auth_state,
            Arc::clone(&state),
            profiles.clone(),
            Arc::clone(&closed),
        ));

        Self {
            state,
            profiles,
            closed,
            task: Some(task),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Resolves with the first state that satisfies `predicate`.
    pub async fn wait_until(&self, predicate: impl FnMut(&SessionState) -> bool) -> SessionState {
        let mut rx = self.state.subscribe();
        let state = match rx.wait_for(predicate).await {
            Ok(state) => Some(state.clone()),
            Err(_) => None,
        };
        state.unwrap_or_else(|| self.state())
    }

    /// Re-reads the profile of the current identity; the identity itself is left alone.
    /// A result that arrives after the identity has changed is dropped.
    pub async fn refresh(&self) {
        let Some(uid) = self.state.borrow().identity.as_ref().map(|i| i.uid.clone()) else {
            return;
        };
        let result = self.profiles.get(&uid).await;
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        self.state.send_if_modified(|s| {
            if s.identity.as_ref().map(|i| &i.uid) != Some(&uid) {
                debug!("Identity changed while refreshing {}, discarding", uid);
                return false;
            }
            match result {
                Ok(Some(profile)) => s.profile = Some(profile),
                Ok(None) => return false,
                Err(e) => {
                    warn!("Error refreshing profile for {}: {}", uid, e);
                    s.error = Some(e.to_string());
                }
            }
            true
        });
    }

    pub fn teardown(mut self) {
        self.release();
    }

    fn release(&mut self) {
        self.closed.store(true, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Session observer unsubscribed");
        }
    }
}

impl Drop for SessionObserver {
    fn drop(&mut self) {
        self.release();
    }
}

async fn listen(
    mut auth_state: AuthStateReceiver,
    state: Arc<watch::Sender<SessionState>>,
    profiles: ProfileStore,
    closed: Arc<AtomicBool>,
) {
    loop {
        let identity = auth_state.borrow_and_update().clone();
        apply(identity, &state, &profiles, &closed).await;
        if auth_state.changed().await.is_err() {
            break;
        }
    }
}

async fn apply(
    identity: Option<Identity>,
    state: &watch::Sender<SessionState>,
    profiles: &ProfileStore,
    closed: &AtomicBool,
) {
    if closed.load(Ordering::Acquire) {
        return;
    }
    state.send_modify(|s| {
        s.loading = true;
        s.error = None;
    });

    let Some(identity) = identity else {
        state.send_modify(|s| {
            s.identity = None;
            s.profile = None;
            s.loading = false;
        });
        return;
    };

    let uid = identity.uid.clone();
    state.send_modify(|s| {
        if s.identity.as_ref().map(|i| &i.uid) != Some(&uid) {
            s.profile = None;
        }
        s.identity = Some(identity);
    });

    let result = profiles.get(&uid).await;
    if closed.load(Ordering::Acquire) {
        return;
    }
    state.send_modify(|s| {
        match result {
            Ok(profile) => s.profile = profile,
            Err(e) => {
                warn!("Error loading profile for {}: {}", uid, e);
                s.error = Some(e.to_string());
            }
        }
        s.loading = false;
    });
}
