//! Polls the provider until the signed-in identity's email is verified, then syncs the profile

use crate::account::gateway::AuthGateway;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationState {
    Unverified,
    /// The provider reports the email verified but the profile still says otherwise.
    VerifiedPendingSync { uid: String },
    Synced,
    /// No identity is signed in; the view sends the user back to login.
    SignedOut,
}

impl VerificationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, VerificationState::Synced | VerificationState::SignedOut)
    }
}

/// Marks a check as running; a second `try_begin` fails until the guard drops.
#[derive(Debug, Clone, Default)]
pub struct InFlight(Arc<AtomicBool>);

pub struct InFlightGuard(Arc<AtomicBool>);

impl InFlight {
    pub fn try_begin(&self) -> Option<InFlightGuard> {
        if self.0.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(InFlightGuard(Arc::clone(&self.0)))
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct VerificationPoller {
    state: watch::Receiver<VerificationState>,
    closed: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl VerificationPoller {
    /// Checks immediately, then once per `interval` until a terminal state.
    pub fn start(gateway: AuthGateway, interval: Duration) -> Self {
        let initial = if gateway.current_identity().is_some() {
            VerificationState::Unverified
        } else {
            VerificationState::SignedOut
        };
        let (tx, rx) = watch::channel(initial);
        let tx = Arc::new(tx);
        let closed = Arc::new(AtomicBool::new(false));

        let task = if rx.borrow().is_terminal() {
            None
        } else {
            Some(tokio::spawn(poll(
                gateway,
                interval,
                Arc::clone(&tx),
                Arc::clone(&closed),
            )))
        };

        Self {
            state: rx,
            closed,
            task,
        }
    }

    pub fn state(&self) -> VerificationState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<VerificationState> {
        self.state.clone()
    }

    pub async fn wait_for_terminal(&mut self) -> VerificationState {
        let state = match self.state.wait_for(VerificationState::is_terminal).await {
            Ok(state) => Some(state.clone()),
            Err(_) => None,
        };
        state.unwrap_or_else(|| self.state())
    }

    pub fn stop(mut self) {
        self.release();
    }

    fn release(&mut self) {
        self.closed.store(true, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for VerificationPoller {
    fn drop(&mut self) {
        self.release();
    }
}

async fn poll(
    gateway: AuthGateway,
    period: Duration,
    state: Arc<watch::Sender<VerificationState>>,
    closed: Arc<AtomicBool>,
) {
    let in_flight = InFlight::default();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if state.borrow().is_terminal() || closed.load(Ordering::Acquire) {
            break;
        }
        let Some(guard) = in_flight.try_begin() else {
            debug!("Verification check still running, skipping tick");
            continue;
        };
        let gateway = gateway.clone();
        let state = Arc::clone(&state);
        let closed = Arc::clone(&closed);
        tokio::spawn(async move {
            let _guard = guard;
            let current = state.borrow().clone();
            let next = check(&gateway, &current).await;
            if let Some(next) = next {
                if !closed.load(Ordering::Acquire) {
                    state.send_replace(next);
                }
            }
        });
    }
}

/// One poll tick. Failures are logged and left for the next tick.
async fn check(gateway: &AuthGateway, current: &VerificationState) -> Option<VerificationState> {
    let identity = match gateway.provider().reload().await {
        Ok(Some(identity)) => identity,
        Ok(None) => return Some(VerificationState::SignedOut),
        Err(e) => {
            warn!("Error checking verification: {}", e);
            return None;
        }
    };

    if !identity.email_verified {
        return None;
    }

    let pending = VerificationState::VerifiedPendingSync {
        uid: identity.uid.clone(),
    };
    match gateway.update_verification_status(&identity.uid).await {
        Ok(()) => {
            info!("Email verified for {}", identity.uid);
            Some(VerificationState::Synced)
        }
        Err(e) => {
            warn!("Verified {} but profile sync failed: {}", identity.uid, e);
            (current != &pending).then_some(pending)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_guard_excludes_second_check() {
        let in_flight = InFlight::default();
        let guard = in_flight.try_begin();
        assert!(guard.is_some());
        assert!(in_flight.try_begin().is_none());

        drop(guard);
        assert!(in_flight.try_begin().is_some());
    }

    #[test]
    fn test_terminal_states() {
        assert!(VerificationState::Synced.is_terminal());
        assert!(VerificationState::SignedOut.is_terminal());
        assert!(!VerificationState::Unverified.is_terminal());
        assert!(!VerificationState::VerifiedPendingSync { uid: "u".into() }.is_terminal());
    }
}
