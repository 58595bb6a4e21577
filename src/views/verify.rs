//! Email verification page

use crate::account::gateway::AuthGateway;
use crate::account::verification::{VerificationPoller, VerificationState};
use crate::views::{Notification, Outcome, Route};
use std::time::Duration;
use tracing::warn;

pub struct VerifyEmailView {
    gateway: AuthGateway,
    poller: VerificationPoller,
    resending: bool,
}

impl VerifyEmailView {
    /// Starts polling as soon as the page opens.
    pub fn open(gateway: AuthGateway, interval: Duration) -> Self {
        let poller = VerificationPoller::start(gateway.clone(), interval);
        Self {
            gateway,
            poller,
            resending: false,
        }
    }

    pub fn email(&self) -> Option<String> {
        self.gateway.current_identity().map(|i| i.email)
    }

    pub fn state(&self) -> VerificationState {
        self.poller.state()
    }

    pub fn is_resending(&self) -> bool {
        self.resending
    }

    /// Waits for the poller to finish and reports where to go next.
    pub async fn wait(&mut self) -> Outcome {
        let state = self.poller.wait_for_terminal().await;
        Self::outcome_for(&state)
    }

    fn outcome_for(state: &VerificationState) -> Outcome {
        match state {
            VerificationState::SignedOut => Outcome::show(Notification::warning(
                "Signed Out",
                "Please log in to verify your email.",
            ))
            .then(Route::Login),
            VerificationState::Synced => Outcome::show(Notification::success(
                "Email Verified",
                "Email verified successfully!",
            ))
            .then(Route::Dashboard),
            VerificationState::Unverified | VerificationState::VerifiedPendingSync { .. } => {
                Outcome::show(Notification::warning(
                    "Not Verified",
                    "Email verification has not completed yet.",
                ))
            }
        }
    }

    pub async fn resend(&mut self) -> Option<Outcome> {
        if self.resending {
            return None;
        }
        self.resending = true;
        let result = self.gateway.resend_verification_email().await;
        self.resending = false;

        Some(match result {
            Ok(()) => Outcome::show(Notification::success(
                "Email Sent",
                "Verification email resent! Check your inbox.",
            )),
            Err(e) => {
                warn!("Error resending verification email: {}", e);
                Outcome::show(Notification::error(
                    "Resend Failed",
                    "Error resending verification email.",
                ))
            }
        })
    }

    /// Stops polling and signs out; navigation back to login happens either way.
    pub async fn sign_out(self) -> Outcome {
        let Self { gateway, poller, .. } = self;
        poller.stop();
        match gateway.sign_out().await {
            Ok(()) => Outcome::show(Notification::success("Signed Out", "You have been signed out."))
                .then(Route::Login),
            Err(e) => Outcome::show(Notification::error("Sign-out Failed", e.friendly_message()))
                .then(Route::Login),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_map_to_routes() {
        let synced = VerifyEmailView::outcome_for(&VerificationState::Synced);
        assert_eq!(synced.navigate, Some(Route::Dashboard));
        assert_eq!(synced.notification.message, "Email verified successfully!");

        let signed_out = VerifyEmailView::outcome_for(&VerificationState::SignedOut);
        assert_eq!(signed_out.navigate, Some(Route::Login));
    }

    #[test]
    fn test_pending_states_are_not_success() {
        for state in [
            VerificationState::Unverified,
            VerificationState::VerifiedPendingSync { uid: "u".into() },
        ] {
            let outcome = VerifyEmailView::outcome_for(&state);
            assert!(!outcome.is_success());
            assert_eq!(outcome.navigate, None);
        }
    }
}
