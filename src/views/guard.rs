//! Keeps signed-out sessions away from protected views

use crate::account::session::SessionState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardView {
    /// The session is still resolving.
    Placeholder,
    /// Navigate to the login entry point. Issued once per signed-out period.
    Redirect(String),
    /// Signed out and the redirect is already in flight.
    Blank,
    Render,
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    login_path: String,
    redirected: bool,
}

impl RouteGuard {
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
            redirected: false,
        }
    }

    /// Never redirects while the session is loading.
    pub fn evaluate(&mut self, state: &SessionState) -> GuardView {
        if state.loading {
            return GuardView::Placeholder;
        }
        if state.identity.is_some() {
            self.redirected = false;
            return GuardView::Render;
        }
        if self.redirected {
            GuardView::Blank
        } else {
            self.redirected = true;
            GuardView::Redirect(self.login_path.clone())
        }
    }
}
