//! Headless view controllers: they own form state, call the gateway and report
//! notifications and navigations for whatever front end renders them.

pub mod contact;
pub mod guard;
pub mod login;
pub mod profile;
pub mod verify;

use serde::Serialize;
use std::fmt;

pub use contact::ContactView;
pub use guard::{GuardView, RouteGuard};
pub use login::LoginView;
pub use profile::ProfileView;
pub use verify::VerifyEmailView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Route {
    Home,
    Login,
    Verify,
    Dashboard,
    Profile,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::Verify => "/verify",
            Route::Dashboard => "/dashboard",
            Route::Profile => "/dashboard/profile",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Warning, title, message)
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}: {}", self.kind, self.title, self.message)
    }
}

/// What a user action produced: something to show, and maybe somewhere to go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub notification: Notification,
    pub navigate: Option<Route>,
}

impl Outcome {
    pub fn show(notification: Notification) -> Self {
        Self {
            notification,
            navigate: None,
        }
    }

    pub fn then(mut self, route: Route) -> Self {
        self.navigate = Some(route);
        self
    }

    pub fn is_success(&self) -> bool {
        self.notification.kind == NotificationKind::Success
    }
}
