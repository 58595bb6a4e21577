//! School portal accounts: sign-up, login, email verification, profiles and
//! the form validation that feeds them.

pub mod account;
pub mod api;
pub mod backend;
pub mod config;
pub mod contact;
pub mod context;
pub mod forms;
pub mod views;

pub use account::{AuthGateway, PortalError, SessionObserver, SessionState};
pub use config::PortalConfig;
pub use context::AppContext;
