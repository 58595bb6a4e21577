//! Application context: everything a front end needs, wired once at startup

use crate::account::gateway::AuthGateway;
use crate::account::identity::IdentityProvider;
use crate::account::profile_store::ProfileStore;
use crate::account::session::{SessionObserver, SessionState};
use crate::account::store::DocumentStore;
use crate::config::PortalConfig;
use crate::contact::EmailService;
use crate::forms::state::FormMode;
use crate::views::{ContactView, LoginView, ProfileView, RouteGuard, VerifyEmailView};
use std::sync::Arc;
use tracing::info;

/// Collaborators shared by the views. Build one per process and pass it down.
pub struct AppContext {
    pub config: PortalConfig,
    pub gateway: AuthGateway,
    pub email: Arc<dyn EmailService>,
    pub session: SessionObserver,
}

impl AppContext {
    /// Subscribes the session observer. Must be called inside a Tokio runtime.
    pub fn start(
        config: PortalConfig,
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        email: Arc<dyn EmailService>,
    ) -> Self {
        let profiles = ProfileStore::new(store, config.firebase.users_collection.clone());
        let session = SessionObserver::start(provider.as_ref(), profiles.clone());
        let gateway = AuthGateway::new(provider, profiles);
        info!(
            "Portal context started for project {}",
            config.firebase.project_id
        );
        Self {
            config,
            gateway,
            email,
            session,
        }
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn login_view(&self, mode: FormMode) -> LoginView {
        LoginView::new(self.gateway.clone(), mode)
    }

    pub fn verify_view(&self) -> VerifyEmailView {
        VerifyEmailView::open(self.gateway.clone(), self.config.poll_interval())
    }

    pub fn profile_view(&self) -> ProfileView {
        ProfileView::new(self.gateway.clone(), &self.session.state())
    }

    pub fn contact_view(&self) -> ContactView {
        ContactView::new(Arc::clone(&self.email))
    }

    pub fn route_guard(&self) -> RouteGuard {
        RouteGuard::new(self.config.session.login_path.clone())
    }

    /// Releases the auth-state subscription.
    pub fn teardown(self) {
        self.session.teardown();
        info!("Portal context torn down");
    }
}
