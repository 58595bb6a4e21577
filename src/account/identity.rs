//! Identity provider contract: the principal it issues and the operations the portal consumes

use crate::account::error::{AuthErrorCode, PortalError, ProviderError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// An auth method linked to an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkedProvider {
    Password,
    Google,
    Other(String),
}

impl LinkedProvider {
    pub fn from_provider_id(id: &str) -> Self {
        match id {
            "password" => LinkedProvider::Password,
            "google.com" => LinkedProvider::Google,
            other => LinkedProvider::Other(other.to_string()),
        }
    }

    pub fn provider_id(&self) -> &str {
        match self {
            LinkedProvider::Password => "password",
            LinkedProvider::Google => "google.com",
            LinkedProvider::Other(id) => id,
        }
    }
}

/// Third-party brokers the portal can federate with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FederatedProvider {
    Google,
}

impl FederatedProvider {
    pub fn provider_id(&self) -> &'static str {
        match self {
            FederatedProvider::Google => "google.com",
        }
    }
}

/// How an identity proves itself when reauthenticating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Password,
    Federated(FederatedProvider),
}

/// The principal issued by the identity provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub email_verified: bool,
    pub providers: Vec<LinkedProvider>,
}

impl Identity {
    /// A password credential wins over any federated link. Identities linked
    /// only to brokers the portal cannot federate with have no usable method.
    pub fn auth_method(&self) -> Result<AuthMethod, PortalError> {
        if self.providers.contains(&LinkedProvider::Password) {
            Ok(AuthMethod::Password)
        } else if self.providers.contains(&LinkedProvider::Google) {
            Ok(AuthMethod::Federated(FederatedProvider::Google))
        } else {
            Err(ProviderError::from_code(AuthErrorCode::OperationNotAllowed).into())
        }
    }

    pub fn has_password(&self) -> bool {
        matches!(self.auth_method(), Ok(AuthMethod::Password))
    }
}

/// Credential handed back by a federated popup or redirect flow.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthCredential {
    pub provider: FederatedProvider,
    pub id_token: Option<String>,
    pub access_token: Option<String>,
}

/// Drives the interactive part of a federated sign-in.
#[async_trait]
pub trait PopupHandler: Send + Sync {
    async fn open(&self, provider: FederatedProvider) -> Result<OAuthCredential, PortalError>;
}

/// Receiver side of the provider's auth-state channel.
pub type AuthStateReceiver = watch::Receiver<Option<Identity>>;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, PortalError>;

    async fn create_user_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, PortalError>;

    async fn sign_in_with_popup(&self, provider: FederatedProvider)
        -> Result<Identity, PortalError>;

    async fn update_display_name(&self, name: &str) -> Result<(), PortalError>;

    async fn update_password(&self, new_password: &str) -> Result<(), PortalError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), PortalError>;

    async fn send_email_verification(&self) -> Result<(), PortalError>;

    async fn reauthenticate_with_password(&self, password: &str) -> Result<Identity, PortalError>;

    async fn reauthenticate_with_popup(
        &self,
        provider: FederatedProvider,
    ) -> Result<Identity, PortalError>;

    async fn delete_current_user(&self) -> Result<(), PortalError>;

    async fn sign_out(&self) -> Result<(), PortalError>;

    /// Refetches the current identity without emitting an auth-state change.
    async fn reload(&self) -> Result<Option<Identity>, PortalError>;

    fn current_identity(&self) -> Option<Identity>;

    /// The current value is delivered to the subscriber as its first notification.
    fn subscribe(&self) -> AuthStateReceiver;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(providers: Vec<LinkedProvider>) -> Identity {
        Identity {
            uid: "uid-1".to_string(),
            email: "s@x.com".to_string(),
            display_name: None,
            email_verified: false,
            providers,
        }
    }

    #[test]
    fn test_password_link_selects_password_method() {
        let id = identity(vec![LinkedProvider::Google, LinkedProvider::Password]);
        assert_eq!(id.auth_method().unwrap(), AuthMethod::Password);
    }

    #[test]
    fn test_federated_only_identity() {
        let id = identity(vec![LinkedProvider::Google]);
        assert_eq!(
            id.auth_method().unwrap(),
            AuthMethod::Federated(FederatedProvider::Google)
        );
        assert!(!id.has_password());
    }

    #[test]
    fn test_unsupported_links_have_no_auth_method() {
        for providers in [vec![], vec![LinkedProvider::Other("github.com".to_string())]] {
            let id = identity(providers);
            let err = id.auth_method().unwrap_err();
            assert_eq!(err.code(), Some(&AuthErrorCode::OperationNotAllowed));
            assert!(!id.has_password());
        }
    }

    #[test]
    fn test_provider_ids() {
        assert_eq!(LinkedProvider::from_provider_id("google.com"), LinkedProvider::Google);
        assert_eq!(
            LinkedProvider::from_provider_id("github.com").provider_id(),
            "github.com"
        );
    }
}
