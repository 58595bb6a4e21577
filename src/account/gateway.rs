//! Auth gateway: the only writer of identities and profile documents

use crate::account::error::{AuthErrorCode, PortalError};
use crate::account::identity::{AuthMethod, FederatedProvider, Identity, IdentityProvider};
use crate::account::profile::ProfileDocument;
use crate::account::profile_store::ProfileStore;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AuthGateway {
    provider: Arc<dyn IdentityProvider>,
    profiles: ProfileStore,
}

impl AuthGateway {
    pub fn new(provider: Arc<dyn IdentityProvider>, profiles: ProfileStore) -> Self {
        Self { provider, profiles }
    }

    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.provider.current_identity()
    }

    fn require_identity(&self) -> Result<Identity, PortalError> {
        self.provider
            .current_identity()
            .ok_or(PortalError::NoActiveUser)
    }

    /// Provider errors come back verbatim for the caller to translate.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, PortalError> {
        let identity = self.provider.sign_in_with_password(email, password).await?;
        self.profiles.touch_last_login(&identity.uid).await?;
        info!("User {} logged in", identity.uid);
        Ok(identity)
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
        phone: &str,
    ) -> Result<Identity, PortalError> {
        let mut identity = self
            .provider
            .create_user_with_password(email, password)
            .await?;
        self.provider.update_display_name(name).await?;
        identity.display_name = Some(name.to_string());

        // A lost verification email can be resent from the verify view.
        if let Err(e) = self.provider.send_email_verification().await {
            warn!("Verification email for {} was not sent: {}", identity.uid, e);
        }

        let phone = Some(phone.to_string()).filter(|p| !p.is_empty());
        let profile = ProfileDocument::for_email(&identity, name, phone);
        self.profiles.put(&profile).await?;

        info!("Registered user {} ({})", identity.uid, identity.email);
        Ok(identity)
    }

    /// Creates the profile on first federated sign-in; afterwards only the
    /// last-login timestamp is touched so profile edits survive.
    pub async fn sign_in_with_google(&self) -> Result<Identity, PortalError> {
        let identity = self
            .provider
            .sign_in_with_popup(FederatedProvider::Google)
            .await?;

        match self.profiles.get(&identity.uid).await? {
            None => {
                let profile = ProfileDocument::for_google(&identity);
                self.profiles.put(&profile).await?;
                info!("Created profile for Google user {}", identity.uid);
            }
            Some(_) => {
                self.profiles.touch_last_login(&identity.uid).await?;
                info!("Google user {} logged in", identity.uid);
            }
        }
        Ok(identity)
    }

    /// Succeeds whether or not an account exists for `email`.
    pub async fn reset_password(&self, email: &str) -> Result<(), PortalError> {
        match self.provider.send_password_reset(email).await {
            Ok(()) => Ok(()),
            Err(e) if e.code() == Some(&AuthErrorCode::UserNotFound) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn resend_verification_email(&self) -> Result<(), PortalError> {
        let identity = self.require_identity()?;
        self.provider.send_email_verification().await?;
        info!("Verification email resent to {}", identity.email);
        Ok(())
    }

    pub async fn update_verification_status(&self, uid: &str) -> Result<(), PortalError> {
        self.profiles.mark_verified(uid).await
    }

    /// Password identities prove their password; federated-only identities go
    /// through a fresh popup and `password` is ignored.
    pub async fn reauthenticate(&self, password: &str) -> Result<Identity, PortalError> {
        let identity = self.require_identity()?;
        match identity.auth_method()? {
            AuthMethod::Password => {
                if password.is_empty() {
                    return Err(PortalError::PasswordRequired);
                }
                self.provider.reauthenticate_with_password(password).await
            }
            AuthMethod::Federated(provider) => {
                self.provider.reauthenticate_with_popup(provider).await
            }
        }
    }

    /// Removes the profile and then the identity. Callers reauthenticate first;
    /// a stale login makes the provider refuse the identity deletion, in which
    /// case the profile is written back.
    pub async fn delete_account(&self) -> Result<(), PortalError> {
        let identity = self.require_identity()?;
        let snapshot = self.profiles.get(&identity.uid).await?;
        self.profiles.delete(&identity.uid).await?;

        let err = match self.provider.delete_current_user().await {
            Ok(()) => {
                info!("Deleted account {}", identity.uid);
                return Ok(());
            }
            Err(e) => e,
        };

        let Some(snapshot) = snapshot else {
            return Err(err);
        };
        match self.profiles.put(&snapshot).await {
            Ok(()) => {
                warn!(
                    "Identity deletion for {} failed ({}); profile restored",
                    identity.uid, err
                );
                Err(err)
            }
            Err(restore_err) => {
                error!(
                    "Identity deletion for {} failed ({}) and profile restore failed ({})",
                    identity.uid, err, restore_err
                );
                Err(PortalError::DeletionIncomplete(format!(
                    "identity {} kept without a profile: {}",
                    identity.uid, err
                )))
            }
        }
    }

    pub async fn update_profile(&self, name: &str, phone: &str) -> Result<(), PortalError> {
        let identity = self.require_identity()?;
        self.provider.update_display_name(name).await?;
        self.profiles.update_contact(&identity.uid, name, phone).await?;
        info!("Updated profile for {}", identity.uid);
        Ok(())
    }

    pub async fn change_password(&self, current: &str, new: &str) -> Result<(), PortalError> {
        let identity = self.require_identity()?;
        if !identity.has_password() {
            return Err(PortalError::Validation(
                "Password changes are only available for email/password accounts".to_string(),
            ));
        }
        if current.is_empty() {
            return Err(PortalError::PasswordRequired);
        }
        self.provider.reauthenticate_with_password(current).await?;
        self.provider.update_password(new).await?;
        info!("Password changed for {}", identity.uid);
        Ok(())
    }

    pub async fn sign_out(&self) -> Result<(), PortalError> {
        self.provider.sign_out().await
    }
}
