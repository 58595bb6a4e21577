//! Profile tab: personal details, password change and account deletion

use crate::account::error::{AuthErrorCode, PortalError};
use crate::account::gateway::AuthGateway;
use crate::account::session::{SessionObserver, SessionState};
use crate::forms::state::{ProfileForm, SubmitState};
use crate::views::{Notification, Outcome, Route};
use tracing::warn;

pub const DELETE_PASSWORD_PROMPT: &str = "Please enter your password to confirm account deletion";

pub struct ProfileView {
    gateway: AuthGateway,
    pub form: ProfileForm,
    pub deleting: SubmitState,
}

impl ProfileView {
    pub fn new(gateway: AuthGateway, session: &SessionState) -> Self {
        let form = match &session.identity {
            Some(identity) => ProfileForm::from_profile(identity, session.profile.as_ref()),
            None => ProfileForm::default(),
        };
        Self {
            gateway,
            form,
            deleting: SubmitState::Idle,
        }
    }

    pub fn edit(&mut self) {
        self.form.editing = true;
    }

    pub fn cancel(&mut self, session: &SessionState) {
        if let Some(identity) = &session.identity {
            self.form.cancel(identity, session.profile.as_ref());
        }
    }

    /// Whether the signed-in identity has a password to confirm deletion with.
    pub fn needs_password(&self) -> bool {
        self.gateway
            .current_identity()
            .is_some_and(|i| i.has_password())
    }

    /// Saves name and phone, then reloads the session's profile.
    pub async fn save_personal_info(&mut self, session: &SessionObserver) -> Option<Outcome> {
        if !self.form.validate_personal() {
            return None;
        }
        if !self.form.submit.begin() {
            return None;
        }
        let name = self.form.name.trim().to_string();
        let phone = self.form.phone.trim().to_string();
        let result = self.gateway.update_profile(&name, &phone).await;
        self.form.submit.finish(&result);

        Some(match result {
            Ok(()) => {
                self.form.editing = false;
                session.refresh().await;
                Outcome::show(Notification::success(
                    "Profile Updated",
                    "Profile updated successfully!",
                ))
            }
            Err(e) => {
                warn!("Error updating profile: {}", e);
                Outcome::show(Notification::error(
                    "Update Failed",
                    "Failed to update profile. Please try again.",
                ))
            }
        })
    }

    pub async fn change_password(&mut self) -> Option<Outcome> {
        if !self.form.validate_security() {
            return None;
        }
        if !self.form.submit.begin() {
            return None;
        }
        let result = self
            .gateway
            .change_password(&self.form.current_password, &self.form.new_password)
            .await;
        self.form.submit.finish(&result);

        Some(match result {
            Ok(()) => {
                self.form.clear_passwords();
                Outcome::show(Notification::success(
                    "Password Changed",
                    "Password updated successfully!",
                ))
            }
            Err(e) => Outcome::show(Notification::error(
                "Password Change Failed",
                password_change_message(&e),
            )),
        })
    }

    /// Reauthenticates and deletes the account. A password account with an
    /// empty `password` is turned away before anything leaves the process.
    pub async fn delete_account(&mut self, password: &str) -> Option<Outcome> {
        if self.needs_password() && password.is_empty() {
            return Some(Outcome::show(Notification::error(
                "Password Required",
                DELETE_PASSWORD_PROMPT,
            )));
        }
        if !self.deleting.begin() {
            return None;
        }

        let result = match self.gateway.reauthenticate(password).await {
            Ok(_) => self.gateway.delete_account().await,
            Err(e) => Err(e),
        };
        self.deleting.finish(&result);

        Some(match result {
            Ok(()) => Outcome::show(Notification::success(
                "Account Deleted",
                "Account deleted successfully",
            ))
            .then(Route::Home),
            Err(e) => {
                warn!("Error deleting account: {}", e);
                Outcome::show(Notification::error("Deletion Failed", deletion_message(&e)))
            }
        })
    }
}

fn deletion_message(err: &PortalError) -> String {
    match err {
        PortalError::PasswordRequired => DELETE_PASSWORD_PROMPT.to_string(),
        PortalError::DeletionIncomplete(_) => {
            "Account deletion did not complete. Please contact support.".to_string()
        }
        _ => match err.code() {
            Some(AuthErrorCode::InvalidCredential | AuthErrorCode::WrongPassword) => {
                "Incorrect password. Please try again.".to_string()
            }
            Some(AuthErrorCode::RequiresRecentLogin) => {
                "Session expired. Please log in again and try.".to_string()
            }
            Some(AuthErrorCode::TooManyRequests) => {
                "Too many attempts. Please try again in a few minutes.".to_string()
            }
            Some(AuthErrorCode::PopupClosedByUser) => {
                "Authentication cancelled. Please try again.".to_string()
            }
            Some(AuthErrorCode::UserMismatch) => "Authentication mismatch failure".to_string(),
            _ => err.friendly_message(),
        },
    }
}

fn password_change_message(err: &PortalError) -> String {
    match err.code() {
        Some(AuthErrorCode::InvalidCredential | AuthErrorCode::WrongPassword) => {
            "Current password is incorrect.".to_string()
        }
        Some(AuthErrorCode::NetworkRequestFailed) => {
            "Network error. Check your connection.".to_string()
        }
        _ => err.friendly_message(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::error::ProviderError;

    fn provider_error(code: AuthErrorCode) -> PortalError {
        PortalError::Provider(ProviderError::from_code(code))
    }

    #[test]
    fn test_deletion_messages() {
        assert_eq!(
            deletion_message(&provider_error(AuthErrorCode::InvalidCredential)),
            "Incorrect password. Please try again."
        );
        assert_eq!(
            deletion_message(&provider_error(AuthErrorCode::UserMismatch)),
            "Authentication mismatch failure"
        );
        assert_eq!(
            deletion_message(&PortalError::PasswordRequired),
            DELETE_PASSWORD_PROMPT
        );
    }

    #[test]
    fn test_password_change_messages() {
        assert_eq!(
            password_change_message(&provider_error(AuthErrorCode::InvalidCredential)),
            "Current password is incorrect."
        );
        assert_eq!(
            password_change_message(&provider_error(AuthErrorCode::NetworkRequestFailed)),
            "Network error. Check your connection."
        );
    }
}
