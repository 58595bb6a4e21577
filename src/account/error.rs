//! Error types for accounts, profiles and provider calls

use std::fmt;
use thiserror::Error;

/// Fallback text for provider codes that have no entry in the lookup table.
pub const FALLBACK_MESSAGE: &str = "Something went wrong.";

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("Document store error: {0}")]
    Store(String),

    #[error("No user logged in")]
    NoActiveUser,

    #[error("Password is required for email/password users")]
    PasswordRequired,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Account deletion incomplete: {0}")]
    DeletionIncomplete(String),

    #[error("Email service error: {0}")]
    Email(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
}

impl PortalError {
    /// The provider code carried by this error, if it came from the identity provider.
    pub fn code(&self) -> Option<&AuthErrorCode> {
        match self {
            PortalError::Provider(e) => Some(&e.code),
            _ => None,
        }
    }

    /// User-facing text for the error.
    pub fn friendly_message(&self) -> String {
        match self {
            PortalError::Provider(e) => e.code.friendly_message().to_string(),
            other => other.to_string(),
        }
    }
}

/// Provider-defined failure codes, in the provider's `auth/*` vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuthErrorCode {
    EmailAlreadyInUse,
    InvalidEmail,
    UserNotFound,
    WrongPassword,
    TooManyRequests,
    NetworkRequestFailed,
    InternalError,
    WeakPassword,
    InvalidCredential,
    RequiresRecentLogin,
    PopupClosedByUser,
    UserMismatch,
    UserDisabled,
    OperationNotAllowed,
    Other(String),
}

impl AuthErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            AuthErrorCode::EmailAlreadyInUse => "auth/email-already-in-use",
            AuthErrorCode::InvalidEmail => "auth/invalid-email",
            AuthErrorCode::UserNotFound => "auth/user-not-found",
            AuthErrorCode::WrongPassword => "auth/wrong-password",
            AuthErrorCode::TooManyRequests => "auth/too-many-requests",
            AuthErrorCode::NetworkRequestFailed => "auth/network-request-failed",
            AuthErrorCode::InternalError => "auth/internal-error",
            AuthErrorCode::WeakPassword => "auth/weak-password",
            AuthErrorCode::InvalidCredential => "auth/invalid-credential",
            AuthErrorCode::RequiresRecentLogin => "auth/requires-recent-login",
            AuthErrorCode::PopupClosedByUser => "auth/popup-closed-by-user",
            AuthErrorCode::UserMismatch => "auth/user-mismatch",
            AuthErrorCode::UserDisabled => "auth/user-disabled",
            AuthErrorCode::OperationNotAllowed => "auth/operation-not-allowed",
            AuthErrorCode::Other(code) => code,
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code {
            "auth/email-already-in-use" => AuthErrorCode::EmailAlreadyInUse,
            "auth/invalid-email" => AuthErrorCode::InvalidEmail,
            "auth/user-not-found" => AuthErrorCode::UserNotFound,
            "auth/wrong-password" => AuthErrorCode::WrongPassword,
            "auth/too-many-requests" => AuthErrorCode::TooManyRequests,
            "auth/network-request-failed" => AuthErrorCode::NetworkRequestFailed,
            "auth/internal-error" => AuthErrorCode::InternalError,
            "auth/weak-password" => AuthErrorCode::WeakPassword,
            "auth/invalid-credential" => AuthErrorCode::InvalidCredential,
            "auth/requires-recent-login" => AuthErrorCode::RequiresRecentLogin,
            "auth/popup-closed-by-user" => AuthErrorCode::PopupClosedByUser,
            "auth/user-mismatch" => AuthErrorCode::UserMismatch,
            "auth/user-disabled" => AuthErrorCode::UserDisabled,
            "auth/operation-not-allowed" => AuthErrorCode::OperationNotAllowed,
            other => AuthErrorCode::Other(other.to_string()),
        }
    }

    /// Normalizes an Identity Toolkit REST error string such as
    /// `WEAK_PASSWORD : Password should be at least 6 characters`.
    pub fn from_rest_message(message: &str) -> Self {
        let head = message.split(':').next().unwrap_or_default().trim();
        match head {
            "EMAIL_EXISTS" => AuthErrorCode::EmailAlreadyInUse,
            "INVALID_EMAIL" | "MISSING_EMAIL" => AuthErrorCode::InvalidEmail,
            "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" => AuthErrorCode::UserNotFound,
            "INVALID_PASSWORD" | "MISSING_PASSWORD" => AuthErrorCode::WrongPassword,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => AuthErrorCode::TooManyRequests,
            "WEAK_PASSWORD" => AuthErrorCode::WeakPassword,
            "INVALID_LOGIN_CREDENTIALS" | "INVALID_IDP_RESPONSE" | "INVALID_ID_TOKEN" => {
                AuthErrorCode::InvalidCredential
            }
            "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" | "TOKEN_EXPIRED" => {
                AuthErrorCode::RequiresRecentLogin
            }
            "USER_DISABLED" => AuthErrorCode::UserDisabled,
            "OPERATION_NOT_ALLOWED" | "PASSWORD_LOGIN_DISABLED" => {
                AuthErrorCode::OperationNotAllowed
            }
            _ => AuthErrorCode::Other(format!("auth/{}", head.to_lowercase().replace('_', "-"))),
        }
    }

    pub fn friendly_message(&self) -> &'static str {
        match self {
            AuthErrorCode::EmailAlreadyInUse => "Email already in use. Try logging in instead.",
            AuthErrorCode::InvalidEmail => "Please enter a valid email address.",
            AuthErrorCode::UserNotFound => "No account found with this email.",
            AuthErrorCode::WrongPassword => "Incorrect password.",
            AuthErrorCode::TooManyRequests => "Too many attempts. Please try again later.",
            AuthErrorCode::NetworkRequestFailed | AuthErrorCode::InternalError => {
                "Network error. Check your connection."
            }
            AuthErrorCode::WeakPassword => "Password should be at least 6 characters.",
            AuthErrorCode::InvalidCredential => "Invalid login credentials.",
            AuthErrorCode::RequiresRecentLogin => "Please log in again.",
            AuthErrorCode::PopupClosedByUser => {
                "You closed the login popup before completing the sign-in."
            }
            _ => FALLBACK_MESSAGE,
        }
    }
}

impl fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error raised by the identity provider, propagated verbatim to callers.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} ({code})")]
pub struct ProviderError {
    pub code: AuthErrorCode,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: AuthErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn from_code(code: AuthErrorCode) -> Self {
        let message = code.friendly_message().to_string();
        Self { code, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip_through_strings() {
        let code = AuthErrorCode::from_code("auth/requires-recent-login");
        assert_eq!(code, AuthErrorCode::RequiresRecentLogin);
        assert_eq!(code.as_str(), "auth/requires-recent-login");
    }

    #[test]
    fn test_unmapped_code_falls_back() {
        let code = AuthErrorCode::from_code("auth/quota-exceeded");
        assert_eq!(code, AuthErrorCode::Other("auth/quota-exceeded".to_string()));
        assert_eq!(code.friendly_message(), FALLBACK_MESSAGE);
    }

    #[test]
    fn test_rest_messages_are_normalized() {
        assert_eq!(
            AuthErrorCode::from_rest_message("WEAK_PASSWORD : Password should be at least 6 characters"),
            AuthErrorCode::WeakPassword
        );
        assert_eq!(
            AuthErrorCode::from_rest_message("INVALID_LOGIN_CREDENTIALS"),
            AuthErrorCode::InvalidCredential
        );
        assert_eq!(
            AuthErrorCode::from_rest_message("SOMETHING_NEW"),
            AuthErrorCode::Other("auth/something-new".to_string())
        );
    }

    #[test]
    fn test_friendly_message_for_provider_error() {
        let err = PortalError::from(ProviderError::from_code(AuthErrorCode::TooManyRequests));
        assert_eq!(err.friendly_message(), "Too many attempts. Please try again later.");
        assert_eq!(err.code(), Some(&AuthErrorCode::TooManyRequests));
        assert_eq!(PortalError::NoActiveUser.friendly_message(), "No user logged in");
    }
}
