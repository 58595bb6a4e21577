//! Configuration for the portal: Firebase project, EmailJS keys and server settings

use crate::account::PortalError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub firebase: FirebaseConfig,
    pub email: EmailConfig,
    pub session: SessionConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FirebaseConfig {
    /// Web API key of the Firebase project
    pub api_key: String,
    pub project_id: String,
    /// Collection holding one profile document per identity
    pub users_collection: String,
    pub auth_endpoint: String,
    pub token_endpoint: String,
    pub firestore_endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub poll_interval_ms: u64,
    pub login_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl PortalConfig {
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.firebase.api_key = api_key.into();
        config.firebase.project_id = project_id.into();
        config
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.session.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Reads a TOML file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PortalError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var("PORTAL_FIREBASE_API_KEY") {
            self.firebase.api_key = key;
        }
        if let Ok(project) = std::env::var("PORTAL_FIREBASE_PROJECT_ID") {
            self.firebase.project_id = project;
        }
        if let Ok(key) = std::env::var("PORTAL_EMAILJS_PUBLIC_KEY") {
            self.email.public_key = key;
        }
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.session.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), PortalError> {
        if self.firebase.api_key.is_empty() {
            return Err(PortalError::Config("firebase.api_key is not set".to_string()));
        }
        if self.firebase.project_id.is_empty() {
            return Err(PortalError::Config("firebase.project_id is not set".to_string()));
        }
        if self.session.poll_interval_ms == 0 {
            return Err(PortalError::Config(
                "session.poll_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            project_id: String::new(),
            users_collection: "users".to_string(),
            auth_endpoint: "https://identitytoolkit.googleapis.com/v1".to_string(),
            token_endpoint: "https://securetoken.googleapis.com/v1".to_string(),
            firestore_endpoint: "https://firestore.googleapis.com/v1".to_string(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            service_id: String::new(),
            template_id: String::new(),
            public_key: String::new(),
            endpoint: "https://api.emailjs.com/api/v1.0/email/send".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3000,
            login_path: "/login".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: PortalConfig = toml::from_str(
            r#"
            [firebase]
            api_key = "key"
            project_id = "school"

            [session]
            poll_interval_ms = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.firebase.users_collection, "users");
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.session.login_path, "/login");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_keys_fail_validation() {
        let config = PortalConfig::default();
        assert!(matches!(config.validate(), Err(PortalError::Config(_))));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = PortalConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config.session.poll_interval_ms, 3000);
    }
}
