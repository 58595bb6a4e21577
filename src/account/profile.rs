//! Profile document kept in the `users` collection, one per identity

use crate::account::error::PortalError;
use crate::account::identity::Identity;
use crate::account::store::{Document, FieldValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDocument {
    pub uid: String,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub provider: ProfileProvider,
    pub created_at: DateTime<Utc>,
    pub verified: bool,
    pub last_login_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// How the profile's identity was first created.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProfileProvider {
    Email,
    Google,
}

impl ProfileDocument {
    /// Profile for an email/password registration; starts unverified.
    pub fn for_email(identity: &Identity, name: impl Into<String>, phone: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            uid: identity.uid.clone(),
            email: identity.email.clone(),
            name: name.into(),
            phone: phone.filter(|p| !p.is_empty()),
            provider: ProfileProvider::Email,
            created_at: now,
            verified: false,
            last_login_at: now,
            updated_at: None,
        }
    }

    /// Profile created lazily on the first federated sign-in.
    pub fn for_google(identity: &Identity) -> Self {
        let now = Utc::now();
        Self {
            uid: identity.uid.clone(),
            email: identity.email.clone(),
            name: identity.display_name.clone().unwrap_or_default(),
            phone: None,
            provider: ProfileProvider::Google,
            created_at: now,
            verified: identity.email_verified,
            last_login_at: now,
            updated_at: None,
        }
    }

    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("uid".to_string(), self.uid.clone().into());
        doc.insert("email".to_string(), self.email.clone().into());
        doc.insert("name".to_string(), self.name.clone().into());
        doc.insert(
            "phone".to_string(),
            self.phone.clone().unwrap_or_default().into(),
        );
        doc.insert("provider".to_string(), self.provider.to_string().into());
        doc.insert("createdAt".to_string(), self.created_at.into());
        doc.insert("verified".to_string(), self.verified.into());
        doc.insert("lastLoginAt".to_string(), self.last_login_at.into());
        if let Some(updated_at) = self.updated_at {
            doc.insert("updatedAt".to_string(), updated_at.into());
        }
        doc
    }

    pub fn from_document(doc: &Document) -> Result<Self, PortalError> {
        let text = |key: &str| -> Result<String, PortalError> {
            doc.get(key)
                .and_then(FieldValue::as_str)
                .map(str::to_string)
                .ok_or_else(|| PortalError::Store(format!("profile field '{}' is missing", key)))
        };
        let time = |key: &str| doc.get(key).and_then(FieldValue::as_timestamp);

        let provider = match text("provider")?.as_str() {
            "email" => ProfileProvider::Email,
            "google" => ProfileProvider::Google,
            other => {
                return Err(PortalError::Store(format!(
                    "unknown profile provider '{}'",
                    other
                )))
            }
        };
        let created_at = time("createdAt")
            .ok_or_else(|| PortalError::Store("profile field 'createdAt' is missing".to_string()))?;

        Ok(Self {
            uid: text("uid")?,
            email: text("email")?,
            name: text("name").unwrap_or_default(),
            phone: doc
                .get("phone")
                .and_then(FieldValue::as_str)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            provider,
            created_at,
            // Federated profiles written before the flag existed count as verified.
            verified: doc
                .get("verified")
                .and_then(FieldValue::as_bool)
                .unwrap_or(provider == ProfileProvider::Google),
            last_login_at: time("lastLoginAt").unwrap_or(created_at),
            updated_at: time("updatedAt"),
        })
    }
}

impl std::fmt::Display for ProfileProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileProvider::Email => write!(f, "email"),
            ProfileProvider::Google => write!(f, "google"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::identity::LinkedProvider;

    fn identity() -> Identity {
        Identity {
            uid: "u1".to_string(),
            email: "s@x.com".to_string(),
            display_name: Some("Sam".to_string()),
            email_verified: true,
            providers: vec![LinkedProvider::Google],
        }
    }

    #[test]
    fn test_email_profile_starts_unverified() {
        let profile = ProfileDocument::for_email(&identity(), "Sam", Some("+15551234567".into()));
        assert_eq!(profile.provider, ProfileProvider::Email);
        assert!(!profile.verified);
        assert_eq!(profile.created_at, profile.last_login_at);
    }

    #[test]
    fn test_google_profile_takes_verification_from_identity() {
        let profile = ProfileDocument::for_google(&identity());
        assert_eq!(profile.provider, ProfileProvider::Google);
        assert!(profile.verified);
        assert_eq!(profile.name, "Sam");
    }

    #[test]
    fn test_document_conversion_keeps_fields() {
        let profile = ProfileDocument::for_email(&identity(), "Sam", None);
        let doc = profile.to_document();
        assert_eq!(doc.get("provider"), Some(&FieldValue::from("email")));
        assert_eq!(doc.get("phone"), Some(&FieldValue::from("")));

        let back = ProfileDocument::from_document(&doc).unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn test_missing_required_field_is_store_error() {
        let mut doc = ProfileDocument::for_google(&identity()).to_document();
        doc.remove("uid");
        assert!(matches!(
            ProfileDocument::from_document(&doc),
            Err(PortalError::Store(_))
        ));
    }
}
