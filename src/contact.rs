//! Contact form relayed through a transactional email service

use crate::account::PortalError;
use crate::forms::validate::check_email;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub subject: String,
    #[serde(default)]
    pub grade_level: String,
    pub message: String,
}

impl ContactMessage {
    /// Returns one message per offending field.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("Name is required".to_string());
        }
        if self.email.trim().is_empty() {
            errors.push("Email is required".to_string());
        } else {
            let email_error = check_email(self.email.trim());
            if !email_error.is_empty() {
                errors.push(email_error);
            }
        }
        if self.subject.trim().is_empty() {
            errors.push("Subject is required".to_string());
        }
        if self.message.trim().is_empty() {
            errors.push("Message is required".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Template variables, named the way the email template expects them.
    pub fn template_params(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("user_name", self.name.clone()),
            ("user_email", self.email.clone()),
            ("user_phone", self.phone.clone()),
            ("subject", self.subject.clone()),
            ("grade_level", self.grade_level.clone()),
            ("message", self.message.clone()),
        ])
    }
}

#[async_trait]
pub trait EmailService: Send + Sync {
    async fn send(&self, message: &ContactMessage) -> Result<(), PortalError>;
}

/// Sends without waiting; `on_done` receives the outcome. Nothing is retried.
pub fn dispatch<F>(service: Arc<dyn EmailService>, message: ContactMessage, on_done: F)
where
    F: FnOnce(Result<(), PortalError>) + Send + 'static,
{
    tokio::spawn(async move {
        let result = service.send(&message).await;
        if let Err(e) = &result {
            warn!("Contact message from {} was not sent: {}", message.email, e);
        }
        on_done(result);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> ContactMessage {
        ContactMessage {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            phone: String::new(),
            subject: "Admissions".to_string(),
            grade_level: "Grade 7".to_string(),
            message: "When does term start?".to_string(),
        }
    }

    #[test]
    fn test_valid_message() {
        assert!(message().validate().is_ok());
    }

    #[test]
    fn test_required_fields() {
        let errors = ContactMessage::default().validate().unwrap_err();
        assert_eq!(
            errors,
            vec![
                "Name is required",
                "Email is required",
                "Subject is required",
                "Message is required"
            ]
        );
    }

    #[test]
    fn test_bad_email() {
        let mut msg = message();
        msg.email = "ada".to_string();
        assert_eq!(msg.validate().unwrap_err(), vec!["Invalid email address"]);
    }

    #[test]
    fn test_template_params_use_form_names() {
        let params = message().template_params();
        assert_eq!(params["user_name"], "Ada");
        assert_eq!(params["grade_level"], "Grade 7");
        assert_eq!(params.len(), 6);
    }
}
