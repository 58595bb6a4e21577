//! EmailJS REST client for the contact form

use crate::account::error::PortalError;
use crate::config::EmailConfig;
use crate::contact::{ContactMessage, EmailService};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: BTreeMap<&'static str, String>,
}

pub struct EmailJs {
    http: reqwest::Client,
    config: EmailConfig,
}

impl EmailJs {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl EmailService for EmailJs {
    async fn send(&self, message: &ContactMessage) -> Result<(), PortalError> {
        if self.config.service_id.is_empty() || self.config.public_key.is_empty() {
            return Err(PortalError::Config(
                "email.service_id and email.public_key must be set".to_string(),
            ));
        }
        let request = SendRequest {
            service_id: &self.config.service_id,
            template_id: &self.config.template_id,
            user_id: &self.config.public_key,
            template_params: message.template_params(),
        };

        let response = self
            .http
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| PortalError::Email(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortalError::Email(format!("{}: {}", status, body)));
        }
        info!("Contact message from {} sent", message.email);
        Ok(())
    }
}
