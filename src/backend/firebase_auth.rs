//! Firebase Authentication over the Identity Toolkit REST API

use crate::account::error::{AuthErrorCode, PortalError, ProviderError};
use crate::account::identity::{
    AuthStateReceiver, FederatedProvider, Identity, IdentityProvider, LinkedProvider,
    OAuthCredential, PopupHandler,
};
use crate::backend::firestore::TokenSource;
use crate::config::FirebaseConfig;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tracing::{debug, info};

/// Redirect URI sent with federated credentials; the REST API only checks that it parses.
const IDP_REQUEST_URI: &str = "http://localhost";

#[derive(Debug, Clone)]
struct AuthSession {
    identity: Identity,
    id_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateResponse {
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<UserRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRecord {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    provider_user_info: Vec<ProviderUserInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderUserInfo {
    provider_id: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl UserRecord {
    fn into_identity(self) -> Identity {
        Identity {
            uid: self.local_id,
            email: self.email.unwrap_or_default(),
            display_name: self.display_name.filter(|n| !n.is_empty()),
            email_verified: self.email_verified,
            providers: self
                .provider_user_info
                .iter()
                .map(|p| LinkedProvider::from_provider_id(&p.provider_id))
                .collect(),
        }
    }
}

fn expiry(expires_in: Option<&str>) -> DateTime<Utc> {
    let secs = expires_in.and_then(|s| s.parse::<i64>().ok()).unwrap_or(3600);
    // Refresh a minute early so tokens never expire mid-request.
    Utc::now() + Duration::seconds(secs - 60)
}

fn idp_post_body(credential: &OAuthCredential) -> Result<String, PortalError> {
    let provider_id = credential.provider.provider_id();
    match (&credential.id_token, &credential.access_token) {
        (Some(token), _) => Ok(format!("id_token={}&providerId={}", token, provider_id)),
        (None, Some(token)) => Ok(format!("access_token={}&providerId={}", token, provider_id)),
        (None, None) => Err(ProviderError::new(
            AuthErrorCode::InvalidCredential,
            "Federated credential carries no token",
        )
        .into()),
    }
}

pub struct FirebaseAuth {
    http: reqwest::Client,
    auth_endpoint: String,
    token_endpoint: String,
    api_key: String,
    popup: Option<Arc<dyn PopupHandler>>,
    session: RwLock<Option<AuthSession>>,
    auth_state: watch::Sender<Option<Identity>>,
}

impl FirebaseAuth {
    pub fn new(config: &FirebaseConfig) -> Self {
        let (auth_state, _) = watch::channel(None);
        Self {
            http: reqwest::Client::new(),
            auth_endpoint: config.auth_endpoint.trim_end_matches('/').to_string(),
            token_endpoint: config.token_endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            popup: None,
            session: RwLock::new(None),
            auth_state,
        }
    }

    pub fn with_popup_handler(mut self, popup: Arc<dyn PopupHandler>) -> Self {
        self.popup = Some(popup);
        self
    }

    fn read_session(&self) -> Option<AuthSession> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn write_session(&self, session: Option<AuthSession>) {
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = session;
    }

    fn require_session(&self) -> Result<AuthSession, PortalError> {
        self.read_session().ok_or(PortalError::NoActiveUser)
    }

    async fn post<T: DeserializeOwned>(&self, url: String, body: Value) -> Result<T, PortalError> {
        let response = self.http.post(&url).json(&body).send().await.map_err(|e| {
            PortalError::Provider(ProviderError::new(
                AuthErrorCode::NetworkRequestFailed,
                e.to_string(),
            ))
        })?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {}", status));
            debug!("Identity Toolkit error from {}: {}", url, message);
            return Err(ProviderError::new(AuthErrorCode::from_rest_message(&message), message).into());
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn accounts<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, PortalError> {
        let url = format!("{}/accounts:{}?key={}", self.auth_endpoint, method, self.api_key);
        self.post(url, body).await
    }

    async fn lookup(&self, id_token: &str) -> Result<Identity, PortalError> {
        let response: LookupResponse = self.accounts("lookup", json!({ "idToken": id_token })).await?;
        response
            .users
            .into_iter()
            .next()
            .map(UserRecord::into_identity)
            .ok_or_else(|| ProviderError::from_code(AuthErrorCode::UserNotFound).into())
    }

    /// Turns a token response into the active session and announces it.
    async fn establish(&self, tokens: TokenResponse) -> Result<Identity, PortalError> {
        let mut identity = self.lookup(&tokens.id_token).await?;
        if identity.email.is_empty() {
            identity.email = tokens.email.clone().unwrap_or_default();
        }
        if identity.display_name.is_none() {
            identity.display_name = tokens.display_name.clone();
        }
        self.write_session(Some(AuthSession {
            identity: identity.clone(),
            id_token: tokens.id_token,
            refresh_token: tokens.refresh_token,
            expires_at: expiry(tokens.expires_in.as_deref()),
        }));
        self.auth_state.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    /// Re-proves the current identity; the new tokens replace the old ones.
    async fn renew(&self, tokens: TokenResponse) -> Result<Identity, PortalError> {
        let session = self.require_session()?;
        if tokens.local_id != session.identity.uid {
            return Err(ProviderError::from_code(AuthErrorCode::UserMismatch).into());
        }
        self.write_session(Some(AuthSession {
            identity: session.identity.clone(),
            id_token: tokens.id_token,
            refresh_token: tokens.refresh_token,
            expires_at: expiry(tokens.expires_in.as_deref()),
        }));
        Ok(session.identity)
    }

    fn apply_update(&self, update: UpdateResponse, edit: impl FnOnce(&mut Identity)) {
        let mut guard = self.session.write().unwrap_or_else(|e| e.into_inner());
        if let Some(session) = guard.as_mut() {
            edit(&mut session.identity);
            if let (Some(id_token), Some(refresh_token)) = (update.id_token, update.refresh_token) {
                session.id_token = id_token;
                session.refresh_token = refresh_token;
                session.expires_at = expiry(update.expires_in.as_deref());
            }
        }
    }

    async fn federated_tokens(&self, provider: FederatedProvider) -> Result<TokenResponse, PortalError> {
        let popup = self.popup.as_ref().ok_or_else(|| {
            PortalError::from(ProviderError::new(
                AuthErrorCode::OperationNotAllowed,
                "No popup handler configured for federated sign-in",
            ))
        })?;
        let credential = popup.open(provider).await?;
        let body = json!({
            "postBody": idp_post_body(&credential)?,
            "requestUri": IDP_REQUEST_URI,
            "returnSecureToken": true,
            "returnIdpCredential": true,
        });
        self.accounts("signInWithIdp", body).await
    }

    async fn fresh_id_token(&self) -> Result<Option<String>, PortalError> {
        let Some(session) = self.read_session() else {
            return Ok(None);
        };
        if session.expires_at > Utc::now() {
            return Ok(Some(session.id_token));
        }

        let url = format!("{}/token?key={}", self.token_endpoint, self.api_key);
        let refreshed: RefreshResponse = self
            .post(
                url,
                json!({ "grant_type": "refresh_token", "refresh_token": session.refresh_token }),
            )
            .await?;
        let id_token = refreshed.id_token.clone();
        self.apply_update(
            UpdateResponse {
                id_token: Some(refreshed.id_token),
                refresh_token: Some(refreshed.refresh_token),
                expires_in: Some(refreshed.expires_in),
            },
            |_| {},
        );
        debug!("Refreshed ID token for {}", session.identity.uid);
        Ok(Some(id_token))
    }
}

#[async_trait]
impl TokenSource for FirebaseAuth {
    async fn id_token(&self) -> Result<Option<String>, PortalError> {
        self.fresh_id_token().await
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuth {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, PortalError> {
        let tokens: TokenResponse = self
            .accounts(
                "signInWithPassword",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        self.establish(tokens).await
    }

    async fn create_user_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, PortalError> {
        let tokens: TokenResponse = self
            .accounts(
                "signUp",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        let identity = self.establish(tokens).await?;
        info!("Created identity {}", identity.uid);
        Ok(identity)
    }

    async fn sign_in_with_popup(
        &self,
        provider: FederatedProvider,
    ) -> Result<Identity, PortalError> {
        let tokens = self.federated_tokens(provider).await?;
        self.establish(tokens).await
    }

    async fn update_display_name(&self, name: &str) -> Result<(), PortalError> {
        let id_token = self.fresh_id_token().await?.ok_or(PortalError::NoActiveUser)?;
        let update: UpdateResponse = self
            .accounts(
                "update",
                json!({ "idToken": id_token, "displayName": name, "returnSecureToken": true }),
            )
            .await?;
        self.apply_update(update, |identity| identity.display_name = Some(name.to_string()));
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<(), PortalError> {
        let id_token = self.fresh_id_token().await?.ok_or(PortalError::NoActiveUser)?;
        let update: UpdateResponse = self
            .accounts(
                "update",
                json!({ "idToken": id_token, "password": new_password, "returnSecureToken": true }),
            )
            .await?;
        self.apply_update(update, |_| {});
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), PortalError> {
        let _: Value = self
            .accounts(
                "sendOobCode",
                json!({ "requestType": "PASSWORD_RESET", "email": email }),
            )
            .await?;
        Ok(())
    }

    async fn send_email_verification(&self) -> Result<(), PortalError> {
        let id_token = self.fresh_id_token().await?.ok_or(PortalError::NoActiveUser)?;
        let _: Value = self
            .accounts(
                "sendOobCode",
                json!({ "requestType": "VERIFY_EMAIL", "idToken": id_token }),
            )
            .await?;
        Ok(())
    }

    async fn reauthenticate_with_password(&self, password: &str) -> Result<Identity, PortalError> {
        let session = self.require_session()?;
        let tokens: TokenResponse = self
            .accounts(
                "signInWithPassword",
                json!({
                    "email": session.identity.email,
                    "password": password,
                    "returnSecureToken": true,
                }),
            )
            .await?;
        self.renew(tokens).await
    }

    async fn reauthenticate_with_popup(
        &self,
        provider: FederatedProvider,
    ) -> Result<Identity, PortalError> {
        self.require_session()?;
        let tokens = self.federated_tokens(provider).await?;
        self.renew(tokens).await
    }

    async fn delete_current_user(&self) -> Result<(), PortalError> {
        let session = self.require_session()?;
        let id_token = self.fresh_id_token().await?.ok_or(PortalError::NoActiveUser)?;
        let _: Value = self
            .accounts("delete", json!({ "idToken": id_token }))
            .await?;
        self.write_session(None);
        self.auth_state.send_replace(None);
        info!("Deleted identity {}", session.identity.uid);
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), PortalError> {
        self.write_session(None);
        self.auth_state.send_replace(None);
        Ok(())
    }

    async fn reload(&self) -> Result<Option<Identity>, PortalError> {
        let Some(id_token) = self.fresh_id_token().await? else {
            return Ok(None);
        };
        let identity = self.lookup(&id_token).await?;
        let mut guard = self.session.write().unwrap_or_else(|e| e.into_inner());
        if let Some(session) = guard.as_mut() {
            session.identity = identity.clone();
        }
        Ok(Some(identity))
    }

    fn current_identity(&self) -> Option<Identity> {
        self.read_session().map(|s| s.identity)
    }

    fn subscribe(&self) -> AuthStateReceiver {
        self.auth_state.subscribe()
    }
}
