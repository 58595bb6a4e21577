//! In-process identity provider, document store and email service
//!
//! Used for local development and tests. Each fake records the calls made to it and can be
//! told to fail the next call of a given kind with a provider code.

use crate::account::error::{AuthErrorCode, PortalError, ProviderError};
use crate::account::identity::{
    AuthStateReceiver, FederatedProvider, Identity, IdentityProvider, LinkedProvider,
};
use crate::account::store::{Document, DocumentStore};
use crate::contact::{ContactMessage, EmailService};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{watch, Notify};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthOp {
    SignIn,
    CreateUser,
    Popup,
    UpdateDisplayName,
    UpdatePassword,
    PasswordReset,
    SendVerification,
    Reauthenticate,
    ReauthenticatePopup,
    Delete,
    SignOut,
    Reload,
}

#[derive(Debug, Clone)]
struct Account {
    identity: Identity,
    password: Option<String>,
    last_auth: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct FederatedAccount {
    email: String,
    name: String,
}

#[derive(Default)]
struct AuthInner {
    accounts: HashMap<String, Account>,
    current: Option<String>,
    failures: HashMap<AuthOp, AuthErrorCode>,
    popups: VecDeque<FederatedAccount>,
    calls: HashMap<AuthOp, usize>,
    verification_emails: HashMap<String, usize>,
    reset_emails: Vec<String>,
}

pub struct InMemoryIdentityProvider {
    inner: Mutex<AuthInner>,
    auth_state: watch::Sender<Option<Identity>>,
    recent_login: Duration,
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        let (auth_state, _) = watch::channel(None);
        Self {
            inner: Mutex::new(AuthInner::default()),
            auth_state,
            recent_login: Duration::minutes(5),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AuthInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seeds a password account without signing it in.
    pub fn add_password_account(&self, email: &str, password: &str, name: &str) -> Identity {
        let identity = Identity {
            uid: Uuid::new_v4().to_string(),
            email: email.to_string(),
            display_name: Some(name.to_string()),
            email_verified: false,
            providers: vec![LinkedProvider::Password],
        };
        self.lock().accounts.insert(
            identity.uid.clone(),
            Account {
                identity: identity.clone(),
                password: Some(password.to_string()),
                last_auth: Utc::now(),
            },
        );
        identity
    }

    /// The next popup completes as this Google account.
    pub fn queue_popup(&self, email: &str, name: &str) {
        self.lock().popups.push_back(FederatedAccount {
            email: email.to_string(),
            name: name.to_string(),
        });
    }

    pub fn fail_next(&self, op: AuthOp, code: AuthErrorCode) {
        self.lock().failures.insert(op, code);
    }

    /// Simulates the user clicking the link in the verification email.
    pub fn mark_email_verified(&self, uid: &str) {
        if let Some(account) = self.lock().accounts.get_mut(uid) {
            account.identity.email_verified = true;
        }
    }

    /// Pushes the last sign-in of `uid` outside the recent-login window.
    pub fn expire_login(&self, uid: &str) {
        let window = self.recent_login;
        if let Some(account) = self.lock().accounts.get_mut(uid) {
            account.last_auth = Utc::now() - window - Duration::seconds(1);
        }
    }

    pub fn calls(&self, op: AuthOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    pub fn verification_emails_sent(&self, uid: &str) -> usize {
        self.lock().verification_emails.get(uid).copied().unwrap_or(0)
    }

    pub fn reset_emails(&self) -> Vec<String> {
        self.lock().reset_emails.clone()
    }

    pub fn has_account(&self, uid: &str) -> bool {
        self.lock().accounts.contains_key(uid)
    }

    pub fn account_password(&self, uid: &str) -> Option<String> {
        self.lock().accounts.get(uid).and_then(|a| a.password.clone())
    }

    /// Counts the call and consumes an injected failure, if any.
    fn enter(&self, op: AuthOp) -> Result<MutexGuard<'_, AuthInner>, PortalError> {
        let mut inner = self.lock();
        *inner.calls.entry(op).or_insert(0) += 1;
        if let Some(code) = inner.failures.remove(&op) {
            return Err(ProviderError::from_code(code).into());
        }
        Ok(inner)
    }

    fn publish(&self, identity: Option<Identity>) {
        self.auth_state.send_replace(identity);
    }
}

fn provider_error(code: AuthErrorCode) -> PortalError {
    ProviderError::from_code(code).into()
}

fn current_account(inner: &mut AuthInner) -> Result<&mut Account, PortalError> {
    let uid = inner.current.clone().ok_or(PortalError::NoActiveUser)?;
    inner
        .accounts
        .get_mut(&uid)
        .ok_or_else(|| provider_error(AuthErrorCode::UserNotFound))
}

fn find_by_email<'a>(inner: &'a mut AuthInner, email: &str) -> Option<&'a mut Account> {
    inner
        .accounts
        .values_mut()
        .find(|a| a.identity.email.eq_ignore_ascii_case(email))
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, PortalError> {
        let identity = {
            let mut inner = self.enter(AuthOp::SignIn)?;
            let account = find_by_email(&mut inner, email)
                .filter(|a| a.password.as_deref() == Some(password))
                .ok_or_else(|| provider_error(AuthErrorCode::InvalidCredential))?;
            account.last_auth = Utc::now();
            let identity = account.identity.clone();
            inner.current = Some(identity.uid.clone());
            identity
        };
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn create_user_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, PortalError> {
        let identity = {
            let mut inner = self.enter(AuthOp::CreateUser)?;
            if find_by_email(&mut inner, email).is_some() {
                return Err(provider_error(AuthErrorCode::EmailAlreadyInUse));
            }
            if password.chars().count() < 6 {
                return Err(provider_error(AuthErrorCode::WeakPassword));
            }
            let identity = Identity {
                uid: Uuid::new_v4().to_string(),
                email: email.to_string(),
                display_name: None,
                email_verified: false,
                providers: vec![LinkedProvider::Password],
            };
            inner.accounts.insert(
                identity.uid.clone(),
                Account {
                    identity: identity.clone(),
                    password: Some(password.to_string()),
                    last_auth: Utc::now(),
                },
            );
            inner.current = Some(identity.uid.clone());
            identity
        };
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in_with_popup(
        &self,
        _provider: FederatedProvider,
    ) -> Result<Identity, PortalError> {
        let identity = {
            let mut inner = self.enter(AuthOp::Popup)?;
            let popup = inner
                .popups
                .pop_front()
                .ok_or_else(|| provider_error(AuthErrorCode::PopupClosedByUser))?;
            let identity = match find_by_email(&mut inner, &popup.email) {
                Some(account) => {
                    if !account.identity.providers.contains(&LinkedProvider::Google) {
                        account.identity.providers.push(LinkedProvider::Google);
                    }
                    account.identity.email_verified = true;
                    account.last_auth = Utc::now();
                    account.identity.clone()
                }
                None => {
                    let identity = Identity {
                        uid: Uuid::new_v4().to_string(),
                        email: popup.email.clone(),
                        display_name: Some(popup.name.clone()),
                        email_verified: true,
                        providers: vec![LinkedProvider::Google],
                    };
                    inner.accounts.insert(
                        identity.uid.clone(),
                        Account {
                            identity: identity.clone(),
                            password: None,
                            last_auth: Utc::now(),
                        },
                    );
                    identity
                }
            };
            inner.current = Some(identity.uid.clone());
            identity
        };
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn update_display_name(&self, name: &str) -> Result<(), PortalError> {
        let mut inner = self.enter(AuthOp::UpdateDisplayName)?;
        current_account(&mut inner)?.identity.display_name = Some(name.to_string());
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<(), PortalError> {
        let window = self.recent_login;
        let mut inner = self.enter(AuthOp::UpdatePassword)?;
        let account = current_account(&mut inner)?;
        if Utc::now() - account.last_auth > window {
            return Err(provider_error(AuthErrorCode::RequiresRecentLogin));
        }
        if new_password.chars().count() < 6 {
            return Err(provider_error(AuthErrorCode::WeakPassword));
        }
        account.password = Some(new_password.to_string());
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), PortalError> {
        let mut inner = self.enter(AuthOp::PasswordReset)?;
        if find_by_email(&mut inner, email).is_none() {
            return Err(provider_error(AuthErrorCode::UserNotFound));
        }
        inner.reset_emails.push(email.to_string());
        Ok(())
    }

    async fn send_email_verification(&self) -> Result<(), PortalError> {
        let mut inner = self.enter(AuthOp::SendVerification)?;
        let uid = current_account(&mut inner)?.identity.uid.clone();
        *inner.verification_emails.entry(uid).or_insert(0) += 1;
        Ok(())
    }

    async fn reauthenticate_with_password(&self, password: &str) -> Result<Identity, PortalError> {
        let mut inner = self.enter(AuthOp::Reauthenticate)?;
        let account = current_account(&mut inner)?;
        if account.password.as_deref() != Some(password) {
            return Err(provider_error(AuthErrorCode::InvalidCredential));
        }
        account.last_auth = Utc::now();
        Ok(account.identity.clone())
    }

    async fn reauthenticate_with_popup(
        &self,
        _provider: FederatedProvider,
    ) -> Result<Identity, PortalError> {
        let mut inner = self.enter(AuthOp::ReauthenticatePopup)?;
        let popup = inner
            .popups
            .pop_front()
            .ok_or_else(|| provider_error(AuthErrorCode::PopupClosedByUser))?;
        let account = current_account(&mut inner)?;
        if !account.identity.email.eq_ignore_ascii_case(&popup.email) {
            return Err(provider_error(AuthErrorCode::UserMismatch));
        }
        account.last_auth = Utc::now();
        Ok(account.identity.clone())
    }

    async fn delete_current_user(&self) -> Result<(), PortalError> {
        let window = self.recent_login;
        {
            let mut inner = self.enter(AuthOp::Delete)?;
            let account = current_account(&mut inner)?;
            if Utc::now() - account.last_auth > window {
                return Err(provider_error(AuthErrorCode::RequiresRecentLogin));
            }
            let uid = account.identity.uid.clone();
            inner.accounts.remove(&uid);
            inner.current = None;
        }
        self.publish(None);
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), PortalError> {
        self.enter(AuthOp::SignOut)?.current = None;
        self.publish(None);
        Ok(())
    }

    async fn reload(&self) -> Result<Option<Identity>, PortalError> {
        let inner = self.enter(AuthOp::Reload)?;
        Ok(inner
            .current
            .as_ref()
            .and_then(|uid| inner.accounts.get(uid))
            .map(|a| a.identity.clone()))
    }

    fn current_identity(&self) -> Option<Identity> {
        let inner = self.lock();
        inner
            .current
            .as_ref()
            .and_then(|uid| inner.accounts.get(uid))
            .map(|a| a.identity.clone())
    }

    fn subscribe(&self) -> AuthStateReceiver {
        self.auth_state.subscribe()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Get,
    Set,
    Update,
    Delete,
}

#[derive(Default)]
struct StoreInner {
    documents: HashMap<(String, String), Document>,
    failures: HashMap<StoreOp, String>,
    holds: HashMap<StoreOp, Arc<Notify>>,
    calls: HashMap<StoreOp, usize>,
}

#[derive(Default)]
pub struct InMemoryDocumentStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn fail_next(&self, op: StoreOp, message: impl Into<String>) {
        self.lock().failures.insert(op, message.into());
    }

    /// The next call of `op` waits until the returned handle is notified.
    pub fn hold_next(&self, op: StoreOp) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock().holds.insert(op, Arc::clone(&gate));
        gate
    }

    pub fn document(&self, collection: &str, id: &str) -> Option<Document> {
        self.lock()
            .documents
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }

    pub fn calls(&self, op: StoreOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Number of set, update and delete calls.
    pub fn writes(&self) -> usize {
        [StoreOp::Set, StoreOp::Update, StoreOp::Delete]
            .iter()
            .map(|op| self.calls(*op))
            .sum()
    }

    async fn enter(&self, op: StoreOp) -> Result<MutexGuard<'_, StoreInner>, PortalError> {
        let hold = self.lock().holds.remove(&op);
        if let Some(gate) = hold {
            gate.notified().await;
        }
        let mut inner = self.lock();
        *inner.calls.entry(op).or_insert(0) += 1;
        if let Some(message) = inner.failures.remove(&op) {
            return Err(PortalError::Store(message));
        }
        Ok(inner)
    }
}

fn key(collection: &str, id: &str) -> (String, String) {
    (collection.to_string(), id.to_string())
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, PortalError> {
        let inner = self.enter(StoreOp::Get).await?;
        Ok(inner.documents.get(&key(collection, id)).cloned())
    }

    async fn set(&self, collection: &str, id: &str, document: Document) -> Result<(), PortalError> {
        let mut inner = self.enter(StoreOp::Set).await?;
        inner.documents.insert(key(collection, id), document);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> Result<(), PortalError> {
        let mut inner = self.enter(StoreOp::Update).await?;
        let doc = inner.documents.get_mut(&key(collection, id)).ok_or_else(|| {
            PortalError::Store(format!("No document to update: {}/{}", collection, id))
        })?;
        doc.extend(fields);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), PortalError> {
        let mut inner = self.enter(StoreOp::Delete).await?;
        inner.documents.remove(&key(collection, id));
        Ok(())
    }
}

/// Collects sent contact messages instead of emailing them.
#[derive(Default)]
pub struct RecordingEmailService {
    sent: Mutex<Vec<ContactMessage>>,
    fail_next: Mutex<Option<String>>,
}

impl RecordingEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, message: impl Into<String>) {
        *self.fail_next.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.into());
    }

    pub fn sent(&self) -> Vec<ContactMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl EmailService for RecordingEmailService {
    async fn send(&self, message: &ContactMessage) -> Result<(), PortalError> {
        if let Some(reason) = self
            .fail_next
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            return Err(PortalError::Email(reason));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_in_publishes_auth_state() {
        let provider = InMemoryIdentityProvider::new();
        let seeded = provider.add_password_account("s@x.com", "Abcd123!", "Sam");
        let rx = provider.subscribe();

        provider.sign_in_with_password("s@x.com", "Abcd123!").await.unwrap();
        assert_eq!(rx.borrow().as_ref().map(|i| i.uid.clone()), Some(seeded.uid));

        provider.sign_out().await.unwrap();
        assert!(rx.borrow().is_none());
    }

    #[tokio::test]
    async fn test_wrong_password_is_invalid_credential() {
        let provider = InMemoryIdentityProvider::new();
        provider.add_password_account("s@x.com", "Abcd123!", "Sam");

        let err = provider.sign_in_with_password("s@x.com", "nope").await.unwrap_err();
        assert_eq!(err.code(), Some(&AuthErrorCode::InvalidCredential));
    }

    #[tokio::test]
    async fn test_injected_failure_is_consumed_once() {
        let provider = InMemoryIdentityProvider::new();
        provider.fail_next(AuthOp::Reload, AuthErrorCode::NetworkRequestFailed);

        assert!(provider.reload().await.is_err());
        assert!(provider.reload().await.unwrap().is_none());
        assert_eq!(provider.calls(AuthOp::Reload), 2);
    }

    #[tokio::test]
    async fn test_stale_login_blocks_deletion() {
        let provider = InMemoryIdentityProvider::new();
        let seeded = provider.add_password_account("s@x.com", "Abcd123!", "Sam");
        provider.sign_in_with_password("s@x.com", "Abcd123!").await.unwrap();
        provider.expire_login(&seeded.uid);

        let err = provider.delete_current_user().await.unwrap_err();
        assert_eq!(err.code(), Some(&AuthErrorCode::RequiresRecentLogin));
        assert!(provider.has_account(&seeded.uid));
    }

    #[tokio::test]
    async fn test_update_requires_existing_document() {
        let store = InMemoryDocumentStore::new();
        let result = store.update("users", "missing", Document::new()).await;
        assert!(matches!(result, Err(PortalError::Store(_))));
        assert_eq!(store.writes(), 1);
    }
}
