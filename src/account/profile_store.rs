//! Profile storage on top of a document store
//! Structure: {users_collection}/{uid}

use crate::account::error::PortalError;
use crate::account::profile::ProfileDocument;
use crate::account::store::{Document, DocumentStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct ProfileStore {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl ProfileStore {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub async fn get(&self, uid: &str) -> Result<Option<ProfileDocument>, PortalError> {
        match self.store.get(&self.collection, uid).await? {
            Some(doc) => Ok(Some(ProfileDocument::from_document(&doc)?)),
            None => Ok(None),
        }
    }

    /// Writes the whole document, replacing any existing one.
    pub async fn put(&self, profile: &ProfileDocument) -> Result<(), PortalError> {
        self.store
            .set(&self.collection, &profile.uid, profile.to_document())
            .await?;
        info!("Stored profile for {} ({})", profile.uid, profile.provider);
        Ok(())
    }

    pub async fn touch_last_login(&self, uid: &str) -> Result<(), PortalError> {
        let mut fields = Document::new();
        fields.insert("lastLoginAt".to_string(), Utc::now().into());
        self.store.update(&self.collection, uid, fields).await
    }

    pub async fn mark_verified(&self, uid: &str) -> Result<(), PortalError> {
        let mut fields = Document::new();
        fields.insert("verified".to_string(), true.into());
        self.store.update(&self.collection, uid, fields).await?;
        info!("Profile {} marked verified", uid);
        Ok(())
    }

    pub async fn update_contact(
        &self,
        uid: &str,
        name: &str,
        phone: &str,
    ) -> Result<(), PortalError> {
        let mut fields = Document::new();
        fields.insert("name".to_string(), name.into());
        fields.insert("phone".to_string(), phone.into());
        fields.insert("updatedAt".to_string(), Utc::now().into());
        self.store.update(&self.collection, uid, fields).await
    }

    pub async fn delete(&self, uid: &str) -> Result<(), PortalError> {
        self.store.delete(&self.collection, uid).await?;
        info!("Deleted profile: {}", uid);
        Ok(())
    }
}
