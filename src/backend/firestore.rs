//! Cloud Firestore over its REST API
//! Structure: projects/{project}/databases/(default)/documents/{collection}/{id}

use crate::account::error::PortalError;
use crate::account::store::{Document, DocumentStore, FieldValue};
use crate::config::FirebaseConfig;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Supplies the bearer token Firestore requests are made with.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn id_token(&self) -> Result<Option<String>, PortalError>;
}

pub struct Firestore {
    http: reqwest::Client,
    documents_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl Firestore {
    pub fn new(config: &FirebaseConfig, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http: reqwest::Client::new(),
            documents_url: format!(
                "{}/projects/{}/databases/(default)/documents",
                config.firestore_endpoint.trim_end_matches('/'),
                config.project_id
            ),
            tokens,
        }
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.documents_url, collection, id)
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, PortalError> {
        Ok(match self.tokens.id_token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn execute(&self, request: RequestBuilder) -> Result<(StatusCode, String), PortalError> {
        let response = self.authorized(request).await?.send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

fn store_error(action: &str, status: StatusCode, body: &str) -> PortalError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string());
    PortalError::Store(format!("Failed to {} document ({}): {}", action, status, message))
}

pub fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => json!({ "nullValue": null }),
        FieldValue::Bool(b) => json!({ "booleanValue": b }),
        FieldValue::Integer(i) => json!({ "integerValue": i.to_string() }),
        FieldValue::String(s) => json!({ "stringValue": s }),
        FieldValue::Timestamp(t) => {
            json!({ "timestampValue": t.to_rfc3339_opts(SecondsFormat::Micros, true) })
        }
    }
}

pub fn decode_value(value: &Value) -> Option<FieldValue> {
    let object = value.as_object()?;
    let (kind, inner) = object.iter().next()?;
    match kind.as_str() {
        "nullValue" => Some(FieldValue::Null),
        "booleanValue" => inner.as_bool().map(FieldValue::Bool),
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse().ok())
            .or_else(|| inner.as_i64())
            .map(FieldValue::Integer),
        "stringValue" => inner.as_str().map(FieldValue::from),
        "timestampValue" => inner
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| FieldValue::Timestamp(t.with_timezone(&Utc))),
        _ => None,
    }
}

pub fn encode_fields(document: &Document) -> Value {
    let fields: Map<String, Value> = document
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect();
    json!({ "fields": fields })
}

pub fn decode_fields(body: &Value) -> Document {
    let mut document = Document::new();
    if let Some(fields) = body["fields"].as_object() {
        for (key, value) in fields {
            match decode_value(value) {
                Some(decoded) => {
                    document.insert(key.clone(), decoded);
                }
                None => warn!("Skipping unsupported Firestore field '{}'", key),
            }
        }
    }
    document
}

#[async_trait]
impl DocumentStore for Firestore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, PortalError> {
        let request = self.http.get(self.document_url(collection, id));
        let (status, body) = self.execute(request).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(store_error("read", status, &body));
        }
        let value: Value = serde_json::from_str(&body)?;
        Ok(Some(decode_fields(&value)))
    }

    async fn set(&self, collection: &str, id: &str, document: Document) -> Result<(), PortalError> {
        let request = self
            .http
            .patch(self.document_url(collection, id))
            .json(&encode_fields(&document));
        let (status, body) = self.execute(request).await?;
        if !status.is_success() {
            return Err(store_error("write", status, &body));
        }
        debug!("Wrote {}/{}", collection, id);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> Result<(), PortalError> {
        let mut query: Vec<(&str, &str)> = fields
            .keys()
            .map(|k| ("updateMask.fieldPaths", k.as_str()))
            .collect();
        query.push(("currentDocument.exists", "true"));

        let request = self
            .http
            .patch(self.document_url(collection, id))
            .query(&query)
            .json(&encode_fields(&fields));
        let (status, body) = self.execute(request).await?;
        if !status.is_success() {
            return Err(store_error("update", status, &body));
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), PortalError> {
        let request = self.http.delete(self.document_url(collection, id));
        let (status, body) = self.execute(request).await?;
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(store_error("delete", status, &body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_encodes_typed_values() {
        let mut doc = Document::new();
        doc.insert("verified".to_string(), FieldValue::Bool(false));
        doc.insert("name".to_string(), FieldValue::from("Sam"));
        doc.insert(
            "createdAt".to_string(),
            FieldValue::Timestamp(Utc.with_ymd_and_hms(2024, 9, 1, 8, 30, 0).unwrap()),
        );

        let body = encode_fields(&doc);
        assert_eq!(body["fields"]["verified"], json!({ "booleanValue": false }));
        assert_eq!(body["fields"]["name"], json!({ "stringValue": "Sam" }));
        assert_eq!(
            body["fields"]["createdAt"],
            json!({ "timestampValue": "2024-09-01T08:30:00.000000Z" })
        );
    }

    #[test]
    fn test_decodes_server_document() {
        let body = json!({
            "name": "projects/p/databases/(default)/documents/users/u1",
            "fields": {
                "uid": { "stringValue": "u1" },
                "verified": { "booleanValue": true },
                "visits": { "integerValue": "12" },
                "lastLoginAt": { "timestampValue": "2024-09-01T08:30:00.123456Z" },
                "tags": { "arrayValue": { "values": [] } }
            },
            "createTime": "2024-09-01T08:30:00.123456Z"
        });

        let doc = decode_fields(&body);
        assert_eq!(doc.get("uid"), Some(&FieldValue::from("u1")));
        assert_eq!(doc.get("visits"), Some(&FieldValue::Integer(12)));
        assert!(doc.get("lastLoginAt").and_then(FieldValue::as_timestamp).is_some());
        assert!(!doc.contains_key("tags"));
    }
}
