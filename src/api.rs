//! HTTP API for field validation and the contact form

use crate::contact::{ContactMessage, EmailService};
use crate::forms::strength::{present, StrengthReport};
use crate::forms::validate::{validate, ValidationResult};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub email: Arc<dyn EmailService>,
}

// Request/Response types
#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub field: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub field: String,
    pub error: String,
    pub result: ValidationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<StrengthView>,
}

#[derive(Debug, Serialize)]
pub struct StrengthView {
    pub strength: usize,
    pub label: String,
    pub report: String,
}

impl From<(usize, StrengthReport)> for StrengthView {
    fn from((strength, report): (usize, StrengthReport)) -> Self {
        Self {
            strength,
            label: report.label.text().to_string(),
            report: report.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub service: String,
}

// Configure routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/api/validate", post(validate_field))
        .route("/api/contact", post(send_contact))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(StatusResponse {
        status: "ok".to_string(),
        service: "school-portal".to_string(),
    })
}

// Unknown field names validate to an empty error, as in the form itself
async fn validate_field(Json(payload): Json<ValidateRequest>) -> impl IntoResponse {
    let result = validate(&payload.field, &payload.value);
    let strength = result.password().map(|check| {
        StrengthView::from((check.strength, present(check.strength, &check.requirements)))
    });

    Json(ValidateResponse {
        field: payload.field,
        error: result.error().to_string(),
        result,
        strength,
    })
}

// Waits for delivery so the caller learns the outcome
async fn send_contact(
    State(state): State<AppState>,
    Json(payload): Json<ContactMessage>,
) -> impl IntoResponse {
    if let Err(errors) = payload.validate() {
        info!("Contact request rejected: {}", errors.join(", "));
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ContactResponse {
                success: false,
                message: "Please fill in all required fields correctly".to_string(),
                errors,
            }),
        );
    }

    match state.email.send(&payload).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ContactResponse {
                success: true,
                message: "Message sent successfully! We'll get back to you soon.".to_string(),
                errors: vec![],
            }),
        ),
        Err(e) => {
            error!("Contact relay failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(ContactResponse {
                    success: false,
                    message: format!("Failed to send message: {}", e.friendly_message()),
                    errors: vec![],
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::RecordingEmailService;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(
        router: Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let body = match body {
            Some(v) => Body::from(serde_json::to_string(&v).unwrap()),
            None => Body::empty(),
        };
        let resp = router.oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn router() -> (Router, Arc<RecordingEmailService>) {
        let email = Arc::new(RecordingEmailService::default());
        let router = create_router(AppState {
            email: email.clone(),
        });
        (router, email)
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = router();
        let (status, body) = call(router, "GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_validate_email() {
        let (router, _) = router();
        let (status, body) = call(
            router,
            "POST",
            "/api/validate",
            Some(json!({"field": "Email", "value": "bad"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"], "Invalid email address");
        assert!(body.get("strength").is_none());
    }

    #[tokio::test]
    async fn test_validate_password_reports_strength() {
        let (router, _) = router();
        let (_, body) = call(
            router,
            "POST",
            "/api/validate",
            Some(json!({"field": "Password", "value": "Abcd123!"})),
        )
        .await;
        assert_eq!(body["error"], "");
        assert_eq!(body["strength"]["strength"], 5);
        assert_eq!(body["strength"]["label"], "Very Strong");
    }

    #[tokio::test]
    async fn test_contact_requires_fields() {
        let (router, email) = router();
        let (status, body) = call(
            router,
            "POST",
            "/api/contact",
            Some(json!({"name": "", "email": "", "subject": "", "message": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);
        assert!(email.sent().is_empty());
    }

    #[tokio::test]
    async fn test_contact_relays_message() {
        let (router, email) = router();
        let (status, body) = call(
            router,
            "POST",
            "/api/contact",
            Some(json!({
                "name": "Ada",
                "email": "ada@example.com",
                "subject": "Admissions",
                "grade_level": "Grade 7",
                "message": "Hello"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(email.sent().len(), 1);
    }
}
