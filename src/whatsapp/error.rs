use crate::security::validation::ValidationError;
use axum::{response::IntoResponse, Json};

#[derive(Debug, thiserror::Error)]
pub enum WhatsAppError {
    #[error("Validation failed: {}", format_fields(.0))]
    Validation(Vec<ValidationError>),
    #[error("Send rate limit reached, retry later")]
    RateLimited,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("WhatsApp is not configured: {0}")]
    NotConfigured(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Webhook signature verification failed")]
    Signature,
    #[error("Database error: {0}")]
    Database(String),
}

fn format_fields(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<diesel::result::Error> for WhatsAppError {
    fn from(e: diesel::result::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<Vec<ValidationError>> for WhatsAppError {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self::Validation(errors)
    }
}

impl IntoResponse for WhatsAppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound(_) | Self::NotConfigured(_) => StatusCode::NOT_FOUND,
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::Signature => StatusCode::UNAUTHORIZED,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = match &self {
            Self::Validation(errors) => serde_json::json!({
                "success": false,
                "error": "Validation failed",
                "fields": errors.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
            }),
            other => serde_json::json!({
                "success": false,
                "error": other.to_string(),
            }),
        };
        (status, Json(body)).into_response()
    }
}
