pub mod conversations;
pub mod dispatch;
pub mod error;
pub mod inbound;
pub mod transport;

use crate::campaigns;
use crate::security::signature;
use crate::shared::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use dispatch::{BulkCommand, ConnectionTestCommand, SendCommand};
use error::WhatsAppError;
use inbound::WebhookPayload;
use log::{info, warn};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct WebhookVerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/webhook/whatsapp", get(verify_webhook))
        .route("/webhook/whatsapp", post(handle_webhook))
        .route("/api/whatsapp/send", post(send_message))
        .route("/api/whatsapp/send-bulk", post(send_bulk))
        .route("/api/whatsapp/test-connection", post(test_connection))
        .route("/api/conversations/{id}/read", post(mark_conversation_read))
}

pub async fn verify_webhook(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WebhookVerifyQuery>,
) -> impl IntoResponse {
    info!("WhatsApp webhook verification request received");

    let mode = params.mode.unwrap_or_default();
    let token = params.verify_token.unwrap_or_default();
    let challenge = params.challenge.unwrap_or_default();

    if mode != "subscribe" {
        warn!("Invalid webhook mode: {}", mode);
        return (StatusCode::FORBIDDEN, "Invalid mode".to_string());
    }

    match campaigns::verify_token_known(&state.conn, &token).await {
        Ok(true) => {
            info!("Webhook verification successful");
            (StatusCode::OK, challenge)
        }
        Ok(false) => {
            warn!("Invalid verify token");
            (StatusCode::FORBIDDEN, "Invalid verify token".to_string())
        }
        Err(e) => {
            warn!("Webhook verification failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Verification failed".to_string(),
            )
        }
    }
}

/// Event delivery. The signature is checked over the raw request body
/// before any parsing; once it passes, the endpoint always answers 200
/// so the platform does not retry payloads we already consumed.
pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WhatsAppError> {
    if let Some(secret) = state.config.whatsapp.app_secret.as_deref() {
        let header = headers
            .get(signature::SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(WhatsAppError::Signature)?;
        if !signature::verify(secret, &body, header) {
            warn!("Webhook signature verification failed");
            return Err(WhatsAppError::Signature);
        }
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Unparseable webhook body: {}", e);
            return Ok(StatusCode::OK);
        }
    };

    if payload.object != "whatsapp_business_account" {
        return Ok(StatusCode::OK);
    }

    inbound::process_webhook(&state, payload).await;
    Ok(StatusCode::OK)
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(cmd): Json<SendCommand>,
) -> Result<impl IntoResponse, WhatsAppError> {
    let outcome = dispatch::send_message(&state, &cmd).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message_id": outcome.message_id,
        "whatsapp_id": outcome.whatsapp_id,
        "conversation_id": outcome.conversation_id,
    })))
}

pub async fn send_bulk(
    State(state): State<Arc<AppState>>,
    Json(cmd): Json<BulkCommand>,
) -> Result<impl IntoResponse, WhatsAppError> {
    let outcome = dispatch::send_bulk(&state, &cmd).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "success_count": outcome.success_count,
        "fail_count": outcome.fail_count,
    })))
}

pub async fn test_connection(
    State(state): State<Arc<AppState>>,
    Json(cmd): Json<ConnectionTestCommand>,
) -> Result<impl IntoResponse, WhatsAppError> {
    let outcome = dispatch::test_connection(&state, &cmd).await?;
    Ok(Json(outcome))
}

pub async fn mark_conversation_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, WhatsAppError> {
    let found = conversations::mark_read(&state.conn, id).await?;
    if !found {
        return Err(WhatsAppError::NotFound("conversation".to_string()));
    }
    Ok(Json(serde_json::json!({ "success": true })))
}
