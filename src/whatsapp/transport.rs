//! Transport adapters: one send capability, two backends.
//!
//! The official adapter talks to Meta's per-phone-number messages endpoint
//! with a bearer token; the bridge adapter posts a session-scoped envelope
//! to a self-hosted automation bridge. Both are pure request/response with
//! no local state and no retries; retry policy belongs to the caller.

use crate::shared::models::{ApiType, MessageKind, WhatsAppConfig};
use crate::shared::utils::normalize_phone;
use crate::whatsapp::error::WhatsAppError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug)]
pub struct SendReceipt {
    /// Platform-assigned message id, the join key for later status
    /// callbacks.
    pub remote_id: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        to: &str,
        body: &str,
        kind: MessageKind,
        media_url: Option<&str>,
    ) -> Result<SendReceipt, WhatsAppError>;
}

/// Meta WhatsApp Business Platform adapter.
pub struct OfficialTransport {
    http: reqwest::Client,
    base_url: String,
    phone_number_id: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GraphSendResponse {
    #[serde(default)]
    messages: Vec<GraphMessageId>,
}

#[derive(Debug, Deserialize)]
struct GraphMessageId {
    id: String,
}

impl OfficialTransport {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        phone_number_id: &str,
        access_token: &str,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            phone_number_id: phone_number_id.to_string(),
            access_token: access_token.to_string(),
        }
    }

    fn build_payload(to: &str, body: &str, kind: MessageKind, media_url: Option<&str>) -> serde_json::Value {
        match kind {
            MessageKind::Text => json!({
                "messaging_product": "whatsapp",
                "to": to,
                "type": "text",
                "text": { "body": body }
            }),
            MessageKind::Image => json!({
                "messaging_product": "whatsapp",
                "to": to,
                "type": "image",
                "image": { "link": media_url.unwrap_or_default(), "caption": body }
            }),
            MessageKind::Document => json!({
                "messaging_product": "whatsapp",
                "to": to,
                "type": "document",
                "document": { "link": media_url.unwrap_or_default(), "caption": body }
            }),
        }
    }
}

#[async_trait]
impl Transport for OfficialTransport {
    async fn send(
        &self,
        to: &str,
        body: &str,
        kind: MessageKind,
        media_url: Option<&str>,
    ) -> Result<SendReceipt, WhatsAppError> {
        let url = format!("{}/{}/messages", self.base_url, self.phone_number_id);
        let payload = Self::build_payload(&normalize_phone(to), body, kind, media_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| WhatsAppError::Transport(format!("whatsapp api request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(WhatsAppError::Transport(format!(
                "whatsapp api error ({}): {}",
                status, detail
            )));
        }

        let parsed: GraphSendResponse = response
            .json()
            .await
            .map_err(|e| WhatsAppError::Transport(format!("unreadable api response: {}", e)))?;
        let remote_id = parsed
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| {
                WhatsAppError::Transport("api response carried no message id".to_string())
            })?;

        Ok(SendReceipt { remote_id })
    }
}

/// Self-hosted bridge adapter (venom-style session).
pub struct BridgeTransport {
    http: reqwest::Client,
    webhook_url: String,
    session_name: String,
}

impl BridgeTransport {
    pub fn new(http: reqwest::Client, webhook_url: &str, session_name: &str) -> Self {
        Self {
            http,
            webhook_url: webhook_url.to_string(),
            session_name: session_name.to_string(),
        }
    }
}

#[async_trait]
impl Transport for BridgeTransport {
    async fn send(
        &self,
        to: &str,
        body: &str,
        kind: MessageKind,
        media_url: Option<&str>,
    ) -> Result<SendReceipt, WhatsAppError> {
        let payload = json!({
            "session": self.session_name,
            "phone": normalize_phone(to),
            "message": body,
            "type": kind.as_str(),
            "media_url": media_url,
        });

        let response = self
            .http
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| WhatsAppError::Transport(format!("bridge request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(WhatsAppError::Transport(format!(
                "bridge error ({}): {}",
                status, detail
            )));
        }

        // Bridges are loose about their response shape; fall back to a
        // synthesized id when none is returned.
        let remote_id = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| {
                v.get("id")
                    .or_else(|| v.get("messageId"))
                    .and_then(|id| id.as_str())
                    .map(|s| s.to_string())
            })
            .unwrap_or_else(|| format!("venom_{}", chrono::Utc::now().timestamp_millis()));

        Ok(SendReceipt { remote_id })
    }
}

/// Selects the adapter for a campaign's configured API type, failing when
/// the credentials that type needs are absent.
pub fn transport_for(
    config: &WhatsAppConfig,
    http: &reqwest::Client,
    api_base_url: &str,
) -> Result<Box<dyn Transport>, WhatsAppError> {
    match ApiType::parse(&config.api_type) {
        Some(ApiType::Official) => {
            let phone_number_id = config.phone_number_id.as_deref().ok_or_else(|| {
                WhatsAppError::NotConfigured("official api: phone_number_id missing".to_string())
            })?;
            let access_token = config.access_token.as_deref().ok_or_else(|| {
                WhatsAppError::NotConfigured("official api: access_token missing".to_string())
            })?;
            Ok(Box::new(OfficialTransport::new(
                http.clone(),
                api_base_url,
                phone_number_id,
                access_token,
            )))
        }
        Some(ApiType::Unofficial) => {
            let webhook_url = config.webhook_url.as_deref().ok_or_else(|| {
                WhatsAppError::NotConfigured("unofficial api: webhook_url missing".to_string())
            })?;
            let session_name = config.session_name.as_deref().ok_or_else(|| {
                WhatsAppError::NotConfigured("unofficial api: session_name missing".to_string())
            })?;
            Ok(Box::new(BridgeTransport::new(
                http.clone(),
                webhook_url,
                session_name,
            )))
        }
        None => Err(WhatsAppError::NotConfigured(format!(
            "unknown api type '{}'",
            config.api_type
        ))),
    }
}

#[derive(Debug, Deserialize)]
pub struct OfficialProbe {
    pub display_phone_number: Option<String>,
    pub verified_name: Option<String>,
}

/// Connection test against the official API: reads the business phone
/// number object the token is scoped to.
pub async fn probe_official(
    http: &reqwest::Client,
    base_url: &str,
    phone_number_id: &str,
    access_token: &str,
) -> Result<OfficialProbe, WhatsAppError> {
    let url = format!(
        "{}/{}?fields=display_phone_number,verified_name",
        base_url.trim_end_matches('/'),
        phone_number_id
    );
    let response = http
        .get(&url)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| WhatsAppError::Transport(format!("whatsapp api request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(WhatsAppError::Transport(format!(
            "whatsapp api error ({}): {}",
            status, detail
        )));
    }
    response
        .json::<OfficialProbe>()
        .await
        .map_err(|e| WhatsAppError::Transport(format!("unreadable api response: {}", e)))
}

/// Connection test against a bridge: any 2xx from its status endpoint
/// counts as connected.
pub async fn probe_bridge(
    http: &reqwest::Client,
    webhook_url: &str,
    session_name: &str,
) -> Result<(), WhatsAppError> {
    let url = format!(
        "{}/status?session={}",
        webhook_url.trim_end_matches('/'),
        session_name
    );
    let response = http
        .get(&url)
        .send()
        .await
        .map_err(|e| WhatsAppError::Transport(format!("bridge request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(WhatsAppError::Transport(format!(
            "bridge error ({}): {}",
            status, detail
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn config(api_type: &str) -> WhatsAppConfig {
        WhatsAppConfig {
            id: uuid::Uuid::new_v4(),
            campaign_id: uuid::Uuid::new_v4(),
            api_type: api_type.to_string(),
            business_account_id: Some("123".to_string()),
            phone_number_id: Some("5550001".to_string()),
            access_token: Some("token-1234567890".to_string()),
            webhook_verify_token: Some("verify-me".to_string()),
            session_name: Some("main-session".to_string()),
            webhook_url: Some("http://bridge.local/send".to_string()),
            status: "connected".to_string(),
            last_connection: None,
            qr_code: None,
            chatwoot_url: None,
            chatwoot_account_id: None,
            chatwoot_inbox_id: None,
            chatwoot_api_key: None,
        }
    }

    #[tokio::test]
    async fn test_official_text_send_extracts_wamid() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/5550001/messages")
            .match_header("authorization", "Bearer token-1234567890")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "messaging_product": "whatsapp",
                "to": "5511999990000",
                "type": "text",
                "text": { "body": "Hello {{nome}}" }
            })))
            .with_status(200)
            .with_body(r#"{"messages":[{"id":"wamid.1"}]}"#)
            .create_async()
            .await;

        let transport = OfficialTransport::new(
            reqwest::Client::new(),
            &server.url(),
            "5550001",
            "token-1234567890",
        );
        let receipt = transport
            .send("+55 (11) 99999-0000", "Hello {{nome}}", MessageKind::Text, None)
            .await
            .unwrap();

        assert_eq!(receipt.remote_id, "wamid.1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_official_image_payload_carries_link_and_caption() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/5550001/messages")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "type": "image",
                "image": { "link": "https://cdn.example.com/a.png", "caption": "look" }
            })))
            .with_status(200)
            .with_body(r#"{"messages":[{"id":"wamid.img"}]}"#)
            .create_async()
            .await;

        let transport =
            OfficialTransport::new(reqwest::Client::new(), &server.url(), "5550001", "t-1234567890");
        let receipt = transport
            .send(
                "5511999990000",
                "look",
                MessageKind::Image,
                Some("https://cdn.example.com/a.png"),
            )
            .await
            .unwrap();

        assert_eq!(receipt.remote_id, "wamid.img");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_official_error_body_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/5550001/messages")
            .with_status(400)
            .with_body(r#"{"error":{"message":"(#131030) Recipient not in allowed list"}}"#)
            .create_async()
            .await;

        let transport =
            OfficialTransport::new(reqwest::Client::new(), &server.url(), "5550001", "t-1234567890");
        let err = transport
            .send("5511999990000", "hi", MessageKind::Text, None)
            .await
            .unwrap_err();

        match err {
            WhatsAppError::Transport(detail) => assert!(detail.contains("131030")),
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bridge_send_uses_returned_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "session": "main-session",
                "phone": "5511999990000",
                "message": "oi",
                "type": "text"
            })))
            .with_status(200)
            .with_body(r#"{"id":"bridge_42"}"#)
            .create_async()
            .await;

        let transport = BridgeTransport::new(reqwest::Client::new(), &server.url(), "main-session");
        let receipt = transport
            .send("+5511999990000", "oi", MessageKind::Text, None)
            .await
            .unwrap();

        assert_eq!(receipt.remote_id, "bridge_42");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_bridge_synthesizes_id_when_absent() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let transport = BridgeTransport::new(reqwest::Client::new(), &server.url(), "main-session");
        let receipt = transport
            .send("5511999990000", "oi", MessageKind::Text, None)
            .await
            .unwrap();

        assert!(receipt.remote_id.starts_with("venom_"));
    }

    #[tokio::test]
    async fn test_bridge_failure_is_hard_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(500)
            .with_body("session closed")
            .create_async()
            .await;

        let transport = BridgeTransport::new(reqwest::Client::new(), &server.url(), "main-session");
        let err = transport
            .send("5511999990000", "oi", MessageKind::Text, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WhatsAppError::Transport(_)));
    }

    #[test]
    fn test_transport_selection_by_api_type() {
        let http = reqwest::Client::new();
        assert!(transport_for(&config("official"), &http, "https://graph.example").is_ok());
        assert!(transport_for(&config("unofficial"), &http, "https://graph.example").is_ok());

        let mut broken = config("official");
        broken.access_token = None;
        assert!(matches!(
            transport_for(&broken, &http, "https://graph.example"),
            Err(WhatsAppError::NotConfigured(_))
        ));

        let unknown = config("carrier-pigeon");
        assert!(matches!(
            transport_for(&unknown, &http, "https://graph.example"),
            Err(WhatsAppError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_probe_official_reads_phone_fields() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock(
                "GET",
                "/5550001?fields=display_phone_number,verified_name",
            )
            .match_header("authorization", "Bearer t-1234567890")
            .with_status(200)
            .with_body(r#"{"display_phone_number":"+55 11 5550-001","verified_name":"Acme"}"#)
            .create_async()
            .await;

        let probe = probe_official(&reqwest::Client::new(), &server.url(), "5550001", "t-1234567890")
            .await
            .unwrap();
        assert_eq!(probe.display_phone_number.as_deref(), Some("+55 11 5550-001"));
        assert_eq!(probe.verified_name.as_deref(), Some("Acme"));
    }

    #[tokio::test]
    async fn test_probe_bridge_status_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/status?session=main-session")
            .with_status(200)
            .with_body(r#"{"connected":true}"#)
            .create_async()
            .await;

        probe_bridge(&reqwest::Client::new(), &server.url(), "main-session")
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
