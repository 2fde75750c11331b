//! Outbound send orchestration: validate, admit, resolve context, send
//! through the configured transport, persist.
//!
//! Per send, the pipeline either completes fully or fails with a typed
//! reason; nothing is written before the adapter confirms the send. Bulk
//! sends run the same pipeline per lead, sequentially in list order, and
//! one lead's failure never aborts the batch.

use crate::campaigns;
use crate::core::rate_limit::SendRateLimiter;
use crate::leads;
use crate::security::validation::{self, ValidationError};
use crate::shared::models::{Direction, MessageKind, MessageStatus, Template, WhatsAppConfig};
use crate::shared::state::AppState;
use crate::templates;
use crate::whatsapp::conversations::{record_message, MessageDraft};
use crate::whatsapp::error::WhatsAppError;
use crate::whatsapp::transport::{self, transport_for};
use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SendCommand {
    pub campaign_id: String,
    pub lead_id: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub message: String,
    #[serde(default = "default_message_type")]
    pub message_type: String,
    #[serde(default)]
    pub media_url: Option<String>,
}

fn default_message_type() -> String {
    "text".to_string()
}

#[derive(Debug, Serialize)]
pub struct SendOutcome {
    pub message_id: Uuid,
    pub whatsapp_id: String,
    pub conversation_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct BulkCommand {
    pub template_id: String,
    pub lead_ids: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct BulkOutcome {
    pub success_count: usize,
    pub fail_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct ConnectionTestCommand {
    pub campaign_id: String,
}

#[derive(Debug, Serialize)]
pub struct ConnectionTestOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

fn parse_validated_uuid(raw: &str) -> Result<Uuid, WhatsAppError> {
    Uuid::parse_str(raw)
        .map_err(|_| WhatsAppError::Validation(vec![ValidationError::InvalidUuid(raw.to_string())]))
}

/// Single outbound send. Template variables are NOT substituted here;
/// ad-hoc messages go out literally.
pub async fn send_message(
    state: &AppState,
    cmd: &SendCommand,
) -> Result<SendOutcome, WhatsAppError> {
    let result = validation::validate_send(
        &cmd.campaign_id,
        &cmd.lead_id,
        cmd.conversation_id.as_deref(),
        &cmd.message,
        &cmd.message_type,
        cmd.media_url.as_deref(),
    );
    if !result.is_valid() {
        return Err(result.into_errors().into());
    }
    let campaign_id = parse_validated_uuid(&cmd.campaign_id)?;
    let lead_id = parse_validated_uuid(&cmd.lead_id)?;
    let kind = MessageKind::parse(&cmd.message_type).ok_or_else(|| {
        WhatsAppError::Validation(vec![ValidationError::InvalidValue {
            field: "message_type".to_string(),
            message: cmd.message_type.clone(),
        }])
    })?;

    admit(&state.limiter, campaign_id).await?;

    let config = campaigns::config_for_campaign(&state.conn, campaign_id)
        .await?
        .ok_or_else(|| {
            WhatsAppError::NotConfigured("no WhatsApp configuration for campaign".to_string())
        })?;
    let lead = leads::lead_by_id(&state.conn, lead_id)
        .await?
        .ok_or_else(|| WhatsAppError::NotFound("lead not found".to_string()))?;
    let phone = lead
        .phone
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| WhatsAppError::NotFound("lead has no phone number".to_string()))?
        .to_string();

    deliver(
        state,
        &config,
        campaign_id,
        lead_id,
        &phone,
        &cmd.message,
        kind,
        cmd.media_url.as_deref(),
    )
    .await
}

async fn admit(limiter: &SendRateLimiter, campaign_id: Uuid) -> Result<(), WhatsAppError> {
    if limiter.allow(campaign_id).await {
        Ok(())
    } else {
        Err(WhatsAppError::RateLimited)
    }
}

/// Adapter call plus persistence; shared by ad-hoc and bulk paths.
#[allow(clippy::too_many_arguments)]
async fn deliver(
    state: &AppState,
    config: &WhatsAppConfig,
    campaign_id: Uuid,
    lead_id: Uuid,
    phone: &str,
    body: &str,
    kind: MessageKind,
    media_url: Option<&str>,
) -> Result<SendOutcome, WhatsAppError> {
    let transport = transport_for(config, &state.http, &state.config.whatsapp.api_base_url)?;
    let receipt = transport.send(phone, body, kind, media_url).await?;

    let draft = MessageDraft {
        whatsapp_id: Some(receipt.remote_id.clone()),
        content: body.to_string(),
        message_type: kind,
        media_url: media_url.map(|s| s.to_string()),
        direction: Direction::Outbound,
        status: MessageStatus::Sent,
        from_phone: config
            .phone_number_id
            .clone()
            .or_else(|| config.session_name.clone())
            .unwrap_or_default(),
        to_phone: phone.to_string(),
        sent_at: Utc::now(),
    };

    let pool = state.conn.clone();
    let (conversation, message) = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| WhatsAppError::Database(e.to_string()))?;
        record_message(&mut conn, campaign_id, lead_id, draft).map_err(WhatsAppError::from)
    })
    .await
    .map_err(|e| WhatsAppError::Database(e.to_string()))??;

    // The backend answered, so the connection is demonstrably alive.
    if let Err(e) = campaigns::set_connection_status(&state.conn, config.id, true).await {
        warn!("Failed to stamp last_connection: {}", e);
    }

    info!(
        "Outbound message {} sent to lead {} (remote id {})",
        message.id, lead_id, receipt.remote_id
    );
    Ok(SendOutcome {
        message_id: message.id,
        whatsapp_id: receipt.remote_id,
        conversation_id: conversation.id,
    })
}

/// Bulk templated send: the template is loaded once, then each lead is
/// processed independently (resolve context, render, send, persist).
pub async fn send_bulk(state: &AppState, cmd: &BulkCommand) -> Result<BulkOutcome, WhatsAppError> {
    let result = validation::validate_bulk(&cmd.template_id, &cmd.lead_ids);
    if !result.is_valid() {
        return Err(result.into_errors().into());
    }
    let template_id = parse_validated_uuid(&cmd.template_id)?;
    let template = templates::template_by_id(&state.conn, template_id)
        .await?
        .ok_or_else(|| WhatsAppError::NotFound("template not found".to_string()))?;

    let template_ref = &template;
    let outcome = run_bulk(&cmd.lead_ids, |lead_id| async move {
        send_templated(state, template_ref, &lead_id).await
    })
    .await;
    info!(
        "Bulk send of template {} finished: {} ok, {} failed",
        template.id, outcome.success_count, outcome.fail_count
    );
    Ok(outcome)
}

/// Aggregation seam for bulk sends: runs `send_one` per lead in list
/// order, counting successes and failures; a failure never aborts the
/// remaining leads.
async fn run_bulk<F, Fut>(lead_ids: &[String], mut send_one: F) -> BulkOutcome
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = Result<SendOutcome, WhatsAppError>>,
{
    let mut outcome = BulkOutcome::default();
    for lead_id in lead_ids {
        match send_one(lead_id.clone()).await {
            Ok(_) => outcome.success_count += 1,
            Err(e) => {
                warn!("Bulk send to lead {} failed: {}", lead_id, e);
                outcome.fail_count += 1;
            }
        }
    }
    outcome
}

async fn send_templated(
    state: &AppState,
    template: &Template,
    lead_id_raw: &str,
) -> Result<SendOutcome, WhatsAppError> {
    let lead_id = parse_validated_uuid(lead_id_raw)?;
    let lead = leads::lead_by_id(&state.conn, lead_id)
        .await?
        .ok_or_else(|| WhatsAppError::NotFound("lead not found".to_string()))?;
    let campaign_id = lead
        .campaign_id
        .ok_or_else(|| WhatsAppError::NotFound("lead has no campaign".to_string()))?;
    let config = campaigns::config_for_campaign(&state.conn, campaign_id)
        .await?
        .ok_or_else(|| {
            WhatsAppError::NotConfigured("no WhatsApp configuration for campaign".to_string())
        })?;
    let phone = lead
        .phone
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| WhatsAppError::NotFound("lead has no phone number".to_string()))?
        .to_string();

    let body = templates::render(&template.content, &lead);
    deliver(
        state,
        &config,
        campaign_id,
        lead_id,
        &phone,
        &body,
        MessageKind::Text,
        None,
    )
    .await
}

/// Connection test: probes the configured backend and persists the
/// resulting connection state on the config row.
pub async fn test_connection(
    state: &AppState,
    cmd: &ConnectionTestCommand,
) -> Result<ConnectionTestOutcome, WhatsAppError> {
    validation::validate_uuid(&cmd.campaign_id).map_err(|e| WhatsAppError::Validation(vec![e]))?;
    let campaign_id = parse_validated_uuid(&cmd.campaign_id)?;
    let config = campaigns::config_for_campaign(&state.conn, campaign_id)
        .await?
        .ok_or_else(|| {
            WhatsAppError::NotConfigured("no WhatsApp configuration for campaign".to_string())
        })?;

    match crate::shared::models::ApiType::parse(&config.api_type) {
        Some(crate::shared::models::ApiType::Official) => {
            let phone_number_id = config.phone_number_id.as_deref().ok_or_else(|| {
                WhatsAppError::NotConfigured("official api: phone_number_id missing".to_string())
            })?;
            let access_token = config.access_token.as_deref().ok_or_else(|| {
                WhatsAppError::NotConfigured("official api: access_token missing".to_string())
            })?;
            match transport::probe_official(
                &state.http,
                &state.config.whatsapp.api_base_url,
                phone_number_id,
                access_token,
            )
            .await
            {
                Ok(probe) => {
                    campaigns::set_connection_status(&state.conn, config.id, true).await?;
                    Ok(ConnectionTestOutcome {
                        success: true,
                        message: "WhatsApp Business API connected".to_string(),
                        phone_number: probe.display_phone_number,
                        verified: Some(probe.verified_name.is_some()),
                        session: None,
                    })
                }
                Err(e) => {
                    campaigns::set_connection_status(&state.conn, config.id, false).await?;
                    Err(e)
                }
            }
        }
        Some(crate::shared::models::ApiType::Unofficial) => {
            let webhook_url = config.webhook_url.as_deref().ok_or_else(|| {
                WhatsAppError::NotConfigured("unofficial api: webhook_url missing".to_string())
            })?;
            let session_name = config.session_name.as_deref().ok_or_else(|| {
                WhatsAppError::NotConfigured("unofficial api: session_name missing".to_string())
            })?;
            match transport::probe_bridge(&state.http, webhook_url, session_name).await {
                Ok(()) => {
                    campaigns::set_connection_status(&state.conn, config.id, true).await?;
                    Ok(ConnectionTestOutcome {
                        success: true,
                        message: "Bridge session reachable".to_string(),
                        phone_number: None,
                        verified: None,
                        session: Some(session_name.to_string()),
                    })
                }
                Err(e) => {
                    campaigns::set_connection_status(&state.conn, config.id, false).await?;
                    Err(e)
                }
            }
        }
        None => Err(WhatsAppError::NotConfigured(format!(
            "unknown api type '{}'",
            config.api_type
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_command_defaults_to_text() {
        let cmd: SendCommand = serde_json::from_str(
            r#"{"campaign_id":"c","lead_id":"l","message":"hi"}"#,
        )
        .unwrap();
        assert_eq!(cmd.message_type, "text");
        assert!(cmd.conversation_id.is_none());
        assert!(cmd.media_url.is_none());
    }

    #[test]
    fn test_connection_outcome_omits_empty_fields() {
        let outcome = ConnectionTestOutcome {
            success: true,
            message: "ok".to_string(),
            phone_number: None,
            verified: None,
            session: Some("main".to_string()),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(!json.contains("phone_number"));
        assert!(json.contains("\"session\":\"main\""));
    }

    fn outcome() -> SendOutcome {
        SendOutcome {
            message_id: Uuid::new_v4(),
            whatsapp_id: "wamid.test".to_string(),
            conversation_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn test_bulk_counts_failures_without_aborting() {
        let lead_ids: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        let result = run_bulk(&lead_ids, |lead_id| async move {
            if lead_id == "b" {
                Err(WhatsAppError::Transport("session closed".to_string()))
            } else {
                Ok(outcome())
            }
        })
        .await;
        assert_eq!(result.success_count, 2);
        assert_eq!(result.fail_count, 1);
    }

    #[tokio::test]
    async fn test_bulk_attempts_every_lead_in_list_order() {
        use std::cell::RefCell;
        let lead_ids: Vec<String> = vec!["x".into(), "y".into(), "z".into()];
        let attempted = RefCell::new(Vec::new());
        let result = run_bulk(&lead_ids, |lead_id| {
            attempted.borrow_mut().push(lead_id);
            async move { Err(WhatsAppError::RateLimited) }
        })
        .await;
        assert_eq!(result.success_count, 0);
        assert_eq!(result.fail_count, 3);
        assert_eq!(*attempted.borrow(), lead_ids);
    }

    #[test]
    fn test_parse_validated_uuid_rejects_garbage() {
        assert!(matches!(
            parse_validated_uuid("nope"),
            Err(WhatsAppError::Validation(_))
        ));
    }
}
