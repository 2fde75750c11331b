//! Inbound webhook processing: event parsing, message intake and
//! delivery-status application.
//!
//! Per-item failures are logged and skipped so one bad message never
//! poisons the rest of a delivery batch; the HTTP layer always answers
//! 200 once the signature check passed.

use crate::campaigns;
use crate::leads;
use crate::shared::models::schema::messages;
use crate::shared::models::{Campaign, Direction, Lead, MessageKind, MessageStatus};
use crate::shared::state::AppState;
use crate::shared::utils::normalize_phone;
use crate::whatsapp::conversations::{record_message, MessageDraft};
use crate::whatsapp::error::WhatsAppError;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct WebhookPayload {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WebhookEntry {
    pub id: String,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WebhookChange {
    pub field: String,
    pub value: WebhookValue,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WebhookValue {
    #[serde(default)]
    pub messaging_product: String,
    #[serde(default)]
    pub metadata: WebhookMetadata,
    #[serde(default)]
    pub contacts: Vec<WebhookContact>,
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
    #[serde(default)]
    pub statuses: Vec<StatusCallback>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct WebhookMetadata {
    pub display_phone_number: Option<String>,
    pub phone_number_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WebhookContact {
    pub wa_id: String,
    pub profile: WebhookProfile,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WebhookProfile {
    pub name: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct InboundMessage {
    pub id: String,
    pub from: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub text: Option<InboundText>,
    #[serde(default)]
    pub image: Option<InboundMedia>,
    #[serde(default)]
    pub document: Option<InboundMedia>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct InboundText {
    pub body: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct InboundMedia {
    pub id: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StatusCallback {
    pub id: String,
    pub status: String,
    pub timestamp: String,
    #[serde(default)]
    pub recipient_id: String,
}

/// Walks the entry/change structure, taking in messages and applying
/// status callbacks. Fields other than "messages" are ignored.
pub async fn process_webhook(state: &AppState, payload: WebhookPayload) {
    for entry in payload.entry {
        for change in entry.changes {
            if change.field != "messages" {
                continue;
            }
            let contact_name = change
                .value
                .contacts
                .first()
                .map(|c| c.profile.name.clone());
            let phone_number_id = change.value.metadata.phone_number_id.clone();
            let display_phone = change.value.metadata.display_phone_number.clone();

            for message in &change.value.messages {
                if let Err(e) = intake_message(
                    state,
                    message,
                    contact_name.clone(),
                    phone_number_id.as_deref(),
                    display_phone.as_deref(),
                )
                .await
                {
                    error!("Inbound message {} dropped: {}", message.id, e);
                }
            }
            for status in &change.value.statuses {
                if let Err(e) = apply_status_callback(state, status).await {
                    error!("Status callback for {} dropped: {}", status.id, e);
                }
            }
        }
    }
}

/// Content, kind and provider media reference carried by an inbound
/// message. Unsupported types yield None and are skipped.
pub fn extract_content(message: &InboundMessage) -> Option<(String, MessageKind, Option<String>)> {
    match message.message_type.as_str() {
        "text" => message
            .text
            .as_ref()
            .map(|t| (t.body.clone(), MessageKind::Text, None)),
        "image" => message.image.as_ref().map(|m| {
            (
                m.caption.clone().unwrap_or_else(|| "[imagem]".to_string()),
                MessageKind::Image,
                Some(m.id.clone()),
            )
        }),
        "document" => message.document.as_ref().map(|m| {
            (
                m.caption
                    .clone()
                    .unwrap_or_else(|| "[documento]".to_string()),
                MessageKind::Document,
                Some(m.id.clone()),
            )
        }),
        _ => None,
    }
}

fn parse_epoch_seconds(raw: &str) -> DateTime<Utc> {
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}

/// Tenant resolution: the receiving business phone number id routes the
/// message to its config's campaign. When metadata is missing or
/// unmatched, fall back to the first active campaign of the sender's
/// known client.
async fn resolve_campaign(
    state: &AppState,
    phone_number_id: Option<&str>,
    existing_lead: Option<&Lead>,
) -> Result<Option<Campaign>, WhatsAppError> {
    if let Some(pnid) = phone_number_id {
        if let Some(config) = campaigns::config_by_phone_number_id(&state.conn, pnid).await? {
            if let Some(campaign) = campaigns::campaign_by_id(&state.conn, config.campaign_id).await? {
                return Ok(Some(campaign));
            }
            warn!(
                "WhatsApp config {} points at a missing campaign {}",
                config.id, config.campaign_id
            );
        }
    }
    if let Some(lead) = existing_lead {
        return campaigns::first_active_campaign(&state.conn, lead.client_id).await;
    }
    Ok(None)
}

async fn intake_message(
    state: &AppState,
    message: &InboundMessage,
    contact_name: Option<String>,
    phone_number_id: Option<&str>,
    display_phone: Option<&str>,
) -> Result<(), WhatsAppError> {
    let Some((content, kind, media_ref)) = extract_content(message) else {
        debug!(
            "Skipping unsupported inbound type '{}' ({})",
            message.message_type, message.id
        );
        return Ok(());
    };

    let phone = normalize_phone(&message.from);
    let existing = leads::lead_by_phone(&state.conn, &phone).await?;
    let Some(campaign) = resolve_campaign(state, phone_number_id, existing.as_ref()).await? else {
        warn!(
            "No active campaign resolvable for inbound message {} from {}",
            message.id, phone
        );
        return Ok(());
    };

    let lead = match existing {
        Some(lead) => lead,
        None => {
            leads::create_inbound_lead(
                &state.conn,
                campaign.client_id,
                campaign.id,
                contact_name,
                &phone,
            )
            .await?
        }
    };

    let draft = MessageDraft {
        whatsapp_id: Some(message.id.clone()),
        content,
        message_type: kind,
        media_url: media_ref,
        direction: Direction::Inbound,
        status: MessageStatus::Received,
        from_phone: phone,
        to_phone: display_phone.unwrap_or_default().to_string(),
        sent_at: parse_epoch_seconds(&message.timestamp),
    };

    let campaign_id = campaign.id;
    let lead_id = lead.id;
    let pool = state.conn.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| WhatsAppError::Database(e.to_string()))?;
        record_message(&mut conn, campaign_id, lead_id, draft).map_err(WhatsAppError::from)
    })
    .await
    .map_err(|e| WhatsAppError::Database(e.to_string()))??;

    debug!(
        "Inbound message {} recorded for campaign {} lead {}",
        message.id, campaign_id, lead_id
    );
    Ok(())
}

fn rank(status: MessageStatus) -> Option<u8> {
    match status {
        MessageStatus::Pending => Some(0),
        MessageStatus::Sent => Some(1),
        MessageStatus::Delivered => Some(2),
        MessageStatus::Read => Some(3),
        MessageStatus::Failed | MessageStatus::Received => None,
    }
}

/// Whether a reported status may overwrite the current one. Statuses only
/// move forward along pending < sent < delivered < read; `failed` applies
/// from any non-terminal state; nothing leaves `read` or `failed`, and
/// inbound (`received`) rows never change through callbacks.
pub fn may_advance(current: MessageStatus, reported: MessageStatus) -> bool {
    if reported == MessageStatus::Failed {
        return matches!(
            current,
            MessageStatus::Pending | MessageStatus::Sent | MessageStatus::Delivered
        );
    }
    match (rank(current), rank(reported)) {
        (Some(c), Some(r)) => r > c,
        _ => false,
    }
}

const ALL_STATUSES: [MessageStatus; 6] = [
    MessageStatus::Pending,
    MessageStatus::Sent,
    MessageStatus::Delivered,
    MessageStatus::Read,
    MessageStatus::Failed,
    MessageStatus::Received,
];

/// The stored statuses a report is allowed to overwrite, derived from
/// `may_advance`. Empty means the report never changes `status`.
fn advance_sources(reported: MessageStatus) -> Vec<&'static str> {
    ALL_STATUSES
        .iter()
        .filter(|current| may_advance(**current, reported))
        .map(|current| current.as_str())
        .collect()
}

/// Applies a status callback. The overwrite is conditional on the stored
/// status still being one `may_advance` permits, so duplicate and
/// out-of-order callbacks are no-ops; timestamps are stamped separately
/// whenever unset, so a late `delivered` arriving after `read` still
/// records `delivered_at` without regressing `status`.
pub fn apply_status(
    conn: &mut PgConnection,
    remote_id: &str,
    status: MessageStatus,
    at: DateTime<Utc>,
) -> QueryResult<usize> {
    let sources = advance_sources(status);
    let advanced = if sources.is_empty() {
        0
    } else {
        diesel::update(
            messages::table
                .filter(messages::whatsapp_id.eq(remote_id))
                .filter(messages::status.eq_any(sources)),
        )
        .set(messages::status.eq(status.as_str()))
        .execute(conn)?
    };
    let stamped = match status {
        MessageStatus::Delivered => diesel::update(
            messages::table
                .filter(messages::whatsapp_id.eq(remote_id))
                .filter(messages::delivered_at.is_null()),
        )
        .set(messages::delivered_at.eq(Some(at)))
        .execute(conn)?,
        MessageStatus::Read => diesel::update(
            messages::table
                .filter(messages::whatsapp_id.eq(remote_id))
                .filter(messages::read_at.is_null()),
        )
        .set(messages::read_at.eq(Some(at)))
        .execute(conn)?,
        _ => 0,
    };
    Ok(advanced.max(stamped))
}

async fn apply_status_callback(
    state: &AppState,
    callback: &StatusCallback,
) -> Result<(), WhatsAppError> {
    let Some(status) = MessageStatus::parse(&callback.status) else {
        debug!(
            "Ignoring unknown status '{}' for {}",
            callback.status, callback.id
        );
        return Ok(());
    };
    let at = parse_epoch_seconds(&callback.timestamp);
    let remote_id = callback.id.clone();
    let pool = state.conn.clone();
    let affected = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| WhatsAppError::Database(e.to_string()))?;
        apply_status(&mut conn, &remote_id, status, at).map_err(WhatsAppError::from)
    })
    .await
    .map_err(|e| WhatsAppError::Database(e.to_string()))??;

    if affected == 0 {
        debug!(
            "Status '{}' for {} was a no-op (unknown id or already applied)",
            callback.status, callback.id
        );
    }
    Ok(())
}
