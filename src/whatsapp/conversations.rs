//! Conversation state for one (campaign, lead) pair.
//!
//! Outbound dispatch and inbound webhook intake both land here, possibly
//! concurrently, so the upsert is a single `INSERT .. ON CONFLICT DO
//! UPDATE` whose counters increment database-side. Application code never
//! reads a counter to write it back.

use crate::shared::models::schema::{conversations, messages};
use crate::shared::models::{
    Conversation, Direction, Message, MessageKind, MessageStatus, NewConversation, NewMessage,
};
use crate::shared::utils::DbPool;
use crate::whatsapp::error::WhatsAppError;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use uuid::Uuid;

/// A message about to be persisted, before ids are assigned.
pub struct MessageDraft {
    pub whatsapp_id: Option<String>,
    pub content: String,
    pub message_type: MessageKind,
    pub media_url: Option<String>,
    pub direction: Direction,
    pub status: MessageStatus,
    pub from_phone: String,
    pub to_phone: String,
    pub sent_at: DateTime<Utc>,
}

/// Creates or advances the conversation row. Last-message fields always
/// take the newest write; `unread_count` moves only for inbound traffic.
pub fn upsert_conversation(
    conn: &mut PgConnection,
    campaign_id: Uuid,
    lead_id: Uuid,
    last_message: &str,
    direction: Direction,
    at: DateTime<Utc>,
) -> QueryResult<Conversation> {
    let inbound = direction == Direction::Inbound;
    let row = NewConversation {
        id: Uuid::new_v4(),
        campaign_id,
        lead_id,
        last_message_at: at,
        last_message: last_message.to_string(),
        last_message_direction: direction.as_str().to_string(),
        unread_count: if inbound { 1 } else { 0 },
        total_messages: 1,
        status: "active".to_string(),
    };

    if inbound {
        diesel::insert_into(conversations::table)
            .values(&row)
            .on_conflict((conversations::campaign_id, conversations::lead_id))
            .do_update()
            .set((
                conversations::last_message_at.eq(excluded(conversations::last_message_at)),
                conversations::last_message.eq(excluded(conversations::last_message)),
                conversations::last_message_direction
                    .eq(excluded(conversations::last_message_direction)),
                conversations::total_messages.eq(conversations::total_messages + 1),
                conversations::unread_count.eq(conversations::unread_count + 1),
            ))
            .get_result(conn)
    } else {
        diesel::insert_into(conversations::table)
            .values(&row)
            .on_conflict((conversations::campaign_id, conversations::lead_id))
            .do_update()
            .set((
                conversations::last_message_at.eq(excluded(conversations::last_message_at)),
                conversations::last_message.eq(excluded(conversations::last_message)),
                conversations::last_message_direction
                    .eq(excluded(conversations::last_message_direction)),
                conversations::total_messages.eq(conversations::total_messages + 1),
            ))
            .get_result(conn)
    }
}

/// Upserts the conversation and appends the message row in one
/// transaction. Returns both so callers can report ids.
pub fn record_message(
    conn: &mut PgConnection,
    campaign_id: Uuid,
    lead_id: Uuid,
    draft: MessageDraft,
) -> QueryResult<(Conversation, Message)> {
    conn.transaction(|conn| {
        let conversation = upsert_conversation(
            conn,
            campaign_id,
            lead_id,
            &draft.content,
            draft.direction,
            draft.sent_at,
        )?;
        let new_message = NewMessage {
            id: Uuid::new_v4(),
            campaign_id,
            lead_id,
            conversation_id: conversation.id,
            whatsapp_id: draft.whatsapp_id,
            content: draft.content,
            message_type: draft.message_type.as_str().to_string(),
            media_url: draft.media_url,
            direction: draft.direction.as_str().to_string(),
            status: draft.status.as_str().to_string(),
            from_phone: draft.from_phone,
            to_phone: draft.to_phone,
            sent_at: draft.sent_at,
        };
        let message = diesel::insert_into(messages::table)
            .values(&new_message)
            .get_result::<Message>(conn)?;
        Ok((conversation, message))
    })
}

/// Operator opened the thread: reset the unread counter.
pub async fn mark_read(pool: &DbPool, conversation_id: Uuid) -> Result<bool, WhatsAppError> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| WhatsAppError::Database(e.to_string()))?;
        let updated = diesel::update(conversations::table.find(conversation_id))
            .set(conversations::unread_count.eq(0))
            .execute(&mut conn)?;
        Ok(updated > 0)
    })
    .await
    .map_err(|e| WhatsAppError::Database(e.to_string()))?
}
