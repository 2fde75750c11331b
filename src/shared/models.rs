use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which WhatsApp backend a campaign is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiType {
    Official,
    Unofficial,
}

impl ApiType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Official => "official",
            Self::Unofficial => "unofficial",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "official" => Some(Self::Official),
            "unofficial" => Some(Self::Unofficial),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Image,
    Document,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Document => "document",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "document" => Some(Self::Document),
            _ => None,
        }
    }
}

/// Delivery state of a message row. Outbound rows start at `Sent` and only
/// advance (`Sent -> Delivered -> Read`); inbound rows are `Received`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
    Received,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
            Self::Failed => "failed",
            Self::Received => "received",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "read" => Some(Self::Read),
            "failed" => Some(Self::Failed),
            "received" => Some(Self::Received),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Selectable)]
#[diesel(table_name = clients)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Selectable)]
#[diesel(table_name = campaigns)]
pub struct Campaign {
    pub id: Uuid,
    pub client_id: Uuid,
    pub name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// One WhatsApp connection per campaign. Credentials for the inactive API
/// type may be retained; this core only writes `status`, `last_connection`
/// and `qr_code`.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Selectable)]
#[diesel(table_name = whatsapp_configs)]
pub struct WhatsAppConfig {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub api_type: String,
    pub business_account_id: Option<String>,
    pub phone_number_id: Option<String>,
    pub access_token: Option<String>,
    pub webhook_verify_token: Option<String>,
    pub session_name: Option<String>,
    pub webhook_url: Option<String>,
    pub status: String,
    pub last_connection: Option<DateTime<Utc>>,
    pub qr_code: Option<String>,
    pub chatwoot_url: Option<String>,
    pub chatwoot_account_id: Option<String>,
    pub chatwoot_inbox_id: Option<String>,
    pub chatwoot_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Selectable)]
#[diesel(table_name = leads)]
pub struct Lead {
    pub id: Uuid,
    pub client_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub name: String,
    pub phone: Option<String>,
    pub email: String,
    pub interest: Option<String>,
    pub origin: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = leads)]
pub struct NewLead {
    pub id: Uuid,
    pub client_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub name: String,
    pub phone: Option<String>,
    pub email: String,
    pub origin: String,
    pub status: String,
}

/// Thread state for one (campaign, lead) pair. `unread_count` and
/// `total_messages` are only ever touched through database-native
/// increments, see `whatsapp::conversations`.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Selectable)]
#[diesel(table_name = conversations)]
pub struct Conversation {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub lead_id: Uuid,
    pub last_message_at: DateTime<Utc>,
    pub last_message: String,
    pub last_message_direction: String,
    pub unread_count: i32,
    pub total_messages: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = conversations)]
pub struct NewConversation {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub lead_id: Uuid,
    pub last_message_at: DateTime<Utc>,
    pub last_message: String,
    pub last_message_direction: String,
    pub unread_count: i32,
    pub total_messages: i32,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Selectable)]
#[diesel(table_name = messages)]
pub struct Message {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub lead_id: Uuid,
    pub conversation_id: Uuid,
    pub whatsapp_id: Option<String>,
    pub content: String,
    pub message_type: String,
    pub media_url: Option<String>,
    pub direction: String,
    pub status: String,
    pub from_phone: String,
    pub to_phone: String,
    pub sent_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessage {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub lead_id: Uuid,
    pub conversation_id: Uuid,
    pub whatsapp_id: Option<String>,
    pub content: String,
    pub message_type: String,
    pub media_url: Option<String>,
    pub direction: String,
    pub status: String,
    pub from_phone: String,
    pub to_phone: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Selectable)]
#[diesel(table_name = templates)]
pub struct Template {
    pub id: Uuid,
    pub client_id: Uuid,
    pub name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

pub mod schema {
    diesel::table! {
        clients (id) {
            id -> Uuid,
            name -> Text,
            email -> Text,
            created_at -> Timestamptz,
        }
    }

    diesel::table! {
        campaigns (id) {
            id -> Uuid,
            client_id -> Uuid,
            name -> Text,
            status -> Text,
            created_at -> Timestamptz,
        }
    }

    diesel::table! {
        whatsapp_configs (id) {
            id -> Uuid,
            campaign_id -> Uuid,
            api_type -> Text,
            business_account_id -> Nullable<Text>,
            phone_number_id -> Nullable<Text>,
            access_token -> Nullable<Text>,
            webhook_verify_token -> Nullable<Text>,
            session_name -> Nullable<Text>,
            webhook_url -> Nullable<Text>,
            status -> Text,
            last_connection -> Nullable<Timestamptz>,
            qr_code -> Nullable<Text>,
            chatwoot_url -> Nullable<Text>,
            chatwoot_account_id -> Nullable<Text>,
            chatwoot_inbox_id -> Nullable<Text>,
            chatwoot_api_key -> Nullable<Text>,
        }
    }

    diesel::table! {
        leads (id) {
            id -> Uuid,
            client_id -> Uuid,
            campaign_id -> Nullable<Uuid>,
            name -> Text,
            phone -> Nullable<Text>,
            email -> Text,
            interest -> Nullable<Text>,
            origin -> Text,
            status -> Text,
            created_at -> Timestamptz,
        }
    }

    diesel::table! {
        conversations (id) {
            id -> Uuid,
            campaign_id -> Uuid,
            lead_id -> Uuid,
            last_message_at -> Timestamptz,
            last_message -> Text,
            last_message_direction -> Text,
            unread_count -> Int4,
            total_messages -> Int4,
            status -> Text,
            created_at -> Timestamptz,
        }
    }

    diesel::table! {
        messages (id) {
            id -> Uuid,
            campaign_id -> Uuid,
            lead_id -> Uuid,
            conversation_id -> Uuid,
            whatsapp_id -> Nullable<Text>,
            content -> Text,
            message_type -> Text,
            media_url -> Nullable<Text>,
            direction -> Text,
            status -> Text,
            from_phone -> Text,
            to_phone -> Text,
            sent_at -> Timestamptz,
            delivered_at -> Nullable<Timestamptz>,
            read_at -> Nullable<Timestamptz>,
        }
    }

    diesel::table! {
        templates (id) {
            id -> Uuid,
            client_id -> Uuid,
            name -> Text,
            content -> Text,
            created_at -> Timestamptz,
        }
    }
}

pub use schema::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_type_round_trip() {
        assert_eq!(ApiType::parse("official"), Some(ApiType::Official));
        assert_eq!(ApiType::parse("unofficial"), Some(ApiType::Unofficial));
        assert_eq!(ApiType::parse("twilio"), None);
        assert_eq!(ApiType::Official.as_str(), "official");
    }

    #[test]
    fn test_message_status_parse() {
        for s in ["pending", "sent", "delivered", "read", "failed", "received"] {
            let parsed = MessageStatus::parse(s).unwrap();
            assert_eq!(parsed.as_str(), s);
        }
        assert_eq!(MessageStatus::parse("queued"), None);
    }

    #[test]
    fn test_insertable_lead_defaults() {
        let lead = NewLead {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            campaign_id: None,
            name: "Contato 5511999990000".to_string(),
            phone: Some("5511999990000".to_string()),
            email: "5511999990000@whatsapp.lead".to_string(),
            origin: "whatsapp".to_string(),
            status: "new".to_string(),
        };
        assert_eq!(lead.origin, "whatsapp");
        assert_eq!(lead.status, "new");
    }
}
