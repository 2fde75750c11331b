//! Campaign and WhatsApp-config store. Campaigns are owned by the CRUD
//! layer; configs are read here and only their connection-state fields
//! are ever written back.

use crate::shared::models::schema::{campaigns, whatsapp_configs};
use crate::shared::models::{ApiType, Campaign, WhatsAppConfig};
use crate::shared::utils::DbPool;
use crate::whatsapp::error::WhatsAppError;
use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

pub async fn campaign_by_id(pool: &DbPool, id: Uuid) -> Result<Option<Campaign>, WhatsAppError> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| WhatsAppError::Database(e.to_string()))?;
        campaigns::table
            .find(id)
            .first::<Campaign>(&mut conn)
            .optional()
            .map_err(WhatsAppError::from)
    })
    .await
    .map_err(|e| WhatsAppError::Database(e.to_string()))?
}

/// Legacy fallback for inbound tenant resolution: the oldest active
/// campaign of a client.
pub async fn first_active_campaign(
    pool: &DbPool,
    client_id: Uuid,
) -> Result<Option<Campaign>, WhatsAppError> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| WhatsAppError::Database(e.to_string()))?;
        campaigns::table
            .filter(campaigns::client_id.eq(client_id))
            .filter(campaigns::status.eq("active"))
            .order(campaigns::created_at.asc())
            .first::<Campaign>(&mut conn)
            .optional()
            .map_err(WhatsAppError::from)
    })
    .await
    .map_err(|e| WhatsAppError::Database(e.to_string()))?
}

pub async fn config_for_campaign(
    pool: &DbPool,
    campaign_id: Uuid,
) -> Result<Option<WhatsAppConfig>, WhatsAppError> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| WhatsAppError::Database(e.to_string()))?;
        whatsapp_configs::table
            .filter(whatsapp_configs::campaign_id.eq(campaign_id))
            .first::<WhatsAppConfig>(&mut conn)
            .optional()
            .map_err(WhatsAppError::from)
    })
    .await
    .map_err(|e| WhatsAppError::Database(e.to_string()))?
}

/// Routes an inbound delivery to its tenant: the business phone number id
/// in the webhook metadata belongs to exactly one config row.
pub async fn config_by_phone_number_id(
    pool: &DbPool,
    phone_number_id: &str,
) -> Result<Option<WhatsAppConfig>, WhatsAppError> {
    let pool = pool.clone();
    let phone_number_id = phone_number_id.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| WhatsAppError::Database(e.to_string()))?;
        whatsapp_configs::table
            .filter(whatsapp_configs::phone_number_id.eq(&phone_number_id))
            .filter(whatsapp_configs::api_type.eq(ApiType::Official.as_str()))
            .first::<WhatsAppConfig>(&mut conn)
            .optional()
            .map_err(WhatsAppError::from)
    })
    .await
    .map_err(|e| WhatsAppError::Database(e.to_string()))?
}

/// Whether any official-API campaign is configured with this verify
/// token. Used by the webhook verification handshake.
pub async fn verify_token_known(pool: &DbPool, token: &str) -> Result<bool, WhatsAppError> {
    let pool = pool.clone();
    let token = token.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| WhatsAppError::Database(e.to_string()))?;
        let count: i64 = whatsapp_configs::table
            .filter(whatsapp_configs::api_type.eq(ApiType::Official.as_str()))
            .filter(whatsapp_configs::webhook_verify_token.eq(&token))
            .count()
            .get_result(&mut conn)?;
        Ok(count > 0)
    })
    .await
    .map_err(|e| WhatsAppError::Database(e.to_string()))?
}

/// Persists the outcome of a connection test or a successful send.
/// `last_connection` is stamped only when the backend answered.
pub async fn set_connection_status(
    pool: &DbPool,
    config_id: Uuid,
    connected: bool,
) -> Result<(), WhatsAppError> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| WhatsAppError::Database(e.to_string()))?;
        if connected {
            diesel::update(whatsapp_configs::table.find(config_id))
                .set((
                    whatsapp_configs::status.eq("connected"),
                    whatsapp_configs::last_connection.eq(Some(Utc::now())),
                ))
                .execute(&mut conn)?;
        } else {
            diesel::update(whatsapp_configs::table.find(config_id))
                .set(whatsapp_configs::status.eq("disconnected"))
                .execute(&mut conn)?;
        }
        Ok(())
    })
    .await
    .map_err(|e| WhatsAppError::Database(e.to_string()))?
}
