//! Lead store, the slice of the CRUD layer this core touches: lookup by
//! id or phone, and creation of leads that first appear through an
//! inbound WhatsApp message.

use crate::shared::models::schema::leads;
use crate::shared::models::{Lead, NewLead};
use crate::shared::utils::{normalize_phone, DbPool};
use crate::whatsapp::error::WhatsAppError;
use diesel::prelude::*;
use uuid::Uuid;

pub async fn lead_by_id(pool: &DbPool, id: Uuid) -> Result<Option<Lead>, WhatsAppError> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| WhatsAppError::Database(e.to_string()))?;
        leads::table
            .find(id)
            .first::<Lead>(&mut conn)
            .optional()
            .map_err(WhatsAppError::from)
    })
    .await
    .map_err(|e| WhatsAppError::Database(e.to_string()))?
}

/// Exact match on the stored phone. Phone is not unique in storage; the
/// first row wins (see DESIGN.md on tenant resolution).
pub async fn lead_by_phone(pool: &DbPool, phone: &str) -> Result<Option<Lead>, WhatsAppError> {
    let pool = pool.clone();
    let phone = phone.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| WhatsAppError::Database(e.to_string()))?;
        leads::table
            .filter(leads::phone.eq(&phone))
            .order(leads::created_at.asc())
            .first::<Lead>(&mut conn)
            .optional()
            .map_err(WhatsAppError::from)
    })
    .await
    .map_err(|e| WhatsAppError::Database(e.to_string()))?
}

/// Creates the lead for an unrecognized inbound sender: WhatsApp origin,
/// synthesized placeholder email, status "new".
pub async fn create_inbound_lead(
    pool: &DbPool,
    client_id: Uuid,
    campaign_id: Uuid,
    display_name: Option<String>,
    phone: &str,
) -> Result<Lead, WhatsAppError> {
    let pool = pool.clone();
    let digits = normalize_phone(phone);
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| WhatsAppError::Database(e.to_string()))?;
        let new_lead = NewLead {
            id: Uuid::new_v4(),
            client_id,
            campaign_id: Some(campaign_id),
            name: display_name.unwrap_or_else(|| format!("Contato {}", digits)),
            phone: Some(digits.clone()),
            email: format!("{}@whatsapp.lead", digits),
            origin: "whatsapp".to_string(),
            status: "new".to_string(),
        };
        diesel::insert_into(leads::table)
            .values(&new_lead)
            .get_result::<Lead>(&mut conn)
            .map_err(WhatsAppError::from)
    })
    .await
    .map_err(|e| WhatsAppError::Database(e.to_string()))?
}
