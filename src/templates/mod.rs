//! Message templates with `{{variable}}` placeholders, resolved from the
//! lead at send time. Substitution happens only on the bulk-template
//! path; ad-hoc sends go out literally.

use crate::shared::models::schema::templates;
use crate::shared::models::{Lead, Template};
use crate::shared::utils::DbPool;
use crate::whatsapp::error::WhatsAppError;
use diesel::prelude::*;
use uuid::Uuid;

pub async fn template_by_id(pool: &DbPool, id: Uuid) -> Result<Option<Template>, WhatsAppError> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| WhatsAppError::Database(e.to_string()))?;
        templates::table
            .find(id)
            .first::<Template>(&mut conn)
            .optional()
            .map_err(WhatsAppError::from)
    })
    .await
    .map_err(|e| WhatsAppError::Database(e.to_string()))?
}

/// Substitutes `{{nome}}`, `{{email}}`, `{{telefone}}` and `{{interesse}}`
/// from the lead. Unknown placeholders are left as-is; missing lead
/// fields become empty strings.
pub fn render(content: &str, lead: &Lead) -> String {
    content
        .replace("{{nome}}", &lead.name)
        .replace("{{email}}", &lead.email)
        .replace("{{telefone}}", lead.phone.as_deref().unwrap_or(""))
        .replace("{{interesse}}", lead.interest.as_deref().unwrap_or(""))
}
