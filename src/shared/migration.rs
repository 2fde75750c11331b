use crate::shared::utils::DbPool;
use diesel::connection::SimpleConnection;
use log::info;

/// Idempotent schema bootstrap, applied on startup.
pub fn schema_migration() -> &'static str {
    r#"
    CREATE TABLE IF NOT EXISTS clients (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );

    CREATE TABLE IF NOT EXISTS campaigns (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        client_id UUID NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'active',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );

    CREATE TABLE IF NOT EXISTS whatsapp_configs (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        campaign_id UUID NOT NULL UNIQUE REFERENCES campaigns(id) ON DELETE CASCADE,
        api_type TEXT NOT NULL DEFAULT 'official',
        business_account_id TEXT,
        phone_number_id TEXT,
        access_token TEXT,
        webhook_verify_token TEXT,
        session_name TEXT,
        webhook_url TEXT,
        status TEXT NOT NULL DEFAULT 'disconnected',
        last_connection TIMESTAMPTZ,
        qr_code TEXT,
        chatwoot_url TEXT,
        chatwoot_account_id TEXT,
        chatwoot_inbox_id TEXT,
        chatwoot_api_key TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_whatsapp_configs_phone_number_id
        ON whatsapp_configs(phone_number_id);

    CREATE TABLE IF NOT EXISTS leads (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        client_id UUID NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
        campaign_id UUID REFERENCES campaigns(id) ON DELETE SET NULL,
        name TEXT NOT NULL,
        phone TEXT,
        email TEXT NOT NULL,
        interest TEXT,
        origin TEXT NOT NULL DEFAULT 'manual',
        status TEXT NOT NULL DEFAULT 'new',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );

    CREATE INDEX IF NOT EXISTS idx_leads_phone ON leads(phone);

    CREATE TABLE IF NOT EXISTS conversations (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        campaign_id UUID NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
        lead_id UUID NOT NULL REFERENCES leads(id) ON DELETE CASCADE,
        last_message_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        last_message TEXT NOT NULL DEFAULT '',
        last_message_direction TEXT NOT NULL DEFAULT 'inbound',
        unread_count INTEGER NOT NULL DEFAULT 0,
        total_messages INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'active',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (campaign_id, lead_id)
    );

    CREATE TABLE IF NOT EXISTS messages (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        campaign_id UUID NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
        lead_id UUID NOT NULL REFERENCES leads(id) ON DELETE CASCADE,
        conversation_id UUID NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
        whatsapp_id TEXT,
        content TEXT NOT NULL,
        message_type TEXT NOT NULL DEFAULT 'text',
        direction TEXT NOT NULL,
        media_url TEXT,
        status TEXT NOT NULL DEFAULT 'pending',
        from_phone TEXT NOT NULL,
        to_phone TEXT NOT NULL,
        sent_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        delivered_at TIMESTAMPTZ,
        read_at TIMESTAMPTZ
    );

    CREATE INDEX IF NOT EXISTS idx_messages_whatsapp_id ON messages(whatsapp_id);
    CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id);

    CREATE TABLE IF NOT EXISTS templates (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        client_id UUID NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
    "#
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let mut conn = pool.get()?;
    conn.batch_execute(schema_migration())?;
    info!("Database schema is up to date");
    Ok(())
}
