use anyhow::Result;

#[derive(Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub whatsapp: WhatsAppAppConfig,
}

#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub username: String,
    pub password: String,
    pub server: String,
    pub port: u32,
    pub database: String,
}

/// Platform-level WhatsApp settings. `app_secret` is the Meta app secret
/// used to verify `x-hub-signature-256` on webhook deliveries; when unset,
/// signature enforcement is disabled (development only).
#[derive(Clone)]
pub struct WhatsAppAppConfig {
    pub api_base_url: String,
    pub app_secret: Option<String>,
}

const DEFAULT_GRAPH_API_BASE: &str = "https://graph.facebook.com/v18.0";

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let server = ServerConfig {
            host: env_or("SERVER_HOST", "0.0.0.0"),
            port: env_or("SERVER_PORT", "8080").parse()?,
        };
        let database = DatabaseConfig {
            username: env_or("DB_USER", "leadserver"),
            password: env_or("DB_PASSWORD", ""),
            server: env_or("DB_HOST", "localhost"),
            port: env_or("DB_PORT", "5432").parse()?,
            database: env_or("DB_NAME", "leadserver"),
        };
        let whatsapp = WhatsAppAppConfig {
            api_base_url: env_or("WHATSAPP_API_BASE_URL", DEFAULT_GRAPH_API_BASE),
            app_secret: std::env::var("WHATSAPP_APP_SECRET").ok().filter(|s| !s.is_empty()),
        };
        Ok(Self {
            server,
            database,
            whatsapp,
        })
    }

    pub fn database_url(&self) -> String {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            return url;
        }
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.database.username,
            self.database.password,
            self.database.server,
            self.database.port,
            self.database.database
        )
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
