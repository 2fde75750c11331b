use crate::config::AppConfig;
use crate::core::rate_limit::SendRateLimiter;
use crate::shared::utils::DbPool;
use std::sync::Arc;

pub struct AppState {
    pub conn: DbPool,
    pub http: reqwest::Client,
    pub limiter: Arc<SendRateLimiter>,
    pub config: AppConfig,
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            http: self.http.clone(),
            limiter: Arc::clone(&self.limiter),
            config: self.config.clone(),
        }
    }
}
