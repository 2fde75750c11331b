use dotenvy::dotenv;
use log::info;
use std::sync::Arc;
use std::time::Duration;

use leadserver::config::AppConfig;
use leadserver::core::rate_limit::SendRateLimiter;
use leadserver::shared::state::AppState;
use leadserver::shared::utils::create_conn;
use leadserver::whatsapp;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    let pool = create_conn(&config.database_url())?;
    leadserver::shared::migration::run_migrations(&pool)?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let state = Arc::new(AppState {
        conn: pool,
        http,
        limiter: Arc::new(SendRateLimiter::default()),
        config: config.clone(),
    });

    let app = whatsapp::configure().with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
