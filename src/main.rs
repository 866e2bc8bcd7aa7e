use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use crowdfund::config::Config;
use crowdfund::gateways::{GeminiClient, SendGridMailer};
use crowdfund::otp::InMemoryOtpStore;
use crowdfund::repository::{self, SeaOrmCampaignRepository};
use crowdfund::storage::FileStore;
use crowdfund::{create_app, AppState};
use sea_orm::Database;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present) before reading configuration
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("crowdfund=info")),
        )
        .init();

    let config = Config::from_env().context("invalid configuration")?;

    let db = Database::connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    repository::sync_schema(&db)
        .await
        .context("failed to create database schema")?;

    let http_client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("failed to build HTTP client")?;

    let state = AppState {
        campaigns: Arc::new(SeaOrmCampaignRepository::new(db)),
        otp_store: Arc::new(InMemoryOtpStore::new(config.otp_ttl)),
        mailer: Arc::new(SendGridMailer::new(
            http_client.clone(),
            config.sendgrid_api_key.clone(),
            config.otp_sender_email.clone(),
        )),
        text_generator: Arc::new(GeminiClient::new(
            http_client,
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
        )),
        files: FileStore::new(config.upload_dir.clone()),
    };

    let app = create_app(state, config.rate_limit);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("Server running on http://{}", config.bind_addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
