mod catalog;
mod config;
mod error;
mod gemini;
mod intake;
mod models;
mod prompt;
mod routes;
mod wizard;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;
use crate::gemini::GeminiClient;
use crate::routes::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env()?;
    tracing::info!("Using API key: {}", config.masked_key());
    tracing::info!(model = %config.gemini_model, timeout = ?config.generation_timeout, "Image generation configured");

    let generator = Arc::new(GeminiClient::from_config(&config));
    if generator.is_demo() {
        tracing::warn!("GEMINI_API_KEY not set, designs will be demo placeholders");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = router(AppState::new(generator, config));

    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutting down");
}
