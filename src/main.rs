mod agent;
mod config;
mod errors;
mod models;
mod routes;
mod service;

use tracing::{info, warn};

use crate::agent::CompletionAgent;
use crate::config::Config;
use crate::service::chat_service::ChatService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    // Initialise tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dharma_chat=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env();
    if config.api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; every chat request will fail until it is configured");
    }
    info!("Upstream chat completions endpoint: {}", config.completions_url());

    // ── Dependency wiring ─────────────────────────────────────────────────────
    let agent = CompletionAgent::new(&config);
    let chat_service = ChatService::new(agent);

    // ── Router ────────────────────────────────────────────────────────────────
    if let Some(dir) = &config.static_dir {
        info!("Serving static site content from {}", dir.display());
    }
    let app = routes::router(chat_service, config.static_dir.as_deref());

    // ── Listen ────────────────────────────────────────────────────────────────
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}/");

    axum::serve(listener, app).await?;
    Ok(())
}
