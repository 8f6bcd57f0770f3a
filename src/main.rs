mod config;
mod credits;
mod error;
mod images;
mod models;
mod openai;
mod openrouter;
mod orchestrator;
mod prompts;
mod routes;
#[cfg(test)]
mod test_support;

use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::{fmt, EnvFilter};

use crate::{
    config::Config,
    credits::InMemoryCredits,
    images::ImageResolver,
    openai::OpenAiImageClient,
    openrouter::OpenRouterClient,
    orchestrator::Orchestrator,
    routes::{router, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    tracing::info!(
        image_model = %config.image_model,
        vision_model = %config.vision_model,
        template_dir = %config.template_dir.display(),
        "Loaded configuration"
    );

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let chat = OpenRouterClient::new(http.clone(), config.openrouter_api_key.clone(), config.vision_model.clone())
        .with_base_url(&config.openrouter_base_url)
        .with_max_tokens(config.vision_max_tokens);
    let images = OpenAiImageClient::new(http.clone(), config.openai_api_key.clone(), config.image_model.clone())
        .with_base_url(&config.openai_base_url);
    let orchestrator = Orchestrator::new(
        ImageResolver::new(http, config.template_dir.clone()),
        Arc::new(chat),
        Arc::new(images),
    );

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        credits: Arc::new(InMemoryCredits::new(config.free_credits)),
    };
    let app = router(state, config.body_limit_bytes);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
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
    }
    tracing::info!("Shutting down");
}
