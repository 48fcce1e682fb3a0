mod advice;
mod config;
mod errors;
mod feedback;
mod llm_client;
mod models;
mod resume;
mod routes;
mod safety;
mod session;
mod state;
mod upload;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::advice::tasks::CareerAssistant;
use crate::config::Config;
use crate::llm_client::image_gen::ImageGenerator;
use crate::llm_client::{GeminiClient, IMAGE_MODEL, TEXT_MODEL};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CareerCraft API v{}", env!("CARGO_PKG_VERSION"));

    // Text and image models may use different keys
    let text_model = GeminiClient::new(
        config.gemini_api_key.clone(),
        &config.gemini_api_base,
        TEXT_MODEL,
    )?;
    let image_model = GeminiClient::new(
        config.gemini_image_api_key.clone(),
        &config.gemini_api_base,
        IMAGE_MODEL,
    )?;
    info!("LLM clients initialized (text: {TEXT_MODEL}, image: {IMAGE_MODEL})");

    let images = ImageGenerator::new(
        Arc::new(image_model),
        config.image_retry_policy,
        config.cache_capacity,
    );
    let assistant = CareerAssistant::new(Arc::new(text_model), images, config.cache_capacity);
    info!(
        "Response cache capacity: {}, image retry policy: {:?}",
        config.cache_capacity, config.image_retry_policy
    );

    let state = AppState::new(assistant);

    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
