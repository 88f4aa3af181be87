// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Parser;
use embed_service::{
    api::{create_app, shutdown_signal, start_server, AppState},
    config::ServiceConfig,
    embeddings::{load_model, TextEmbedder},
    version,
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServiceConfig::parse();
    config.validate().context("Invalid configuration")?;
    let api_config = config.api_config()?;

    info!("🚀 Starting {}", version::get_version_string());
    info!(
        "   model={} dimension={} pooling={} max_length={}",
        config.model_id, config.dimension, config.pooling, config.max_length
    );

    // The model must be ready before the server accepts connections
    info!("🔁 Loading embedding model: {} ...", config.model_id);
    let model = load_model(&config.model_config())
        .await
        .with_context(|| format!("Failed to load embedding model {}", config.model_id))?;
    info!("✅ Model loaded: {} ({} dimensions)", model.model_id(), model.dimension());

    let app = create_app(AppState::new(model), &api_config);

    let listener = TcpListener::bind(api_config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", api_config.listen_addr))?;

    info!("  Health:       GET  http://{}/health", api_config.listen_addr);
    info!("  Embed:        POST http://{}/embed", api_config.listen_addr);

    start_server(listener, app, shutdown_signal()).await
}
