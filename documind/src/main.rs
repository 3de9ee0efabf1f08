use axum::{routing::get, serve, Router};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use documind::api::{self, Hub};
use documind::config::Config;
use documind::generate::GenerationClient;
use documind_core::events::EventBus;
use documind_core::files::LocalFileStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    let storage = Arc::new(LocalFileStorage::new(&config.data_dir)?);
    let generator = Arc::new(GenerationClient::new(
        config.backend_url.clone(),
        Duration::from_secs(config.generation_timeout_secs),
    ));
    let hub = Arc::new(RwLock::new(Hub::new()));
    let events = EventBus::new();

    let app = Router::new()
        .merge(api::router(hub, storage, generator, events))
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(&config.bind).await?;
    tracing::info!(addr = %config.bind, "listening");
    serve(listener, app.into_make_service()).await?;
    Ok(())
}
