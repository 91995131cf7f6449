use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use dealscout_client::{Settings, retail_providers};
use dealscout_core::{AnyProvider, SearchEngine};
use dealscout_server::routes;
use dealscout_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dealscout=info".parse()?))
        .with_target(false)
        .init();

    let settings = Settings::from_env();
    let addr = format!("{}:{}", settings.host, settings.port);

    let providers = build_providers(&settings).await?;
    tracing::info!(providers = providers.len(), "Retailers registered");
    let engine = SearchEngine::new(providers, settings.session_config());
    let state = Arc::new(AppState::new(engine));

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[cfg(feature = "browser")]
async fn build_providers(settings: &Settings) -> anyhow::Result<Vec<AnyProvider>> {
    let fetcher = dealscout_client::BrowserPageFetcher::launch(settings.headless)
        .await
        .context("Failed to launch headless browser")?;
    Ok(retail_providers(fetcher)?
        .into_iter()
        .map(AnyProvider::new)
        .collect())
}

#[cfg(not(feature = "browser"))]
async fn build_providers(_settings: &Settings) -> anyhow::Result<Vec<AnyProvider>> {
    let fetcher = dealscout_client::HttpPageFetcher::new().context("Failed to create HTTP client")?;
    Ok(retail_providers(fetcher)?
        .into_iter()
        .map(AnyProvider::new)
        .collect())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    tracing::info!("Shutdown signal received");
}
