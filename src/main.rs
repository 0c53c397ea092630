mod broadcaster;
mod burst;
mod catalogue;
mod config;
mod encoder;
mod error;
mod fetcher;
mod listener;
mod prefetch;
mod routes;
mod selector;
mod state;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::catalogue::Catalogue;
use crate::config::Config;
use crate::fetcher::Fetcher;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    tokio::fs::create_dir_all(&config.cache_dir).await?;

    let catalogue = Catalogue::load(config.catalogue_path.as_deref())
        .await
        .map_err(|e| {
            error!(error = %e, "fatal: catalogue failed to load");
            e
        })?;
    info!(tracks = catalogue.len(), "catalogue loaded");

    let (state, selector) = AppState::new(&config, catalogue);

    let fetcher = Arc::new(Fetcher::new(
        config.cache_dir.clone(),
        config.source_base.clone(),
        config.min_valid_bytes,
        config.fetch_timeout_secs,
    ));

    tokio::spawn(prefetch::run(selector, fetcher, state.prefetch.clone()));
    let broadcaster_task = tokio::spawn(state.broadcaster.clone().run());

    let broadcaster_for_shutdown = state.broadcaster.clone();
    let app = routes::router(state).layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.bind_addr, config.bind_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received, stopping broadcaster");
            broadcaster_for_shutdown.shutdown();
        })
        .await?;

    let _ = broadcaster_task.await;

    Ok(())
}
