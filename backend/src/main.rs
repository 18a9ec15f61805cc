mod api;
mod config;
mod db;
mod errors;
mod models;
mod state;

use crate::config::Config;
use crate::errors::ApiError;
use crate::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env();

    std::fs::create_dir_all(&config.data_dir).map_err(|e| {
        tracing::error!(error = %e, dir = %config.data_dir.display(), "cannot create data dir");
        ApiError::Internal
    })?;

    let db = db::connect(&config.db_url()).await?;
    db::init_schema(&db).await?;

    let state = AppState::restore(db, config.api_key.as_str()).await?;

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, addr = %config.addr, "bind failed");
            ApiError::Internal
        })?;

    tracing::info!(addr = %config.addr, "backend listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|_| ApiError::Internal)?;

    tracing::info!("backend stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
    }
}
