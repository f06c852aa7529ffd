//! Reviewer Service - pull request reviewer assignment.
//!
//! Assigns reviewers to new pull requests from the author's team, reassigns
//! them on request and tracks the open/merged lifecycle, all on top of a
//! SQLite store. The HTTP API lives in [`services::api`].

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

use config::Config;
use error::AppError;
use services::api::AppState;
use services::api_server::ApiServer;

/// Run the service until Ctrl-C.
///
/// Opens (and migrates) the database, starts the HTTP server and shuts it
/// down gracefully on the interrupt signal.
pub async fn run(config: Config) -> Result<(), AppError> {
    let pool = db::initialize(&config.database_path, config.pool_settings()).await?;

    let state = AppState::new(pool.clone(), config.request_timeout);
    let server = ApiServer::start(config.bind_addr(), state).await?;

    log::info!(
        "[server] Reviewer service ready on {} (request timeout {:?})",
        server.local_addr(),
        config.request_timeout
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("[server] Failed to listen for shutdown signal: {}", e);
    }

    log::info!("[server] Shutting down");
    server.shutdown().await;
    pool.close().await;

    Ok(())
}
