//! # localmighty-server
//!
//! Home-network hub between one Android phone and any number of browsers.
//!
//! This binary provides:
//! - **Main namespace** (`/socket`): the phone pushes SMS, notifications,
//!   calls, contacts and battery state, which are persisted and fanned out
//!   to web clients; web clients send commands that are relayed to the phone
//! - **Hub namespace** (`/share`): shared clipboard, short-lived file
//!   sharing and an end-to-end encrypted password vault
//! - **REST API** (axum) over the same data, plus device pairing

mod api;
mod auth;
mod blob_store;
mod channel;
mod config;
mod dispatch;
mod error;
mod hub;
mod relay;
mod session;
mod state;
mod sync;
mod ws;

use tracing::info;
use tracing_subscriber::EnvFilter;

use localmighty_store::Database;

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,localmighty_server=debug")),
        )
        .init();

    info!("Starting LocalMighty server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the store and build shared state
    // -----------------------------------------------------------------------
    let db = Database::open_in_dir(&config.data_dir)?;
    info!(path = ?db.path(), "Database opened");

    let http_addr = config.http_addr;
    let sweep_interval = config.sweep_interval;
    let state = AppState::new(config, db).await?;

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Expired hub files: once now, then every sweep interval
    state.hub_files.clone().spawn_sweeper(sweep_interval);

    // -----------------------------------------------------------------------
    // 5. Run the HTTP + WebSocket server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
