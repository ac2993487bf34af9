//! `TaskFlow` sync server -- realtime document store for task lists.
//!
//! An axum WebSocket server that owns the task collection and pushes the
//! complete collection to every subscriber after each change.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:7878
//! cargo run --bin taskflow-sync
//!
//! # Run on custom address
//! cargo run --bin taskflow-sync -- --bind 127.0.0.1:8080
//!
//! # Or via environment variable
//! TASKFLOW_SYNC_ADDR=127.0.0.1:8080 cargo run --bin taskflow-sync
//! ```

use std::sync::Arc;

use clap::Parser;
use taskflow_sync::collection::Collection;
use taskflow_sync::config::{SyncCliArgs, SyncConfig};
use taskflow_sync::server::{self, SyncState};

#[tokio::main]
async fn main() {
    let cli = SyncCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match SyncConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(addr = %config.bind_addr, "starting taskflow sync server");

    let collection = Collection::with_max_text_len(config.max_text_len);
    let state = Arc::new(SyncState::with_collection(collection));

    match server::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "sync server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "sync server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start sync server");
            std::process::exit(1);
        }
    }
}
