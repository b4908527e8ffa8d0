//! # helpdesk-server
//!
//! Notification feed service for the repair-shop service desk.
//!
//! This binary provides:
//! - **REST API** (axum) for listing a viewer's notification feed, marking
//!   notifications read, clearing the visible set and accepting new
//!   notifications from event producers
//! - **SQLite storage** of notifications and per-viewer read marks
//! - **Background reconciliation** of the in-memory feed with the store,
//!   announcing arrivals through the alert sink

mod alerts;
mod api;
mod config;
mod error;

use std::sync::Arc;

use helpdesk_shared::NotificationFeed;
use helpdesk_store::Database;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::alerts::Alerts;
use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,helpdesk_server=debug")),
        )
        .init();

    info!("Starting helpdesk server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        http_addr = %config.http_addr,
        poll_interval_secs = config.poll_interval.as_secs(),
        "Loaded configuration"
    );
    info!(
        instance = %config.instance_name,
        producers_enabled = config.producer_token.is_some(),
        desktop_alerts = config.desktop_alerts,
        "Instance settings"
    );

    // -----------------------------------------------------------------------
    // 3. Open the store and load the feed
    // -----------------------------------------------------------------------
    let database = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };

    let alerts = Arc::new(Alerts::from_config(&config));
    let mut feed = NotificationFeed::new(database);
    alerts.sync(&mut feed)?;
    info!(loaded = feed.notifications().len(), "Notification feed loaded");

    let app_state = AppState {
        feed: Arc::new(Mutex::new(feed)),
        alerts: alerts.clone(),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic reconciliation with the store; arrivals trigger alerts.
    let feed = app_state.feed.clone();
    let poll_interval = config.poll_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(poll_interval);
        loop {
            interval.tick().await;
            let mut feed = feed.lock().await;
            alerts.sync_or_warn(&mut feed);
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
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
