//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use helpdesk_shared::constants::{DEFAULT_HTTP_PORT, DEFAULT_POLL_INTERVAL_SECS};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: the platform data directory.
    pub database_path: Option<PathBuf>,

    /// How often the feed is reconciled with the store.
    /// Env: `POLL_INTERVAL_SECS`
    /// Default: `5`
    pub poll_interval: Duration,

    /// Whether arrivals produce a sound alert.
    /// Env: `ALERT_SOUND` (true/false)
    /// Default: `true`
    pub alert_sound: bool,

    /// Whether desktop alerts are permitted.
    /// Env: `DESKTOP_ALERTS` (true/false)
    /// Default: `false`
    pub desktop_alerts: bool,

    /// Bearer token required by event producers to create notifications.
    /// Env: `PRODUCER_TOKEN`
    /// Default: empty (creation disabled).
    pub producer_token: Option<String>,

    /// Human-readable name for this instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Helpdesk"`
    pub instance_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            alert_sound: true,
            desktop_alerts: false,
            producer_token: None,
            instance_name: "Helpdesk".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            if !path.is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }

        if let Some(val) = lookup("POLL_INTERVAL_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.poll_interval = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid POLL_INTERVAL_SECS, using default"),
            }
        }

        if let Some(val) = lookup("ALERT_SOUND") {
            config.alert_sound = parse_flag(&val);
        }

        if let Some(val) = lookup("DESKTOP_ALERTS") {
            config.desktop_alerts = parse_flag(&val);
        }

        if let Some(token) = lookup("PRODUCER_TOKEN") {
            if !token.is_empty() {
                config.producer_token = Some(token);
            }
        }

        if let Some(name) = lookup("INSTANCE_NAME") {
            config.instance_name = name;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

fn parse_flag(val: &str) -> bool {
    val != "false" && val != "0"
}
