//! Arrival alerts for a headless deployment.
//!
//! There is no speaker, vibration motor or focused window on a server, so
//! sound and desktop alerts become structured log events and vibration is
//! reported as unsupported.

use helpdesk_shared::alerts::{announce, AlertSettings, AlertSink, DesktopPermission};
use helpdesk_shared::{AlertError, Notification, NotificationFeed};
use helpdesk_store::{Database, StoreError};
use tracing::{info, warn};

use crate::config::ServerConfig;

#[derive(Debug, Clone)]
pub struct TracingAlertSink {
    desktop_allowed: bool,
}

impl TracingAlertSink {
    pub fn new(desktop_allowed: bool) -> Self {
        Self { desktop_allowed }
    }
}

impl AlertSink for TracingAlertSink {
    fn play_sound(&self) -> Result<(), AlertError> {
        info!(target: "helpdesk::alerts", surface = "sound", "new notification chime");
        Ok(())
    }

    fn vibrate(&self, _pattern: &[u32]) -> Result<(), AlertError> {
        Err(AlertError::Unsupported("vibration"))
    }

    fn desktop_permission(&self) -> DesktopPermission {
        if self.desktop_allowed {
            DesktopPermission::Granted
        } else {
            DesktopPermission::Denied
        }
    }

    fn show_desktop(&self, title: &str, body: &str) -> Result<(), AlertError> {
        info!(target: "helpdesk::alerts", surface = "desktop", title, body, "desktop alert");
        Ok(())
    }
}

/// Sink and settings derived from the server configuration.
#[derive(Debug, Clone)]
pub struct Alerts {
    pub sink: TracingAlertSink,
    pub settings: AlertSettings,
}

impl Alerts {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            sink: TracingAlertSink::new(config.desktop_alerts),
            settings: AlertSettings {
                sound_enabled: config.alert_sound,
                surface_visible: false,
            },
        }
    }

    /// Reconcile the feed with the store and announce any arrival.
    pub fn sync(&self, feed: &mut NotificationFeed<Database>) -> Result<(), StoreError> {
        if let Some(arrived) = feed.refresh()? {
            self.announce_arrival(&arrived);
        }
        Ok(())
    }

    /// Like [`sync`](Self::sync), but a store failure only logs and leaves
    /// the working set as it was.
    pub fn sync_or_warn(&self, feed: &mut NotificationFeed<Database>) {
        if let Err(e) = self.sync(feed) {
            warn!(error = %e, "Feed reconciliation failed, serving working set");
        }
    }

    pub fn announce_arrival(&self, arrived: &Notification) {
        info!(
            id = %arrived.id,
            kind = %arrived.kind,
            user = %arrived.user_id,
            "notification arrived"
        );
        announce(&self.sink, &self.settings, arrived);
    }
}
