//! Arrival detection and best-effort alerting.
//!
//! Nothing in this module may fail the caller: every surface error is
//! logged at debug level and dropped.

use tracing::debug;

use crate::constants::{VIBRATE_DEFAULT, VIBRATE_URGENT};
use crate::error::AlertError;
use crate::notification::Notification;
use crate::types::NotificationKind;

// ---------------------------------------------------------------------------
// Arrival detection
// ---------------------------------------------------------------------------

/// Tracks the size of the last observed collection.
#[derive(Debug, Default, Clone)]
pub struct ArrivalDetector {
    last_len: Option<usize>,
}

impl ArrivalDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe a fresh snapshot of the collection.
    ///
    /// Returns the last notification in collection order when the
    /// collection grew since the previous observation. The first
    /// observation only establishes the baseline.
    pub fn observe<'a>(&mut self, notifications: &'a [Notification]) -> Option<&'a Notification> {
        let previous = self.last_len.replace(notifications.len());
        match previous {
            Some(prev) if notifications.len() > prev => notifications.last(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Alert surfaces
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopPermission {
    Granted,
    Denied,
    Default,
}

/// OS/browser alert surfaces.
pub trait AlertSink {
    fn play_sound(&self) -> Result<(), AlertError>;

    fn vibrate(&self, pattern: &[u32]) -> Result<(), AlertError>;

    fn desktop_permission(&self) -> DesktopPermission;

    fn show_desktop(&self, title: &str, body: &str) -> Result<(), AlertError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertSettings {
    pub sound_enabled: bool,
    /// Whether the viewing surface currently has focus.
    pub surface_visible: bool,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            surface_visible: true,
        }
    }
}

pub fn vibration_pattern(kind: &NotificationKind) -> &'static [u32] {
    match kind {
        NotificationKind::Urgent => VIBRATE_URGENT,
        _ => VIBRATE_DEFAULT,
    }
}

/// Alert the viewer about a newly arrived notification: sound, then
/// vibration, then a desktop alert when the surface is hidden.
pub fn announce<A: AlertSink + ?Sized>(
    sink: &A,
    settings: &AlertSettings,
    notification: &Notification,
) {
    if settings.sound_enabled {
        if let Err(e) = sink.play_sound() {
            debug!(error = %e, "sound alert failed");
        }
    }

    if let Err(e) = sink.vibrate(vibration_pattern(&notification.kind)) {
        debug!(error = %e, "vibration alert failed");
    }

    if !settings.surface_visible && sink.desktop_permission() == DesktopPermission::Granted {
        if let Err(e) = sink.show_desktop(&notification.title, &notification.message) {
            debug!(error = %e, "desktop alert failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::types::{Role, UserId};

    #[derive(Default)]
    struct RecordingSink {
        calls: RefCell<Vec<String>>,
        permission: Option<DesktopPermission>,
        broken: bool,
    }

    impl RecordingSink {
        fn record(&self, call: String) -> Result<(), AlertError> {
            self.calls.borrow_mut().push(call);
            if self.broken {
                Err(AlertError::Unsupported("test"))
            } else {
                Ok(())
            }
        }
    }

    impl AlertSink for RecordingSink {
        fn play_sound(&self) -> Result<(), AlertError> {
            self.record("sound".into())
        }

        fn vibrate(&self, pattern: &[u32]) -> Result<(), AlertError> {
            self.record(format!("vibrate:{pattern:?}"))
        }

        fn desktop_permission(&self) -> DesktopPermission {
            self.permission.unwrap_or(DesktopPermission::Default)
        }

        fn show_desktop(&self, title: &str, _body: &str) -> Result<(), AlertError> {
            self.record(format!("desktop:{title}"))
        }
    }

    fn note(kind: NotificationKind) -> Notification {
        Notification::new("New ticket", "Pixel 7 battery", kind, UserId::from("u"), Role::Customer)
    }

    #[test]
    fn first_observation_is_baseline() {
        let mut detector = ArrivalDetector::new();
        let list = vec![note(NotificationKind::Info)];
        assert!(detector.observe(&list).is_none());
        assert!(detector.observe(&list).is_none());
    }

    #[test]
    fn growth_yields_last_in_collection_order() {
        let mut detector = ArrivalDetector::new();
        let mut list = vec![note(NotificationKind::Info)];
        detector.observe(&list);

        list.push(note(NotificationKind::Urgent));
        list.push(note(NotificationKind::Success));
        let arrived = detector.observe(&list).map(|n| n.id);
        assert_eq!(arrived, Some(list[2].id));

        list.truncate(1);
        assert!(detector.observe(&list).is_none());
    }

    #[test]
    fn urgent_gets_distinct_pattern() {
        assert_eq!(vibration_pattern(&NotificationKind::Urgent), VIBRATE_URGENT);
        assert_eq!(vibration_pattern(&NotificationKind::Warning), VIBRATE_DEFAULT);
        assert_ne!(VIBRATE_URGENT, VIBRATE_DEFAULT);
    }

    #[test]
    fn announce_runs_steps_in_order() {
        let sink = RecordingSink {
            permission: Some(DesktopPermission::Granted),
            ..Default::default()
        };
        let settings = AlertSettings {
            sound_enabled: true,
            surface_visible: false,
        };
        announce(&sink, &settings, &note(NotificationKind::Urgent));
        assert_eq!(
            *sink.calls.borrow(),
            vec![
                "sound".to_string(),
                format!("vibrate:{:?}", VIBRATE_URGENT),
                "desktop:New ticket".to_string(),
            ]
        );
    }

    #[test]
    fn announce_respects_settings_and_permission() {
        let sink = RecordingSink {
            permission: Some(DesktopPermission::Denied),
            ..Default::default()
        };
        let settings = AlertSettings {
            sound_enabled: false,
            surface_visible: false,
        };
        announce(&sink, &settings, &note(NotificationKind::Info));
        assert_eq!(*sink.calls.borrow(), vec![format!("vibrate:{:?}", VIBRATE_DEFAULT)]);

        let sink = RecordingSink {
            permission: Some(DesktopPermission::Granted),
            ..Default::default()
        };
        announce(&sink, &AlertSettings::default(), &note(NotificationKind::Info));
        assert_eq!(sink.calls.borrow().len(), 2);
    }

    #[test]
    fn announce_swallows_surface_failures() {
        let sink = RecordingSink {
            permission: Some(DesktopPermission::Granted),
            broken: true,
            ..Default::default()
        };
        let settings = AlertSettings {
            sound_enabled: true,
            surface_visible: false,
        };
        announce(&sink, &settings, &note(NotificationKind::Info));
        assert_eq!(sink.calls.borrow().len(), 3);
    }
}
