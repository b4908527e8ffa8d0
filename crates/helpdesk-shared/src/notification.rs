//! The notification record pushed to service-desk staff and customers.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{NotificationId, NotificationKind, Role, UserId};

/// A unit of information pushed to one or more viewers.
///
/// Only `read_by` ever changes after creation, and it only grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Creation instant, epoch milliseconds.
    pub timestamp: i64,
    /// Account whose activity generated this notification.
    pub user_id: UserId,
    /// Role of `user_id` when the notification was created.
    pub user_role: Role,
    #[serde(default)]
    pub read_by: BTreeSet<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Notification {
    /// Build a fresh, unread notification stamped with the current time.
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        kind: NotificationKind,
        user_id: UserId,
        user_role: Role,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            title: title.into(),
            message: message.into(),
            kind,
            timestamp: Utc::now().timestamp_millis(),
            user_id,
            user_role,
            read_by: BTreeSet::new(),
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_read_by(&self, viewer: &UserId) -> bool {
        self.read_by.contains(viewer)
    }

    /// Record `viewer` as having read this notification.
    ///
    /// Returns `false` when the viewer was already present.
    pub fn mark_read_by(&mut self, viewer: &UserId) -> bool {
        self.read_by.insert(viewer.clone())
    }
}
