//! Which notifications a viewer may see, and in what order.
//!
//! Visibility is decided in three stages:
//!
//! 1. the role-keyed [`VisibilityRule`] of the viewer,
//! 2. the user-facing [`CategoryFilter`],
//! 3. the [`RoleFilter`] on the author's snapshotted role, honoured only for
//!    privileged viewers.
//!
//! The surviving records are then ordered by timestamp. Everything here is
//! pure; read state never affects membership.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FilterParseError;
use crate::notification::Notification;
use crate::types::{NotificationKind, Role, Viewer};

// ---------------------------------------------------------------------------
// Role-keyed visibility table
// ---------------------------------------------------------------------------

/// Disclosure breadth granted to a viewer role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityRule {
    /// Every notification.
    Everything,
    /// Everything except notifications authored under these roles.
    ExcludeAuthorRoles(&'static [Role]),
    /// Only notifications authored under these roles.
    OnlyAuthorRoles(&'static [Role]),
    /// Only notifications about the viewer's own account.
    OwnOnly,
    /// Nothing at all.
    Nothing,
}

const SUPER_ADMIN_ONLY: &[Role] = &[Role::SuperAdmin];
const FIELD_STAFF: &[Role] = &[Role::Manager, Role::Technician];

impl VisibilityRule {
    pub fn for_role(role: &Role) -> Self {
        match role {
            Role::SuperAdmin => VisibilityRule::Everything,
            Role::Admin => VisibilityRule::ExcludeAuthorRoles(SUPER_ADMIN_ONLY),
            Role::Manager => VisibilityRule::OnlyAuthorRoles(FIELD_STAFF),
            Role::Technician | Role::Customer => VisibilityRule::OwnOnly,
            Role::Other(_) => VisibilityRule::Nothing,
        }
    }

    pub fn permits(&self, viewer: &Viewer, notification: &Notification) -> bool {
        match self {
            VisibilityRule::Everything => true,
            VisibilityRule::ExcludeAuthorRoles(roles) => !roles.contains(&notification.user_role),
            VisibilityRule::OnlyAuthorRoles(roles) => roles.contains(&notification.user_role),
            VisibilityRule::OwnOnly => notification.user_id == viewer.id,
            VisibilityRule::Nothing => false,
        }
    }
}

/// Whether `viewer` may see `notification` at all.
pub fn is_accessible(viewer: &Viewer, notification: &Notification) -> bool {
    VisibilityRule::for_role(&viewer.role).permits(viewer, notification)
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryFilter {
    #[default]
    All,
    /// `urgent` and `warning`.
    Urgent,
    /// `info` and `success`.
    System,
}

impl CategoryFilter {
    pub fn matches(&self, kind: &NotificationKind) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Urgent => {
                matches!(kind, NotificationKind::Urgent | NotificationKind::Warning)
            }
            CategoryFilter::System => {
                matches!(kind, NotificationKind::Info | NotificationKind::Success)
            }
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(CategoryFilter::All),
            "urgent" => Ok(CategoryFilter::Urgent),
            "system" => Ok(CategoryFilter::System),
            _ => Err(FilterParseError::Category(s.to_string())),
        }
    }
}

/// Exact match on the author's snapshotted role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum RoleFilter {
    #[default]
    All,
    Only(Role),
}

impl RoleFilter {
    pub fn matches(&self, role: &Role) -> bool {
        match self {
            RoleFilter::All => true,
            RoleFilter::Only(wanted) => wanted == role,
        }
    }
}

impl FromStr for RoleFilter {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.as_str() {
            "ALL" => Ok(RoleFilter::All),
            "TECHNICIAN" | "MANAGER" | "ADMIN" | "CUSTOMER" => {
                Ok(RoleFilter::Only(Role::from(upper)))
            }
            _ => Err(FilterParseError::Role(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Most recent first.
    #[default]
    Newest,
    Oldest,
}

impl FromStr for SortOrder {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" => Ok(SortOrder::Newest),
            "oldest" => Ok(SortOrder::Oldest),
            _ => Err(FilterParseError::Sort(s.to_string())),
        }
    }
}

/// The UI selection applied on top of role-based visibility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FeedQuery {
    pub category: CategoryFilter,
    pub role: RoleFilter,
    pub sort: SortOrder,
}

impl FeedQuery {
    /// Parse optional query-string values; absent values take the default.
    pub fn parse(
        category: Option<&str>,
        role: Option<&str>,
        sort: Option<&str>,
    ) -> Result<Self, FilterParseError> {
        Ok(Self {
            category: category.map(str::parse).transpose()?.unwrap_or_default(),
            role: role.map(str::parse).transpose()?.unwrap_or_default(),
            sort: sort.map(str::parse).transpose()?.unwrap_or_default(),
        })
    }
}

// ---------------------------------------------------------------------------
// Computation
// ---------------------------------------------------------------------------

/// The ordered subset of `notifications` that `viewer` sees under `query`.
///
/// The sort is stable: equal timestamps keep their collection order.
pub fn compute_visible(
    notifications: &[Notification],
    viewer: &Viewer,
    query: &FeedQuery,
) -> Vec<Notification> {
    let rule = VisibilityRule::for_role(&viewer.role);
    let narrow_by_role = viewer.role.is_privileged();

    let mut visible: Vec<Notification> = notifications
        .iter()
        .filter(|n| rule.permits(viewer, n))
        .filter(|n| query.category.matches(&n.kind))
        .filter(|n| !narrow_by_role || query.role.matches(&n.user_role))
        .cloned()
        .collect();

    match query.sort {
        SortOrder::Newest => visible.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
        SortOrder::Oldest => visible.sort_by(|a, b| a.timestamp.cmp(&b.timestamp)),
    }

    visible
}

/// Number of accessible notifications `viewer` has not read yet.
///
/// Evaluated over the viewer's whole accessible set, ignoring UI filters.
pub fn unread_count(notifications: &[Notification], viewer: &Viewer) -> usize {
    let rule = VisibilityRule::for_role(&viewer.role);
    notifications
        .iter()
        .filter(|n| rule.permits(viewer, n) && !n.is_read_by(&viewer.id))
        .count()
}

pub fn has_unread(notifications: &[Notification], viewer: &Viewer) -> bool {
    let rule = VisibilityRule::for_role(&viewer.role);
    notifications
        .iter()
        .any(|n| rule.permits(viewer, n) && !n.is_read_by(&viewer.id))
}
