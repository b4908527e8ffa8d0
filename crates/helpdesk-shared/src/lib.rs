//! # helpdesk-shared
//!
//! Domain types and the notification visibility engine shared by the
//! service-desk store and server.
//!
//! The engine is pure: [`visibility::compute_visible`] maps a collection,
//! a viewer and a UI filter selection to an ordered view. Stateful pieces
//! (the [`feed::NotificationFeed`] working set and arrival alerts) sit on
//! top of it and talk to storage through [`store::NotificationStore`].

pub mod alerts;
pub mod constants;
pub mod error;
pub mod feed;
pub mod notification;
pub mod store;
pub mod types;
pub mod visibility;

pub use error::{AlertError, FilterParseError};
pub use feed::{MutationReport, NotificationFeed};
pub use notification::Notification;
pub use store::NotificationStore;
pub use types::{NotificationId, NotificationKind, Role, UserId, Viewer};
pub use visibility::{compute_visible, CategoryFilter, FeedQuery, RoleFilter, SortOrder};
