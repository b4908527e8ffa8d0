//! The seam to whatever owns the canonical notification collection.

use crate::notification::Notification;
use crate::types::{NotificationId, UserId};

/// Canonical notification storage.
///
/// `append_reader` must behave as a set union: appending an id that is
/// already present is a no-op, and appends for different viewers never
/// overwrite each other.
pub trait NotificationStore {
    type Error: std::error::Error;

    /// The whole collection in collection (insertion) order.
    fn fetch_all(&self) -> Result<Vec<Notification>, Self::Error>;

    fn append_reader(&self, id: &NotificationId, reader: &UserId) -> Result<(), Self::Error>;

    fn delete(&self, id: &NotificationId) -> Result<(), Self::Error>;
}

impl<S: NotificationStore + ?Sized> NotificationStore for &S {
    type Error = S::Error;

    fn fetch_all(&self) -> Result<Vec<Notification>, Self::Error> {
        (**self).fetch_all()
    }

    fn append_reader(&self, id: &NotificationId, reader: &UserId) -> Result<(), Self::Error> {
        (**self).append_reader(id, reader)
    }

    fn delete(&self, id: &NotificationId) -> Result<(), Self::Error> {
        (**self).delete(id)
    }
}
