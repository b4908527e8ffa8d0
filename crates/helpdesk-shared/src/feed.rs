//! The viewer-side working set of notifications.
//!
//! [`NotificationFeed`] holds a read-mostly copy of the store's collection.
//! Mutations are applied to the local copy first and then forwarded to the
//! store one request per notification. A failed request is logged and the
//! local change is kept; the next [`NotificationFeed::refresh`] replaces the
//! working set with whatever the store holds.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::alerts::ArrivalDetector;
use crate::notification::Notification;
use crate::store::NotificationStore;
use crate::types::{NotificationId, Viewer};
use crate::visibility::{self, FeedQuery};

/// Outcome of a batch of independent store requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MutationReport {
    /// Requests issued to the store.
    pub requested: usize,
    /// Requests the store rejected. Local state was not rolled back.
    pub failed: usize,
}

struct VisibleCache {
    viewer: Viewer,
    query: FeedQuery,
    result: Vec<Notification>,
}

pub struct NotificationFeed<S> {
    store: S,
    working: Vec<Notification>,
    arrivals: ArrivalDetector,
    cache: Option<VisibleCache>,
}

impl<S: NotificationStore> NotificationFeed<S> {
    /// Create an empty feed. Call [`refresh`](Self::refresh) to load it.
    pub fn new(store: S) -> Self {
        Self {
            store,
            working: Vec::new(),
            arrivals: ArrivalDetector::new(),
            cache: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The working set in collection order.
    pub fn notifications(&self) -> &[Notification] {
        &self.working
    }

    /// Replace the working set with the store's current collection.
    ///
    /// Returns the newly arrived notification when the collection grew
    /// since it was last observed. Local clears and inserts move the
    /// baseline too, so growth is measured against what the viewer saw.
    pub fn refresh(&mut self) -> Result<Option<Notification>, S::Error> {
        let fresh = self.store.fetch_all()?;
        let arrived = self.arrivals.observe(&fresh).cloned();

        if fresh != self.working {
            debug!(
                before = self.working.len(),
                after = fresh.len(),
                "notification working set reconciled"
            );
            self.working = fresh;
            self.invalidate();
        }

        Ok(arrived)
    }

    /// Add a notification pushed by a live subscription, ahead of the next
    /// store read.
    ///
    /// Returns the notification as an arrival once a baseline exists.
    pub fn insert_local(&mut self, notification: Notification) -> Option<Notification> {
        if self.working.iter().any(|n| n.id == notification.id) {
            return None;
        }
        self.working.push(notification);
        self.invalidate();
        self.arrivals.observe(&self.working).cloned()
    }

    /// What `viewer` sees under `query`, memoized until the working set,
    /// the viewer or the query changes.
    pub fn visible(&mut self, viewer: &Viewer, query: &FeedQuery) -> &[Notification] {
        let hit = matches!(
            &self.cache,
            Some(c) if c.viewer == *viewer && c.query == *query
        );
        if !hit {
            let result = visibility::compute_visible(&self.working, viewer, query);
            self.cache = Some(VisibleCache {
                viewer: viewer.clone(),
                query: query.clone(),
                result,
            });
        }
        self.cache
            .as_ref()
            .map(|c| c.result.as_slice())
            .unwrap_or_default()
    }

    pub fn has_unread(&self, viewer: &Viewer) -> bool {
        visibility::has_unread(&self.working, viewer)
    }

    pub fn unread_count(&self, viewer: &Viewer) -> usize {
        visibility::unread_count(&self.working, viewer)
    }

    /// Mark a single notification read for `viewer`. No request is issued
    /// when it is already read or not in the working set.
    pub fn mark_one_read(&mut self, viewer: &Viewer, id: &NotificationId) -> MutationReport {
        let Some(local) = self.working.iter_mut().find(|n| n.id == *id) else {
            return MutationReport::default();
        };
        if !local.mark_read_by(&viewer.id) {
            return MutationReport::default();
        }
        self.invalidate();

        let mut report = MutationReport::default();
        self.forward_read(viewer, id, &mut report);
        report
    }

    /// Mark every notification in `visible` read for `viewer`.
    ///
    /// Each request is independent; one failure does not stop the rest.
    pub fn mark_all_visible_read(
        &mut self,
        viewer: &Viewer,
        visible: &[Notification],
    ) -> MutationReport {
        let mut report = MutationReport::default();
        let mut changed = false;

        for record in visible {
            let already_read = match self.working.iter_mut().find(|n| n.id == record.id) {
                Some(local) => {
                    let inserted = local.mark_read_by(&viewer.id);
                    changed |= inserted;
                    !inserted
                }
                None => record.is_read_by(&viewer.id),
            };
            if already_read {
                continue;
            }
            self.forward_read(viewer, &record.id, &mut report);
        }

        if changed {
            self.invalidate();
        }
        report
    }

    /// Delete exactly the notifications in `visible`, leaving everything
    /// else in the working set untouched.
    pub fn clear_visible(&mut self, visible: &[Notification]) -> MutationReport {
        let doomed: HashSet<NotificationId> = visible.iter().map(|n| n.id).collect();
        let before = self.working.len();
        self.working.retain(|n| !doomed.contains(&n.id));
        if self.working.len() != before {
            self.invalidate();
            self.arrivals.observe(&self.working);
        }

        let mut report = MutationReport::default();
        for record in visible {
            report.requested += 1;
            if let Err(e) = self.store.delete(&record.id) {
                report.failed += 1;
                warn!(id = %record.id, error = %e, "failed to delete notification");
            }
        }
        report
    }

    /// Act on a notification: mark it read and hand back its navigation
    /// target, if any.
    pub fn open(&mut self, viewer: &Viewer, id: &NotificationId) -> Option<String> {
        self.mark_one_read(viewer, id);
        self.working
            .iter()
            .find(|n| n.id == *id)
            .and_then(|n| n.link.clone())
    }

    fn forward_read(&self, viewer: &Viewer, id: &NotificationId, report: &mut MutationReport) {
        report.requested += 1;
        if let Err(e) = self.store.append_reader(id, &viewer.id) {
            report.failed += 1;
            warn!(id = %id, viewer = %viewer.id, error = %e, "failed to persist read mark");
        }
    }

    fn invalidate(&mut self) {
        self.cache = None;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::types::{NotificationKind, Role, UserId};
    use crate::visibility::CategoryFilter;

    #[derive(Debug, thiserror::Error)]
    #[error("store offline")]
    struct Offline;

    #[derive(Default)]
    struct MemoryStore {
        rows: RefCell<Vec<Notification>>,
        offline: Cell<bool>,
        appends: Cell<usize>,
        deletes: Cell<usize>,
    }

    impl MemoryStore {
        fn with(rows: Vec<Notification>) -> Self {
            Self {
                rows: RefCell::new(rows),
                ..Default::default()
            }
        }
    }

    impl NotificationStore for MemoryStore {
        type Error = Offline;

        fn fetch_all(&self) -> Result<Vec<Notification>, Offline> {
            if self.offline.get() {
                return Err(Offline);
            }
            Ok(self.rows.borrow().clone())
        }

        fn append_reader(&self, id: &NotificationId, reader: &UserId) -> Result<(), Offline> {
            self.appends.set(self.appends.get() + 1);
            if self.offline.get() {
                return Err(Offline);
            }
            if let Some(n) = self.rows.borrow_mut().iter_mut().find(|n| n.id == *id) {
                n.mark_read_by(reader);
            }
            Ok(())
        }

        fn delete(&self, id: &NotificationId) -> Result<(), Offline> {
            self.deletes.set(self.deletes.get() + 1);
            if self.offline.get() {
                return Err(Offline);
            }
            self.rows.borrow_mut().retain(|n| n.id != *id);
            Ok(())
        }
    }

    fn note(user: &str, kind: NotificationKind, ts: i64) -> Notification {
        Notification::new("t", "m", kind, UserId::from(user), Role::Technician).with_timestamp(ts)
    }

    fn loaded(rows: Vec<Notification>) -> NotificationFeed<MemoryStore> {
        let mut feed = NotificationFeed::new(MemoryStore::with(rows));
        feed.refresh().unwrap();
        feed
    }

    #[test]
    fn mark_one_read_is_idempotent() {
        let n = note("tech", NotificationKind::Info, 1);
        let id = n.id;
        let mut feed = loaded(vec![n]);
        let viewer = Viewer::new("tech", Role::Technician);

        assert_eq!(feed.mark_one_read(&viewer, &id).requested, 1);
        let after_once = feed.notifications()[0].read_by.clone();
        assert_eq!(feed.mark_one_read(&viewer, &id).requested, 0);
        assert_eq!(feed.notifications()[0].read_by, after_once);
        assert_eq!(feed.store().appends.get(), 1);
    }

    #[test]
    fn mark_all_clears_unread_badge() {
        let viewer = Viewer::new("tech", Role::Technician);
        let unread = note("tech", NotificationKind::Info, 1);
        let mut read = note("tech", NotificationKind::Urgent, 2);
        read.mark_read_by(&viewer.id);
        let mut feed = loaded(vec![unread, read]);

        assert!(feed.has_unread(&viewer));
        let visible = feed.visible(&viewer, &FeedQuery::default()).to_vec();
        let report = feed.mark_all_visible_read(&viewer, &visible);
        assert_eq!(report, MutationReport { requested: 1, failed: 0 });
        assert!(!feed.has_unread(&viewer));
        assert_eq!(feed.unread_count(&viewer), 0);
    }

    #[test]
    fn mark_all_on_empty_or_read_set_issues_nothing() {
        let viewer = Viewer::new("tech", Role::Technician);
        let mut read = note("tech", NotificationKind::Info, 1);
        read.mark_read_by(&viewer.id);
        let mut feed = loaded(vec![read]);

        assert_eq!(feed.mark_all_visible_read(&viewer, &[]), MutationReport::default());
        let visible = feed.visible(&viewer, &FeedQuery::default()).to_vec();
        assert_eq!(feed.mark_all_visible_read(&viewer, &visible), MutationReport::default());
        assert_eq!(feed.store().appends.get(), 0);
    }

    #[test]
    fn clear_visible_respects_active_filter() {
        let viewer = Viewer::new("tech", Role::Technician);
        let urgent = note("tech", NotificationKind::Urgent, 1);
        let info = note("tech", NotificationKind::Info, 2);
        let info_id = info.id;
        let mut feed = loaded(vec![urgent, info]);

        let query = FeedQuery {
            category: CategoryFilter::Urgent,
            ..FeedQuery::default()
        };
        let visible = feed.visible(&viewer, &query).to_vec();
        assert_eq!(visible.len(), 1);

        let report = feed.clear_visible(&visible);
        assert_eq!(report.requested, 1);
        let remaining: Vec<_> = feed.notifications().iter().map(|n| n.id).collect();
        assert_eq!(remaining, vec![info_id]);
        assert_eq!(feed.store().rows.borrow().len(), 1);
    }

    #[test]
    fn visible_cache_invalidates_on_mutation() {
        let viewer = Viewer::new("tech", Role::Technician);
        let n = note("tech", NotificationKind::Info, 1);
        let id = n.id;
        let mut feed = loaded(vec![n]);

        assert!(!feed.visible(&viewer, &FeedQuery::default())[0].is_read_by(&viewer.id));
        feed.mark_one_read(&viewer, &id);
        assert!(feed.visible(&viewer, &FeedQuery::default())[0].is_read_by(&viewer.id));

        assert!(feed.insert_local(note("tech", NotificationKind::Urgent, 5)).is_some());
        assert_eq!(feed.visible(&viewer, &FeedQuery::default()).len(), 2);
    }

    #[test]
    fn refresh_reports_arrivals_after_baseline() {
        let store = MemoryStore::with(vec![note("a", NotificationKind::Info, 1)]);
        let mut feed = NotificationFeed::new(store);
        assert!(feed.refresh().unwrap().is_none());

        let newcomer = note("a", NotificationKind::Urgent, 2);
        feed.store().rows.borrow_mut().push(newcomer.clone());
        assert_eq!(feed.refresh().unwrap(), Some(newcomer));
        assert!(feed.refresh().unwrap().is_none());
    }

    #[test]
    fn arrival_after_clear_is_reported() {
        let viewer = Viewer::new("tech", Role::Technician);
        let mut feed = loaded(vec![
            note("tech", NotificationKind::Urgent, 1),
            note("tech", NotificationKind::Warning, 2),
            note("tech", NotificationKind::Info, 3),
        ]);

        let query = FeedQuery {
            category: CategoryFilter::Urgent,
            ..FeedQuery::default()
        };
        let visible = feed.visible(&viewer, &query).to_vec();
        assert_eq!(feed.clear_visible(&visible).requested, 2);

        let newcomer = note("tech", NotificationKind::Urgent, 4);
        feed.store().rows.borrow_mut().push(newcomer.clone());
        assert_eq!(feed.store().rows.borrow().len(), 2);
        assert_eq!(feed.refresh().unwrap(), Some(newcomer));
    }

    #[test]
    fn local_insert_moves_the_baseline() {
        let mut feed = loaded(vec![note("tech", NotificationKind::Info, 1)]);
        let pushed = note("tech", NotificationKind::Urgent, 2);
        assert_eq!(feed.insert_local(pushed.clone()), Some(pushed.clone()));
        assert_eq!(feed.insert_local(pushed.clone()), None);

        // The store catching up with the push is not a second arrival.
        feed.store().rows.borrow_mut().push(pushed);
        assert!(feed.refresh().unwrap().is_none());
    }

    #[test]
    fn failed_store_keeps_optimistic_state() {
        // Known limitation: there is no rollback, the UI keeps showing the
        // optimistic result until the next successful refresh.
        let viewer = Viewer::new("tech", Role::Technician);
        let n = note("tech", NotificationKind::Info, 1);
        let id = n.id;
        let mut feed = loaded(vec![n]);
        feed.store().offline.set(true);

        let report = feed.mark_one_read(&viewer, &id);
        assert_eq!(report, MutationReport { requested: 1, failed: 1 });
        assert!(!feed.has_unread(&viewer));
        assert!(feed.refresh().is_err());
        assert!(!feed.has_unread(&viewer));

        feed.store().offline.set(false);
        feed.refresh().unwrap();
        assert!(feed.has_unread(&viewer));
    }

    #[test]
    fn partial_failure_does_not_block_other_requests() {
        let viewer = Viewer::new("tech", Role::Technician);
        let mut feed = loaded(vec![
            note("tech", NotificationKind::Info, 1),
            note("tech", NotificationKind::Info, 2),
        ]);
        feed.store().offline.set(true);

        let visible = feed.visible(&viewer, &FeedQuery::default()).to_vec();
        let report = feed.clear_visible(&visible);
        assert_eq!(report, MutationReport { requested: 2, failed: 2 });
        assert_eq!(feed.store().deletes.get(), 2);
        assert!(feed.notifications().is_empty());
    }

    #[test]
    fn open_marks_read_and_returns_link() {
        let viewer = Viewer::new("tech", Role::Technician);
        let linked = note("tech", NotificationKind::Info, 1).with_link("/tickets/77");
        let plain = note("tech", NotificationKind::Info, 2);
        let (linked_id, plain_id) = (linked.id, plain.id);
        let mut feed = loaded(vec![linked, plain]);

        assert_eq!(feed.open(&viewer, &linked_id).as_deref(), Some("/tickets/77"));
        assert_eq!(feed.open(&viewer, &plain_id), None);
        assert!(!feed.has_unread(&viewer));
    }
}
