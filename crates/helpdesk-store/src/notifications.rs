//! CRUD operations for [`Notification`] records and their read marks.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use helpdesk_shared::{Notification, NotificationId, NotificationStore, UserId};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};

const SELECT_COLUMNS: &str =
    "SELECT id, title, message, kind, timestamp, user_id, user_role, link FROM notifications";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new notification together with any read marks it carries.
    /// The record and its marks land atomically.
    pub fn insert_notification(&self, notification: &Notification) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO notifications (id, title, message, kind, timestamp, user_id, user_role, link)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                notification.id.to_string(),
                notification.title,
                notification.message,
                notification.kind.as_str(),
                notification.timestamp,
                notification.user_id.as_str(),
                notification.user_role.as_str(),
                notification.link,
            ],
        )?;

        let read_at = Utc::now().to_rfc3339();
        for reader in &notification.read_by {
            tx.execute(
                "INSERT OR IGNORE INTO notification_reads (notification_id, reader_id, read_at)
                 VALUES (?1, ?2, ?3)",
                params![notification.id.to_string(), reader.as_str(), read_at],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_notification(&self, id: NotificationId) -> Result<Notification> {
        let mut notification = self
            .conn()
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id.to_string()],
                row_to_notification,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })?;

        let mut stmt = self.conn().prepare(
            "SELECT reader_id FROM notification_reads WHERE notification_id = ?1",
        )?;
        let rows = stmt.query_map(params![id.to_string()], |row| row.get::<_, String>(0))?;
        for row in rows {
            notification.read_by.insert(UserId(row?));
        }
        Ok(notification)
    }

    /// Every notification in collection (insertion) order, read marks
    /// attached.
    pub fn list_notifications(&self) -> Result<Vec<Notification>> {
        let mut readers = self.all_read_marks()?;

        let mut stmt = self
            .conn()
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY seq ASC"))?;
        let rows = stmt.query_map([], row_to_notification)?;

        let mut notifications = Vec::new();
        for row in rows {
            let mut notification = row?;
            if let Some(read_by) = readers.remove(&notification.id.to_string()) {
                notification.read_by = read_by;
            }
            notifications.push(notification);
        }
        Ok(notifications)
    }

    pub fn count_notifications(&self) -> Result<usize> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM notifications", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn all_read_marks(&self) -> Result<HashMap<String, BTreeSet<UserId>>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT notification_id, reader_id FROM notification_reads")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut map: HashMap<String, BTreeSet<UserId>> = HashMap::new();
        for row in rows {
            let (notification_id, reader) = row?;
            map.entry(notification_id).or_default().insert(UserId(reader));
        }
        Ok(map)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Add `reader` to the notification's read set.
    ///
    /// Appending an existing reader is a no-op, so concurrent marks from
    /// different viewers merge instead of overwriting each other.
    pub fn append_reader(&self, id: NotificationId, reader: &UserId) -> Result<()> {
        let exists: bool = self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM notifications WHERE id = ?1)",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StoreError::NotFound);
        }

        self.conn().execute(
            "INSERT OR IGNORE INTO notification_reads (notification_id, reader_id, read_at)
             VALUES (?1, ?2, ?3)",
            params![id.to_string(), reader.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a notification and its read marks. Returns `true` if a row
    /// was removed.
    pub fn delete_notification(&self, id: NotificationId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM notifications WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

impl NotificationStore for Database {
    type Error = StoreError;

    fn fetch_all(&self) -> Result<Vec<Notification>> {
        self.list_notifications()
    }

    fn append_reader(&self, id: &NotificationId, reader: &UserId) -> Result<()> {
        Database::append_reader(self, *id, reader)
    }

    fn delete(&self, id: &NotificationId) -> Result<()> {
        if !self.delete_notification(*id)? {
            tracing::debug!(%id, "delete of unknown notification ignored");
        }
        Ok(())
    }
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let id_str: String = row.get(0)?;
    let kind: String = row.get(3)?;
    let user_id: String = row.get(5)?;
    let user_role: String = row.get(6)?;

    let id = NotificationId::parse(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Notification {
        id,
        title: row.get(1)?,
        message: row.get(2)?,
        kind: kind.into(),
        timestamp: row.get(4)?,
        user_id: UserId(user_id),
        user_role: user_role.into(),
        read_by: BTreeSet::new(),
        link: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use helpdesk_shared::{
        CategoryFilter, FeedQuery, NotificationFeed, NotificationKind, Role, Viewer,
    };

    use super::*;

    fn note(user: &str, role: Role, kind: NotificationKind, ts: i64) -> Notification {
        Notification::new("Ticket update", "Repair completed", kind, UserId::from(user), role)
            .with_timestamp(ts)
    }

    #[test]
    fn insert_and_get_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let mut n = note("tech-1", Role::Technician, NotificationKind::Warning, 42)
            .with_link("/tickets/9");
        n.mark_read_by(&UserId::from("mgr-1"));
        db.insert_notification(&n).unwrap();

        let fetched = db.get_notification(n.id).unwrap();
        assert_eq!(fetched, n);
    }

    #[test]
    fn unknown_kind_and_role_survive_storage() {
        let db = Database::open_in_memory().unwrap();
        let n = note(
            "x",
            Role::Other("CONTRACTOR".into()),
            NotificationKind::Other("critical".into()),
            1,
        );
        db.insert_notification(&n).unwrap();
        let fetched = db.get_notification(n.id).unwrap();
        assert_eq!(fetched.user_role, Role::Other("CONTRACTOR".into()));
        assert_eq!(fetched.kind, NotificationKind::Other("critical".into()));
    }

    #[test]
    fn list_preserves_collection_order() {
        let db = Database::open_in_memory().unwrap();
        let later = note("a", Role::Customer, NotificationKind::Info, 300);
        let earlier = note("a", Role::Customer, NotificationKind::Info, 100);
        db.insert_notification(&later).unwrap();
        db.insert_notification(&earlier).unwrap();

        let ids: Vec<_> = db.list_notifications().unwrap().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![later.id, earlier.id]);
        assert_eq!(db.count_notifications().unwrap(), 2);
    }

    #[test]
    fn append_reader_is_a_set_union() {
        let db = Database::open_in_memory().unwrap();
        let n = note("a", Role::Customer, NotificationKind::Info, 1);
        db.insert_notification(&n).unwrap();

        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        db.append_reader(n.id, &alice).unwrap();
        db.append_reader(n.id, &bob).unwrap();
        db.append_reader(n.id, &alice).unwrap();

        let read_by = db.get_notification(n.id).unwrap().read_by;
        assert_eq!(read_by.into_iter().collect::<Vec<_>>(), vec![alice, bob]);
    }

    #[test]
    fn append_reader_to_missing_notification() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .append_reader(NotificationId::new(), &UserId::from("a"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn delete_cascades_read_marks() {
        let db = Database::open_in_memory().unwrap();
        let n = note("a", Role::Customer, NotificationKind::Info, 1);
        db.insert_notification(&n).unwrap();
        db.append_reader(n.id, &UserId::from("a")).unwrap();

        assert!(db.delete_notification(n.id).unwrap());
        assert!(!db.delete_notification(n.id).unwrap());
        assert!(matches!(db.get_notification(n.id), Err(StoreError::NotFound)));

        let marks: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM notification_reads", [], |row| row.get(0))
            .unwrap();
        assert_eq!(marks, 0);
    }

    #[test]
    fn backs_a_notification_feed() {
        let db = Database::open_in_memory().unwrap();
        let urgent = note("tech", Role::Technician, NotificationKind::Urgent, 1);
        let info = note("tech", Role::Technician, NotificationKind::Info, 2);
        db.insert_notification(&urgent).unwrap();
        db.insert_notification(&info).unwrap();

        let viewer = Viewer::new("tech", Role::Technician);
        let mut feed = NotificationFeed::new(&db);
        feed.refresh().unwrap();

        let query = FeedQuery {
            category: CategoryFilter::Urgent,
            ..FeedQuery::default()
        };
        let visible = feed.visible(&viewer, &query).to_vec();
        feed.mark_all_visible_read(&viewer, &visible);
        feed.clear_visible(&visible);

        let remaining = db.list_notifications().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, info.id);
        assert!(remaining[0].read_by.is_empty());
    }

    #[test]
    fn failed_read_mark_rolls_back_insert() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute_batch("DROP TABLE notification_reads")
            .unwrap();

        let mut n = note("cust-1", Role::Customer, NotificationKind::Info, 5);
        n.mark_read_by(&UserId::from("cust-1"));
        assert!(db.insert_notification(&n).is_err());
        assert_eq!(db.count_notifications().unwrap(), 0);
    }

    #[test]
    fn malformed_id_surfaces_as_sqlite_error() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute(
                "INSERT INTO notifications (id, title, message, kind, timestamp, user_id, user_role, link)
                 VALUES ('garbage', 't', 'm', 'info', 1, 'u', 'customer', NULL)",
                [],
            )
            .unwrap();
        assert!(matches!(
            db.list_notifications(),
            Err(StoreError::Sqlite(_))
        ));
    }
}
