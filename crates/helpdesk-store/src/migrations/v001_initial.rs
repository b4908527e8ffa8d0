//! v001 -- Initial schema creation.
//!
//! Creates `notifications` and the per-viewer `notification_reads` table.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Notifications
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS notifications (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT, -- collection order
    id         TEXT NOT NULL UNIQUE,              -- UUID v4
    title      TEXT NOT NULL,
    message    TEXT NOT NULL,
    kind       TEXT NOT NULL,                     -- info / success / warning / urgent
    timestamp  INTEGER NOT NULL,                  -- epoch millis
    user_id    TEXT NOT NULL,
    user_role  TEXT NOT NULL,                     -- role snapshot at creation
    link       TEXT
);

CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id);

-- ----------------------------------------------------------------
-- Read marks (append-only set per notification)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS notification_reads (
    notification_id TEXT NOT NULL,   -- FK -> notifications(id)
    reader_id       TEXT NOT NULL,
    read_at         TEXT NOT NULL,   -- ISO-8601

    PRIMARY KEY (notification_id, reader_id),
    FOREIGN KEY (notification_id) REFERENCES notifications(id) ON DELETE CASCADE
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
