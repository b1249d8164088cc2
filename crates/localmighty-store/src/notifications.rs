use rusqlite::{params, Connection};

use localmighty_shared::types::{now_millis, AppNotification, NotificationApp};

use crate::database::{collect_rows, Database};
use crate::error::{not_found, Result};

// `dismissed` is the only field that changes once a notification is known.
const UPSERT_SQL: &str = "INSERT INTO notifications (id, package_name, app_name, title, text, timestamp, dismissed, synced_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
     ON CONFLICT(id) DO UPDATE SET dismissed = excluded.dismissed, synced_at = excluded.synced_at";

const SELECT_COLUMNS: &str =
    "SELECT id, package_name, app_name, title, text, timestamp, dismissed FROM notifications";

fn upsert(conn: &Connection, n: &AppNotification, now: i64) -> rusqlite::Result<()> {
    conn.prepare_cached(UPSERT_SQL)?.execute(params![
        n.id,
        n.package_name,
        n.app_name,
        n.title,
        n.text,
        n.timestamp,
        n.dismissed,
        now,
    ])?;
    Ok(())
}

impl Database {
    pub fn upsert_notification(&self, notification: &AppNotification) -> Result<()> {
        upsert(self.conn(), notification, now_millis())?;
        Ok(())
    }

    /// Upsert a batch atomically.
    pub fn upsert_notifications(&mut self, notifications: &[AppNotification]) -> Result<usize> {
        let now = now_millis();
        let tx = self.conn_mut().transaction()?;
        for n in notifications {
            upsert(&tx, n, now)?;
        }
        tx.commit()?;
        Ok(notifications.len())
    }

    /// Last-writer-wins write of the `dismissed` flag, whichever side it
    /// comes from. Returns `false` if the id is unknown.
    pub fn overwrite_notification_dismissed(&self, id: &str, dismissed: bool) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE notifications SET dismissed = ?2 WHERE id = ?1",
            params![id, dismissed],
        )?;
        Ok(affected > 0)
    }

    pub fn dismiss_all_notifications(&self) -> Result<usize> {
        let affected = self
            .conn()
            .execute("UPDATE notifications SET dismissed = 1 WHERE dismissed = 0", [])?;
        Ok(affected)
    }

    /// Delete dismissed notifications posted before `older_than` (epoch ms).
    pub fn cleanup_dismissed_notifications(&self, older_than: i64) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM notifications WHERE timestamp < ?1 AND dismissed = 1",
            params![older_than],
        )?;
        Ok(affected)
    }

    pub fn get_notification(&self, id: &str) -> Result<AppNotification> {
        self.conn()
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                row_to_notification,
            )
            .map_err(not_found)
    }

    /// Newest first; dismissed ones only when asked for.
    pub fn list_notifications(
        &self,
        limit: u32,
        include_dismissed: bool,
    ) -> Result<Vec<AppNotification>> {
        let mut stmt = self.conn().prepare(&format!(
            "{SELECT_COLUMNS}
             WHERE (?1 OR dismissed = 0)
             ORDER BY timestamp DESC
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![include_dismissed, limit], row_to_notification)?;
        collect_rows(rows)
    }

    pub fn notifications_for_app(
        &self,
        package_name: &str,
        limit: u32,
    ) -> Result<Vec<AppNotification>> {
        let mut stmt = self.conn().prepare(&format!(
            "{SELECT_COLUMNS}
             WHERE package_name = ?1
             ORDER BY timestamp DESC
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![package_name, limit], row_to_notification)?;
        collect_rows(rows)
    }

    /// One summary row per application, most recently active first.
    pub fn notification_apps(&self) -> Result<Vec<NotificationApp>> {
        let mut stmt = self.conn().prepare(
            "SELECT package_name, MAX(app_name), COUNT(*),
                    SUM(CASE WHEN dismissed = 0 THEN 1 ELSE 0 END),
                    MAX(timestamp) AS last_notification
             FROM notifications
             GROUP BY package_name
             ORDER BY last_notification DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(NotificationApp {
                package_name: row.get(0)?,
                app_name: row.get(1)?,
                count: row.get(2)?,
                active_count: row.get(3)?,
                last_notification: row.get(4)?,
            })
        })?;
        collect_rows(rows)
    }
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<AppNotification> {
    Ok(AppNotification {
        id: row.get(0)?,
        package_name: row.get(1)?,
        app_name: row.get(2)?,
        title: row.get(3)?,
        text: row.get(4)?,
        timestamp: row.get(5)?,
        dismissed: row.get(6)?,
        icon: None,
        can_reply: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_db;

    fn notif(id: &str, package: &str, timestamp: i64) -> AppNotification {
        AppNotification {
            id: id.into(),
            package_name: package.into(),
            app_name: "Chat".into(),
            title: "Title".into(),
            text: "Text".into(),
            timestamp,
            dismissed: false,
            icon: None,
            can_reply: None,
        }
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let (db, _dir) = test_db();
        let n = notif("0|com.chat|1_1000", "com.chat", 1000);
        db.upsert_notification(&n).unwrap();
        db.upsert_notification(&n).unwrap();

        assert_eq!(db.get_notification(&n.id).unwrap(), n);
        assert_eq!(db.list_notifications(100, true).unwrap().len(), 1);
    }

    #[test]
    fn test_dismiss_is_last_writer_wins() {
        let (db, _dir) = test_db();
        let n = notif("a", "com.chat", 1000);
        db.upsert_notification(&n).unwrap();

        assert!(db.overwrite_notification_dismissed("a", true).unwrap());
        // replaying the same dismissal changes nothing further
        assert!(db.overwrite_notification_dismissed("a", true).unwrap());
        assert!(db.get_notification("a").unwrap().dismissed);
        assert!(db.list_notifications(100, false).unwrap().is_empty());

        assert!(!db.overwrite_notification_dismissed("missing", true).unwrap());
    }

    #[test]
    fn test_batch_apps_and_cleanup() {
        let (mut db, _dir) = test_db();
        db.upsert_notifications(&[
            notif("1", "com.chat", 100),
            notif("2", "com.chat", 300),
            notif("3", "com.mail", 200),
        ])
        .unwrap();

        let apps = db.notification_apps().unwrap();
        assert_eq!(apps[0].package_name, "com.chat");
        assert_eq!(apps[0].count, 2);
        assert_eq!(db.notifications_for_app("com.mail", 10).unwrap().len(), 1);

        assert_eq!(db.dismiss_all_notifications().unwrap(), 3);
        assert_eq!(db.cleanup_dismissed_notifications(250).unwrap(), 2);
        assert_eq!(db.list_notifications(10, true).unwrap().len(), 1);
    }
}
