//! SMS messages and the threads derived from them.

use rusqlite::{params, Connection};

use localmighty_shared::types::{now_millis, MessageStats, MessageType, SmsMessage, SmsThread};

use crate::contacts::phone_suffix;
use crate::database::{collect_rows, contains_pattern, Database};
use crate::error::{invalid_column, not_found, Result};

/// Only `read` (and bookkeeping) changes when a known id is synced again.
const UPSERT_SQL: &str = "INSERT INTO messages (id, thread_id, address, address_key, body, date, type, read, synced_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
     ON CONFLICT(id) DO UPDATE SET read = excluded.read, synced_at = excluded.synced_at";

const SELECT_COLUMNS: &str = "SELECT id, thread_id, address, body, date, type, read FROM messages";

fn upsert(conn: &Connection, message: &SmsMessage, now: i64) -> rusqlite::Result<()> {
    conn.prepare_cached(UPSERT_SQL)?.execute(params![
        message.id,
        message.thread_id,
        message.address,
        phone_suffix(&message.address).unwrap_or_default(),
        message.body,
        message.date,
        message.kind.as_str(),
        message.read,
        now,
    ])?;
    Ok(())
}

impl Database {
    // ------------------------------------------------------------------
    // Sync
    // ------------------------------------------------------------------

    /// Insert a message or refresh its `read` flag. Idempotent.
    pub fn upsert_message(&self, message: &SmsMessage) -> Result<()> {
        upsert(self.conn(), message, now_millis())?;
        Ok(())
    }

    /// Upsert every message in one transaction. Either all rows land or
    /// none do.
    pub fn upsert_messages(&mut self, messages: &[SmsMessage]) -> Result<usize> {
        let now = now_millis();
        let tx = self.conn_mut().transaction()?;
        for message in messages {
            upsert(&tx, message, now)?;
        }
        tx.commit()?;
        Ok(messages.len())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_message(&self, id: &str) -> Result<SmsMessage> {
        self.conn()
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                row_to_message,
            )
            .map_err(not_found)
    }

    /// Threads newest first, with `contactName` resolved from contacts.
    pub fn list_threads(&self) -> Result<Vec<SmsThread>> {
        // SQLite takes bare columns from the row holding MAX(date), so
        // address/body are those of the latest message in the thread.
        let mut stmt = self.conn().prepare(
            "SELECT thread_id, address, body, MAX(date) AS last_date,
                    SUM(CASE WHEN read = 0 AND type = 'inbox' THEN 1 ELSE 0 END)
             FROM messages
             GROUP BY thread_id
             ORDER BY last_date DESC",
        )?;

        let threads = collect_rows(stmt.query_map([], |row| {
            Ok(SmsThread {
                thread_id: row.get(0)?,
                address: row.get(1)?,
                contact_name: None,
                last_message: row.get(2)?,
                last_date: row.get(3)?,
                unread_count: row.get(4)?,
            })
        })?)?;

        threads
            .into_iter()
            .map(|mut thread| {
                thread.contact_name = self.find_contact_name(&thread.address)?;
                Ok(thread)
            })
            .collect()
    }

    /// A page of a thread: the newest `limit` messages strictly older than
    /// `before` (if given), returned in ascending date order with contact
    /// names resolved.
    pub fn thread_messages(
        &self,
        thread_id: &str,
        limit: u32,
        before: Option<i64>,
    ) -> Result<Vec<SmsMessage>> {
        let mut stmt = self.conn().prepare(&format!(
            "{SELECT_COLUMNS}
             WHERE thread_id = ?1 AND (?2 IS NULL OR date < ?2)
             ORDER BY date DESC, id DESC
             LIMIT ?3"
        ))?;

        let mut messages =
            collect_rows(stmt.query_map(params![thread_id, before, limit], row_to_message)?)?;
        messages.reverse();
        messages
            .into_iter()
            .map(|m| self.with_contact_name(m))
            .collect()
    }

    /// Messages whose body or address contains `query`, or whose address
    /// belongs to a contact whose name contains it. Newest first.
    pub fn search_messages(&self, query: &str, limit: u32) -> Result<Vec<SmsMessage>> {
        if query.chars().count() < 2 {
            return Ok(Vec::new());
        }
        let pattern = contains_pattern(query);

        let mut stmt = self.conn().prepare(&format!(
            "{SELECT_COLUMNS}
             WHERE body LIKE ?1 ESCAPE '\\'
                OR address LIKE ?1 ESCAPE '\\'
                OR (address_key <> '' AND address_key IN (
                    SELECT SUBSTR(cp.phone_digits, -9)
                    FROM contact_phones cp
                    JOIN contacts c ON c.id = cp.contact_id
                    WHERE c.name LIKE ?1 ESCAPE '\\'))
             ORDER BY date DESC
             LIMIT ?2"
        ))?;

        let messages = collect_rows(stmt.query_map(params![pattern, limit], row_to_message)?)?;
        messages
            .into_iter()
            .map(|m| self.with_contact_name(m))
            .collect()
    }

    /// Attach the resolved contact name. Resolution happens on every read so
    /// a renamed contact shows up immediately.
    pub fn with_contact_name(&self, mut message: SmsMessage) -> Result<SmsMessage> {
        message.contact_name = self.find_contact_name(&message.address)?;
        Ok(message)
    }

    pub fn message_stats(&self) -> Result<MessageStats> {
        self.conn()
            .query_row(
                "SELECT COUNT(*),
                        COUNT(DISTINCT thread_id),
                        COALESCE(SUM(CASE WHEN read = 0 AND type = 'inbox' THEN 1 ELSE 0 END), 0)
                 FROM messages",
                [],
                |row| {
                    Ok(MessageStats {
                        total_messages: row.get(0)?,
                        total_threads: row.get(1)?,
                        unread_count: row.get(2)?,
                    })
                },
            )
            .map_err(Into::into)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Mark every unread message of a thread as read. Returns the number of
    /// rows changed.
    pub fn mark_thread_read(&self, thread_id: &str) -> Result<usize> {
        let affected = self.conn().execute(
            "UPDATE messages SET read = 1 WHERE thread_id = ?1 AND read = 0",
            params![thread_id],
        )?;
        Ok(affected)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<SmsMessage> {
    let kind: String = row.get(5)?;
    let kind = kind.parse::<MessageType>().map_err(|e| invalid_column(5, e))?;

    Ok(SmsMessage {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        address: row.get(2)?,
        body: row.get(3)?,
        date: row.get(4)?,
        kind,
        read: row.get(6)?,
        contact_name: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_db;
    use localmighty_shared::types::Contact;

    fn sms(id: &str, thread: &str, date: i64, kind: MessageType, read: bool) -> SmsMessage {
        SmsMessage {
            id: id.into(),
            thread_id: thread.into(),
            address: "+33612345678".into(),
            body: format!("body {id}"),
            date,
            kind,
            read,
            contact_name: None,
        }
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let (db, _dir) = test_db();
        let msg = sms("1", "42", 1000, MessageType::Inbox, false);

        db.upsert_message(&msg).unwrap();
        let first = db.get_message("1").unwrap();
        db.upsert_message(&msg).unwrap();
        let second = db.get_message("1").unwrap();

        assert_eq!(first, second);
        assert_eq!(db.message_stats().unwrap().total_messages, 1);
    }

    #[test]
    fn test_resync_only_changes_read_flag() {
        let (db, _dir) = test_db();
        db.upsert_message(&sms("1", "42", 1000, MessageType::Inbox, false))
            .unwrap();

        let mut edited = sms("1", "42", 1000, MessageType::Inbox, true);
        edited.body = "rewritten".into();
        db.upsert_message(&edited).unwrap();

        let stored = db.get_message("1").unwrap();
        assert!(stored.read);
        assert_eq!(stored.body, "body 1");
    }

    #[test]
    fn test_batch_then_thread_in_ascending_order() {
        let (mut db, _dir) = test_db();
        let batch = vec![
            sms("b", "42", 3000, MessageType::Inbox, false),
            sms("a", "42", 1000, MessageType::Sent, true),
            sms("c", "42", 2000, MessageType::Inbox, true),
        ];
        assert_eq!(db.upsert_messages(&batch).unwrap(), 3);

        let thread = db.thread_messages("42", 50, None).unwrap();
        let ids: Vec<_> = thread.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);

        let page = db.thread_messages("42", 1, Some(3000)).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "c");
    }

    #[test]
    fn test_threads_unread_count_and_last_message() {
        let (mut db, _dir) = test_db();
        db.upsert_messages(&[
            sms("1", "t1", 100, MessageType::Inbox, false),
            sms("2", "t1", 300, MessageType::Sent, false),
            sms("3", "t1", 200, MessageType::Inbox, true),
            sms("4", "t2", 50, MessageType::Inbox, false),
        ])
        .unwrap();

        let threads = db.list_threads().unwrap();
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].thread_id, "t1");
        assert_eq!(threads[0].last_message, "body 2");
        assert_eq!(threads[0].last_date, 300);
        // the unread sent message is not counted
        assert_eq!(threads[0].unread_count, 1);

        assert_eq!(db.mark_thread_read("t1").unwrap(), 2);
        assert_eq!(db.list_threads().unwrap()[0].unread_count, 0);
        assert_eq!(db.message_stats().unwrap().unread_count, 1);
    }

    #[test]
    fn test_contact_name_resolved_at_read_time() {
        let (mut db, _dir) = test_db();
        db.upsert_message(&sms("1", "t1", 100, MessageType::Inbox, false))
            .unwrap();
        assert_eq!(db.list_threads().unwrap()[0].contact_name, None);

        db.replace_contacts(&[Contact {
            id: "c1".into(),
            name: "Alice".into(),
            phone_numbers: vec!["06 12 34 56 78".into()],
        }])
        .unwrap();
        assert_eq!(
            db.list_threads().unwrap()[0].contact_name.as_deref(),
            Some("Alice")
        );

        let found = db.search_messages("Ali", 10).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].contact_name.as_deref(), Some("Alice"));
        assert!(db.search_messages("x", 10).unwrap().is_empty());

        let page = db.thread_messages("t1", 50, None).unwrap();
        assert_eq!(page[0].contact_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_search_wildcards_match_literally() {
        let (mut db, _dir) = test_db();
        let mut sale = sms("1", "t1", 100, MessageType::Inbox, false);
        sale.body = "50% off today".into();
        db.upsert_messages(&[sale, sms("2", "t1", 200, MessageType::Inbox, false)])
            .unwrap();

        let found = db.search_messages("0%", 10).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "1");
        assert!(db.search_messages("%%", 10).unwrap().is_empty());
        assert!(db.search_messages("__", 10).unwrap().is_empty());
    }
}
