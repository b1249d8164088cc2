use rusqlite::{params, Connection};

use localmighty_shared::types::{now_millis, CallLogEntry, CallStats, CallType};

use crate::database::{collect_rows, Database};
use crate::error::{invalid_column, not_found, Result};

// Call log entries are immutable; a replay only touches bookkeeping.
const UPSERT_SQL: &str = "INSERT INTO calls (id, number, contact_name, type, date, duration, synced_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
     ON CONFLICT(id) DO UPDATE SET synced_at = excluded.synced_at";

const SELECT_COLUMNS: &str = "SELECT id, number, contact_name, type, date, duration FROM calls";

fn upsert(conn: &Connection, call: &CallLogEntry, now: i64) -> rusqlite::Result<()> {
    conn.prepare_cached(UPSERT_SQL)?.execute(params![
        call.id,
        call.number,
        call.contact_name,
        call.kind.as_str(),
        call.date,
        call.duration,
        now,
    ])?;
    Ok(())
}

impl Database {
    pub fn upsert_call(&self, call: &CallLogEntry) -> Result<()> {
        upsert(self.conn(), call, now_millis())?;
        Ok(())
    }

    pub fn upsert_calls(&mut self, calls: &[CallLogEntry]) -> Result<usize> {
        let now = now_millis();
        let tx = self.conn_mut().transaction()?;
        for call in calls {
            upsert(&tx, call, now)?;
        }
        tx.commit()?;
        Ok(calls.len())
    }

    pub fn get_call(&self, id: &str) -> Result<CallLogEntry> {
        self.conn()
            .query_row(&format!("{SELECT_COLUMNS} WHERE id = ?1"), params![id], row_to_call)
            .map_err(not_found)
    }

    /// Newest first, with contact names resolved at read time.
    pub fn list_calls(&self, limit: u32, offset: u32) -> Result<Vec<CallLogEntry>> {
        let mut stmt = self.conn().prepare(&format!(
            "{SELECT_COLUMNS} ORDER BY date DESC LIMIT ?1 OFFSET ?2"
        ))?;
        let calls = collect_rows(stmt.query_map(params![limit, offset], row_to_call)?)?;
        calls.into_iter().map(|c| self.with_call_contact(c)).collect()
    }

    pub fn calls_by_type(&self, kind: CallType, limit: u32) -> Result<Vec<CallLogEntry>> {
        let mut stmt = self.conn().prepare(&format!(
            "{SELECT_COLUMNS} WHERE type = ?1 ORDER BY date DESC LIMIT ?2"
        ))?;
        let calls = collect_rows(stmt.query_map(params![kind.as_str(), limit], row_to_call)?)?;
        calls.into_iter().map(|c| self.with_call_contact(c)).collect()
    }

    /// Prefer the name stored in contacts; fall back to the one the phone
    /// reported with the call.
    pub fn with_call_contact(&self, mut call: CallLogEntry) -> Result<CallLogEntry> {
        if let Some(name) = self.find_contact_name(&call.number)? {
            call.contact_name = Some(name);
        }
        Ok(call)
    }

    pub fn call_stats(&self) -> Result<CallStats> {
        self.conn()
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN type = 'incoming' THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN type = 'outgoing' THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN type = 'missed' THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(duration), 0)
                 FROM calls",
                [],
                |row| {
                    Ok(CallStats {
                        total_calls: row.get(0)?,
                        incoming_calls: row.get(1)?,
                        outgoing_calls: row.get(2)?,
                        missed_calls: row.get(3)?,
                        total_duration: row.get(4)?,
                    })
                },
            )
            .map_err(Into::into)
    }
}

fn row_to_call(row: &rusqlite::Row<'_>) -> rusqlite::Result<CallLogEntry> {
    let kind: String = row.get(3)?;
    let kind = kind.parse::<CallType>().map_err(|e| invalid_column(3, e))?;

    Ok(CallLogEntry {
        id: row.get(0)?,
        number: row.get(1)?,
        contact_name: row.get(2)?,
        kind,
        date: row.get(4)?,
        duration: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_db;
    use localmighty_shared::types::Contact;

    fn call(id: &str, kind: CallType, date: i64, duration: i64) -> CallLogEntry {
        CallLogEntry {
            id: id.into(),
            number: "+33612345678".into(),
            contact_name: Some("From phone".into()),
            kind,
            date,
            duration,
        }
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let (db, _dir) = test_db();
        let c = call("1", CallType::Missed, 10, 0);
        db.upsert_call(&c).unwrap();
        db.upsert_call(&c).unwrap();
        assert_eq!(db.get_call("1").unwrap(), c);
        assert_eq!(db.call_stats().unwrap().total_calls, 1);
    }

    #[test]
    fn test_stats_and_filters() {
        let (mut db, _dir) = test_db();
        db.upsert_calls(&[
            call("1", CallType::Incoming, 10, 30),
            call("2", CallType::Outgoing, 20, 60),
            call("3", CallType::Missed, 30, 0),
            call("4", CallType::Incoming, 40, 10),
        ])
        .unwrap();

        let stats = db.call_stats().unwrap();
        assert_eq!(stats.incoming_calls, 2);
        assert_eq!(stats.missed_calls, 1);
        assert_eq!(stats.total_duration, 100);

        let incoming = db.calls_by_type(CallType::Incoming, 10).unwrap();
        assert_eq!(incoming.len(), 2);
        assert_eq!(incoming[0].id, "4");

        let page = db.list_calls(2, 1).unwrap();
        let ids: Vec<_> = page.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2"]);
    }

    #[test]
    fn test_stored_contact_overrides_phone_name() {
        let (mut db, _dir) = test_db();
        db.upsert_call(&call("1", CallType::Incoming, 10, 5)).unwrap();
        assert_eq!(
            db.list_calls(10, 0).unwrap()[0].contact_name.as_deref(),
            Some("From phone")
        );

        db.replace_contacts(&[Contact {
            id: "c".into(),
            name: "Alice".into(),
            phone_numbers: vec!["0612345678".into()],
        }])
        .unwrap();
        assert_eq!(
            db.list_calls(10, 0).unwrap()[0].contact_name.as_deref(),
            Some("Alice")
        );
    }
}
