//! Metadata of shared hub files. Blobs are managed by the server.

use rusqlite::params;

use localmighty_shared::types::Retention;

use crate::database::{collect_rows, Database};
use crate::error::{not_found, Result};
use crate::models::StoredHubFile;

const SELECT_COLUMNS: &str = "SELECT id, original_name, mime_type, size, stored_name, uploader_ip, created_at, expires_at, retention FROM hub_files";

impl Database {
    pub fn insert_hub_file(&self, file: &StoredHubFile) -> Result<()> {
        self.conn().execute(
            "INSERT INTO hub_files (id, original_name, mime_type, size, stored_name, uploader_ip, created_at, expires_at, retention)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                file.id,
                file.original_name,
                file.mime_type,
                file.size,
                file.stored_name,
                file.uploader_ip,
                file.created_at,
                file.expires_at,
                file.retention.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn get_hub_file(&self, id: &str) -> Result<StoredHubFile> {
        self.conn()
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                row_to_hub_file,
            )
            .map_err(not_found)
    }

    pub fn hub_file_by_stored_name(&self, stored_name: &str) -> Result<StoredHubFile> {
        self.conn()
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE stored_name = ?1"),
                params![stored_name],
                row_to_hub_file,
            )
            .map_err(not_found)
    }

    /// Files that have not expired at `now`, newest first.
    pub fn list_active_hub_files(&self, now: i64) -> Result<Vec<StoredHubFile>> {
        let mut stmt = self.conn().prepare(&format!(
            "{SELECT_COLUMNS}
             WHERE expires_at IS NULL OR expires_at >= ?1
             ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map(params![now], row_to_hub_file)?;
        collect_rows(rows)
    }

    /// Files whose retention ran out strictly before `now`.
    pub fn expired_hub_files(&self, now: i64) -> Result<Vec<StoredHubFile>> {
        let mut stmt = self.conn().prepare(&format!(
            "{SELECT_COLUMNS} WHERE expires_at IS NOT NULL AND expires_at < ?1"
        ))?;
        let rows = stmt.query_map(params![now], row_to_hub_file)?;
        collect_rows(rows)
    }

    /// Returns `true` if a record was removed.
    pub fn delete_hub_file(&self, id: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM hub_files WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    /// Delete many records in a single statement.
    pub fn delete_hub_files(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("DELETE FROM hub_files WHERE id IN ({placeholders})");
        let affected = self
            .conn()
            .execute(&sql, rusqlite::params_from_iter(ids.iter()))?;
        Ok(affected)
    }
}

fn row_to_hub_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredHubFile> {
    let retention: String = row.get(8)?;
    Ok(StoredHubFile {
        id: row.get(0)?,
        original_name: row.get(1)?,
        mime_type: row.get(2)?,
        size: row.get(3)?,
        stored_name: row.get(4)?,
        uploader_ip: row.get(5)?,
        created_at: row.get(6)?,
        expires_at: row.get(7)?,
        retention: Retention::parse(&retention),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_db;
    use crate::StoreError;

    fn file(id: &str, created_at: i64, retention: Retention) -> StoredHubFile {
        StoredHubFile {
            id: id.into(),
            original_name: "notes.txt".into(),
            mime_type: "text/plain".into(),
            size: 5,
            stored_name: format!("{id}_notes.txt"),
            uploader_ip: "192.168.1.2".into(),
            created_at,
            expires_at: retention.expires_at(created_at),
            retention,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let (db, _dir) = test_db();
        let f = file("a", 1000, Retention::OneHour);
        db.insert_hub_file(&f).unwrap();
        assert_eq!(db.get_hub_file("a").unwrap(), f);
        assert!(matches!(db.get_hub_file("b"), Err(StoreError::NotFound)));
        assert_eq!(db.hub_file_by_stored_name("a_notes.txt").unwrap().id, "a");
    }

    #[test]
    fn test_expiry_split() {
        let (db, _dir) = test_db();
        let hour = 60 * 60 * 1000;
        let now = 10 * hour;
        db.insert_hub_file(&file("old", now - 2 * hour, Retention::OneHour))
            .unwrap();
        db.insert_hub_file(&file("fresh", now - hour / 2, Retention::OneHour))
            .unwrap();
        db.insert_hub_file(&file("forever", 0, Retention::Unlimited))
            .unwrap();

        let expired = db.expired_hub_files(now).unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, "old");

        let active: Vec<_> = db
            .list_active_hub_files(now)
            .unwrap()
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(active, vec!["fresh".to_string(), "forever".to_string()]);
    }

    #[test]
    fn test_batched_delete() {
        let (db, _dir) = test_db();
        for id in ["a", "b", "c"] {
            db.insert_hub_file(&file(id, 0, Retention::OneDay)).unwrap();
        }
        assert_eq!(db.delete_hub_files(&[]).unwrap(), 0);
        assert_eq!(
            db.delete_hub_files(&["a".to_string(), "c".to_string()])
                .unwrap(),
            2
        );
        assert!(db.delete_hub_file("b").unwrap());
        assert!(!db.delete_hub_file("b").unwrap());
    }
}
