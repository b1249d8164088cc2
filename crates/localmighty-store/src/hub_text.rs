//! Hub clipboard singleton and its bounded history.

use rusqlite::{params, OptionalExtension};

use localmighty_shared::constants::HUB_TEXT_HISTORY_LIMIT;
use localmighty_shared::types::{HubText, HubTextHistoryEntry};

use crate::database::{collect_rows, Database};
use crate::error::Result;

/// Id of the clipboard singleton as shown to clients.
pub const CLIPBOARD_ID: &str = "1";

impl Database {
    pub fn get_clipboard(&self) -> Result<HubText> {
        self.conn()
            .query_row(
                "SELECT content, author_ip, updated_at FROM hub_clipboard WHERE id = 1",
                [],
                |row| {
                    Ok(HubText {
                        id: CLIPBOARD_ID.to_string(),
                        content: row.get(0)?,
                        author_ip: row.get(1)?,
                        updated_at: row.get(2)?,
                    })
                },
            )
            .map_err(Into::into)
    }

    /// Replace the clipboard and record the new content in history.
    ///
    /// History only grows with non-empty content that differs from the
    /// newest entry, and is pruned to the most recent
    /// `HUB_TEXT_HISTORY_LIMIT` entries. Size limits are the caller's job.
    pub fn overwrite_clipboard(
        &mut self,
        content: &str,
        author_ip: &str,
        now: i64,
    ) -> Result<HubText> {
        let tx = self.conn_mut().transaction()?;

        tx.execute(
            "UPDATE hub_clipboard SET content = ?1, author_ip = ?2, updated_at = ?3 WHERE id = 1",
            params![content, author_ip, now],
        )?;

        if !content.is_empty() {
            let newest: Option<String> = tx
                .query_row(
                    "SELECT content FROM hub_text_history
                     ORDER BY created_at DESC, rowid DESC LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()?;

            if newest.as_deref() != Some(content) {
                tx.execute(
                    "INSERT INTO hub_text_history (id, content, author_ip, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![uuid::Uuid::new_v4().to_string(), content, author_ip, now],
                )?;
                tx.execute(
                    "DELETE FROM hub_text_history WHERE rowid NOT IN (
                        SELECT rowid FROM hub_text_history
                        ORDER BY created_at DESC, rowid DESC
                        LIMIT ?1)",
                    params![HUB_TEXT_HISTORY_LIMIT as i64],
                )?;
            }
        }

        tx.commit()?;

        Ok(HubText {
            id: CLIPBOARD_ID.to_string(),
            content: content.to_string(),
            author_ip: author_ip.to_string(),
            updated_at: now,
        })
    }

    /// Newest first.
    pub fn text_history(&self) -> Result<Vec<HubTextHistoryEntry>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, content, author_ip, created_at FROM hub_text_history
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(HubTextHistoryEntry {
                id: row.get(0)?,
                content: row.get(1)?,
                author_ip: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;
        collect_rows(rows)
    }

    pub fn clear_text_history(&self) -> Result<usize> {
        let affected = self.conn().execute("DELETE FROM hub_text_history", [])?;
        Ok(affected)
    }
}
