//! Vault storage. Every secret column is opaque ciphertext produced by the
//! browser; nothing here can decrypt or check it.

use rusqlite::{params, OptionalExtension};

use localmighty_shared::types::{HubVaultEntry, HubVaultEntryInput, HubVaultMeta};

use crate::database::{collect_rows, Database};
use crate::error::{not_found, Result, StoreError};

const SELECT_COLUMNS: &str = "SELECT id, label, username, password_encrypted, totp_secret_encrypted, url, notes, created_at, updated_at FROM hub_vault_entries";

impl Database {
    pub fn get_vault_meta(&self) -> Result<Option<HubVaultMeta>> {
        self.conn()
            .query_row(
                "SELECT salt, verification_blob FROM hub_vault_meta WHERE id = 1",
                [],
                |row| {
                    Ok(HubVaultMeta {
                        salt: row.get(0)?,
                        verification_blob: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    /// Initialise the vault. Returns `false` (and changes nothing) if it was
    /// already set up.
    pub fn set_vault_meta(&self, meta: &HubVaultMeta) -> Result<bool> {
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO hub_vault_meta (id, salt, verification_blob) VALUES (1, ?1, ?2)",
            params![meta.salt, meta.verification_blob],
        )?;
        Ok(inserted > 0)
    }

    /// Entries ordered by label.
    pub fn list_vault_entries(&self) -> Result<Vec<HubVaultEntry>> {
        let mut stmt = self.conn().prepare(&format!(
            "{SELECT_COLUMNS} ORDER BY label COLLATE NOCASE ASC, id ASC"
        ))?;
        let rows = stmt.query_map([], row_to_entry)?;
        collect_rows(rows)
    }

    pub fn get_vault_entry(&self, id: &str) -> Result<HubVaultEntry> {
        self.conn()
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                row_to_entry,
            )
            .map_err(not_found)
    }

    pub fn insert_vault_entry(&self, input: &HubVaultEntryInput, now: i64) -> Result<HubVaultEntry> {
        let entry = HubVaultEntry {
            id: uuid::Uuid::new_v4().to_string(),
            label: input.label.clone(),
            username: input.username.clone(),
            password_encrypted: input.password_encrypted.clone(),
            totp_secret_encrypted: input.totp_secret_encrypted.clone(),
            url: input.url.clone(),
            notes: input.notes.clone(),
            created_at: now,
            updated_at: now,
        };

        self.conn().execute(
            "INSERT INTO hub_vault_entries
                (id, label, username, password_encrypted, totp_secret_encrypted, url, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                entry.id,
                entry.label,
                entry.username,
                entry.password_encrypted,
                entry.totp_secret_encrypted,
                entry.url,
                entry.notes,
                entry.created_at,
                entry.updated_at,
            ],
        )?;
        Ok(entry)
    }

    /// Overwrite an entry's fields; `created_at` is kept.
    pub fn update_vault_entry(
        &self,
        id: &str,
        input: &HubVaultEntryInput,
        now: i64,
    ) -> Result<HubVaultEntry> {
        let affected = self.conn().execute(
            "UPDATE hub_vault_entries
             SET label = ?2, username = ?3, password_encrypted = ?4, totp_secret_encrypted = ?5,
                 url = ?6, notes = ?7, updated_at = ?8
             WHERE id = ?1",
            params![
                id,
                input.label,
                input.username,
                input.password_encrypted,
                input.totp_secret_encrypted,
                input.url,
                input.notes,
                now,
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_vault_entry(id)
    }

    pub fn delete_vault_entry(&self, id: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM hub_vault_entries WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<HubVaultEntry> {
    Ok(HubVaultEntry {
        id: row.get(0)?,
        label: row.get(1)?,
        username: row.get(2)?,
        password_encrypted: row.get(3)?,
        totp_secret_encrypted: row.get(4)?,
        url: row.get(5)?,
        notes: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
