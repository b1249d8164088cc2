//! Pairing tokens.

use rand::RngCore;
use rusqlite::{params, OptionalExtension};

use localmighty_shared::types::now_millis;

use crate::database::{collect_rows, Database};
use crate::error::Result;
use crate::models::{AuthToken, PairedDevice};

/// Number of random bytes behind a token (hex-encoded on the wire).
const TOKEN_BYTES: usize = 32;

impl Database {
    /// Mint and persist a fresh token for `device_name`.
    pub fn create_auth_token(&self, device_name: &str) -> Result<AuthToken> {
        let mut raw = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut raw);

        let now = now_millis();
        let token = AuthToken {
            token: hex::encode(raw),
            device_name: device_name.to_string(),
            created_at: now,
            last_used: now,
        };

        self.conn().execute(
            "INSERT INTO auth_tokens (token, device_name, created_at, last_used)
             VALUES (?1, ?2, ?3, ?4)",
            params![token.token, token.device_name, token.created_at, token.last_used],
        )?;

        tracing::info!(device = %device_name, "paired new device");
        Ok(token)
    }

    /// Look up a token and refresh its `last_used` stamp. Returns `None`
    /// for unknown tokens.
    pub fn validate_token(&self, token: &str) -> Result<Option<AuthToken>> {
        let now = now_millis();
        let updated = self.conn().execute(
            "UPDATE auth_tokens SET last_used = ?2 WHERE token = ?1",
            params![token, now],
        )?;
        if updated == 0 {
            return Ok(None);
        }

        self.conn()
            .query_row(
                "SELECT token, device_name, created_at, last_used FROM auth_tokens WHERE token = ?1",
                params![token],
                |row| {
                    Ok(AuthToken {
                        token: row.get(0)?,
                        device_name: row.get(1)?,
                        created_at: row.get(2)?,
                        last_used: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    /// Returns `true` if a token was removed.
    pub fn revoke_token(&self, token: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM auth_tokens WHERE token = ?1", params![token])?;
        Ok(affected > 0)
    }

    pub fn list_paired_devices(&self) -> Result<Vec<PairedDevice>> {
        let mut stmt = self.conn().prepare(
            "SELECT device_name, created_at, last_used FROM auth_tokens ORDER BY last_used DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(PairedDevice {
                device_name: row.get(0)?,
                created_at: row.get(1)?,
                last_used: row.get(2)?,
            })
        })?;
        collect_rows(rows)
    }
}
