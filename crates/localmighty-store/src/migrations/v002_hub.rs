//! v002 -- Hub collaboration tables: shared clipboard and its history,
//! shared files, and the ciphertext-only password vault.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS hub_clipboard (
    id         INTEGER PRIMARY KEY CHECK (id = 1),
    content    TEXT NOT NULL,
    author_ip  TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

INSERT OR IGNORE INTO hub_clipboard (id, content, author_ip, updated_at)
VALUES (1, '', '', 0);

CREATE TABLE IF NOT EXISTS hub_text_history (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    content    TEXT NOT NULL,
    author_ip  TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_hub_text_history_created ON hub_text_history(created_at DESC);

CREATE TABLE IF NOT EXISTS hub_files (
    id            TEXT PRIMARY KEY NOT NULL, -- UUID v4
    original_name TEXT NOT NULL,
    mime_type     TEXT NOT NULL,
    size          INTEGER NOT NULL,
    stored_name   TEXT NOT NULL UNIQUE,     -- <id>_<sanitised name> on disk
    uploader_ip   TEXT NOT NULL,
    created_at    INTEGER NOT NULL,
    expires_at    INTEGER,                  -- NULL = unlimited
    retention     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_hub_files_expires ON hub_files(expires_at);

CREATE TABLE IF NOT EXISTS hub_vault_meta (
    id                INTEGER PRIMARY KEY CHECK (id = 1),
    salt              TEXT NOT NULL,
    verification_blob TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS hub_vault_entries (
    id                    TEXT PRIMARY KEY NOT NULL,
    label                 TEXT NOT NULL,
    username              TEXT NOT NULL DEFAULT '',
    password_encrypted    TEXT NOT NULL,  -- opaque ciphertext
    totp_secret_encrypted TEXT,           -- opaque ciphertext
    url                   TEXT NOT NULL DEFAULT '',
    notes                 TEXT NOT NULL DEFAULT '',
    created_at            INTEGER NOT NULL,
    updated_at            INTEGER NOT NULL
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
