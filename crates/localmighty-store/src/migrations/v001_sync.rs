//! v001 -- Phone sync schema.
//!
//! Creates the tables mirrored from the phone (`messages`, `notifications`,
//! `calls`, `contacts`, `contact_phones`), the `device_status` singleton and
//! the pairing `auth_tokens`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Messages (SMS)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id          TEXT PRIMARY KEY NOT NULL,   -- phone-side natural key
    thread_id   TEXT NOT NULL,
    address     TEXT NOT NULL,
    address_key TEXT NOT NULL,               -- last 9 digits of address
    body        TEXT NOT NULL DEFAULT '',
    date        INTEGER NOT NULL,            -- epoch ms
    type        TEXT NOT NULL,               -- inbox | sent | draft | outbox
    read        INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    synced_at   INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(thread_id, date);
CREATE INDEX IF NOT EXISTS idx_messages_date ON messages(date DESC);
CREATE INDEX IF NOT EXISTS idx_messages_address_key ON messages(address_key);

-- ----------------------------------------------------------------
-- Notifications
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS notifications (
    id           TEXT PRIMARY KEY NOT NULL,  -- sourceId_postTime
    package_name TEXT NOT NULL,
    app_name     TEXT NOT NULL DEFAULT '',
    title        TEXT NOT NULL DEFAULT '',
    text         TEXT NOT NULL DEFAULT '',
    timestamp    INTEGER NOT NULL,
    dismissed    INTEGER NOT NULL DEFAULT 0,
    synced_at    INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notifications_timestamp ON notifications(timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_notifications_package ON notifications(package_name);

-- ----------------------------------------------------------------
-- Call log
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS calls (
    id           TEXT PRIMARY KEY NOT NULL,
    number       TEXT NOT NULL,
    contact_name TEXT,                       -- as reported by the phone
    type         TEXT NOT NULL,
    date         INTEGER NOT NULL,
    duration     INTEGER NOT NULL DEFAULT 0, -- seconds
    synced_at    INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_calls_date ON calls(date DESC);
CREATE INDEX IF NOT EXISTS idx_calls_type ON calls(type);

-- ----------------------------------------------------------------
-- Contacts (wholesale replaced on every sync)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS contacts (
    id        TEXT PRIMARY KEY NOT NULL,
    name      TEXT NOT NULL,
    synced_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS contact_phones (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    contact_id   TEXT NOT NULL,
    phone_number TEXT NOT NULL,
    phone_digits TEXT NOT NULL,              -- digits only, for suffix match
    position     INTEGER NOT NULL,

    UNIQUE (contact_id, phone_number),
    FOREIGN KEY (contact_id) REFERENCES contacts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_contact_phones_digits ON contact_phones(phone_digits);

-- ----------------------------------------------------------------
-- Device status (singleton, id = 1)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS device_status (
    id             INTEGER PRIMARY KEY CHECK (id = 1),
    battery_level  INTEGER NOT NULL,
    is_charging    INTEGER NOT NULL,
    wifi_connected INTEGER NOT NULL,
    last_seen      INTEGER NOT NULL
);

INSERT OR IGNORE INTO device_status (id, battery_level, is_charging, wifi_connected, last_seen)
VALUES (1, 0, 0, 0, 0);

-- ----------------------------------------------------------------
-- Pairing tokens
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS auth_tokens (
    token       TEXT PRIMARY KEY NOT NULL,   -- hex, 32 random bytes
    device_name TEXT NOT NULL,
    created_at  INTEGER NOT NULL,
    last_used   INTEGER NOT NULL
);
"#;

/// Apply the sync schema.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
