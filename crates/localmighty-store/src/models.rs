//! Store-side records that have no direct wire equivalent.
//!
//! Synced domain types (messages, notifications, ...) live in
//! `localmighty_shared::types`; the structs here carry bookkeeping the
//! server keeps to itself.

use serde::{Deserialize, Serialize};

use localmighty_shared::types::{HubFile, Retention};

// ---------------------------------------------------------------------------
// Auth token
// ---------------------------------------------------------------------------

/// A pairing token. Presenting a stored token is what authorises a
/// connection to take the phone role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    /// Opaque, unguessable token (hex of 32 random bytes).
    pub token: String,
    pub device_name: String,
    pub created_at: i64,
    pub last_used: i64,
}

/// A paired device as listed to clients (the token itself is withheld).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PairedDevice {
    pub device_name: String,
    pub created_at: i64,
    pub last_used: i64,
}

// ---------------------------------------------------------------------------
// Hub file
// ---------------------------------------------------------------------------

/// Metadata of an uploaded hub file. The blob lives on disk under
/// `stored_name`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredHubFile {
    pub id: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    pub stored_name: String,
    pub uploader_ip: String,
    pub created_at: i64,
    pub expires_at: Option<i64>,
    pub retention: Retention,
}

impl StoredHubFile {
    /// Whether the file's retention has run out at `now` (epoch ms).
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }

    /// Client view of the record, with its download URL.
    pub fn to_hub_file(&self, url: String) -> HubFile {
        HubFile {
            id: self.id.clone(),
            original_name: self.original_name.clone(),
            mime_type: self.mime_type.clone(),
            size: self.size,
            url,
            uploader_ip: self.uploader_ip.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            retention: self.retention,
        }
    }
}
