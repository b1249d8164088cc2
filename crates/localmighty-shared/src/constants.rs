/// Application name
pub const APP_NAME: &str = "LocalMighty";

/// Default HTTP/WebSocket port
pub const DEFAULT_HTTP_PORT: u16 = 3001;

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

/// Room reserved for the connection currently holding the phone role.
pub const ROOM_PHONE: &str = "phone";

/// Room every browser client joins to receive sync broadcasts.
pub const ROOM_WEB_CLIENTS: &str = "web-clients";

// ---------------------------------------------------------------------------
// Main namespace events
// ---------------------------------------------------------------------------

// Phone -> Server
pub const EVT_NEW_SMS: &str = "new_sms";
pub const EVT_SMS_BATCH: &str = "sms_batch";
pub const EVT_NEW_NOTIFICATION: &str = "new_notif";
pub const EVT_NOTIF_BATCH: &str = "notif_batch";
pub const EVT_BATTERY_UPDATE: &str = "battery_update";
pub const EVT_PHONE_CONNECTED: &str = "phone_connected";
pub const EVT_NOTIF_DISMISSED_PHONE: &str = "notif_dismissed_phone";
pub const EVT_CONTACTS_SYNC: &str = "contacts_sync";
pub const EVT_SMS_SENT: &str = "sms_sent";
pub const EVT_SMS_DELIVERED: &str = "sms_delivered";
pub const EVT_SMS_FAILED: &str = "sms_failed";
pub const EVT_CALL_LOG_SYNC: &str = "call_log_sync";
pub const EVT_NEW_CALL: &str = "new_call";

// Server -> Phone (also accepted Web -> Server and relayed)
pub const EVT_SEND_SMS: &str = "send_sms";
pub const EVT_DISMISS_NOTIFICATION: &str = "dismiss_notif";
pub const EVT_REQUEST_SYNC: &str = "request_sync";
pub const EVT_DIAL_NUMBER: &str = "dial_number";
pub const EVT_REPLY_NOTIFICATION: &str = "reply_notif";

// Server -> Web
pub const EVT_UPDATE_SMS: &str = "update_sms";
pub const EVT_UPDATE_NOTIFICATIONS: &str = "update_notifications";
pub const EVT_STATUS_UPDATE: &str = "status_update";
pub const EVT_PHONE_STATUS: &str = "phone_status";
pub const EVT_SMS_SYNC_COMPLETE: &str = "sms_sync_complete";
pub const EVT_NOTIF_SYNC_COMPLETE: &str = "notif_sync_complete";
pub const EVT_CONTACTS_SYNC_COMPLETE: &str = "contacts_sync_complete";
pub const EVT_SMS_STATUS_UPDATE: &str = "sms_status_update";
pub const EVT_CALL_LOG_UPDATE: &str = "call_log_update";
pub const EVT_CALL_LOG_SYNC_COMPLETE: &str = "call_log_sync_complete";

// Web -> Server
pub const EVT_JOIN: &str = "join";

// ---------------------------------------------------------------------------
// Hub namespace events
// ---------------------------------------------------------------------------

pub const EVT_HUB_TEXT_REQUEST: &str = "hub:text:request";
pub const EVT_HUB_TEXT_UPDATE: &str = "hub:text:update";
pub const EVT_HUB_TEXT_SYNC: &str = "hub:text:sync";
pub const EVT_HUB_FILE_NEW: &str = "hub:file:new";
pub const EVT_HUB_FILE_DELETED: &str = "hub:file:deleted";
pub const EVT_HUB_VAULT_NEW: &str = "hub:vault:new";
pub const EVT_HUB_VAULT_UPDATED: &str = "hub:vault:updated";
pub const EVT_HUB_VAULT_DELETED: &str = "hub:vault:deleted";

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum hub clipboard size in UTF-8 bytes (10 KiB). Larger writes are
/// rejected, never truncated.
pub const HUB_TEXT_MAX_BYTES: usize = 10 * 1024;

/// Number of distinct clipboard contents kept in history.
pub const HUB_TEXT_HISTORY_LIMIT: usize = 10;

/// Interval of the expired-file sweep, in seconds.
pub const HUB_SWEEP_INTERVAL_SECS: u64 = 5 * 60;

/// Default retention applied when an upload does not name one.
pub const HUB_DEFAULT_RETENTION: &str = "24h";

/// Number of trailing digits used to match a phone number to a contact.
pub const CONTACT_MATCH_DIGITS: usize = 9;

/// Maximum upload size in bytes (100 MiB).
pub const MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024;

/// Dismissed notifications older than this are removed by the cleanup route.
pub const NOTIFICATION_CLEANUP_AGE_MS: i64 = 7 * 24 * 60 * 60 * 1000;
