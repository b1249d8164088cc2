//! Payload types exchanged over the event channel and the REST surface.
//!
//! Field names are camelCase on the wire to stay interoperable with the
//! Android app and the browser client.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Current wall-clock time as epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ---------------------------------------------------------------------------
// SMS
// ---------------------------------------------------------------------------

/// Direction of an SMS as reported by the phone's content provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Inbox,
    Sent,
    Draft,
    Outbox,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Inbox => "inbox",
            MessageType::Sent => "sent",
            MessageType::Draft => "draft",
            MessageType::Outbox => "outbox",
        }
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inbox" => Ok(MessageType::Inbox),
            "sent" => Ok(MessageType::Sent),
            "draft" => Ok(MessageType::Draft),
            "outbox" => Ok(MessageType::Outbox),
            other => Err(format!("unknown message type: {other}")),
        }
    }
}

/// A single SMS. `id` is the phone-side natural key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SmsMessage {
    pub id: String,
    pub thread_id: String,
    pub address: String,
    #[serde(default)]
    pub body: String,
    /// Epoch milliseconds.
    pub date: i64,
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub read: bool,
    /// Resolved from stored contacts at read/broadcast time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
}

impl SmsMessage {
    /// Unread means an inbox message that has not been read.
    pub fn is_unread(&self) -> bool {
        self.kind == MessageType::Inbox && !self.read
    }
}

/// A conversation, derived from messages sharing a `threadId`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SmsThread {
    pub thread_id: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    pub last_message: String,
    pub last_date: i64,
    pub unread_count: i64,
}

/// Aggregate message counters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MessageStats {
    pub total_messages: i64,
    pub total_threads: i64,
    pub unread_count: i64,
}

/// Web -> phone request to send an SMS.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SendSmsPayload {
    pub address: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

/// Phone-side delivery report for an outgoing SMS (`sms_sent`,
/// `sms_delivered`, `sms_failed`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SmsStatusReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Failed,
}

/// Delivery report relayed to web clients, tagged with its status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SmsStatusUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub address: String,
    pub status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SmsStatusUpdate {
    pub fn from_report(report: SmsStatusReport, status: DeliveryStatus) -> Self {
        Self {
            message_id: report.message_id,
            address: report.address,
            status,
            error: report.error,
        }
    }
}

/// Completion summary broadcast after a batch sync.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncComplete {
    pub count: usize,
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// A mirrored phone notification. `id` is `sourceId_postTime`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppNotification {
    pub id: String,
    pub package_name: String,
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    pub timestamp: i64,
    #[serde(default)]
    pub dismissed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_reply: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DismissNotificationPayload {
    pub id: String,
    #[serde(default)]
    pub package_name: String,
}

/// Partial notification update broadcast when a dismissal originates on the
/// phone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationDismissed {
    pub id: String,
    pub dismissed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReplyNotificationPayload {
    pub notification_id: String,
    pub message: String,
}

/// Per-application notification summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationApp {
    pub package_name: String,
    pub app_name: String,
    pub count: i64,
    pub active_count: i64,
    pub last_notification: i64,
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Incoming,
    Outgoing,
    Missed,
    Rejected,
    Voicemail,
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::Incoming => "incoming",
            CallType::Outgoing => "outgoing",
            CallType::Missed => "missed",
            CallType::Rejected => "rejected",
            CallType::Voicemail => "voicemail",
        }
    }
}

impl FromStr for CallType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incoming" => Ok(CallType::Incoming),
            "outgoing" => Ok(CallType::Outgoing),
            "missed" => Ok(CallType::Missed),
            "rejected" => Ok(CallType::Rejected),
            "voicemail" => Ok(CallType::Voicemail),
            other => Err(format!("unknown call type: {other}")),
        }
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CallLogEntry {
    pub id: String,
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: CallType,
    pub date: i64,
    /// Seconds.
    #[serde(default)]
    pub duration: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CallStats {
    pub total_calls: i64,
    pub incoming_calls: i64,
    pub outgoing_calls: i64,
    pub missed_calls: i64,
    pub total_duration: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DialPayload {
    pub number: String,
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone_numbers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContactStats {
    pub total_contacts: i64,
    pub total_phone_numbers: i64,
}

// ---------------------------------------------------------------------------
// Device / phone role
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    /// 0-100.
    pub battery_level: u8,
    pub is_charging: bool,
    pub wifi_connected: bool,
    #[serde(default)]
    pub last_seen: i64,
}

/// Metadata the phone announces with `phone_connected`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PhoneInfo {
    pub device_name: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub android_version: String,
}

/// Snapshot broadcast to web clients on every phone role transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PhoneStatus {
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

/// The shared clipboard singleton.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HubText {
    pub id: String,
    pub content: String,
    pub author_ip: String,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HubTextUpdatePayload {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HubTextHistoryEntry {
    pub id: String,
    pub content: String,
    pub author_ip: String,
    pub created_at: i64,
}

/// How long an uploaded hub file is kept.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Retention {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "24h")]
    OneDay,
    #[serde(rename = "7d")]
    OneWeek,
    #[serde(rename = "unlimited")]
    Unlimited,
}

impl Retention {
    /// Parse a form value. Unknown values mean no expiry.
    pub fn parse(value: &str) -> Self {
        match value {
            "1h" => Retention::OneHour,
            "24h" => Retention::OneDay,
            "7d" => Retention::OneWeek,
            _ => Retention::Unlimited,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Retention::OneHour => "1h",
            Retention::OneDay => "24h",
            Retention::OneWeek => "7d",
            Retention::Unlimited => "unlimited",
        }
    }

    /// Time-to-live in milliseconds, `None` for unlimited.
    pub fn duration_ms(&self) -> Option<i64> {
        const HOUR: i64 = 60 * 60 * 1000;
        match self {
            Retention::OneHour => Some(HOUR),
            Retention::OneDay => Some(24 * HOUR),
            Retention::OneWeek => Some(7 * 24 * HOUR),
            Retention::Unlimited => None,
        }
    }

    pub fn expires_at(&self, created_at: i64) -> Option<i64> {
        self.duration_ms().map(|ms| created_at + ms)
    }
}

/// A shared file as presented to hub clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HubFile {
    pub id: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    pub url: String,
    pub uploader_ip: String,
    pub created_at: i64,
    pub expires_at: Option<i64>,
    pub retention: Retention,
}

/// Deletion notice carrying only the record id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deleted {
    pub id: String,
}

/// A vault entry. Secrets are ciphertext produced by the browser; the
/// server never sees plaintext.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HubVaultEntry {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub username: String,
    pub password_encrypted: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totp_secret_encrypted: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub notes: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields a client supplies when creating or updating a vault entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HubVaultEntryInput {
    pub label: String,
    #[serde(default)]
    pub username: String,
    pub password_encrypted: String,
    #[serde(default)]
    pub totp_secret_encrypted: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub notes: String,
}

/// Vault initialisation material. The salt and verification blob are
/// opaque to the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HubVaultMeta {
    pub salt: String,
    pub verification_blob: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sms_wire_names() {
        let msg: SmsMessage = serde_json::from_value(serde_json::json!({
            "id": "1",
            "threadId": "42",
            "address": "+33612345678",
            "body": "hi",
            "date": 1000,
            "type": "inbox",
            "read": false
        }))
        .unwrap();
        assert_eq!(msg.thread_id, "42");
        assert!(msg.is_unread());

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "inbox");
        assert!(json.get("contactName").is_none());
    }

    #[test]
    fn test_sms_missing_required_field() {
        let res: Result<SmsMessage, _> = serde_json::from_value(serde_json::json!({
            "id": "1",
            "address": "123",
            "date": 1,
            "type": "sent"
        }));
        assert!(res.is_err());
    }

    #[test]
    fn test_retention_parse() {
        assert_eq!(Retention::parse("1h"), Retention::OneHour);
        assert_eq!(Retention::parse("7d"), Retention::OneWeek);
        assert_eq!(Retention::parse("forever"), Retention::Unlimited);
        assert_eq!(Retention::OneHour.expires_at(0), Some(3_600_000));
        assert_eq!(Retention::Unlimited.expires_at(5), None);
        assert_eq!(
            serde_json::to_value(Retention::OneDay).unwrap(),
            serde_json::json!("24h")
        );
    }

    #[test]
    fn test_status_update_from_report() {
        let report = SmsStatusReport {
            message_id: None,
            address: "555".into(),
            error: Some("no signal".into()),
        };
        let update = SmsStatusUpdate::from_report(report, DeliveryStatus::Failed);
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "no signal");
        assert!(json.get("messageId").is_none());
    }
}
