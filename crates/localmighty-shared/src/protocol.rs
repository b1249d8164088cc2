//! Frame envelope and the catalog of inbound events.
//!
//! Every WebSocket text frame carries `{"event": "...", "data": ...}`.
//! Inbound frames are decoded into [`MainEvent`] or [`HubEvent`] so the
//! whole protocol surface is listed in one place, each event with its
//! typed payload.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::*;
use crate::error::ProtocolError;
use crate::types::*;

/// One event on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    /// Build a frame from any serializable payload.
    pub fn new<T: Serialize + ?Sized>(event: &str, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event: event.to_string(),
            data: serde_json::to_value(payload)?,
        })
    }

    /// A frame with a `null` payload (e.g. `request_sync`).
    pub fn empty(event: &str) -> Self {
        Self {
            event: event.to_string(),
            data: Value::Null,
        }
    }

    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::MalformedFrame)
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode the payload into `T`.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        serde_json::from_value(self.data.clone()).map_err(|source| ProtocolError::InvalidPayload {
            event: self.event.clone(),
            source,
        })
    }
}

/// Records of a batch event. Elements that fail to decode are counted in
/// `skipped` instead of failing the whole batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    pub records: Vec<T>,
    pub skipped: usize,
}

impl<T: DeserializeOwned> Batch<T> {
    pub fn decode(event: &str, data: &Value) -> Result<Self, ProtocolError> {
        let items = data
            .as_array()
            .ok_or_else(|| ProtocolError::NotABatch(event.to_string()))?;

        let mut records = Vec::with_capacity(items.len());
        let mut skipped = 0;
        for item in items {
            match serde_json::from_value::<T>(item.clone()) {
                Ok(record) => records.push(record),
                Err(_) => skipped += 1,
            }
        }

        Ok(Self { records, skipped })
    }
}

// ---------------------------------------------------------------------------
// Main namespace
// ---------------------------------------------------------------------------

/// Every event the main namespace accepts, phone- or web-originated.
#[derive(Debug, Clone, PartialEq)]
pub enum MainEvent {
    Join(String),
    PhoneConnected(PhoneInfo),

    // sync
    NewSms(SmsMessage),
    SmsBatch(Batch<SmsMessage>),
    NewNotification(AppNotification),
    NotificationBatch(Batch<AppNotification>),
    NotificationDismissedPhone(DismissNotificationPayload),
    BatteryUpdate(DeviceStatus),
    ContactsSync(Batch<Contact>),
    CallLogSync(Batch<CallLogEntry>),
    NewCall(CallLogEntry),

    // delivery echoes
    SmsSent(SmsStatusReport),
    SmsDelivered(SmsStatusReport),
    SmsFailed(SmsStatusReport),

    // commands
    SendSms(SendSmsPayload),
    DismissNotification(DismissNotificationPayload),
    ReplyNotification(ReplyNotificationPayload),
    DialNumber(DialPayload),
    RequestSync,
}

impl MainEvent {
    pub fn decode(frame: &Frame) -> Result<Self, ProtocolError> {
        let event = match frame.event.as_str() {
            EVT_JOIN => MainEvent::Join(frame.payload()?),
            EVT_PHONE_CONNECTED => MainEvent::PhoneConnected(frame.payload()?),
            EVT_NEW_SMS => MainEvent::NewSms(frame.payload()?),
            EVT_SMS_BATCH => MainEvent::SmsBatch(Batch::decode(&frame.event, &frame.data)?),
            EVT_NEW_NOTIFICATION => MainEvent::NewNotification(frame.payload()?),
            EVT_NOTIF_BATCH => {
                MainEvent::NotificationBatch(Batch::decode(&frame.event, &frame.data)?)
            }
            EVT_NOTIF_DISMISSED_PHONE => MainEvent::NotificationDismissedPhone(frame.payload()?),
            EVT_BATTERY_UPDATE => MainEvent::BatteryUpdate(frame.payload()?),
            EVT_CONTACTS_SYNC => MainEvent::ContactsSync(Batch::decode(&frame.event, &frame.data)?),
            EVT_CALL_LOG_SYNC => MainEvent::CallLogSync(Batch::decode(&frame.event, &frame.data)?),
            EVT_NEW_CALL => MainEvent::NewCall(frame.payload()?),
            EVT_SMS_SENT => MainEvent::SmsSent(frame.payload()?),
            EVT_SMS_DELIVERED => MainEvent::SmsDelivered(frame.payload()?),
            EVT_SMS_FAILED => MainEvent::SmsFailed(frame.payload()?),
            EVT_SEND_SMS => MainEvent::SendSms(frame.payload()?),
            EVT_DISMISS_NOTIFICATION => MainEvent::DismissNotification(frame.payload()?),
            EVT_REPLY_NOTIFICATION => MainEvent::ReplyNotification(frame.payload()?),
            EVT_DIAL_NUMBER => MainEvent::DialNumber(frame.payload()?),
            EVT_REQUEST_SYNC => MainEvent::RequestSync,
            other => return Err(ProtocolError::UnknownEvent(other.to_string())),
        };
        Ok(event)
    }

    /// Wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            MainEvent::Join(_) => EVT_JOIN,
            MainEvent::PhoneConnected(_) => EVT_PHONE_CONNECTED,
            MainEvent::NewSms(_) => EVT_NEW_SMS,
            MainEvent::SmsBatch(_) => EVT_SMS_BATCH,
            MainEvent::NewNotification(_) => EVT_NEW_NOTIFICATION,
            MainEvent::NotificationBatch(_) => EVT_NOTIF_BATCH,
            MainEvent::NotificationDismissedPhone(_) => EVT_NOTIF_DISMISSED_PHONE,
            MainEvent::BatteryUpdate(_) => EVT_BATTERY_UPDATE,
            MainEvent::ContactsSync(_) => EVT_CONTACTS_SYNC,
            MainEvent::CallLogSync(_) => EVT_CALL_LOG_SYNC,
            MainEvent::NewCall(_) => EVT_NEW_CALL,
            MainEvent::SmsSent(_) => EVT_SMS_SENT,
            MainEvent::SmsDelivered(_) => EVT_SMS_DELIVERED,
            MainEvent::SmsFailed(_) => EVT_SMS_FAILED,
            MainEvent::SendSms(_) => EVT_SEND_SMS,
            MainEvent::DismissNotification(_) => EVT_DISMISS_NOTIFICATION,
            MainEvent::ReplyNotification(_) => EVT_REPLY_NOTIFICATION,
            MainEvent::DialNumber(_) => EVT_DIAL_NUMBER,
            MainEvent::RequestSync => EVT_REQUEST_SYNC,
        }
    }
}

// ---------------------------------------------------------------------------
// Hub namespace
// ---------------------------------------------------------------------------

/// Events a hub client may send. File and vault changes arrive over REST
/// and are only ever broadcast, never received.
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    TextRequest,
    TextUpdate(HubTextUpdatePayload),
}

impl HubEvent {
    pub fn decode(frame: &Frame) -> Result<Self, ProtocolError> {
        match frame.event.as_str() {
            EVT_HUB_TEXT_REQUEST => Ok(HubEvent::TextRequest),
            EVT_HUB_TEXT_UPDATE => {
                // A bare `{}` or missing payload clears the clipboard.
                if frame.data.is_null() {
                    return Ok(HubEvent::TextUpdate(HubTextUpdatePayload {
                        content: String::new(),
                    }));
                }
                Ok(HubEvent::TextUpdate(frame.payload()?))
            }
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_missing_data_is_null() {
        let frame = Frame::parse(r#"{"event":"request_sync"}"#).unwrap();
        assert_eq!(frame.data, Value::Null);
        assert_eq!(MainEvent::decode(&frame).unwrap(), MainEvent::RequestSync);
    }

    #[test]
    fn test_join_takes_bare_string() {
        let frame = Frame::parse(r#"{"event":"join","data":"web-clients"}"#).unwrap();
        assert_eq!(
            MainEvent::decode(&frame).unwrap(),
            MainEvent::Join(ROOM_WEB_CLIENTS.to_string())
        );
    }

    #[test]
    fn test_batch_skips_malformed_records() {
        let frame = Frame {
            event: EVT_SMS_BATCH.into(),
            data: json!([
                {"id": "1", "threadId": "t", "address": "a", "date": 1, "type": "inbox"},
                {"id": "2", "address": "a", "date": 2, "type": "inbox"},
                {"id": "3", "threadId": "t", "address": "a", "date": 3, "type": "sent", "read": true}
            ]),
        };
        match MainEvent::decode(&frame).unwrap() {
            MainEvent::SmsBatch(batch) => {
                assert_eq!(batch.records.len(), 2);
                assert_eq!(batch.skipped, 1);
                assert_eq!(batch.records[1].id, "3");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_batch_requires_array() {
        let frame = Frame {
            event: EVT_CONTACTS_SYNC.into(),
            data: json!({"id": "1"}),
        };
        assert!(matches!(
            MainEvent::decode(&frame),
            Err(ProtocolError::NotABatch(_))
        ));
    }

    #[test]
    fn test_unknown_event() {
        let frame = Frame::empty("definitely_not_an_event");
        assert!(matches!(
            MainEvent::decode(&frame),
            Err(ProtocolError::UnknownEvent(_))
        ));
        assert!(HubEvent::decode(&frame).is_err());
    }

    #[test]
    fn test_hub_text_update() {
        let frame = Frame::new(EVT_HUB_TEXT_UPDATE, &json!({"content": "hello"})).unwrap();
        assert_eq!(
            HubEvent::decode(&frame).unwrap(),
            HubEvent::TextUpdate(HubTextUpdatePayload {
                content: "hello".into()
            })
        );

        let empty = Frame::empty(EVT_HUB_TEXT_UPDATE);
        assert_eq!(
            HubEvent::decode(&empty).unwrap(),
            HubEvent::TextUpdate(HubTextUpdatePayload {
                content: String::new()
            })
        );
    }
}
