//! Command relay between web clients and the phone.
//!
//! Web commands go to the `phone` room, delivery reports come back to
//! `web-clients`. Nothing is queued: with no phone connected a command is
//! dropped and the caller sees [`Delivery::NoRecipients`].

use serde::Serialize;
use tracing::debug;

use localmighty_shared::constants::*;
use localmighty_shared::protocol::Frame;
use localmighty_shared::types::{
    DeliveryStatus, DialPayload, DismissNotificationPayload, ReplyNotificationPayload,
    SendSmsPayload, SmsStatusReport, SmsStatusUpdate,
};

use crate::channel::{Delivery, Namespace};
use crate::error::ServerError;
use crate::state::SharedDb;

#[derive(Clone)]
pub struct CommandRelay {
    db: SharedDb,
    main: Namespace,
}

impl CommandRelay {
    pub fn new(db: SharedDb, main: Namespace) -> Self {
        Self { db, main }
    }

    async fn forward_frame(&self, frame: Frame) -> Delivery {
        let delivery = self.main.emit_to_room(ROOM_PHONE, &frame).await;
        if !delivery.is_delivered() {
            debug!(event = %frame.event, "No phone connected, command dropped");
        }
        delivery
    }

    /// Forward `payload` unchanged to the phone under `event`.
    pub async fn forward_to_phone<T: Serialize + ?Sized>(
        &self,
        event: &str,
        payload: &T,
    ) -> Result<Delivery, ServerError> {
        Ok(self.forward_frame(Frame::new(event, payload)?).await)
    }

    pub async fn send_sms(&self, payload: &SendSmsPayload) -> Result<Delivery, ServerError> {
        self.forward_to_phone(EVT_SEND_SMS, payload).await
    }

    /// Marks the notification dismissed locally before forwarding, so the
    /// web view stays consistent even when the phone is away.
    pub async fn dismiss_notification(
        &self,
        payload: &DismissNotificationPayload,
    ) -> Result<Delivery, ServerError> {
        self.db
            .lock()
            .await
            .overwrite_notification_dismissed(&payload.id, true)?;
        self.forward_to_phone(EVT_DISMISS_NOTIFICATION, payload).await
    }

    pub async fn reply_notification(
        &self,
        payload: &ReplyNotificationPayload,
    ) -> Result<Delivery, ServerError> {
        self.forward_to_phone(EVT_REPLY_NOTIFICATION, payload).await
    }

    pub async fn dial_number(&self, payload: &DialPayload) -> Result<Delivery, ServerError> {
        self.forward_to_phone(EVT_DIAL_NUMBER, payload).await
    }

    pub async fn request_sync(&self) -> Delivery {
        self.forward_frame(Frame::empty(EVT_REQUEST_SYNC)).await
    }

    /// Relay a phone delivery report to web clients, tagged with `status`.
    pub async fn echo_status(
        &self,
        report: SmsStatusReport,
        status: DeliveryStatus,
    ) -> Result<Delivery, ServerError> {
        let update = SmsStatusUpdate::from_report(report, status);
        let frame = Frame::new(EVT_SMS_STATUS_UPDATE, &update)?;
        Ok(self.main.emit_to_room(ROOM_WEB_CLIENTS, &frame).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;
    use crate::channel::testing::{connect, drain};
    use crate::state::open_test_db;
    use localmighty_shared::types::AppNotification;
    use serde_json::json;

    fn sms() -> SendSmsPayload {
        SendSmsPayload {
            address: "+15551234".into(),
            body: "on my way".into(),
            thread_id: None,
        }
    }

    #[tokio::test]
    async fn test_command_without_phone_is_dropped() {
        let (db, _dir) = open_test_db();
        let main = Namespace::new("main");
        let (web, mut web_rx) = connect(&main, Identity::Anonymous).await;
        main.join(web.id, ROOM_WEB_CLIENTS).await;
        let relay = CommandRelay::new(db, main);

        let delivery = relay.send_sms(&sms()).await.unwrap();
        assert_eq!(delivery, Delivery::NoRecipients);
        assert_eq!(relay.request_sync().await, Delivery::NoRecipients);
        assert!(drain(&mut web_rx).is_empty());
    }

    #[tokio::test]
    async fn test_command_reaches_phone_verbatim() {
        let (db, _dir) = open_test_db();
        let main = Namespace::new("main");
        let (phone, mut phone_rx) = connect(&main, Identity::Anonymous).await;
        main.join(phone.id, ROOM_PHONE).await;
        let relay = CommandRelay::new(db, main);

        relay.send_sms(&sms()).await.unwrap();
        relay
            .dial_number(&DialPayload {
                number: "555".into(),
            })
            .await
            .unwrap();
        relay.request_sync().await;

        let frames = drain(&mut phone_rx);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].event, EVT_SEND_SMS);
        assert_eq!(
            frames[0].data,
            json!({"address": "+15551234", "body": "on my way"})
        );
        assert_eq!(frames[1].data, json!({"number": "555"}));
        assert_eq!(frames[2].event, EVT_REQUEST_SYNC);
    }

    #[tokio::test]
    async fn test_web_dismiss_marks_store_even_without_phone() {
        let (db, _dir) = open_test_db();
        db.lock()
            .await
            .upsert_notification(&AppNotification {
                id: "n1".into(),
                package_name: "com.mail".into(),
                app_name: "Mail".into(),
                title: "New mail".into(),
                text: String::new(),
                timestamp: 1,
                dismissed: false,
                icon: None,
                can_reply: None,
            })
            .unwrap();
        let relay = CommandRelay::new(db.clone(), Namespace::new("main"));

        let delivery = relay
            .dismiss_notification(&DismissNotificationPayload {
                id: "n1".into(),
                package_name: "com.mail".into(),
            })
            .await
            .unwrap();

        assert_eq!(delivery, Delivery::NoRecipients);
        assert!(db.lock().await.get_notification("n1").unwrap().dismissed);
    }

    #[tokio::test]
    async fn test_delivery_report_echoed_with_status() {
        let (db, _dir) = open_test_db();
        let main = Namespace::new("main");
        let (web, mut web_rx) = connect(&main, Identity::Anonymous).await;
        main.join(web.id, ROOM_WEB_CLIENTS).await;
        let relay = CommandRelay::new(db, main);

        relay
            .echo_status(
                SmsStatusReport {
                    message_id: Some("m1".into()),
                    address: "+15551234".into(),
                    error: Some("radio off".into()),
                },
                DeliveryStatus::Failed,
            )
            .await
            .unwrap();

        let frame = drain(&mut web_rx).remove(0);
        assert_eq!(frame.event, EVT_SMS_STATUS_UPDATE);
        assert_eq!(
            frame.data,
            json!({
                "messageId": "m1",
                "address": "+15551234",
                "status": "failed",
                "error": "radio off"
            })
        );
    }
}
