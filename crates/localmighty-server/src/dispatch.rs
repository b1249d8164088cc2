//! Inbound event dispatch: one entry point per namespace, one match arm per
//! event of the catalog in `localmighty_shared::protocol`.
//!
//! Handlers are fire-and-forget. Decode failures, refused events and store
//! errors are logged here and never answered on the socket.

use tracing::{debug, error, warn};

use localmighty_shared::protocol::{Frame, HubEvent, MainEvent};
use localmighty_shared::types::DeliveryStatus;

use crate::channel::Peer;
use crate::error::ServerError;
use crate::hub::TextUpdate;
use crate::state::AppState;

/// Events only the phone may send.
fn is_phone_origin(event: &MainEvent) -> bool {
    matches!(
        event,
        MainEvent::PhoneConnected(_)
            | MainEvent::NewSms(_)
            | MainEvent::SmsBatch(_)
            | MainEvent::NewNotification(_)
            | MainEvent::NotificationBatch(_)
            | MainEvent::NotificationDismissedPhone(_)
            | MainEvent::BatteryUpdate(_)
            | MainEvent::ContactsSync(_)
            | MainEvent::CallLogSync(_)
            | MainEvent::NewCall(_)
            | MainEvent::SmsSent(_)
            | MainEvent::SmsDelivered(_)
            | MainEvent::SmsFailed(_)
    )
}

/// Handle one frame received on the main namespace.
pub async fn handle_main(state: &AppState, peer: &Peer, frame: Frame) {
    let event = match MainEvent::decode(&frame) {
        Ok(event) => event,
        Err(e) => {
            warn!(conn = %peer.id, event = %frame.event, error = %e, "Dropped inbound frame");
            return;
        }
    };

    let name = event.name();
    if let Err(e) = dispatch_main(state, peer, event).await {
        error!(conn = %peer.id, event = name, error = %e, "Event handler failed");
    }
}

async fn dispatch_main(state: &AppState, peer: &Peer, event: MainEvent) -> Result<(), ServerError> {
    state.sessions.touch(peer.id).await;

    if is_phone_origin(&event) && !state.sessions.may_act_as_phone(peer) {
        warn!(conn = %peer.id, event = event.name(), "Phone event from unpaired connection ignored");
        return Ok(());
    }

    match event {
        MainEvent::Join(room) => {
            state.sessions.join(peer, &room).await?;
        }
        MainEvent::PhoneConnected(info) => {
            state.sessions.claim_phone(peer, &info).await?;
        }

        MainEvent::NewSms(message) => {
            state.reconciler.new_sms(message).await?;
        }
        MainEvent::SmsBatch(batch) => {
            state.reconciler.sms_batch(batch).await?;
        }
        MainEvent::NewNotification(notification) => {
            state.reconciler.new_notification(notification).await?;
        }
        MainEvent::NotificationBatch(batch) => {
            state.reconciler.notification_batch(batch).await?;
        }
        MainEvent::NotificationDismissedPhone(payload) => {
            state.reconciler.notification_dismissed(payload).await?;
        }
        MainEvent::BatteryUpdate(status) => {
            state.reconciler.battery_update(status).await?;
        }
        MainEvent::ContactsSync(batch) => {
            state.reconciler.contacts_sync(batch).await?;
        }
        MainEvent::CallLogSync(batch) => {
            state.reconciler.call_log_sync(batch).await?;
        }
        MainEvent::NewCall(call) => {
            state.reconciler.new_call(call).await?;
        }

        MainEvent::SmsSent(report) => {
            state.relay.echo_status(report, DeliveryStatus::Sent).await?;
        }
        MainEvent::SmsDelivered(report) => {
            state.relay.echo_status(report, DeliveryStatus::Delivered).await?;
        }
        MainEvent::SmsFailed(report) => {
            state.relay.echo_status(report, DeliveryStatus::Failed).await?;
        }

        MainEvent::SendSms(payload) => {
            state.relay.send_sms(&payload).await?;
        }
        MainEvent::DismissNotification(payload) => {
            state.relay.dismiss_notification(&payload).await?;
        }
        MainEvent::ReplyNotification(payload) => {
            state.relay.reply_notification(&payload).await?;
        }
        MainEvent::DialNumber(payload) => {
            state.relay.dial_number(&payload).await?;
        }
        MainEvent::RequestSync => {
            state.relay.request_sync().await;
        }
    }

    Ok(())
}

/// Handle one frame received on the hub namespace.
pub async fn handle_hub(state: &AppState, peer: &Peer, frame: Frame) {
    let event = match HubEvent::decode(&frame) {
        Ok(event) => event,
        Err(e) => {
            warn!(conn = %peer.id, event = %frame.event, error = %e, "Dropped hub frame");
            return;
        }
    };

    let result = match event {
        HubEvent::TextRequest => state.hub_clipboard.send_current(peer.id).await.map(|_| ()),
        HubEvent::TextUpdate(payload) => state
            .hub_clipboard
            .update(&payload.content, &peer.ip, Some(peer.id))
            .await
            .map(|outcome| {
                if let TextUpdate::Rejected { size } = outcome {
                    debug!(conn = %peer.id, size, "Clipboard update over the size cap");
                }
            }),
    };

    if let Err(e) = result {
        error!(conn = %peer.id, event = %frame.event, error = %e, "Hub handler failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;
    use crate::channel::testing::{connect, drain};
    use crate::state::test_state;
    use localmighty_shared::constants::*;
    use localmighty_shared::types::{HubText, PhoneStatus, SmsMessage};
    use serde_json::json;

    fn frame(text: &str) -> Frame {
        Frame::parse(text).unwrap()
    }

    fn paired() -> Identity {
        Identity::Paired {
            device_name: "Pixel".into(),
        }
    }

    #[tokio::test]
    async fn test_sms_batch_end_to_end() {
        let (state, _dir) = test_state().await;
        let (phone, _phone_rx) = connect(&state.main, paired()).await;
        let (web, mut web_rx) = connect(&state.main, Identity::Anonymous).await;
        handle_main(&state, &web, frame(r#"{"event":"join","data":"web-clients"}"#)).await;
        drain(&mut web_rx);

        let batch = json!({
            "event": "sms_batch",
            "data": [
                {"id": "3", "threadId": "42", "address": "555", "body": "c", "date": 30, "type": "inbox", "read": false},
                {"id": "1", "threadId": "42", "address": "555", "body": "a", "date": 10, "type": "inbox", "read": true},
                {"id": "2", "threadId": "42", "address": "555", "body": "b", "date": 20, "type": "sent", "read": true}
            ]
        });
        handle_main(&state, &phone, frame(&batch.to_string())).await;

        let frames = drain(&mut web_rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, EVT_SMS_SYNC_COMPLETE);
        assert_eq!(frames[0].data, json!({"count": 3}));

        let thread: Vec<SmsMessage> = state
            .db
            .lock()
            .await
            .thread_messages("42", 50, None)
            .unwrap();
        let ids: Vec<_> = thread.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_hub_text_not_echoed_to_sender() {
        let (state, _dir) = test_state().await;
        let (sender, mut sender_rx) = connect(&state.hub, Identity::Anonymous).await;
        let (_other, mut other_rx) = connect(&state.hub, Identity::Anonymous).await;

        handle_hub(
            &state,
            &sender,
            frame(r#"{"event":"hub:text:update","data":{"content":"hello"}}"#),
        )
        .await;

        assert!(drain(&mut sender_rx).is_empty());
        let received = drain(&mut other_rx).remove(0);
        assert_eq!(received.event, EVT_HUB_TEXT_SYNC);
        let text: HubText = received.payload().unwrap();
        assert_eq!(text.content, "hello");
        assert_eq!(text.author_ip, "127.0.0.1");
    }

    #[tokio::test]
    async fn test_hub_text_size_boundary() {
        let (state, _dir) = test_state().await;
        let (sender, _sender_rx) = connect(&state.hub, Identity::Anonymous).await;
        let (_other, mut other_rx) = connect(&state.hub, Identity::Anonymous).await;

        let update = |content: String| {
            Frame::new(EVT_HUB_TEXT_UPDATE, &json!({ "content": content })).unwrap()
        };

        handle_hub(&state, &sender, update("a".repeat(10241))).await;
        assert!(drain(&mut other_rx).is_empty());
        assert_eq!(state.hub_clipboard.current().await.unwrap().content, "");

        handle_hub(&state, &sender, update("a".repeat(10240))).await;
        assert_eq!(drain(&mut other_rx).len(), 1);
        assert_eq!(
            state.hub_clipboard.current().await.unwrap().content.len(),
            10240
        );
    }

    #[tokio::test]
    async fn test_hub_text_request_replies_directly() {
        let (state, _dir) = test_state().await;
        let (a, mut rx_a) = connect(&state.hub, Identity::Anonymous).await;
        let (_b, mut rx_b) = connect(&state.hub, Identity::Anonymous).await;

        handle_hub(&state, &a, frame(r#"{"event":"hub:text:request"}"#)).await;
        assert_eq!(drain(&mut rx_a)[0].event, EVT_HUB_TEXT_SYNC);
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn test_phone_connected_reaches_joined_web_client() {
        let (state, _dir) = test_state().await;
        let (web, mut web_rx) = connect(&state.main, Identity::Anonymous).await;
        handle_main(&state, &web, frame(r#"{"event":"join","data":"web-clients"}"#)).await;
        drain(&mut web_rx);

        let (phone, _phone_rx) = connect(&state.main, paired()).await;
        handle_main(
            &state,
            &phone,
            frame(r#"{"event":"phone_connected","data":{"deviceName":"Pixel","model":"Pixel 8","androidVersion":"14"}}"#),
        )
        .await;

        let received = drain(&mut web_rx).remove(0);
        assert_eq!(received.event, EVT_PHONE_STATUS);
        assert_eq!(
            received.payload::<PhoneStatus>().unwrap(),
            PhoneStatus {
                connected: true,
                device_name: Some("Pixel".into())
            }
        );
    }

    #[tokio::test]
    async fn test_unpaired_phone_events_are_ignored() {
        let (state, _dir) = test_state().await;
        let (web, mut web_rx) = connect(&state.main, Identity::Anonymous).await;
        handle_main(&state, &web, frame(r#"{"event":"join","data":"web-clients"}"#)).await;
        drain(&mut web_rx);

        let (intruder, _rx) = connect(&state.main, Identity::Anonymous).await;
        handle_main(
            &state,
            &intruder,
            frame(r#"{"event":"battery_update","data":{"batteryLevel":5,"isCharging":false,"wifiConnected":false}}"#),
        )
        .await;

        assert!(drain(&mut web_rx).is_empty());
        assert_eq!(
            state.db.lock().await.get_device_status().unwrap().battery_level,
            0
        );
    }

    #[tokio::test]
    async fn test_commands_routed_to_phone() {
        let (state, _dir) = test_state().await;
        let (phone, mut phone_rx) = connect(&state.main, paired()).await;
        handle_main(
            &state,
            &phone,
            frame(r#"{"event":"phone_connected","data":{"deviceName":"Pixel"}}"#),
        )
        .await;

        let (web, _web_rx) = connect(&state.main, Identity::Anonymous).await;
        handle_main(
            &state,
            &web,
            frame(r#"{"event":"send_sms","data":{"address":"555","body":"hi"}}"#),
        )
        .await;
        handle_main(&state, &web, frame(r#"{"event":"request_sync"}"#)).await;

        let events: Vec<_> = drain(&mut phone_rx).into_iter().map(|f| f.event).collect();
        assert_eq!(events, vec![EVT_SEND_SMS, EVT_REQUEST_SYNC]);
    }

    #[tokio::test]
    async fn test_malformed_frames_are_dropped() {
        let (state, _dir) = test_state().await;
        let (web, mut web_rx) = connect(&state.main, Identity::Anonymous).await;

        handle_main(&state, &web, frame(r#"{"event":"no_such_event"}"#)).await;
        handle_main(&state, &web, frame(r#"{"event":"send_sms","data":"oops"}"#)).await;
        assert!(drain(&mut web_rx).is_empty());
    }
}
