//! Sync reconciler: merges phone-origin records into the store and fans the
//! result out to the `web-clients` room.
//!
//! Single records are upserted and broadcast as-is (enriched with a contact
//! name where one resolves). Batches are written in one transaction and
//! announced with a single `{count}` summary. A failed write returns early,
//! so nothing is broadcast for it.

use serde::Serialize;
use tracing::{debug, info, warn};

use localmighty_shared::constants::*;
use localmighty_shared::protocol::{Batch, Frame};
use localmighty_shared::types::{
    now_millis, AppNotification, CallLogEntry, Contact, DeviceStatus, DismissNotificationPayload,
    NotificationDismissed, SmsMessage, SyncComplete,
};

use crate::channel::{Delivery, Namespace};
use crate::error::ServerError;
use crate::state::SharedDb;

#[derive(Clone)]
pub struct Reconciler {
    db: SharedDb,
    main: Namespace,
}

impl Reconciler {
    pub fn new(db: SharedDb, main: Namespace) -> Self {
        Self { db, main }
    }

    async fn to_web<T: Serialize + ?Sized>(&self, event: &str, payload: &T) -> Result<Delivery, ServerError> {
        let frame = Frame::new(event, payload)?;
        Ok(self.main.emit_to_room(ROOM_WEB_CLIENTS, &frame).await)
    }

    fn log_skipped<T>(event: &str, batch: &Batch<T>) {
        if batch.skipped > 0 {
            warn!(event, skipped = batch.skipped, "Malformed records skipped in batch");
        }
    }

    // ------------------------------------------------------------------
    // SMS
    // ------------------------------------------------------------------

    pub async fn new_sms(&self, message: SmsMessage) -> Result<Delivery, ServerError> {
        let enriched = {
            let db = self.db.lock().await;
            db.upsert_message(&message)?;
            db.with_contact_name(message)?
        };
        debug!(id = %enriched.id, thread = %enriched.thread_id, "SMS stored");
        self.to_web(EVT_UPDATE_SMS, &enriched).await
    }

    pub async fn sms_batch(&self, batch: Batch<SmsMessage>) -> Result<Delivery, ServerError> {
        Self::log_skipped(EVT_SMS_BATCH, &batch);
        let count = self.db.lock().await.upsert_messages(&batch.records)?;
        info!(count, "SMS batch synced");
        self.to_web(EVT_SMS_SYNC_COMPLETE, &SyncComplete { count }).await
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    pub async fn new_notification(&self, notification: AppNotification) -> Result<Delivery, ServerError> {
        self.db.lock().await.upsert_notification(&notification)?;
        debug!(id = %notification.id, app = %notification.package_name, "Notification stored");
        self.to_web(EVT_UPDATE_NOTIFICATIONS, &notification).await
    }

    pub async fn notification_batch(
        &self,
        batch: Batch<AppNotification>,
    ) -> Result<Delivery, ServerError> {
        Self::log_skipped(EVT_NOTIF_BATCH, &batch);
        let count = self.db.lock().await.upsert_notifications(&batch.records)?;
        info!(count, "Notification batch synced");
        self.to_web(EVT_NOTIF_SYNC_COMPLETE, &SyncComplete { count }).await
    }

    /// The phone reports a notification dismissed on the device.
    pub async fn notification_dismissed(
        &self,
        payload: DismissNotificationPayload,
    ) -> Result<Delivery, ServerError> {
        let known = self
            .db
            .lock()
            .await
            .overwrite_notification_dismissed(&payload.id, true)?;
        if !known {
            debug!(id = %payload.id, "Dismissal for unknown notification");
        }
        self.to_web(
            EVT_UPDATE_NOTIFICATIONS,
            &NotificationDismissed {
                id: payload.id,
                dismissed: true,
            },
        )
        .await
    }

    // ------------------------------------------------------------------
    // Device status
    // ------------------------------------------------------------------

    /// Overwrite the status singleton. `lastSeen` is stamped on arrival.
    pub async fn battery_update(&self, status: DeviceStatus) -> Result<Delivery, ServerError> {
        let status = DeviceStatus {
            last_seen: now_millis(),
            ..status
        };
        self.db.lock().await.overwrite_device_status(&status)?;
        self.to_web(EVT_STATUS_UPDATE, &status).await
    }

    // ------------------------------------------------------------------
    // Contacts
    // ------------------------------------------------------------------

    pub async fn contacts_sync(&self, batch: Batch<Contact>) -> Result<Delivery, ServerError> {
        Self::log_skipped(EVT_CONTACTS_SYNC, &batch);
        let count = self.db.lock().await.replace_contacts(&batch.records)?;
        info!(count, "Contacts replaced");
        self.to_web(EVT_CONTACTS_SYNC_COMPLETE, &SyncComplete { count }).await
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    pub async fn new_call(&self, call: CallLogEntry) -> Result<Delivery, ServerError> {
        let enriched = {
            let db = self.db.lock().await;
            db.upsert_call(&call)?;
            db.with_call_contact(call)?
        };
        debug!(id = %enriched.id, kind = %enriched.kind, "Call stored");
        self.to_web(EVT_CALL_LOG_UPDATE, &enriched).await
    }

    pub async fn call_log_sync(&self, batch: Batch<CallLogEntry>) -> Result<Delivery, ServerError> {
        Self::log_skipped(EVT_CALL_LOG_SYNC, &batch);
        let count = self.db.lock().await.upsert_calls(&batch.records)?;
        info!(count, "Call log synced");
        self.to_web(EVT_CALL_LOG_SYNC_COMPLETE, &SyncComplete { count }).await
    }
}
