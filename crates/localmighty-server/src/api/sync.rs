//! Read access to the mirrored phone data: messages, notifications, calls
//! and contacts.

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use localmighty_shared::constants::NOTIFICATION_CLEANUP_AGE_MS;
use localmighty_shared::types::{
    now_millis, AppNotification, CallLogEntry, CallStats, CallType, Contact, ContactStats,
    MessageStats, NotificationApp, SmsMessage, SmsThread,
};

use crate::error::ServerError;
use crate::state::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/messages/threads", get(list_threads))
        .route("/api/messages/thread/:thread_id", get(thread_messages))
        .route("/api/messages/thread/:thread_id/read", post(mark_thread_read))
        .route("/api/messages/search", get(search_messages))
        .route("/api/messages/stats", get(message_stats))
        .route("/api/messages/:id", get(get_message))
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/apps", get(notification_apps))
        .route("/api/notifications/app/:package_name", get(notifications_for_app))
        .route("/api/notifications/dismiss-all", post(dismiss_all))
        .route("/api/notifications/cleanup", delete(cleanup_notifications))
        .route("/api/notifications/:id/dismiss", post(dismiss_notification))
        .route("/api/calls", get(list_calls))
        .route("/api/calls/type/:kind", get(calls_by_type))
        .route("/api/calls/stats", get(call_stats))
        .route("/api/contacts", get(list_contacts))
        .route("/api/contacts/search", get(search_contacts))
        .route("/api/contacts/by-phone/:number", get(contact_by_phone))
        .route("/api/contacts/stats", get(contact_stats))
        .route("/api/contacts/:id", get(get_contact))
}

#[derive(Debug, Default, Deserialize)]
struct Page {
    limit: Option<u32>,
    offset: Option<u32>,
    before: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct Search {
    #[serde(default)]
    q: String,
    limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationFilter {
    limit: Option<u32>,
    dismissed: Option<bool>,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

async fn list_threads(State(state): State<AppState>) -> Result<Json<Vec<SmsThread>>, ServerError> {
    Ok(Json(state.db.lock().await.list_threads()?))
}

async fn thread_messages(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<SmsMessage>>, ServerError> {
    let limit = page.limit.unwrap_or(50);
    Ok(Json(
        state
            .db
            .lock()
            .await
            .thread_messages(&thread_id, limit, page.before)?,
    ))
}

async fn mark_thread_read(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<Value>, ServerError> {
    let updated = state.db.lock().await.mark_thread_read(&thread_id)?;
    Ok(Json(json!({ "success": true, "updated": updated })))
}

async fn search_messages(
    State(state): State<AppState>,
    Query(search): Query<Search>,
) -> Result<Json<Vec<SmsMessage>>, ServerError> {
    let limit = search.limit.unwrap_or(50);
    Ok(Json(state.db.lock().await.search_messages(&search.q, limit)?))
}

async fn message_stats(State(state): State<AppState>) -> Result<Json<MessageStats>, ServerError> {
    Ok(Json(state.db.lock().await.message_stats()?))
}

async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SmsMessage>, ServerError> {
    let db = state.db.lock().await;
    let message = db.get_message(&id)?;
    Ok(Json(db.with_contact_name(message)?))
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

async fn list_notifications(
    State(state): State<AppState>,
    Query(filter): Query<NotificationFilter>,
) -> Result<Json<Vec<AppNotification>>, ServerError> {
    let limit = filter.limit.unwrap_or(100);
    let include_dismissed = filter.dismissed.unwrap_or(false);
    Ok(Json(
        state
            .db
            .lock()
            .await
            .list_notifications(limit, include_dismissed)?,
    ))
}

async fn notification_apps(
    State(state): State<AppState>,
) -> Result<Json<Vec<NotificationApp>>, ServerError> {
    Ok(Json(state.db.lock().await.notification_apps()?))
}

async fn notifications_for_app(
    State(state): State<AppState>,
    Path(package_name): Path<String>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<AppNotification>>, ServerError> {
    let limit = page.limit.unwrap_or(50);
    Ok(Json(
        state
            .db
            .lock()
            .await
            .notifications_for_app(&package_name, limit)?,
    ))
}

/// Store-only dismissal. The socket `dismiss_notif` command is the path
/// that also reaches the phone.
async fn dismiss_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ServerError> {
    state
        .db
        .lock()
        .await
        .overwrite_notification_dismissed(&id, true)?;
    Ok(Json(json!({ "success": true })))
}

async fn dismiss_all(State(state): State<AppState>) -> Result<Json<Value>, ServerError> {
    let dismissed = state.db.lock().await.dismiss_all_notifications()?;
    Ok(Json(json!({ "success": true, "dismissed": dismissed })))
}

async fn cleanup_notifications(State(state): State<AppState>) -> Result<Json<Value>, ServerError> {
    let cutoff = now_millis() - NOTIFICATION_CLEANUP_AGE_MS;
    let deleted = state
        .db
        .lock()
        .await
        .cleanup_dismissed_notifications(cutoff)?;
    Ok(Json(json!({ "deleted": deleted })))
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

async fn list_calls(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<CallLogEntry>>, ServerError> {
    let limit = page.limit.unwrap_or(100);
    let offset = page.offset.unwrap_or(0);
    Ok(Json(state.db.lock().await.list_calls(limit, offset)?))
}

async fn calls_by_type(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<CallLogEntry>>, ServerError> {
    let kind: CallType = kind
        .parse()
        .map_err(|_| ServerError::BadRequest("Invalid call type".into()))?;
    let limit = page.limit.unwrap_or(50);
    Ok(Json(state.db.lock().await.calls_by_type(kind, limit)?))
}

async fn call_stats(State(state): State<AppState>) -> Result<Json<CallStats>, ServerError> {
    Ok(Json(state.db.lock().await.call_stats()?))
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

async fn list_contacts(State(state): State<AppState>) -> Result<Json<Vec<Contact>>, ServerError> {
    Ok(Json(state.db.lock().await.list_contacts()?))
}

async fn search_contacts(
    State(state): State<AppState>,
    Query(search): Query<Search>,
) -> Result<Json<Vec<Contact>>, ServerError> {
    Ok(Json(state.db.lock().await.search_contacts(&search.q)?))
}

async fn contact_by_phone(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<Json<Contact>, ServerError> {
    state
        .db
        .lock()
        .await
        .contact_by_phone(&number)?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound("Contact not found".into()))
}

async fn contact_stats(State(state): State<AppState>) -> Result<Json<ContactStats>, ServerError> {
    Ok(Json(state.db.lock().await.contact_stats()?))
}

async fn get_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Contact>, ServerError> {
    Ok(Json(state.db.lock().await.get_contact(&id)?))
}

#[cfg(test)]
mod tests {
    use super::super::build_router;
    use super::super::testing::call;
    use super::*;
    use crate::state::test_state;
    use axum::http::StatusCode;
    use localmighty_shared::types::MessageType;

    fn sms(id: &str, thread: &str, date: i64, read: bool) -> SmsMessage {
        SmsMessage {
            id: id.into(),
            thread_id: thread.into(),
            address: "+33 6 12 34 56 78".into(),
            body: format!("body {id}"),
            date,
            kind: MessageType::Inbox,
            read,
            contact_name: None,
        }
    }

    #[tokio::test]
    async fn test_thread_pages_and_read_marking() {
        let (state, _dir) = test_state().await;
        {
            let mut db = state.db.lock().await;
            db.upsert_messages(&[
                sms("1", "42", 10, false),
                sms("2", "42", 20, false),
                sms("3", "42", 30, true),
            ])
            .unwrap();
            db.replace_contacts(&[Contact {
                id: "c1".into(),
                name: "Alice".into(),
                phone_numbers: vec!["0612345678".into()],
            }])
            .unwrap();
        }
        let app = build_router(state);

        let (_, threads) = call(&app, "GET", "/api/messages/threads", None).await;
        assert_eq!(threads[0]["threadId"], "42");
        assert_eq!(threads[0]["contactName"], "Alice");
        assert_eq!(threads[0]["unreadCount"], 2);

        let (_, page) = call(&app, "GET", "/api/messages/thread/42?limit=2&before=30", None).await;
        let ids: Vec<_> = page
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(page[0]["contactName"], "Alice");

        let (status, _) = call(&app, "POST", "/api/messages/thread/42/read", None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, stats) = call(&app, "GET", "/api/messages/stats", None).await;
        assert_eq!(stats["unreadCount"], 0);
        assert_eq!(stats["totalMessages"], 3);

        let (status, _) = call(&app, "GET", "/api/messages/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_call_type_validation() {
        let (state, _dir) = test_state().await;
        let app = build_router(state);

        let (status, body) = call(&app, "GET", "/api/calls/type/bogus", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Invalid call type"));

        let (status, body) = call(&app, "GET", "/api/calls/type/missed", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_notification_dismissal_routes() {
        let (state, _dir) = test_state().await;
        state
            .db
            .lock()
            .await
            .upsert_notification(&AppNotification {
                id: "n1".into(),
                package_name: "com.chat".into(),
                app_name: "Chat".into(),
                title: "Hi".into(),
                text: String::new(),
                timestamp: now_millis(),
                dismissed: false,
                icon: None,
                can_reply: Some(true),
            })
            .unwrap();
        let app = build_router(state);

        let (_, active) = call(&app, "GET", "/api/notifications", None).await;
        assert_eq!(active.as_array().unwrap().len(), 1);

        call(&app, "POST", "/api/notifications/n1/dismiss", None).await;
        let (_, active) = call(&app, "GET", "/api/notifications", None).await;
        assert_eq!(active, json!([]));
        let (_, all) = call(&app, "GET", "/api/notifications?dismissed=true", None).await;
        assert_eq!(all[0]["dismissed"], true);

        let (_, apps) = call(&app, "GET", "/api/notifications/apps", None).await;
        assert_eq!(apps[0]["activeCount"], 0);

        // dismissed but recent, so kept
        let (_, cleanup) = call(&app, "DELETE", "/api/notifications/cleanup", None).await;
        assert_eq!(cleanup, json!({"deleted": 0}));
    }

    #[tokio::test]
    async fn test_contact_lookup() {
        let (state, _dir) = test_state().await;
        state
            .db
            .lock()
            .await
            .replace_contacts(&[Contact {
                id: "c1".into(),
                name: "Bob".into(),
                phone_numbers: vec!["+33 6 98 76 54 32".into()],
            }])
            .unwrap();
        let app = build_router(state);

        let (status, bob) = call(&app, "GET", "/api/contacts/by-phone/0698765432", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bob["name"], "Bob");

        let (status, _) = call(&app, "GET", "/api/contacts/by-phone/0100000000", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, found) = call(&app, "GET", "/api/contacts/search?q=b", None).await;
        assert_eq!(found, json!([]));
        let (_, found) = call(&app, "GET", "/api/contacts/search?q=bo", None).await;
        assert_eq!(found[0]["id"], "c1");
    }
}
