//! Hub REST routes: clipboard, shared files and the vault.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::debug;

use localmighty_shared::constants::{HUB_DEFAULT_RETENTION, HUB_TEXT_MAX_BYTES};
use localmighty_shared::types::{
    HubFile, HubText, HubTextHistoryEntry, HubVaultEntry, HubVaultEntryInput, HubVaultMeta,
    Retention,
};

use super::base_url;
use crate::error::ServerError;
use crate::hub::files::Upload;
use crate::hub::vault::VaultStatus;
use crate::hub::TextUpdate;
use crate::state::AppState;
use crate::ws::client_ip;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/hub/text", get(get_text).put(put_text))
        .route("/api/hub/text/history", get(text_history).delete(clear_history))
        .route("/api/hub/upload", post(upload_file))
        .route("/api/hub/files", get(list_files))
        .route("/api/hub/files/:id", delete(delete_file))
        .route("/hub/files/:stored_name", get(download_file))
        .route("/api/hub/vault/meta", get(vault_status))
        .route("/api/hub/vault/setup", post(vault_setup))
        .route("/api/hub/vault/entries", get(list_entries).post(create_entry))
        .route("/api/hub/vault/entries/:id", put(update_entry).delete(delete_entry))
}

/// Author address for REST writes. Connect info is absent when the router
/// is driven without a listener.
fn request_ip(headers: &HeaderMap, remote: Option<ConnectInfo<SocketAddr>>) -> String {
    let remote = remote
        .map(|ConnectInfo(addr)| addr)
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 0)));
    client_ip(headers, remote)
}

// ---------------------------------------------------------------------------
// Clipboard
// ---------------------------------------------------------------------------

async fn get_text(State(state): State<AppState>) -> Result<Json<HubText>, ServerError> {
    Ok(Json(state.hub_clipboard.current().await?))
}

async fn put_text(
    State(state): State<AppState>,
    remote: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<HubText>, ServerError> {
    let content = body
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| ServerError::BadRequest("content must be a string".into()))?;

    let ip = request_ip(&headers, remote);
    match state.hub_clipboard.update(content, &ip, None).await? {
        TextUpdate::Applied { text, .. } => Ok(Json(text)),
        TextUpdate::Rejected { size } => Err(ServerError::TooLarge {
            size,
            max: HUB_TEXT_MAX_BYTES,
        }),
    }
}

async fn text_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<HubTextHistoryEntry>>, ServerError> {
    Ok(Json(state.hub_clipboard.history().await?))
}

async fn clear_history(State(state): State<AppState>) -> Result<Json<Value>, ServerError> {
    let removed = state.hub_clipboard.clear_history().await?;
    Ok(Json(json!({ "success": true, "removed": removed })))
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

struct ReceivedFile {
    name: String,
    mime_type: String,
    data: bytes::Bytes,
}

async fn upload_file(
    State(state): State<AppState>,
    remote: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<HubFile>, ServerError> {
    let mut file = None;
    let mut retention = Retention::parse(HUB_DEFAULT_RETENTION);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.body_text()))?
    {
        match field.name() {
            Some("file") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(e.body_text()))?;
                file = Some(ReceivedFile {
                    name,
                    mime_type,
                    data,
                });
            }
            Some("retention") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(e.body_text()))?;
                retention = Retention::parse(value.trim());
            }
            other => debug!(field = ?other, "Ignoring upload field"),
        }
    }

    let file = file.ok_or_else(|| ServerError::BadRequest("No file provided".into()))?;
    let ip = request_ip(&headers, remote);
    let upload = Upload {
        original_name: &file.name,
        mime_type: &file.mime_type,
        data: &file.data,
        retention,
        uploader_ip: &ip,
    };
    let base = base_url(&state.config, &headers);
    Ok(Json(state.hub_files.upload(upload, &base).await?))
}

async fn list_files(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<HubFile>>, ServerError> {
    let base = base_url(&state.config, &headers);
    Ok(Json(state.hub_files.list(&base).await?))
}

async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ServerError> {
    state.hub_files.delete(&id).await?;
    Ok(Json(json!({ "success": true })))
}

async fn download_file(
    State(state): State<AppState>,
    Path(stored_name): Path<String>,
) -> Result<Response, ServerError> {
    let (record, data) = state.hub_files.download(&stored_name).await?;
    let content_type = HeaderValue::from_str(&record.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, content_type)], data).into_response())
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

async fn vault_status(State(state): State<AppState>) -> Result<Json<VaultStatus>, ServerError> {
    Ok(Json(state.hub_vault.status().await?))
}

async fn vault_setup(
    State(state): State<AppState>,
    Json(meta): Json<HubVaultMeta>,
) -> Result<Json<Value>, ServerError> {
    state.hub_vault.setup(&meta).await?;
    Ok(Json(json!({ "success": true })))
}

async fn list_entries(
    State(state): State<AppState>,
) -> Result<Json<Vec<HubVaultEntry>>, ServerError> {
    Ok(Json(state.hub_vault.list().await?))
}

async fn create_entry(
    State(state): State<AppState>,
    Json(input): Json<HubVaultEntryInput>,
) -> Result<(StatusCode, Json<HubVaultEntry>), ServerError> {
    let entry = state.hub_vault.create(&input).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn update_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<HubVaultEntryInput>,
) -> Result<Json<HubVaultEntry>, ServerError> {
    Ok(Json(state.hub_vault.update(&id, &input).await?))
}

async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ServerError> {
    state.hub_vault.delete(&id).await?;
    Ok(Json(json!({ "success": true })))
}
