//! HTTP surface: REST routes, the two WebSocket endpoints and the listener.

mod hub;
mod sync;

use std::net::SocketAddr;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, Method},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use localmighty_shared::types::{now_millis, DeviceStatus, PhoneStatus};
use localmighty_store::PairedDevice;

use crate::auth::bearer_token;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::state::AppState;
use crate::ws;

/// Slack on top of the upload limit for multipart framing.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let body_limit = state.config.max_upload_size + MULTIPART_OVERHEAD;

    Router::new()
        .route("/health", get(health_check))
        .route("/api/info", get(server_info))
        .route("/api/status", get(phone_status))
        .route("/api/auth/pair", post(pair_device))
        .route("/api/auth/validate", post(validate_token))
        .route("/api/auth/revoke", delete(revoke_token))
        .route("/api/auth/devices", get(list_devices))
        .route("/socket", get(ws::main_socket))
        .route("/share", get(ws::hub_socket))
        .merge(sync::routes())
        .merge(hub::routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Origin used in download URLs: the configured public URL, else the
/// request's `Host` (and `X-Forwarded-Proto`, if a proxy set one).
pub(crate) fn base_url(config: &ServerConfig, headers: &HeaderMap) -> String {
    if let Some(public) = &config.public_base_url {
        return public.clone();
    }
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let scheme = header("x-forwarded-proto").unwrap_or("http");
    match header("host") {
        Some(host) => format!("{scheme}://{host}"),
        None => format!("{scheme}://{}", config.http_addr),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    port: u16,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    phone: PhoneStatus,
    device: DeviceStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PairRequest {
    #[serde(default)]
    device_name: String,
}

#[derive(Serialize)]
struct PairResponse {
    token: String,
    message: &'static str,
}

#[derive(Deserialize)]
struct ValidateRequest {
    #[serde(default)]
    token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateResponse {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_name: Option<String>,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: now_millis(),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        port: state.config.http_addr.port(),
    })
}

async fn phone_status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ServerError> {
    let phone = state.sessions.status().await;
    let device = state.db.lock().await.get_device_status()?;
    Ok(Json(StatusResponse { phone, device }))
}

async fn pair_device(
    State(state): State<AppState>,
    Json(req): Json<PairRequest>,
) -> Result<Json<PairResponse>, ServerError> {
    let device_name = req.device_name.trim();
    if device_name.is_empty() {
        return Err(ServerError::BadRequest("Device name required".into()));
    }
    let token = state.db.lock().await.create_auth_token(device_name)?;
    Ok(Json(PairResponse {
        token: token.token,
        message: "Pairing successful",
    }))
}

async fn validate_token(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, ServerError> {
    if req.token.is_empty() {
        return Err(ServerError::BadRequest("Token required".into()));
    }
    let found = state.db.lock().await.validate_token(&req.token)?;
    Ok(Json(ValidateResponse {
        valid: found.is_some(),
        device_name: found.map(|t| t.device_name),
    }))
}

async fn revoke_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ServerError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ServerError::Unauthorized("No authorization header".into()))?;
    let revoked = state.db.lock().await.revoke_token(&token)?;
    if revoked {
        info!("Pairing token revoked");
    }
    Ok(Json(serde_json::json!({ "message": "Token revoked" })))
}

async fn list_devices(State(state): State<AppState>) -> Result<Json<Vec<PairedDevice>>, ServerError> {
    Ok(Json(state.db.lock().await.list_paired_devices()?))
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
