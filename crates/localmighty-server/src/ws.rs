//! WebSocket transport for both namespaces.
//!
//! `GET /socket` carries the main sync protocol, `GET /share` the hub.
//! The connection is authenticated before the upgrade; afterwards each
//! socket gets a writer task draining its namespace outbox, while the
//! read loop feeds frames to the dispatcher.

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, error, warn};

use localmighty_shared::protocol::Frame;

use crate::auth::{bearer_token, AuthError};
use crate::channel::{Namespace, Peer};
use crate::dispatch::{handle_hub, handle_main};
use crate::error::ServerError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Main,
    Hub,
}

impl Endpoint {
    fn namespace(self, state: &AppState) -> &Namespace {
        match self {
            Endpoint::Main => &state.main,
            Endpoint::Hub => &state.hub,
        }
    }
}

/// Remote address, preferring the first `X-Forwarded-For` entry.
pub fn client_ip(headers: &HeaderMap, remote: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| remote.ip().to_string())
}

pub async fn main_socket(
    ws: WebSocketUpgrade,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    upgrade(ws, remote, params, headers, state, Endpoint::Main).await
}

pub async fn hub_socket(
    ws: WebSocketUpgrade,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    upgrade(ws, remote, params, headers, state, Endpoint::Hub).await
}

async fn upgrade(
    ws: WebSocketUpgrade,
    remote: SocketAddr,
    params: ConnectParams,
    headers: HeaderMap,
    state: AppState,
    endpoint: Endpoint,
) -> Response {
    let ip = client_ip(&headers, remote);
    let token = params.token.or_else(|| bearer_token(&headers));

    let identity = match state.authenticator.authenticate(token.as_deref()).await {
        Ok(identity) => identity,
        Err(AuthError::InvalidToken) => {
            warn!(ip = %ip, namespace = endpoint.namespace(&state).name(), "Connection rejected: invalid token");
            return ServerError::Unauthorized("Authentication failed".into()).into_response();
        }
        Err(AuthError::Store(e)) => return ServerError::Store(e).into_response(),
    };

    let peer = Peer::new(ip, identity);
    ws.on_upgrade(move |socket| run_connection(socket, state, peer, endpoint))
}

async fn run_connection(socket: WebSocket, state: AppState, peer: Peer, endpoint: Endpoint) {
    let namespace = endpoint.namespace(&state).clone();
    let mut outbox = namespace.connect(peer.clone()).await;
    let (mut sender, mut receiver) = socket.split();

    let conn = peer.id;
    tokio::spawn(async move {
        while let Some(frame) = outbox.recv().await {
            let text = match frame.to_text() {
                Ok(text) => text,
                Err(e) => {
                    warn!(conn = %conn, event = %frame.event, error = %e, "Unencodable frame dropped");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        debug!(conn = %conn, "Writer task ended");
    });

    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                debug!(conn = %peer.id, error = %e, "WebSocket read failed");
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                let frame = match Frame::parse(&text) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(conn = %peer.id, error = %e, "Malformed frame dropped");
                        continue;
                    }
                };
                match endpoint {
                    Endpoint::Main => handle_main(&state, &peer, frame).await,
                    Endpoint::Hub => handle_hub(&state, &peer, frame).await,
                }
            }
            Message::Binary(data) => {
                debug!(conn = %peer.id, size = data.len(), "Binary frame ignored");
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    // Dropping the registry slot closes the outbox, which ends the writer.
    match endpoint {
        Endpoint::Main => {
            if let Err(e) = state.sessions.release(peer.id).await {
                error!(conn = %peer.id, error = %e, "Failed to release connection");
            }
        }
        Endpoint::Hub => {
            state.hub.disconnect(peer.id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::build_router;
    use crate::state::test_state;
    use localmighty_shared::constants::*;
    use std::time::Duration;
    use tokio_tungstenite::{connect_async, tungstenite};

    type Client = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn spawn_server() -> (SocketAddr, AppState, tempfile::TempDir) {
        let (state, dir) = test_state().await;
        let app = build_router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });
        (addr, state, dir)
    }

    async fn send(client: &mut Client, frame: serde_json::Value) {
        client
            .send(tungstenite::Message::Text(frame.to_string()))
            .await
            .unwrap();
    }

    async fn next_frame(client: &mut Client) -> Frame {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            if let tungstenite::Message::Text(text) = msg {
                return Frame::parse(&text).unwrap();
            }
        }
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let remote: SocketAddr = "10.0.0.9:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, remote), "10.0.0.9");

        headers.insert("x-forwarded-for", "192.168.1.4, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers, remote), "192.168.1.4");
    }

    #[tokio::test]
    async fn test_hub_text_over_real_sockets() {
        let (addr, _state, _dir) = spawn_server().await;
        let url = format!("ws://{addr}/share");
        let (mut a, _) = connect_async(url.as_str()).await.unwrap();
        let (mut b, _) = connect_async(url.as_str()).await.unwrap();

        send(&mut b, serde_json::json!({"event": "hub:text:request"})).await;
        assert_eq!(next_frame(&mut b).await.event, EVT_HUB_TEXT_SYNC);

        send(
            &mut a,
            serde_json::json!({"event": "hub:text:update", "data": {"content": "hello"}}),
        )
        .await;
        let frame = next_frame(&mut b).await;
        assert_eq!(frame.event, EVT_HUB_TEXT_SYNC);
        assert_eq!(frame.data["content"], "hello");
    }

    #[tokio::test]
    async fn test_phone_disconnect_notifies_web() {
        let (addr, state, _dir) = spawn_server().await;
        let token = state
            .db
            .lock()
            .await
            .create_auth_token("Pixel")
            .unwrap()
            .token;

        let (mut web, _) = connect_async(format!("ws://{addr}/socket")).await.unwrap();
        send(&mut web, serde_json::json!({"event": "join", "data": "web-clients"})).await;
        let initial = next_frame(&mut web).await;
        assert_eq!(initial.data, serde_json::json!({"connected": false}));

        let (mut phone, _) = connect_async(format!("ws://{addr}/socket?token={token}"))
            .await
            .unwrap();
        send(
            &mut phone,
            serde_json::json!({"event": "phone_connected", "data": {"deviceName": "Pixel"}}),
        )
        .await;
        let connected = next_frame(&mut web).await;
        assert_eq!(
            connected.data,
            serde_json::json!({"connected": true, "deviceName": "Pixel"})
        );

        phone.close(None).await.unwrap();
        let gone = next_frame(&mut web).await;
        assert_eq!(gone.event, EVT_PHONE_STATUS);
        assert_eq!(gone.data, serde_json::json!({"connected": false}));
    }

    #[tokio::test]
    async fn test_invalid_token_rejected_before_upgrade() {
        let (addr, _state, _dir) = spawn_server().await;
        let result = connect_async(format!("ws://{addr}/socket?token=forged")).await;
        match result {
            Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 401),
            Err(e) => panic!("expected 401, got {e}"),
            Ok(_) => panic!("expected 401, connection was accepted"),
        }
    }
}
