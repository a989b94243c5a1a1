// src/server/live.rs

//! Live channel: a WebSocket available only to clients
//! presenting the signed admin cookie. Pushes a `QueueState` snapshot on
//! every queue transition; accepts `purge_cache` and `cancel_job{id}`
//! commands from the admin side.

use crate::admin::{self, ADMIN_COOKIE_NAME};
use crate::server::state::AppState;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

/// Authentication happens at handshake: an unauthenticated request
/// never reaches the upgrade, let alone the push loop.
pub async fn handle_upgrade(State(state): State<AppState>, headers: HeaderMap, ws: WebSocketUpgrade) -> Response {
    if !authenticated(&headers, &state) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| run(socket, state))
}

fn authenticated(headers: &HeaderMap, state: &AppState) -> bool {
    let Some(cookie_header) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    cookie_header
        .split(';')
        .filter_map(|kv| kv.trim().split_once('='))
        .find(|(name, _)| *name == ADMIN_COOKIE_NAME)
        .is_some_and(|(_, value)| admin::verify_cookie(value, &state.config.admin_cookie_secret))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    PurgeCache,
    CancelJob { id: u64 },
}

/// Drives one authenticated connection until it closes.
async fn run(mut socket: WebSocket, state: AppState) {
    crate::core::metrics::LIVE_CHANNEL_CONNECTIONS.inc();
    let mut rx = state.queue.subscribe();

    if let Ok(initial) = serde_json::to_string(&state.queue.state()) {
        if socket.send(Message::Text(initial.into())).await.is_err() {
            crate::core::metrics::LIVE_CHANNEL_CONNECTIONS.dec();
            return;
        }
    }

    loop {
        tokio::select! {
            snapshot = rx.recv() => {
                match snapshot {
                    Ok(snapshot) => {
                        let Ok(json) = serde_json::to_string(&snapshot) else { continue };
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "live channel subscriber lagged behind queue state");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => handle_frame(&text, &state).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "live channel read error");
                        break;
                    }
                }
            }
        }
    }
    crate::core::metrics::LIVE_CHANNEL_CONNECTIONS.dec();
}

async fn handle_frame(text: &str, state: &AppState) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            debug!(error = %e, "ignoring malformed live channel frame");
            return;
        }
    };
    match frame {
        ClientFrame::PurgeCache => {
            if let Err(e) = state.cache.purge().await {
                warn!(error = %e, "admin-initiated cache purge failed");
            }
        }
        ClientFrame::CancelJob { id } => {
            state.queue.cancel(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_purge_cache_frame() {
        let frame: ClientFrame = serde_json::from_str(r#"{"type":"purge_cache"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::PurgeCache));
    }

    #[test]
    fn parses_cancel_job_frame() {
        let frame: ClientFrame = serde_json::from_str(r#"{"type":"cancel_job","id":42}"#).unwrap();
        assert!(matches!(frame, ClientFrame::CancelJob { id: 42 }));
    }
}
