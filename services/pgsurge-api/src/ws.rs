//! WebSocket snapshot stream.
//!
//! Each client subscribes to the broadcast channel fed by the snapshot
//! broadcaster and receives every snapshot as a JSON text frame. A client
//! that falls behind skips ahead to the live edge rather than buffering
//! unboundedly.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::state::AppState;

pub async fn ws_handler(State(state): State<AppState>, upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(move |socket| forward_snapshots(socket, state))
}

async fn forward_snapshots(mut socket: WebSocket, state: AppState) {
    let mut snapshots = state.snapshots.subscribe();
    debug!("websocket subscriber connected");

    loop {
        match snapshots.recv().await {
            Ok(snapshot) => {
                let payload = match serde_json::to_string(&snapshot) {
                    Ok(payload) => payload,
                    Err(_) => continue,
                };
                // A failed send means the client went away.
                if socket.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "websocket subscriber lagged, skipping ahead");
                continue;
            }
            Err(RecvError::Closed) => break,
        }
    }

    debug!("websocket subscriber disconnected");
}
