//! Push channel
//!
//! Each connection gets its own broadcast receiver and a forwarding task.
//! A subscriber that falls behind the channel capacity misses events
//! (`Lagged`) instead of slowing anyone else down. Inbound client messages
//! are drained and ignored: this is a push-only channel.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use super::rest::AppState;

/// Handle WebSocket upgrade on /ws.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.hub.subscribe();
    tracing::debug!(
        subscribers = state.hub.subscriber_count(),
        "push subscriber connected"
    );

    let forward_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let json = match serde_json::to_string(&event) {
                        Ok(j) => j,
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to serialize push event");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "push subscriber lagged, dropping events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Drain the inbound side until the client disconnects.
    while let Some(Ok(msg)) = receiver.next().await {
        if let Message::Close(_) = msg {
            break;
        }
    }

    forward_task.abort();
    tracing::debug!("push subscriber disconnected");
}
