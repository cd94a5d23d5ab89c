//! WebSocket transport for the reload channel.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, trace};

use super::AppState;
use crate::reload::ClientChannel;

/// Interval between heartbeat pings.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established reload connection.
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let (channel, mut signals) = ClientChannel::open();
    let id = channel.id();

    if let Err(e) = state.reload.register(channel) {
        debug!(client = %id, error = %e, "Could not register reload client");
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    debug!(client = %id, clients = state.reload.len(), "Reload client connected");

    let (mut sink, mut stream) = socket.split();
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    // First tick completes immediately.
    heartbeat.tick().await;

    loop {
        tokio::select! {
            signal = signals.recv() => match signal {
                Some(signal) => {
                    trace!(client = %id, ?signal, "Forwarding reload signal");
                    if sink.send(Message::Text(signal.to_json().into())).await.is_err() {
                        break;
                    }
                }
                // Registry dropped us: the session is going offline.
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            msg = stream.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = heartbeat.tick() => {
                let _ = state.reload.prune();
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = state.reload.unregister(id);
    debug!(client = %id, "Reload client disconnected");
}
