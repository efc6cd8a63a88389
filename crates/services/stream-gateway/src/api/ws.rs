//! Status feed over WebSocket
//!
//! Pushes `{"type":"status_update","data":...}` text frames on the
//! broadcaster's interval until either side goes away.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};

use twitchcast_session::StatusBroadcaster;

/// Handle a single WebSocket connection.
pub async fn handle_ws(socket: WebSocket, broadcaster: Arc<StatusBroadcaster>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subscription = broadcaster.subscribe().await;
    let observer_id = subscription.id();

    loop {
        tokio::select! {
            update = subscription.next() => {
                let Some(update) = update else {
                    // Feed closed by shutdown
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                };
                let text = match serde_json::to_string(&update) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(
                            observer_id = %observer_id,
                            error = %e,
                            "Failed to encode status update"
                        );
                        continue;
                    }
                };
                if ws_tx.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Some(Err(_)) => break,
                    _ => {} // Client messages carry no meaning
                }
            }
        }
    }

    tracing::debug!(observer_id = %observer_id, "WebSocket client disconnected");
}
