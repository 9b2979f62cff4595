//! WebSocket client sessions
//!
//! Each session registers a [`Connection`] with the hub, then forwards
//! frames in both directions until either side goes away. The hub never
//! waits on a session: if the session's outbound buffer fills up the hub
//! drops the connection, the buffer closes and the session ends.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use relay_hub::{Connection, Payload, RelayEvent};
use warp::ws::{Message, WebSocket};

use crate::routes::RelayContext;

pub(crate) async fn session(socket: WebSocket, ctx: RelayContext) {
    let connection_id = ctx.ids.next_id();
    let (connection, mut outbound) = Connection::channel(connection_id, ctx.client_buffer_size);

    if ctx
        .hub
        .submit(RelayEvent::ConnectionOpened { connection })
        .await
        .is_err()
    {
        tracing::warn!(%connection_id, "Relay hub is not running, closing WebSocket");
        return;
    }

    tracing::info!(%connection_id, "WebSocket client connected");
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            payload = outbound.recv() => {
                let Some(payload) = payload else {
                    tracing::info!(%connection_id, "Connection dropped by relay");
                    break;
                };
                if let Err(e) = ws_tx.send(to_message(payload)).await {
                    tracing::debug!(%connection_id, "Failed to send to client: {}", e);
                    break;
                }
            }

            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(message)) if message.is_close() => break,
                    Some(Ok(message)) => {
                        let Some(payload) = from_message(message) else {
                            continue;
                        };
                        let event = RelayEvent::ClientInbound { connection_id, payload };
                        if ctx.hub.submit(event).await.is_err() {
                            tracing::warn!(%connection_id, "Relay hub stopped, closing WebSocket");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::debug!(%connection_id, "WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    let _ = ctx
        .hub
        .submit(RelayEvent::ConnectionClosed { connection_id })
        .await;
    let _ = ws_tx.close().await;

    tracing::info!(%connection_id, "WebSocket client disconnected");
}

fn to_message(payload: Payload) -> Message {
    match payload {
        Payload::Text(text) => Message::text(text),
        Payload::Binary(bytes) => Message::binary(bytes.to_vec()),
    }
}

/// Convert a data frame into a payload; control frames yield `None`
fn from_message(message: Message) -> Option<Payload> {
    if message.is_text() {
        message.to_str().ok().map(|text| Payload::Text(text.to_string()))
    } else if message.is_binary() {
        Some(Payload::Binary(Bytes::from(message.into_bytes())))
    } else {
        None
    }
}
