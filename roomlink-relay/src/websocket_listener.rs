use crate::relay::Relay;
use crate::transport::{ChannelTransport, Outbound};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use roomlink_core::SessionId;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, error, info, warn};

pub async fn handle_websocket(ws: WebSocketUpgrade, State(relay): State<Relay>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| listen(socket, relay))
}

async fn listen(socket: WebSocket, relay: Relay) {
    let (ws_sender, ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();

    let session_id = match relay.connect(Arc::new(ChannelTransport::new(tx))) {
        Ok(session_id) => session_id,
        Err(e) => {
            error!(error = %e, "Failed to register connection");
            return;
        }
    };

    let sender_task = handle_outgoing_messages(rx, ws_sender, session_id);
    let receiver_task = handle_incoming_messages(ws_receiver, &relay, session_id);

    tokio::select! {
        _ = sender_task => {
            info!(%session_id, "Sender task completed");
        }
        _ = receiver_task => {
            info!(%session_id, "Receiver task completed");
        }
    }

    relay.disconnect(session_id);
}

pub async fn handle_outgoing_messages(
    mut rx: UnboundedReceiver<Outbound>,
    mut ws_sender: SplitSink<WebSocket, Message>,
    session_id: SessionId,
) {
    while let Some(outbound) = rx.recv().await {
        match outbound {
            Outbound::Message(message) => {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        error!(%session_id, error = %e, "Failed to serialize message");
                        continue;
                    }
                };
                if let Err(e) = ws_sender.send(Message::Text(text)).await {
                    debug!(%session_id, error = %e, "Failed to send message");
                    break;
                }
            }
            Outbound::Close => {
                let _ = ws_sender.send(Message::Close(None)).await;
                break;
            }
        }
    }
}

pub async fn handle_incoming_messages(
    mut receiver: SplitStream<WebSocket>,
    relay: &Relay,
    session_id: SessionId,
) {
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => relay.handle_text(session_id, &text),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => relay.touch(session_id),
            Ok(Message::Close(_)) => {
                info!(%session_id, "Client closed connection");
                break;
            }
            Ok(Message::Binary(_)) => {
                warn!(%session_id, "Ignoring binary frame");
            }
            Err(e) => {
                debug!(%session_id, error = %e, "Failed to receive message");
                break;
            }
        }
    }
}
