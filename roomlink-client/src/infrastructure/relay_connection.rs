use crate::error::Result;
use roomlink_core::{ClientMessage, ServerMessage};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

pub type RelaySocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open the websocket to the relay
pub async fn connect(url: &str) -> Result<RelaySocket> {
    let (socket, response) = connect_async(url).await?;
    debug!(%url, status = %response.status(), "Relay websocket open");
    Ok(socket)
}

pub fn encode(message: &ClientMessage) -> Result<Message> {
    Ok(Message::text(serde_json::to_string(message)?))
}

/// Text frames carry protocol messages; control frames yield `None`
pub fn decode(frame: &Message) -> Result<Option<ServerMessage>> {
    if !frame.is_text() {
        return Ok(None);
    }
    let text = frame.to_text()?;
    Ok(Some(serde_json::from_str(text)?))
}
