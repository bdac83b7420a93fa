use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope tag on the peer data channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PeerMessageType {
    Chat,
    StateSync,
    Heartbeat,
}

/// Application message exchanged directly between peers
#[derive(Debug, Clone, PartialEq)]
pub enum PeerMessage {
    Chat { text: String },
    StateSync(Value),
    Heartbeat,
}

impl PeerMessage {
    pub fn chat(text: impl Into<String>) -> Self {
        PeerMessage::Chat { text: text.into() }
    }

    pub fn message_type(&self) -> PeerMessageType {
        match self {
            PeerMessage::Chat { .. } => PeerMessageType::Chat,
            PeerMessage::StateSync(_) => PeerMessageType::StateSync,
            PeerMessage::Heartbeat => PeerMessageType::Heartbeat,
        }
    }
}

/// `{seq, type, data}` frame carried over a connected link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerEnvelope {
    pub seq: u64,
    #[serde(rename = "type")]
    pub message_type: PeerMessageType,
    #[serde(default)]
    pub data: Value,
}

impl PeerEnvelope {
    pub fn wrap(seq: u64, message: &PeerMessage) -> Self {
        let data = match message {
            PeerMessage::Chat { text } => serde_json::json!({ "text": text }),
            PeerMessage::StateSync(state) => state.clone(),
            PeerMessage::Heartbeat => Value::Null,
        };
        Self {
            seq,
            message_type: message.message_type(),
            data,
        }
    }

    pub fn message(&self) -> Result<PeerMessage> {
        match self.message_type {
            PeerMessageType::Chat => self
                .data
                .get("text")
                .and_then(Value::as_str)
                .map(PeerMessage::chat)
                .ok_or_else(|| ClientError::InvalidMessage("chat without text".to_string())),
            PeerMessageType::StateSync => Ok(PeerMessage::StateSync(self.data.clone())),
            PeerMessageType::Heartbeat => Ok(PeerMessage::Heartbeat),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
