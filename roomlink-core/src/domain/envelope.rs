use crate::domain::{RoomId, SessionId};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Negotiation payload kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Offer,
    Answer,
    Candidate,
}

/// Wire unit relayed verbatim between two sessions of the same room
///
/// The relay never looks inside `payload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignalEnvelope {
    pub kind: SignalKind,
    pub from_session_id: SessionId,
    pub to_session_id: SessionId,
    pub room_id: RoomId,
    #[serde(with = "payload_base64")]
    #[schemars(with = "String")]
    pub payload: Vec<u8>,
}

impl SignalEnvelope {
    pub fn new(
        kind: SignalKind,
        from: SessionId,
        to: SessionId,
        room_id: RoomId,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            kind,
            from_session_id: from,
            to_session_id: to,
            room_id,
            payload,
        }
    }
}

mod payload_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
