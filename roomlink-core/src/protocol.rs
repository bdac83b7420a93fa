//! Relay wire protocol
//!
//! One JSON text frame per message, discriminated by `type`. Every request
//! carries a client-generated `correlationId` that the relay echoes on its
//! direct reply, errors included.

use crate::domain::{
    IceServer, Member, PlayerIdentity, RoomId, RoomSnapshot, RoomSummary, SessionId,
    SignalEnvelope,
};
use crate::error::{ErrorCode, RejectReason};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub type CorrelationId = u64;

/// Client → relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Init {
        correlation_id: CorrelationId,
        token: String,
        identity: PlayerIdentity,
    },

    #[serde(rename_all = "camelCase")]
    CreateRoom {
        correlation_id: CorrelationId,
        name: String,
        #[serde(default)]
        max_members: Option<usize>,
        #[serde(default)]
        private: bool,
        #[serde(default)]
        password: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        game_version: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    JoinRoom {
        correlation_id: CorrelationId,
        room_id: RoomId,
        #[serde(default)]
        password: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    LeaveRoom { correlation_id: CorrelationId },

    #[serde(rename_all = "camelCase")]
    GetRooms { correlation_id: CorrelationId },

    #[serde(rename_all = "camelCase")]
    Signal {
        correlation_id: CorrelationId,
        envelope: SignalEnvelope,
    },

    #[serde(rename_all = "camelCase")]
    Heartbeat { correlation_id: CorrelationId },

    /// Outcome of a peer connection attempt, for relay statistics
    #[serde(rename_all = "camelCase")]
    ConnectionReport {
        correlation_id: CorrelationId,
        remote_id: SessionId,
        success: bool,
        #[serde(default)]
        nat_type: Option<String>,
    },
}

impl ClientMessage {
    pub fn correlation_id(&self) -> CorrelationId {
        match self {
            ClientMessage::Init { correlation_id, .. }
            | ClientMessage::CreateRoom { correlation_id, .. }
            | ClientMessage::JoinRoom { correlation_id, .. }
            | ClientMessage::LeaveRoom { correlation_id }
            | ClientMessage::GetRooms { correlation_id }
            | ClientMessage::Signal { correlation_id, .. }
            | ClientMessage::Heartbeat { correlation_id }
            | ClientMessage::ConnectionReport { correlation_id, .. } => *correlation_id,
        }
    }

    /// Message type name, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Init { .. } => "init",
            ClientMessage::CreateRoom { .. } => "createRoom",
            ClientMessage::JoinRoom { .. } => "joinRoom",
            ClientMessage::LeaveRoom { .. } => "leaveRoom",
            ClientMessage::GetRooms { .. } => "getRooms",
            ClientMessage::Signal { .. } => "signal",
            ClientMessage::Heartbeat { .. } => "heartbeat",
            ClientMessage::ConnectionReport { .. } => "connectionReport",
        }
    }
}

/// Relay → client: direct replies and pushed events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    // ===== Replies =====
    #[serde(rename_all = "camelCase")]
    Initialized {
        correlation_id: CorrelationId,
        session_id: SessionId,
        ice_servers: Vec<IceServer>,
        heartbeat_interval_ms: u64,
    },

    #[serde(rename_all = "camelCase")]
    RoomJoined {
        correlation_id: CorrelationId,
        room: RoomSnapshot,
    },

    #[serde(rename_all = "camelCase")]
    RoomLeft {
        correlation_id: CorrelationId,
        #[serde(default)]
        room_id: Option<RoomId>,
        destroyed: bool,
    },

    #[serde(rename_all = "camelCase")]
    RoomList {
        correlation_id: CorrelationId,
        rooms: Vec<RoomSummary>,
    },

    #[serde(rename_all = "camelCase")]
    HeartbeatAck {
        correlation_id: CorrelationId,
        server_time: DateTime<Utc>,
    },

    #[serde(rename_all = "camelCase")]
    Ack { correlation_id: CorrelationId },

    #[serde(rename_all = "camelCase")]
    Rejected {
        correlation_id: CorrelationId,
        reason: RejectReason,
        message: String,
    },

    /// `correlationId` is null when the triggering frame could not be parsed
    #[serde(rename_all = "camelCase")]
    Error {
        correlation_id: Option<CorrelationId>,
        code: ErrorCode,
        message: String,
    },

    // ===== Pushed events =====
    #[serde(rename_all = "camelCase")]
    MemberJoined { room_id: RoomId, member: Member },

    #[serde(rename_all = "camelCase")]
    MemberLeft {
        room_id: RoomId,
        session_id: SessionId,
    },

    #[serde(rename_all = "camelCase")]
    HostChanged {
        room_id: RoomId,
        new_host_id: SessionId,
    },

    #[serde(rename_all = "camelCase")]
    RoomListChanged { rooms: Vec<RoomSummary> },

    #[serde(rename_all = "camelCase")]
    RoomClosed { room_id: RoomId, reason: String },

    #[serde(rename_all = "camelCase")]
    Signal { envelope: SignalEnvelope },
}

impl ServerMessage {
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        match self {
            ServerMessage::Initialized { correlation_id, .. }
            | ServerMessage::RoomJoined { correlation_id, .. }
            | ServerMessage::RoomLeft { correlation_id, .. }
            | ServerMessage::RoomList { correlation_id, .. }
            | ServerMessage::HeartbeatAck { correlation_id, .. }
            | ServerMessage::Ack { correlation_id }
            | ServerMessage::Rejected { correlation_id, .. } => Some(*correlation_id),
            ServerMessage::Error { correlation_id, .. } => *correlation_id,
            _ => None,
        }
    }

    pub fn error(correlation_id: Option<CorrelationId>, code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            correlation_id,
            code,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Initialized { .. } => "initialized",
            ServerMessage::RoomJoined { .. } => "roomJoined",
            ServerMessage::RoomLeft { .. } => "roomLeft",
            ServerMessage::RoomList { .. } => "roomList",
            ServerMessage::HeartbeatAck { .. } => "heartbeatAck",
            ServerMessage::Ack { .. } => "ack",
            ServerMessage::Rejected { .. } => "rejected",
            ServerMessage::Error { .. } => "error",
            ServerMessage::MemberJoined { .. } => "memberJoined",
            ServerMessage::MemberLeft { .. } => "memberLeft",
            ServerMessage::HostChanged { .. } => "hostChanged",
            ServerMessage::RoomListChanged { .. } => "roomListChanged",
            ServerMessage::RoomClosed { .. } => "roomClosed",
            ServerMessage::Signal { .. } => "signal",
        }
    }
}

/// JSON schema of both protocol directions
pub fn protocol_schema() -> serde_json::Value {
    serde_json::json!({
        "clientMessage": schemars::schema_for!(ClientMessage),
        "serverMessage": schemars::schema_for!(ServerMessage),
    })
}
