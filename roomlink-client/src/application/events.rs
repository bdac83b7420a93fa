use crate::domain::{LinkState, PeerMessage};
use instant::Instant;
use roomlink_core::{
    ClientMessage, ErrorCode, Member, RejectReason, RoomId, RoomSnapshot, RoomSummary,
    ServerMessage, SessionId, SignalKind,
};

/// Everything the room manager reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Websocket to the relay is open; the manager sends `init`
    RelayConnected,
    /// Websocket dropped without a local shutdown
    RelayDisconnected,
    Relay(ServerMessage),
    Peer(PeerEvent),
    Tick(Instant),
    Request(LocalRequest),
}

/// Requests from the embedding application
#[derive(Debug, Clone, PartialEq)]
pub enum LocalRequest {
    CreateRoom(CreateRoomRequest),
    JoinRoom {
        room_id: RoomId,
        password: Option<String>,
    },
    LeaveRoom,
    RefreshRooms,
    /// `to: None` broadcasts to every connected link
    Send {
        to: Option<SessionId>,
        message: PeerMessage,
    },
    ConnectionReport {
        remote_id: SessionId,
        success: bool,
        nat_type: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateRoomRequest {
    pub name: String,
    pub max_members: Option<usize>,
    pub private: bool,
    pub password: Option<String>,
    pub description: Option<String>,
    pub game_version: Option<String>,
}

impl CreateRoomRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_max_members(mut self, max_members: usize) -> Self {
        self.max_members = Some(max_members);
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }
}

/// Reports from the peer transport the application drives
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    /// Negotiation payload produced locally, to be relayed to the remote
    LocalSignal {
        remote_id: SessionId,
        kind: SignalKind,
        payload: Vec<u8>,
    },
    ChannelOpen {
        remote_id: SessionId,
    },
    ChannelClosed {
        remote_id: SessionId,
    },
    ChannelFailed {
        remote_id: SessionId,
        reason: String,
    },
    Data {
        remote_id: SessionId,
        bytes: Vec<u8>,
    },
}

/// Everything the room manager asks for
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    ToRelay(ClientMessage),
    Peer(PeerCommand),
    Notify(Notification),
}

/// Work for the peer transport
#[derive(Debug, Clone, PartialEq)]
pub enum PeerCommand {
    /// Start (or restart) negotiation; the initiator makes the first offer
    Prepare { remote_id: SessionId, initiator: bool },
    ApplySignal {
        remote_id: SessionId,
        kind: SignalKind,
        payload: Vec<u8>,
    },
    Send { remote_id: SessionId, bytes: Vec<u8> },
    Close { remote_id: SessionId },
}

/// Why a create or join did not land
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinFailure {
    Rejected(RejectReason),
    Error(ErrorCode),
}

/// Updates for the embedding application
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Initialized {
        session_id: SessionId,
    },
    RoomJoined(RoomSnapshot),
    JoinFailed {
        room_id: Option<RoomId>,
        reason: JoinFailure,
        message: String,
    },
    RoomLeft {
        room_id: Option<RoomId>,
        destroyed: bool,
    },
    RoomClosed {
        room_id: RoomId,
        reason: String,
    },
    MemberJoined(Member),
    MemberLeft {
        session_id: SessionId,
    },
    HostChanged {
        new_host_id: SessionId,
    },
    RoomsUpdated(Vec<RoomSummary>),
    LinkStateChanged {
        remote_id: SessionId,
        state: LinkState,
    },
    PeerMessage {
        from: SessionId,
        message: PeerMessage,
    },
    PeerError {
        remote_id: SessionId,
        error: String,
        terminal: bool,
    },
    /// A relay request other than a join failed
    RequestFailed {
        request: &'static str,
        code: ErrorCode,
        message: String,
    },
    Disconnected {
        terminal: bool,
    },
}

/// Request awaiting its correlated reply
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PendingRequest {
    Init,
    CreateRoom {
        password: Option<String>,
    },
    JoinRoom {
        room_id: RoomId,
        password: Option<String>,
        rejoin: bool,
    },
    LeaveRoom,
    GetRooms,
    Signal { to: SessionId },
    Heartbeat,
    ConnectionReport,
}

impl PendingRequest {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            PendingRequest::Init => "init",
            PendingRequest::CreateRoom { .. } => "createRoom",
            PendingRequest::JoinRoom { .. } => "joinRoom",
            PendingRequest::LeaveRoom => "leaveRoom",
            PendingRequest::GetRooms => "getRooms",
            PendingRequest::Signal { .. } => "signal",
            PendingRequest::Heartbeat => "heartbeat",
            PendingRequest::ConnectionReport => "connectionReport",
        }
    }
}

