pub mod domain;
pub mod error;
pub mod protocol;

pub use domain::{
    hash_password, Departure, IceScheme, IceServer, IdentityError, Member, PlayerIdentity, Room,
    RoomError, RoomId, RoomSettings, RoomSnapshot, RoomStatus, RoomSummary, SessionId,
    SignalEnvelope, SignalKind, DEFAULT_MAX_MEMBERS, MAX_MEMBERS_LIMIT,
};
pub use error::{ErrorCode, RejectReason};
pub use protocol::{protocol_schema, ClientMessage, CorrelationId, ServerMessage};
