pub mod envelope;
pub mod ice_server;
pub mod identity;
pub mod room;

pub use envelope::{SignalEnvelope, SignalKind};
pub use ice_server::{IceScheme, IceServer};
pub use identity::{IdentityError, PlayerIdentity, SessionId};
pub use room::{
    hash_password, Departure, Member, Room, RoomError, RoomId, RoomSettings, RoomSnapshot,
    RoomStatus, RoomSummary, DEFAULT_MAX_MEMBERS, MAX_MEMBERS_LIMIT,
};
