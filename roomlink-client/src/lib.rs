//! Client side of roomlink
//!
//! [`RoomManager`] keeps the local room snapshot and a link state machine
//! per remote member. It is pure: events in, commands out. [`ClientRuntime`]
//! wires it to a relay websocket; the embedding application executes the
//! [`PeerCommand`]s on whatever peer transport it uses and reports back
//! [`PeerEvent`]s.

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use application::{
    ClientCommand, ClientConfig, ClientEvent, ClientHandle, ClientOutput, ClientRuntime,
    CreateRoomRequest, JoinFailure, LocalRequest, Notification, PeerCommand, PeerEvent,
    RelayStatus, RoomManager,
};
pub use domain::{Backoff, LinkState, PeerEnvelope, PeerLink, PeerMessage, PeerMessageType};
pub use error::{ClientError, Result};
