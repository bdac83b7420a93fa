pub mod config;
pub mod events;
pub mod manager;
pub mod runtime;

pub use config::ClientConfig;
pub use events::{
    ClientCommand, ClientEvent, CreateRoomRequest, JoinFailure, LocalRequest, Notification,
    PeerCommand, PeerEvent,
};
pub use manager::{RelayStatus, RoomManager};
pub use runtime::{ClientHandle, ClientOutput, ClientRuntime};
