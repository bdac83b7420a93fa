pub mod config;
pub mod error;
pub mod mirror;
pub mod relay;
pub mod rooms;
pub mod route;
pub mod server;
pub mod sessions;
pub mod stats;
pub mod sweeper;
pub mod transport;
pub mod websocket_listener;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use mirror::{DirectoryMirror, HttpMirror, MirrorJob, MirrorOp};
pub use relay::Relay;
pub use route::create_relay_route;
pub use sessions::{Presence, SessionRecord, SessionState};
pub use stats::StatsSnapshot;
pub use transport::{ChannelTransport, Outbound, Transport};
