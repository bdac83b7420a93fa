pub mod auth;
pub mod config;
pub mod directory;
pub mod error;
pub mod identity;
pub mod model;
pub mod route;
pub mod server;
pub mod store;
pub mod sweeper;
pub mod token;

pub use config::DirectoryConfig;
pub use directory::Directory;
pub use error::{DirectoryError, Result};
pub use identity::{IdentityProvider, LocalIdentityProvider};
pub use model::{
    AuthResponse, Credentials, DirectoryStats, NewRoom, ProfileUpdate, Registration, RoomFilter,
    RoomPatch, RoomRecord, UserAccount,
};
pub use route::create_directory_route;
pub use store::DirectoryStore;
pub use token::{TokenClaims, TokenIssuer};
