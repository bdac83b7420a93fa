pub mod relay_connection;

pub use relay_connection::{connect, RelaySocket};
