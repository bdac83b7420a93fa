use roomlink_client::ClientError;
use roomlink_directory::DirectoryError;
use roomlink_relay::RelayError;

/// Everything a `roomlink` subcommand can fail with
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Bad flag combination or value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("tracing subscriber setup failed: {0}")]
    Logging(String),

    #[error("relay: {0}")]
    Relay(#[from] RelayError),

    #[error("directory: {0}")]
    Directory(#[from] DirectoryError),

    /// The watch client's runtime went away or refused a request
    #[error("watch client: {0}")]
    Client(#[from] ClientError),

    #[error("client task panicked or was cancelled: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("schema encoding: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
