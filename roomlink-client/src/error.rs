use roomlink_core::ErrorCode;

/// Client-side errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Relay connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Relay unreachable after {0} attempts")]
    RelayUnavailable(u32),

    #[error("Not connected to the relay")]
    NotConnected,

    #[error("Invalid peer message: {0}")]
    InvalidMessage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Channel closed")]
    ChannelClosed,
}

impl ClientError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ClientError::InvalidMessage(_) | ClientError::Serialization(_) => ErrorCode::Validation,
            ClientError::ConnectionFailed(_)
            | ClientError::RelayUnavailable(_)
            | ClientError::NotConnected
            | ClientError::WebSocket(_)
            | ClientError::ChannelClosed => ErrorCode::Transport,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
