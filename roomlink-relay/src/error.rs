use roomlink_core::{ErrorCode, RoomError};

/// Relay errors; each maps onto a wire error code
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Room(#[from] RoomError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Directory mirror request failed: {0}")]
    Mirror(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RelayError::Validation(_) | RelayError::Serialization(_) => ErrorCode::Validation,
            RelayError::NotFound(_) => ErrorCode::NotFound,
            RelayError::Auth(_) => ErrorCode::Auth,
            RelayError::Timeout(_) => ErrorCode::Timeout,
            RelayError::Transport(_) | RelayError::Mirror(_) => ErrorCode::Transport,
            RelayError::Room(e) => e.code(),
            RelayError::Io(_) | RelayError::Internal(_) => ErrorCode::Internal,
        }
    }

    pub(crate) fn poisoned<T>(e: std::sync::PoisonError<T>) -> Self {
        RelayError::Internal(format!("lock poisoned: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
