use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error taxonomy shared by every roomlink service
///
/// Carried as the `code` of relay `error` replies and directory error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed request; the session stays alive
    Validation,
    /// Room full
    Capacity,
    /// Unknown room or session
    NotFound,
    /// Bad, expired or missing token
    Auth,
    /// Negotiation or heartbeat deadline exceeded
    Timeout,
    /// Underlying channel failure
    Transport,
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::Validation => "validation",
            ErrorCode::Capacity => "capacity",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Auth => "auth",
            ErrorCode::Timeout => "timeout",
            ErrorCode::Transport => "transport",
            ErrorCode::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Why a join or a signal relay was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NotFound,
    Full,
    BadPassword,
    AlreadyMember,
    NotInSameRoom,
}

impl RejectReason {
    pub fn code(&self) -> ErrorCode {
        match self {
            RejectReason::NotFound => ErrorCode::NotFound,
            RejectReason::Full => ErrorCode::Capacity,
            RejectReason::BadPassword => ErrorCode::Auth,
            RejectReason::AlreadyMember => ErrorCode::Validation,
            RejectReason::NotInSameRoom => ErrorCode::Validation,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::NotFound => "not_found",
            RejectReason::Full => "full",
            RejectReason::BadPassword => "bad_password",
            RejectReason::AlreadyMember => "already_member",
            RejectReason::NotInSameRoom => "not_in_same_room",
        };
        f.write_str(s)
    }
}
