use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const MAX_DISPLAY_NAME_LEN: usize = 50;

/// Identifier of one live relay session
///
/// Ordering matches the ordering of the hyphenated string form, which is
/// what the initiator tie-break between two peers relies on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        SessionId(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(SessionId)
    }
}

/// Externally supplied player identity
///
/// Immutable for the lifetime of a session. The identity provider owns it;
/// roomlink only carries it around.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerIdentity {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum IdentityError {
    #[error("Identity id cannot be empty")]
    EmptyId,

    #[error("Display name cannot be empty")]
    EmptyName,

    #[error("Display name must be between 1 and 50 characters")]
    InvalidNameLength,
}

impl PlayerIdentity {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Result<Self, IdentityError> {
        let identity = PlayerIdentity {
            id: id.into(),
            display_name: display_name.into(),
        };
        identity.validate()?;
        Ok(identity)
    }

    /// Identities arrive over the wire, so they are re-checked on use
    pub fn validate(&self) -> Result<(), IdentityError> {
        if self.id.trim().is_empty() {
            return Err(IdentityError::EmptyId);
        }

        let name = self.display_name.trim();
        if name.is_empty() {
            return Err(IdentityError::EmptyName);
        }
        if name.chars().count() > MAX_DISPLAY_NAME_LEN {
            return Err(IdentityError::InvalidNameLength);
        }
        Ok(())
    }
}

impl fmt::Display for PlayerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.id)
    }
}
