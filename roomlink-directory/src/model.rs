use crate::error::{DirectoryError, Result};
use chrono::{DateTime, Utc};
use roomlink_core::{PlayerIdentity, RoomId, RoomStatus, DEFAULT_MAX_MEMBERS, MAX_MEMBERS_LIMIT};
use serde::{Deserialize, Serialize};

const MAX_ROOM_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 200;

// ===== Accounts =====

/// Stored account; never leaves the service as-is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: String,
    pub username: String,
    pub email: String,
    pub display_name: String,
    /// Argon2 PHC string
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserAccount {
    pub fn identity(&self) -> PlayerIdentity {
        PlayerIdentity {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Defaults to the username
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Registration {
    pub fn validate(&self) -> Result<()> {
        let username = self.username.trim();
        if !(3..=50).contains(&username.chars().count()) {
            return Err(DirectoryError::Validation(
                "username must be 3 to 50 characters".to_string(),
            ));
        }
        if !self.email.contains('@') {
            return Err(DirectoryError::Validation("invalid email".to_string()));
        }
        if self.password.chars().count() < 6 {
            return Err(DirectoryError::Validation(
                "password must be at least 6 characters".to_string(),
            ));
        }
        match &self.display_name {
            Some(name) => validate_display_name(name),
            None => Ok(()),
        }
    }
}

/// `PUT /api/users/me` body; only the display name is editable
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfileUpdate {
    pub display_name: String,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<()> {
        validate_display_name(&self.display_name)
    }
}

pub(crate) fn validate_display_name(name: &str) -> Result<()> {
    if !(1..=50).contains(&name.trim().chars().count()) {
        return Err(DirectoryError::Validation(
            "display name must be 1 to 50 characters".to_string(),
        ));
    }
    Ok(())
}

/// Login by username or email
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub identity: PlayerIdentity,
    pub token: String,
}

// ===== Rooms =====

/// Directory copy of a room; no member list, no password hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRecord {
    pub room_id: RoomId,
    pub name: String,
    pub host_id: String,
    pub host_name: String,
    pub max_members: usize,
    pub current_members: usize,
    pub status: RoomStatus,
    pub private: bool,
    pub has_password: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl RoomRecord {
    pub fn is_visible_to(&self, user_id: &str) -> bool {
        !self.private || self.host_id == user_id
    }

    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_activity_at < cutoff
    }

    fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        if !(1..=MAX_MEMBERS_LIMIT).contains(&self.max_members) {
            return Err(DirectoryError::Validation(format!(
                "maxMembers must be between 1 and {}",
                MAX_MEMBERS_LIMIT
            )));
        }
        if self.current_members > self.max_members {
            return Err(DirectoryError::Validation(
                "currentMembers exceeds maxMembers".to_string(),
            ));
        }
        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(DirectoryError::Validation(format!(
                    "description longer than {} characters",
                    MAX_DESCRIPTION_LEN
                )));
            }
        }
        if self.host_port == Some(0) {
            return Err(DirectoryError::Validation(
                "hostPort must be between 1 and 65535".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    let len = name.trim().chars().count();
    if len == 0 || len > MAX_ROOM_NAME_LEN {
        return Err(DirectoryError::Validation(format!(
            "room name must be 1 to {} characters",
            MAX_ROOM_NAME_LEN
        )));
    }
    Ok(())
}

/// `POST /rooms` body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoom {
    /// Relay-assigned id; generated when absent
    #[serde(default)]
    pub room_id: Option<RoomId>,
    pub name: String,
    #[serde(default)]
    pub max_members: Option<usize>,
    #[serde(default)]
    pub current_members: Option<usize>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub has_password: bool,
    #[serde(default)]
    pub status: Option<RoomStatus>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub game_version: Option<String>,
    #[serde(default)]
    pub host_address: Option<String>,
    #[serde(default)]
    pub host_port: Option<u16>,
}

impl NewRoom {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub(crate) fn into_record(self, room_id: RoomId, host: &PlayerIdentity) -> Result<RoomRecord> {
        let now = Utc::now();
        let record = RoomRecord {
            room_id,
            name: self.name.trim().to_string(),
            host_id: host.id.clone(),
            host_name: host.display_name.clone(),
            max_members: self.max_members.unwrap_or(DEFAULT_MAX_MEMBERS),
            current_members: self.current_members.unwrap_or(1),
            status: self.status.unwrap_or(RoomStatus::Waiting),
            private: self.private,
            has_password: self.has_password,
            description: self.description,
            game_version: self.game_version,
            host_address: self.host_address,
            host_port: self.host_port,
            created_at: now,
            last_activity_at: now,
        };
        record.validate()?;
        Ok(record)
    }

    /// Same host re-announcing a room it already has
    pub(crate) fn refresh(self, record: &mut RoomRecord) -> Result<()> {
        if let Some(max_members) = self.max_members {
            record.max_members = max_members;
        }
        if let Some(current_members) = self.current_members {
            record.current_members = current_members;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        record.private = self.private;
        record.has_password = self.has_password;
        record.description = self.description.or(record.description.take());
        record.game_version = self.game_version.or(record.game_version.take());
        record.host_address = self.host_address.or(record.host_address.take());
        record.host_port = self.host_port.or(record.host_port);
        record.last_activity_at = Utc::now();
        record.validate()
    }
}

/// `PATCH /rooms/{id}` body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RoomPatch {
    #[serde(default)]
    pub status: Option<RoomStatus>,
    #[serde(default)]
    pub current_members: Option<usize>,
    #[serde(default)]
    pub max_members: Option<usize>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub host_address: Option<String>,
    #[serde(default)]
    pub host_port: Option<u16>,
}

impl RoomPatch {
    pub(crate) fn apply(self, record: &mut RoomRecord) -> Result<()> {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(current_members) = self.current_members {
            record.current_members = current_members;
        }
        if let Some(max_members) = self.max_members {
            record.max_members = max_members;
        }
        if let Some(description) = self.description {
            record.description = Some(description);
        }
        if let Some(host_address) = self.host_address {
            record.host_address = Some(host_address);
        }
        if let Some(host_port) = self.host_port {
            record.host_port = Some(host_port);
        }
        record.last_activity_at = Utc::now();
        record.validate()
    }
}

/// `GET /rooms` query
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomFilter {
    #[serde(default)]
    pub status: Option<RoomStatus>,
    /// Substring match
    #[serde(default)]
    pub game_version: Option<String>,
}

impl RoomFilter {
    pub fn matches(&self, record: &RoomRecord) -> bool {
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        match (&self.game_version, &record.game_version) {
            (Some(wanted), Some(actual)) => actual.contains(wanted.as_str()),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryStats {
    pub users: usize,
    pub rooms: usize,
    pub open_rooms: usize,
}
