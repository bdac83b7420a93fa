use crate::domain::{PlayerIdentity, SessionId};
use crate::error::{ErrorCode, RejectReason};
use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

pub const DEFAULT_MAX_MEMBERS: usize = 8;
pub const MAX_MEMBERS_LIMIT: usize = 100;
const MAX_ROOM_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 200;

/// Short room code handed out by the relay
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Eight lowercase hex characters
    pub fn generate() -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);
        RoomId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RoomId {
    fn from(value: String) -> Self {
        RoomId(value)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        RoomId(value.to_string())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Room lifecycle status
///
/// `Waiting` and `Active` toggle with membership count; `Closed` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    Active,
    Closed,
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomStatus::Waiting => write!(f, "waiting"),
            RoomStatus::Active => write!(f, "active"),
            RoomStatus::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub session_id: SessionId,
    pub identity: PlayerIdentity,
    pub is_host: bool,
    pub joined_at: DateTime<Utc>,
}

/// Requested properties of a new room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSettings {
    pub name: String,
    pub max_members: usize,
    pub private: bool,
    pub password: Option<String>,
    pub description: Option<String>,
    pub game_version: Option<String>,
}

impl RoomSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_members: DEFAULT_MAX_MEMBERS,
            private: false,
            password: None,
            description: None,
            game_version: None,
        }
    }

    pub fn with_max_members(mut self, max_members: usize) -> Self {
        self.max_members = max_members;
        self
    }

    pub fn with_private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_game_version(mut self, game_version: impl Into<String>) -> Self {
        self.game_version = Some(game_version.into());
        self
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RoomError {
    #[error("Room name must be between 1 and 100 characters")]
    InvalidName,

    #[error("Room description must be at most 200 characters")]
    DescriptionTooLong,

    #[error("Max members must be between 1 and 100, got {0}")]
    InvalidMaxMembers(usize),

    #[error("Room is closed")]
    Closed,

    #[error("Session {0} is already a member of this room")]
    AlreadyMember(SessionId),

    #[error("Room is full ({max} members)")]
    Full { max: usize },

    #[error("Wrong room password")]
    BadPassword,

    #[error("Session {0} is not a member of this room")]
    NotMember(SessionId),
}

impl RoomError {
    /// Join failures that are answered with `rejected` instead of `error`
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            RoomError::Closed => Some(RejectReason::NotFound),
            RoomError::AlreadyMember(_) => Some(RejectReason::AlreadyMember),
            RoomError::Full { .. } => Some(RejectReason::Full),
            RoomError::BadPassword => Some(RejectReason::BadPassword),
            _ => None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            RoomError::InvalidName
            | RoomError::DescriptionTooLong
            | RoomError::InvalidMaxMembers(_)
            | RoomError::AlreadyMember(_) => ErrorCode::Validation,
            RoomError::Closed | RoomError::NotMember(_) => ErrorCode::NotFound,
            RoomError::Full { .. } => ErrorCode::Capacity,
            RoomError::BadPassword => ErrorCode::Auth,
        }
    }
}

/// Outcome of a member leaving
#[derive(Debug, Clone, PartialEq)]
pub struct Departure {
    pub member: Member,
    /// Set when the departing member was host and someone was promoted
    pub new_host: Option<SessionId>,
    /// The room is now empty and closed
    pub destroyed: bool,
}

/// Room aggregate root, owned by the relay
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    id: RoomId,
    name: String,
    description: Option<String>,
    game_version: Option<String>,
    host_id: SessionId,
    /// Kept in join order
    members: Vec<Member>,
    max_members: usize,
    status: RoomStatus,
    private: bool,
    password_hash: Option<String>,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
}

impl Room {
    /// Open a room with the creator as host and sole member
    pub fn open(
        id: RoomId,
        settings: RoomSettings,
        host_session: SessionId,
        host_identity: PlayerIdentity,
    ) -> Result<Self, RoomError> {
        let name = settings.name.trim().to_string();
        if name.is_empty() || name.chars().count() > MAX_ROOM_NAME_LEN {
            return Err(RoomError::InvalidName);
        }
        if settings.max_members == 0 || settings.max_members > MAX_MEMBERS_LIMIT {
            return Err(RoomError::InvalidMaxMembers(settings.max_members));
        }
        if let Some(description) = &settings.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(RoomError::DescriptionTooLong);
            }
        }

        let now = Utc::now();
        let host = Member {
            session_id: host_session,
            identity: host_identity,
            is_host: true,
            joined_at: now,
        };

        Ok(Room {
            id,
            name,
            description: settings.description,
            game_version: settings.game_version,
            host_id: host_session,
            members: vec![host],
            max_members: settings.max_members,
            status: RoomStatus::Waiting,
            private: settings.private,
            password_hash: settings
                .password
                .filter(|p| !p.is_empty())
                .map(|p| hash_password(&p)),
            created_at: now,
            last_activity_at: now,
        })
    }

    // ===== Getters =====

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host_id(&self) -> SessionId {
        self.host_id
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn max_members(&self) -> usize {
        self.max_members
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    pub fn is_private(&self) -> bool {
        self.private
    }

    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.status == RoomStatus::Closed
    }

    pub fn is_member(&self, session_id: SessionId) -> bool {
        self.members.iter().any(|m| m.session_id == session_id)
    }

    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at
    }

    /// Whether `viewer` may see this room in listings
    pub fn is_visible_to(&self, viewer: Option<SessionId>) -> bool {
        !self.private || viewer == Some(self.host_id)
    }

    pub fn is_inactive(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.last_activity_at > window
    }

    pub fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }

    // ===== Membership =====

    /// Add a member; capacity check and insert happen in one step
    pub fn join(
        &mut self,
        session_id: SessionId,
        identity: PlayerIdentity,
        password: Option<&str>,
    ) -> Result<Member, RoomError> {
        if self.is_closed() {
            return Err(RoomError::Closed);
        }
        if self.is_member(session_id) {
            return Err(RoomError::AlreadyMember(session_id));
        }
        if self.members.len() >= self.max_members {
            return Err(RoomError::Full {
                max: self.max_members,
            });
        }
        if let Some(expected) = &self.password_hash {
            let supplied = password.map(hash_password);
            if supplied.as_deref() != Some(expected.as_str()) {
                return Err(RoomError::BadPassword);
            }
        }

        let member = Member {
            session_id,
            identity,
            is_host: false,
            joined_at: Utc::now(),
        };
        self.members.push(member.clone());
        self.refresh_status();
        self.touch();

        tracing::debug!(room_id = %self.id, %session_id, members = self.members.len(), "Member joined");
        Ok(member)
    }

    /// Remove a member, promoting the earliest-joined remaining member if
    /// the host left
    pub fn leave(&mut self, session_id: SessionId) -> Result<Departure, RoomError> {
        let index = self
            .members
            .iter()
            .position(|m| m.session_id == session_id)
            .ok_or(RoomError::NotMember(session_id))?;

        let member = self.members.remove(index);

        if self.members.is_empty() {
            self.status = RoomStatus::Closed;
            return Ok(Departure {
                member,
                new_host: None,
                destroyed: true,
            });
        }

        let mut new_host = None;
        if member.is_host {
            let successor = &mut self.members[0];
            successor.is_host = true;
            self.host_id = successor.session_id;
            new_host = Some(successor.session_id);
            tracing::info!(room_id = %self.id, new_host = %successor.session_id, "Host migrated");
        }

        self.refresh_status();
        self.touch();

        Ok(Departure {
            member,
            new_host,
            destroyed: false,
        })
    }

    /// Force-close the room, returning everyone who was still inside
    pub fn close(&mut self) -> Vec<Member> {
        self.status = RoomStatus::Closed;
        std::mem::take(&mut self.members)
    }

    fn refresh_status(&mut self) {
        if self.is_closed() {
            return;
        }
        self.status = if self.members.len() > 1 {
            RoomStatus::Active
        } else {
            RoomStatus::Waiting
        };
    }

    // ===== Views =====

    pub fn summary(&self) -> RoomSummary {
        let host_name = self
            .members
            .iter()
            .find(|m| m.is_host)
            .map(|m| m.identity.display_name.clone())
            .unwrap_or_default();

        RoomSummary {
            room_id: self.id.clone(),
            name: self.name.clone(),
            host_id: self.host_id,
            host_name,
            member_count: self.members.len(),
            max_members: self.max_members,
            status: self.status,
            private: self.private,
            has_password: self.has_password(),
            description: self.description.clone(),
            game_version: self.game_version.clone(),
            created_at: self.created_at,
            last_activity_at: self.last_activity_at,
        }
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.id.clone(),
            name: self.name.clone(),
            host_id: self.host_id,
            members: self.members.clone(),
            max_members: self.max_members,
            status: self.status,
            private: self.private,
        }
    }
}

/// Listing entry; never carries members or the password hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub name: String,
    pub host_id: SessionId,
    pub host_name: String,
    pub member_count: usize,
    pub max_members: usize,
    pub status: RoomStatus,
    pub private: bool,
    pub has_password: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_version: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

/// Full room state as seen by a member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub name: String,
    pub host_id: SessionId,
    pub members: Vec<Member>,
    pub max_members: usize,
    pub status: RoomStatus,
    pub private: bool,
}

pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: &str) -> PlayerIdentity {
        PlayerIdentity::new(format!("id-{name}"), name).unwrap()
    }

    fn room_with_host(max: usize) -> (Room, SessionId) {
        let host = SessionId::new();
        let room = Room::open(
            RoomId::generate(),
            RoomSettings::new("Test Room").with_max_members(max),
            host,
            identity("Host"),
        )
        .unwrap();
        (room, host)
    }

    #[test]
    fn test_room_id_is_short_hex() {
        let id = RoomId::generate();
        assert_eq!(id.as_str().len(), 8);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_open_room_has_single_host() {
        let (room, host) = room_with_host(4);
        assert_eq!(room.member_count(), 1);
        assert_eq!(room.host_id(), host);
        assert_eq!(room.status(), RoomStatus::Waiting);
        assert!(room.members()[0].is_host);
    }

    #[test]
    fn test_invalid_max_members() {
        let result = Room::open(
            RoomId::generate(),
            RoomSettings::new("Room").with_max_members(0),
            SessionId::new(),
            identity("Host"),
        );
        assert_eq!(result.unwrap_err(), RoomError::InvalidMaxMembers(0));

        let result = Room::open(
            RoomId::generate(),
            RoomSettings::new("Room").with_max_members(101),
            SessionId::new(),
            identity("Host"),
        );
        assert_eq!(result.unwrap_err(), RoomError::InvalidMaxMembers(101));
    }

    #[test]
    fn test_blank_name_rejected() {
        let result = Room::open(
            RoomId::generate(),
            RoomSettings::new("  "),
            SessionId::new(),
            identity("Host"),
        );
        assert_eq!(result.unwrap_err(), RoomError::InvalidName);
    }

    #[test]
    fn test_join_below_capacity_activates_room() {
        let (mut room, _) = room_with_host(2);
        room.join(SessionId::new(), identity("Guest"), None).unwrap();
        assert_eq!(room.member_count(), 2);
        assert_eq!(room.status(), RoomStatus::Active);
    }

    #[test]
    fn test_join_at_capacity_is_full() {
        let (mut room, _) = room_with_host(2);
        room.join(SessionId::new(), identity("Guest1"), None).unwrap();

        let result = room.join(SessionId::new(), identity("Guest2"), None);
        assert_eq!(result.unwrap_err(), RoomError::Full { max: 2 });
        assert_eq!(room.member_count(), 2);
    }

    #[test]
    fn test_join_twice_is_already_member() {
        let (mut room, host) = room_with_host(4);
        let result = room.join(host, identity("Host"), None);
        assert_eq!(result.unwrap_err(), RoomError::AlreadyMember(host));
        assert_eq!(
            RoomError::AlreadyMember(host).reject_reason(),
            Some(RejectReason::AlreadyMember)
        );
    }

    #[test]
    fn test_password_protected_room() {
        let host = SessionId::new();
        let mut room = Room::open(
            RoomId::generate(),
            RoomSettings::new("Locked").with_password("secret"),
            host,
            identity("Host"),
        )
        .unwrap();
        assert!(room.has_password());

        let wrong = room.join(SessionId::new(), identity("A"), Some("nope"));
        assert_eq!(wrong.unwrap_err(), RoomError::BadPassword);

        let missing = room.join(SessionId::new(), identity("B"), None);
        assert_eq!(missing.unwrap_err(), RoomError::BadPassword);

        room.join(SessionId::new(), identity("C"), Some("secret"))
            .unwrap();
        assert_eq!(room.member_count(), 2);
    }

    #[test]
    fn test_host_leaving_promotes_earliest_joined() {
        let (mut room, host) = room_with_host(4);
        let first = SessionId::new();
        let second = SessionId::new();
        room.join(first, identity("First"), None).unwrap();
        room.join(second, identity("Second"), None).unwrap();

        let departure = room.leave(host).unwrap();
        assert_eq!(departure.new_host, Some(first));
        assert!(!departure.destroyed);
        assert_eq!(room.host_id(), first);
        assert_eq!(room.members().iter().filter(|m| m.is_host).count(), 1);
    }

    #[test]
    fn test_guest_leaving_keeps_host() {
        let (mut room, host) = room_with_host(4);
        let guest = SessionId::new();
        room.join(guest, identity("Guest"), None).unwrap();

        let departure = room.leave(guest).unwrap();
        assert_eq!(departure.new_host, None);
        assert_eq!(room.host_id(), host);
        assert_eq!(room.status(), RoomStatus::Waiting);
    }

    #[test]
    fn test_last_member_leaving_closes_room() {
        let (mut room, host) = room_with_host(4);
        let departure = room.leave(host).unwrap();
        assert!(departure.destroyed);
        assert!(room.is_closed());

        let result = room.join(SessionId::new(), identity("Late"), None);
        assert_eq!(result.unwrap_err(), RoomError::Closed);
    }

    #[test]
    fn test_leave_non_member() {
        let (mut room, _) = room_with_host(4);
        let stranger = SessionId::new();
        assert_eq!(
            room.leave(stranger).unwrap_err(),
            RoomError::NotMember(stranger)
        );
    }

    #[test]
    fn test_close_drains_members() {
        let (mut room, _) = room_with_host(4);
        room.join(SessionId::new(), identity("Guest"), None).unwrap();
        let evicted = room.close();
        assert_eq!(evicted.len(), 2);
        assert_eq!(room.member_count(), 0);
        assert!(room.is_closed());
    }

    #[test]
    fn test_private_visibility() {
        let host = SessionId::new();
        let room = Room::open(
            RoomId::generate(),
            RoomSettings::new("Secret").with_private(true),
            host,
            identity("Host"),
        )
        .unwrap();
        assert!(room.is_visible_to(Some(host)));
        assert!(!room.is_visible_to(Some(SessionId::new())));
        assert!(!room.is_visible_to(None));
    }

    #[test]
    fn test_inactivity() {
        let (room, _) = room_with_host(4);
        let later = Utc::now() + Duration::hours(2);
        assert!(room.is_inactive(later, Duration::hours(1)));
        assert!(!room.is_inactive(Utc::now(), Duration::hours(1)));
    }

    #[test]
    fn test_summary_hides_password_hash() {
        let room = Room::open(
            RoomId::generate(),
            RoomSettings::new("Locked").with_password("secret"),
            SessionId::new(),
            identity("Host"),
        )
        .unwrap();
        let json = serde_json::to_string(&room.summary()).unwrap();
        assert!(json.contains("\"hasPassword\":true"));
        assert!(!json.contains(&hash_password("secret")));
        assert!(!json.contains("members\""));
    }
}
