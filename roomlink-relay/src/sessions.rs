use crate::error::{RelayError, Result};
use chrono::{DateTime, Utc};
use roomlink_core::{PlayerIdentity, RoomId, SessionId};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, instrument};

/// Where an authenticated session currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    Idle,
    InRoom(RoomId),
}

/// Session lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, `init` not yet accepted
    Connecting,
    Authenticated(Presence),
    Closed,
}

/// Metadata for one live connection; the transport handle lives elsewhere
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub identity: Option<PlayerIdentity>,
    /// Opaque token from the identity provider, reused for directory mirroring
    pub token: Option<String>,
    pub state: SessionState,
    pub connected_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub subscribed_to_room_list: bool,
}

impl SessionRecord {
    pub fn new(session_id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            identity: None,
            token: None,
            state: SessionState::Connecting,
            connected_at: now,
            last_seen_at: now,
            subscribed_to_room_list: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated(_))
    }

    pub fn current_room(&self) -> Option<&RoomId> {
        match &self.state {
            SessionState::Authenticated(Presence::InRoom(room_id)) => Some(room_id),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == SessionState::Authenticated(Presence::Idle)
    }

    /// Move between idle and in-room; leaving idle drops the room list subscription
    pub fn set_presence(&mut self, presence: Presence) {
        if matches!(presence, Presence::InRoom(_)) {
            self.subscribed_to_room_list = false;
        }
        self.state = SessionState::Authenticated(presence);
    }
}

/// Identity → session metadata map
#[derive(Default)]
pub struct SessionTable {
    sessions: RwLock<HashMap<SessionId, SessionRecord>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[instrument(skip(self, record), fields(session_id = %record.session_id))]
    pub fn insert(&self, record: SessionRecord) -> Result<()> {
        debug!("Adding session");
        self.sessions
            .write()
            .map_err(RelayError::poisoned)?
            .insert(record.session_id, record);
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn remove(&self, session_id: SessionId) -> Result<Option<SessionRecord>> {
        let removed = self
            .sessions
            .write()
            .map_err(RelayError::poisoned)?
            .remove(&session_id)
            .map(|mut record| {
                record.state = SessionState::Closed;
                record
            });
        debug!(found = removed.is_some(), "Removed session");
        Ok(removed)
    }

    pub fn get(&self, session_id: SessionId) -> Result<Option<SessionRecord>> {
        Ok(self
            .sessions
            .read()
            .map_err(RelayError::poisoned)?
            .get(&session_id)
            .cloned())
    }

    /// Apply `f` to a session; `None` when the session is gone
    pub fn update<R>(
        &self,
        session_id: SessionId,
        f: impl FnOnce(&mut SessionRecord) -> R,
    ) -> Result<Option<R>> {
        Ok(self
            .sessions
            .write()
            .map_err(RelayError::poisoned)?
            .get_mut(&session_id)
            .map(f))
    }

    pub fn touch(&self, session_id: SessionId, now: DateTime<Utc>) -> Result<()> {
        self.update(session_id, |record| record.last_seen_at = now)?;
        Ok(())
    }

    /// Idle sessions that asked to hear about room list changes
    pub fn room_list_subscribers(&self) -> Result<Vec<SessionId>> {
        Ok(self
            .sessions
            .read()
            .map_err(RelayError::poisoned)?
            .values()
            .filter(|r| r.subscribed_to_room_list && r.is_idle())
            .map(|r| r.session_id)
            .collect())
    }

    /// Sessions not heard from since `cutoff`
    pub fn silent_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<SessionId>> {
        Ok(self
            .sessions
            .read()
            .map_err(RelayError::poisoned)?
            .values()
            .filter(|r| r.last_seen_at < cutoff)
            .map(|r| r.session_id)
            .collect())
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_session_is_connecting() {
        let record = SessionRecord::new(SessionId::new());
        assert_eq!(record.state, SessionState::Connecting);
        assert!(!record.is_authenticated());
        assert!(record.current_room().is_none());
    }

    #[test]
    fn test_entering_room_drops_subscription() {
        let mut record = SessionRecord::new(SessionId::new());
        record.set_presence(Presence::Idle);
        record.subscribed_to_room_list = true;

        record.set_presence(Presence::InRoom(RoomId::from("r1")));
        assert!(!record.subscribed_to_room_list);
        assert_eq!(record.current_room(), Some(&RoomId::from("r1")));
    }

    #[test]
    fn test_remove_marks_closed() {
        let table = SessionTable::new();
        let id = SessionId::new();
        table.insert(SessionRecord::new(id)).unwrap();

        let removed = table.remove(id).unwrap().unwrap();
        assert_eq!(removed.state, SessionState::Closed);
        assert!(table.get(id).unwrap().is_none());
        assert!(table.remove(id).unwrap().is_none());
    }

    #[test]
    fn test_silent_sessions() {
        let table = SessionTable::new();
        let quiet = SessionId::new();
        let chatty = SessionId::new();
        table.insert(SessionRecord::new(quiet)).unwrap();
        table.insert(SessionRecord::new(chatty)).unwrap();

        let later = Utc::now() + Duration::seconds(90);
        table.touch(chatty, later).unwrap();

        let silent = table.silent_since(later - Duration::seconds(60)).unwrap();
        assert_eq!(silent, vec![quiet]);
    }

    #[test]
    fn test_update_missing_session() {
        let table = SessionTable::new();
        let result = table.update(SessionId::new(), |r| r.token.clone()).unwrap();
        assert!(result.is_none());
    }
}
