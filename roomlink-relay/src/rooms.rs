use crate::error::{RelayError, Result};
use roomlink_core::{PlayerIdentity, Room, RoomId, RoomSettings, RoomSummary, SessionId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, instrument};

/// One live room behind its own mutex
///
/// All membership changes for the room happen while this lock is held.
pub struct RoomSlot {
    room: Mutex<Room>,
    /// Creator's token; the directory mirror acts on the creator's behalf
    owner_token: Option<String>,
}

impl RoomSlot {
    pub fn lock(&self) -> Result<MutexGuard<'_, Room>> {
        self.room.lock().map_err(RelayError::poisoned)
    }

    pub fn owner_token(&self) -> Option<&str> {
        self.owner_token.as_deref()
    }
}

/// Live room table
///
/// Lock order is room slot, then table. Readers clone slots out of the table
/// before locking any of them.
#[derive(Default)]
pub struct RoomTable {
    rooms: RwLock<HashMap<RoomId, Arc<RoomSlot>>>,
}

impl RoomTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a room under a fresh id
    #[instrument(skip(self, settings, host_identity, owner_token))]
    pub fn open(
        &self,
        settings: RoomSettings,
        host: SessionId,
        host_identity: PlayerIdentity,
        owner_token: Option<String>,
    ) -> Result<Arc<RoomSlot>> {
        let mut rooms = self.rooms.write().map_err(RelayError::poisoned)?;

        let mut room_id = RoomId::generate();
        while rooms.contains_key(&room_id) {
            room_id = RoomId::generate();
        }

        let room = Room::open(room_id.clone(), settings, host, host_identity)?;
        let slot = Arc::new(RoomSlot {
            room: Mutex::new(room),
            owner_token,
        });
        rooms.insert(room_id.clone(), slot.clone());

        debug!(%room_id, total = rooms.len(), "Room opened");
        Ok(slot)
    }

    pub fn get(&self, room_id: &RoomId) -> Result<Option<Arc<RoomSlot>>> {
        Ok(self
            .rooms
            .read()
            .map_err(RelayError::poisoned)?
            .get(room_id)
            .cloned())
    }

    /// Drop a room from the table; callers hold the room's own lock
    pub fn remove(&self, room_id: &RoomId) -> Result<()> {
        self.rooms
            .write()
            .map_err(RelayError::poisoned)?
            .remove(room_id);
        debug!(%room_id, "Room removed");
        Ok(())
    }

    pub fn slots(&self) -> Result<Vec<Arc<RoomSlot>>> {
        Ok(self
            .rooms
            .read()
            .map_err(RelayError::poisoned)?
            .values()
            .cloned()
            .collect())
    }

    /// Open rooms `viewer` may see, most recently active first
    ///
    /// Rooms that closed while the listing ran are skipped, so an empty room
    /// is never reported.
    pub fn visible_summaries(&self, viewer: Option<SessionId>) -> Result<Vec<RoomSummary>> {
        let mut summaries = Vec::new();
        for slot in self.slots()? {
            let room = slot.lock()?;
            if room.is_closed() || room.member_count() == 0 || !room.is_visible_to(viewer) {
                continue;
            }
            summaries.push(room.summary());
        }
        summaries.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        Ok(summaries)
    }

    pub fn len(&self) -> usize {
        self.rooms.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
