//! sled-backed persistence
//!
//! Trees:
//! - `users`: user id → account JSON
//! - `usernames`, `emails`: lowercase key → user id
//! - `rooms`: room id → record JSON
//! - `room_keys`: `host id \0 room name` → room id

use crate::error::{DirectoryError, Result};
use crate::model::{NewRoom, RoomFilter, RoomPatch, RoomRecord, UserAccount};
use chrono::{DateTime, Utc};
use roomlink_core::{PlayerIdentity, RoomId, RoomStatus};
use sled::transaction::{abort, TransactionError, TransactionalTree};
use sled::{Transactional, Tree};
use std::path::Path;
use tracing::{debug, info, instrument};

pub struct DirectoryStore {
    db: sled::Db,
    users: Tree,
    usernames: Tree,
    emails: Tree,
    rooms: Tree,
    room_keys: Tree,
}

impl DirectoryStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Opening directory store");
        Self::from_db(sled::open(path)?)
    }

    /// In-memory store, dropped with the handle
    pub fn temporary() -> Result<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        Ok(Self {
            users: db.open_tree("users")?,
            usernames: db.open_tree("usernames")?,
            emails: db.open_tree("emails")?,
            rooms: db.open_tree("rooms")?,
            room_keys: db.open_tree("room_keys")?,
            db,
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    // ===== Users =====

    /// Insert an account; username and email must both be unused
    #[instrument(skip(self, account), fields(username = %account.username))]
    pub fn insert_user(&self, account: &UserAccount) -> Result<()> {
        let value = serde_json::to_vec(account)?;
        let username_key = account.username.trim().to_lowercase();
        let email_key = account.email.trim().to_lowercase();

        let result = (&self.users, &self.usernames, &self.emails).transaction(
            |(users, usernames, emails)| {
                if usernames.get(username_key.as_bytes())?.is_some() {
                    return abort(DirectoryError::Conflict(
                        "username already taken".to_string(),
                    ));
                }
                if emails.get(email_key.as_bytes())?.is_some() {
                    return abort(DirectoryError::Conflict(
                        "email already registered".to_string(),
                    ));
                }
                users.insert(account.id.as_bytes(), value.as_slice())?;
                usernames.insert(username_key.as_bytes(), account.id.as_bytes())?;
                emails.insert(email_key.as_bytes(), account.id.as_bytes())?;
                Ok(())
            },
        );
        unwrap_transaction(result)?;

        debug!("Account stored");
        Ok(())
    }

    /// Overwrite an existing account (login bookkeeping)
    pub fn save_user(&self, account: &UserAccount) -> Result<()> {
        self.users
            .insert(account.id.as_bytes(), serde_json::to_vec(account)?)?;
        Ok(())
    }

    pub fn user(&self, user_id: &str) -> Result<Option<UserAccount>> {
        match self.users.get(user_id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Look an account up by username or email, case-insensitively
    pub fn user_by_login(&self, login: &str) -> Result<Option<UserAccount>> {
        let key = login.trim().to_lowercase();
        let user_id = match self.usernames.get(key.as_bytes())? {
            Some(id) => Some(id),
            None => self.emails.get(key.as_bytes())?,
        };
        match user_id {
            Some(id) => self.user(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    // ===== Rooms =====

    /// Create a room record, or refresh the one this host already has under
    /// the same name. Returns the record and whether it was created.
    #[instrument(skip(self, room, host), fields(host_id = %host.id, name = %room.name))]
    pub fn upsert_room(&self, room: NewRoom, host: &PlayerIdentity) -> Result<(RoomRecord, bool)> {
        let room_key = room_key(&host.id, room.name.trim());
        let requested_id = room.room_id.clone();

        let result = (&self.rooms, &self.room_keys).transaction(|(rooms, room_keys)| {
            if let Some(existing_id) = room_keys.get(room_key.as_bytes())? {
                if let Some(mut record) = read_record(rooms, &existing_id)? {
                    if let Err(e) = room.clone().refresh(&mut record) {
                        return abort(e);
                    }
                    // The caller owns the id: move the record under it
                    if let Some(id) = requested_id.as_ref().filter(|id| **id != record.room_id) {
                        if rooms.get(id.as_str().as_bytes())?.is_some() {
                            return abort(DirectoryError::Conflict(format!(
                                "room {} already exists",
                                id
                            )));
                        }
                        rooms.remove(existing_id.clone())?;
                        record.room_id = id.clone();
                        room_keys.insert(room_key.as_bytes(), id.as_str().as_bytes())?;
                    }
                    write_record(rooms, &record)?;
                    return Ok((record, false));
                }
            }

            let room_id = match &requested_id {
                Some(id) => {
                    if rooms.get(id.as_str().as_bytes())?.is_some() {
                        return abort(DirectoryError::Conflict(format!(
                            "room {} already exists",
                            id
                        )));
                    }
                    id.clone()
                }
                None => fresh_room_id(rooms)?,
            };

            let record = match room.clone().into_record(room_id, host) {
                Ok(record) => record,
                Err(e) => return abort(e),
            };
            write_record(rooms, &record)?;
            room_keys.insert(room_key.as_bytes(), record.room_id.as_str().as_bytes())?;
            Ok((record, true))
        });

        let (record, created) = unwrap_transaction(result)?;
        debug!(room_id = %record.room_id, created, "Room record stored");
        Ok((record, created))
    }

    pub fn room(&self, room_id: &RoomId) -> Result<Option<RoomRecord>> {
        match self.rooms.get(room_id.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Apply a patch on behalf of `host_id`
    #[instrument(skip(self, patch))]
    pub fn update_room(&self, room_id: &RoomId, host_id: &str, patch: RoomPatch) -> Result<RoomRecord> {
        let result = self.rooms.transaction(|rooms| {
            let Some(mut record) = read_record(rooms, room_id.as_str().as_bytes())? else {
                return abort(DirectoryError::NotFound(format!("room {}", room_id)));
            };
            if record.host_id != host_id {
                return abort(DirectoryError::Forbidden(
                    "only the host may change this room".to_string(),
                ));
            }
            if let Err(e) = patch.clone().apply(&mut record) {
                return abort(e);
            }
            write_record(rooms, &record)?;
            Ok(record)
        });
        unwrap_transaction(result)
    }

    /// Delete a record on behalf of `host_id`
    #[instrument(skip(self))]
    pub fn delete_room(&self, room_id: &RoomId, host_id: &str) -> Result<()> {
        let result = (&self.rooms, &self.room_keys).transaction(|(rooms, room_keys)| {
            let Some(record) = read_record(rooms, room_id.as_str().as_bytes())? else {
                return abort(DirectoryError::NotFound(format!("room {}", room_id)));
            };
            if record.host_id != host_id {
                return abort(DirectoryError::Forbidden(
                    "only the host may delete this room".to_string(),
                ));
            }
            rooms.remove(room_id.as_str().as_bytes())?;
            room_keys.remove(room_key(&record.host_id, &record.name).as_bytes())?;
            Ok(())
        });
        unwrap_transaction(result)
    }

    /// Rooms `viewer_id` may see, most recently active first
    pub fn list_rooms(&self, viewer_id: &str, filter: &RoomFilter) -> Result<Vec<RoomRecord>> {
        let mut records = Vec::new();
        for entry in self.rooms.iter() {
            let (_, bytes) = entry?;
            let record: RoomRecord = serde_json::from_slice(&bytes)?;
            if record.is_visible_to(viewer_id) && filter.matches(&record) {
                records.push(record);
            }
        }
        records.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        Ok(records)
    }

    /// Remove every record last active before `cutoff`
    pub fn purge_stale_rooms(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut stale = Vec::new();
        for entry in self.rooms.iter() {
            let (_, bytes) = entry?;
            let record: RoomRecord = serde_json::from_slice(&bytes)?;
            if record.is_stale(cutoff) {
                stale.push(record);
            }
        }

        let mut purged = 0;
        for record in stale {
            let result = (&self.rooms, &self.room_keys).transaction(|(rooms, room_keys)| -> TxResult<bool> {
                // Skip records refreshed since the scan
                match read_record(rooms, record.room_id.as_str().as_bytes())? {
                    Some(current) if current.is_stale(cutoff) => {
                        rooms.remove(record.room_id.as_str().as_bytes())?;
                        room_keys.remove(room_key(&current.host_id, &current.name).as_bytes())?;
                        Ok(true)
                    }
                    _ => Ok(false),
                }
            });
            if unwrap_transaction(result)? {
                purged += 1;
            }
        }
        Ok(purged)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn open_room_count(&self) -> Result<usize> {
        let mut open = 0;
        for entry in self.rooms.iter() {
            let (_, bytes) = entry?;
            let record: RoomRecord = serde_json::from_slice(&bytes)?;
            if record.status != RoomStatus::Closed {
                open += 1;
            }
        }
        Ok(open)
    }
}

type TxResult<T> = std::result::Result<T, sled::transaction::ConflictableTransactionError<DirectoryError>>;

fn room_key(host_id: &str, name: &str) -> String {
    format!("{}\0{}", host_id, name)
}

fn read_record(rooms: &TransactionalTree, room_id: &[u8]) -> TxResult<Option<RoomRecord>> {
    match rooms.get(room_id)? {
        Some(bytes) => match serde_json::from_slice(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => abort(DirectoryError::Serialization(e)),
        },
        None => Ok(None),
    }
}

fn write_record(rooms: &TransactionalTree, record: &RoomRecord) -> TxResult<()> {
    let bytes = match serde_json::to_vec(record) {
        Ok(bytes) => bytes,
        Err(e) => return abort(DirectoryError::Serialization(e)),
    };
    rooms.insert(record.room_id.as_str().as_bytes(), bytes)?;
    Ok(())
}

fn fresh_room_id(rooms: &TransactionalTree) -> TxResult<RoomId> {
    loop {
        let id = RoomId::generate();
        if rooms.get(id.as_str().as_bytes())?.is_none() {
            return Ok(id);
        }
    }
}

fn unwrap_transaction<T>(result: std::result::Result<T, TransactionError<DirectoryError>>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(e)) => Err(e),
        Err(TransactionError::Storage(e)) => Err(DirectoryError::Storage(e)),
    }
}
