use crate::config::{to_chrono, DirectoryConfig};
use crate::error::Result;
use crate::identity::{IdentityProvider, LocalIdentityProvider};
use crate::model::{
    AuthResponse, Credentials, DirectoryStats, NewRoom, ProfileUpdate, RoomFilter, RoomPatch,
    RoomRecord, Registration,
};
use crate::store::DirectoryStore;
use crate::token::TokenIssuer;
use chrono::{DateTime, Utc};
use roomlink_core::{PlayerIdentity, RoomId};
use std::sync::Arc;
use tracing::{info, instrument};

/// Directory service state shared by every request
#[derive(Clone)]
pub struct Directory {
    inner: Arc<DirectoryInner>,
}

struct DirectoryInner {
    config: DirectoryConfig,
    store: Arc<DirectoryStore>,
    identity: Arc<dyn IdentityProvider>,
    tokens: TokenIssuer,
}

impl Directory {
    /// Open the sled database named in `config`
    pub fn open(config: DirectoryConfig) -> Result<Self> {
        let store = Arc::new(DirectoryStore::open(&config.db_path)?);
        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: DirectoryConfig, store: Arc<DirectoryStore>) -> Self {
        let identity = Arc::new(LocalIdentityProvider::new(store.clone()));
        Self::with_identity_provider(config, store, identity)
    }

    pub fn with_identity_provider(
        config: DirectoryConfig,
        store: Arc<DirectoryStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let tokens = TokenIssuer::new(&config.jwt_secret, to_chrono(config.token_ttl));
        Self {
            inner: Arc::new(DirectoryInner {
                config,
                store,
                identity,
                tokens,
            }),
        }
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.inner.config
    }

    // ===== Accounts =====

    pub fn register(&self, registration: &Registration) -> Result<AuthResponse> {
        let identity = self.inner.identity.register(registration)?;
        let token = self.inner.tokens.issue(&identity)?;
        Ok(AuthResponse { identity, token })
    }

    pub fn login(&self, credentials: &Credentials) -> Result<AuthResponse> {
        let identity = self.inner.identity.login(credentials)?;
        let token = self.inner.tokens.issue(&identity)?;
        info!(user_id = %identity.id, "Login");
        Ok(AuthResponse { identity, token })
    }

    /// Resolve a bearer token to the identity it was issued for
    pub fn authenticate(&self, token: &str) -> Result<PlayerIdentity> {
        Ok(self.inner.tokens.verify(token)?.identity())
    }

    pub fn me(&self, user_id: &str) -> Result<PlayerIdentity> {
        self.inner.identity.identity(user_id)
    }

    /// Tokens carry the display name, so a rename reissues one
    pub fn update_me(&self, user_id: &str, update: &ProfileUpdate) -> Result<AuthResponse> {
        let identity = self.inner.identity.rename(user_id, &update.display_name)?;
        let token = self.inner.tokens.issue(&identity)?;
        Ok(AuthResponse { identity, token })
    }

    // ===== Room records =====

    pub fn list_rooms(&self, viewer: &PlayerIdentity, filter: &RoomFilter) -> Result<Vec<RoomRecord>> {
        self.inner.store.list_rooms(&viewer.id, filter)
    }

    /// Idempotent on (host, name); the flag tells whether a record was created
    #[instrument(skip(self, host, room), fields(host_id = %host.id))]
    pub fn create_room_record(&self, host: &PlayerIdentity, room: NewRoom) -> Result<(RoomRecord, bool)> {
        let (record, created) = self.inner.store.upsert_room(room, host)?;
        if created {
            info!(room_id = %record.room_id, name = %record.name, "Room record created");
        }
        Ok((record, created))
    }

    pub fn update_room_record(
        &self,
        host: &PlayerIdentity,
        room_id: &RoomId,
        patch: RoomPatch,
    ) -> Result<RoomRecord> {
        self.inner.store.update_room(room_id, &host.id, patch)
    }

    #[instrument(skip(self, host), fields(host_id = %host.id))]
    pub fn delete_room_record(&self, host: &PlayerIdentity, room_id: &RoomId) -> Result<()> {
        self.inner.store.delete_room(room_id, &host.id)?;
        info!("Room record deleted");
        Ok(())
    }

    // ===== Maintenance =====

    /// Purge rooms idle for longer than the retention window
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - to_chrono(self.inner.config.retention);
        let purged = self.inner.store.purge_stale_rooms(cutoff)?;
        info!(purged, "Retention sweep finished");
        Ok(purged)
    }

    pub fn stats(&self) -> Result<DirectoryStats> {
        Ok(DirectoryStats {
            users: self.inner.store.user_count(),
            rooms: self.inner.store.room_count(),
            open_rooms: self.inner.store.open_room_count()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn directory() -> Directory {
        Directory::with_store(
            DirectoryConfig::default(),
            Arc::new(DirectoryStore::temporary().unwrap()),
        )
    }

    #[test]
    fn test_registration_token_authenticates() {
        let directory = directory();
        let response = directory
            .register(&Registration {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "secret1".to_string(),
                display_name: Some("Alice".to_string()),
            })
            .unwrap();

        let identity = directory.authenticate(&response.token).unwrap();
        assert_eq!(identity, response.identity);
        assert_eq!(identity.display_name, "Alice");
    }

    #[test]
    fn test_sweep_uses_retention_window() {
        let directory = directory();
        let host = PlayerIdentity::new("u1", "Host").unwrap();
        directory
            .create_room_record(&host, NewRoom::new("Lobby"))
            .unwrap();

        assert_eq!(directory.sweep(Utc::now()).unwrap(), 0);
        assert_eq!(directory.sweep(Utc::now() + Duration::hours(25)).unwrap(), 1);
        assert_eq!(directory.stats().unwrap().rooms, 0);
    }
}
