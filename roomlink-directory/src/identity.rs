use crate::error::{DirectoryError, Result};
use crate::model::{validate_display_name, Credentials, Registration, UserAccount};
use crate::store::DirectoryStore;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use roomlink_core::PlayerIdentity;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Exchanges credentials for a player identity
pub trait IdentityProvider: Send + Sync {
    fn register(&self, registration: &Registration) -> Result<PlayerIdentity>;
    fn login(&self, credentials: &Credentials) -> Result<PlayerIdentity>;
    fn identity(&self, user_id: &str) -> Result<PlayerIdentity>;
    fn rename(&self, user_id: &str, display_name: &str) -> Result<PlayerIdentity>;
}

/// Accounts kept in the directory's own store, argon2-hashed
pub struct LocalIdentityProvider {
    store: Arc<DirectoryStore>,
}

impl LocalIdentityProvider {
    pub fn new(store: Arc<DirectoryStore>) -> Self {
        Self { store }
    }
}

impl IdentityProvider for LocalIdentityProvider {
    #[instrument(skip(self, registration), fields(username = %registration.username))]
    fn register(&self, registration: &Registration) -> Result<PlayerIdentity> {
        registration.validate()?;

        let username = registration.username.trim().to_string();
        let display_name = registration
            .display_name
            .as_deref()
            .map(str::trim)
            .unwrap_or(&username)
            .to_string();

        let account = UserAccount {
            id: uuid::Uuid::new_v4().to_string(),
            username,
            email: registration.email.trim().to_string(),
            display_name,
            password_hash: hash_password(&registration.password)?,
            created_at: Utc::now(),
            last_login_at: None,
        };
        self.store.insert_user(&account)?;

        info!(user_id = %account.id, "Account registered");
        Ok(account.identity())
    }

    #[instrument(skip(self, credentials), fields(login = %credentials.login))]
    fn login(&self, credentials: &Credentials) -> Result<PlayerIdentity> {
        let rejected = || DirectoryError::Auth("invalid login or password".to_string());

        let Some(mut account) = self.store.user_by_login(&credentials.login)? else {
            warn!("Login for unknown account");
            return Err(rejected());
        };
        if !verify_password(&credentials.password, &account.password_hash)? {
            warn!(user_id = %account.id, "Wrong password");
            return Err(rejected());
        }

        account.last_login_at = Some(Utc::now());
        self.store.save_user(&account)?;
        Ok(account.identity())
    }

    fn identity(&self, user_id: &str) -> Result<PlayerIdentity> {
        self.store
            .user(user_id)?
            .map(|account| account.identity())
            .ok_or_else(|| DirectoryError::NotFound(format!("user {}", user_id)))
    }

    #[instrument(skip(self))]
    fn rename(&self, user_id: &str, display_name: &str) -> Result<PlayerIdentity> {
        validate_display_name(display_name)?;

        let Some(mut account) = self.store.user(user_id)? else {
            return Err(DirectoryError::NotFound(format!("user {}", user_id)));
        };
        account.display_name = display_name.trim().to_string();
        self.store.save_user(&account)?;
        info!(user_id, "Display name changed");
        Ok(account.identity())
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DirectoryError::Internal(format!("failed to hash password: {}", e)))
}

fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| DirectoryError::Internal(format!("invalid stored hash: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
