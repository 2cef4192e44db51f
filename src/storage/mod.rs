//! Durable credential storage. The credential store sits on top of a plain
//! string key-value backend, the way a browser app sits on local storage, so
//! the backend can be swapped (memory for tests, a JSON file for the CLI).
//! Corrupted entries are never surfaced as errors: the store clears itself and
//! reports no credential.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::session::User;
use chrono::{DateTime, TimeZone, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::{fmt, sync::Arc};
use thiserror::Error;
use tracing::{debug, warn};

pub const TOKEN_KEY: &str = "auth_token";
pub const USER_KEY: &str = "user_data";
pub const EXPIRY_KEY: &str = "token_expiry";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// String key-value backend.
pub trait KeyValueStore: Send + Sync {
    /// # Errors
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    /// Returns an error if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// # Errors
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// A credential as loaded from storage.
#[derive(Clone)]
pub struct StoredCredential {
    pub token: SecretString,
    pub user: User,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredCredential {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

impl fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredential")
            .field("token", &"***")
            .field("user", &self.user)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

impl CredentialStore {
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Process-local store, useful for tests and short-lived tools.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::default()))
    }

    /// # Errors
    /// Returns an error if the user cannot be encoded or the backend fails.
    pub fn save(
        &self,
        token: &SecretString,
        user: &User,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        let user_data = serde_json::to_string(user)?;
        self.backend.set(TOKEN_KEY, token.expose_secret())?;
        self.backend.set(USER_KEY, &user_data)?;
        match expires_at {
            Some(expiry) => self
                .backend
                .set(EXPIRY_KEY, &expiry.timestamp_millis().to_string())?,
            None => self.backend.remove(EXPIRY_KEY)?,
        }
        debug!("credential saved");
        Ok(())
    }

    /// Replaces only the user snapshot, leaving token and expiry alone.
    ///
    /// # Errors
    /// Returns an error if the user cannot be encoded or the backend fails.
    pub fn save_user(&self, user: &User) -> Result<(), StorageError> {
        let user_data = serde_json::to_string(user)?;
        self.backend.set(USER_KEY, &user_data)
    }

    /// Replaces token and expiry, leaving the user snapshot alone.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    pub fn save_token(
        &self,
        token: &SecretString,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        self.backend.set(TOKEN_KEY, token.expose_secret())?;
        match expires_at {
            Some(expiry) => self
                .backend
                .set(EXPIRY_KEY, &expiry.timestamp_millis().to_string()),
            None => self.backend.remove(EXPIRY_KEY),
        }
    }

    /// Loads the stored credential. Incomplete or unparsable data is cleared
    /// and reported as absent.
    ///
    /// # Errors
    /// Returns an error only if the backend itself fails.
    pub fn load(&self) -> Result<Option<StoredCredential>, StorageError> {
        let token = self.backend.get(TOKEN_KEY)?;
        let user_data = self.backend.get(USER_KEY)?;
        let expiry = self.backend.get(EXPIRY_KEY)?;

        let (token, user_data) = match (token, user_data) {
            (None, None) => return Ok(None),
            (Some(token), Some(user_data)) if !token.is_empty() => (token, user_data),
            _ => {
                warn!("incomplete stored credential, clearing");
                self.clear()?;
                return Ok(None);
            }
        };

        let user = match serde_json::from_str::<User>(&user_data) {
            Ok(user) => user,
            Err(err) => {
                warn!("failed to parse stored user data, clearing: {}", err);
                self.clear()?;
                return Ok(None);
            }
        };

        let expires_at = match expiry.as_deref().map(parse_expiry) {
            None => None,
            Some(Some(expiry)) => Some(expiry),
            Some(None) => {
                warn!("failed to parse stored token expiry, clearing");
                self.clear()?;
                return Ok(None);
            }
        };

        Ok(Some(StoredCredential {
            token: SecretString::from(token),
            user,
            expires_at,
        }))
    }

    /// # Errors
    /// Returns an error if the backend fails.
    pub fn token(&self) -> Result<Option<SecretString>, StorageError> {
        Ok(self
            .backend
            .get(TOKEN_KEY)?
            .filter(|token| !token.is_empty())
            .map(SecretString::from))
    }

    /// # Errors
    /// Returns an error if the backend fails.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.backend.remove(TOKEN_KEY)?;
        self.backend.remove(USER_KEY)?;
        self.backend.remove(EXPIRY_KEY)?;
        debug!("credential cleared");
        Ok(())
    }

    /// # Errors
    /// Returns an error if the backend fails.
    pub fn is_present(&self) -> Result<bool, StorageError> {
        Ok(self.token()?.is_some())
    }
}

fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let millis = raw.trim().parse::<i64>().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}
