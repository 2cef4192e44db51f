//! The single shared session. Every handle is a clone of the same instance;
//! transitions happen under one lock, persist to the credential store in the
//! same critical section, and publish a complete new snapshot. Readers never
//! see a half-applied transition.
//!
//! Teardown bumps a generation counter. Operations remember the generation
//! they started in and their results are refused once it has moved on, which
//! keeps a late login response from resurrecting a session after logout.

use super::{
    state::SessionSnapshot,
    user::{Abilities, User},
};
use crate::{
    error::{Error, Result},
    storage::CredentialStore,
};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Login,
    Logout,
    Register,
    Refresh,
    Revalidate,
    UpdateProfile,
}

#[derive(Default)]
struct State {
    snapshot: SessionSnapshot,
    generation: u64,
}

struct Inner {
    credentials: CredentialStore,
    state: Mutex<State>,
    publisher: watch::Sender<Arc<SessionSnapshot>>,
}

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Hydrates the session from storage. A valid credential authenticates
    /// optimistically without any network call; an expired one is cleared.
    ///
    /// # Errors
    /// Returns an error if the storage backend fails.
    pub fn open(credentials: CredentialStore) -> Result<Self> {
        let mut snapshot = SessionSnapshot::default();

        if let Some(stored) = credentials.load()? {
            if stored.is_expired_at(Utc::now()) {
                info!("stored credential expired, clearing");
                credentials.clear()?;
            } else {
                debug!("session hydrated from storage");
                snapshot.abilities = stored.user.abilities.clone().unwrap_or_default();
                snapshot.user = Some(stored.user);
                snapshot.token = Some(stored.token);
                snapshot.expires_at = stored.expires_at;
            }
        }

        let (publisher, _) = watch::channel(Arc::new(snapshot.clone()));

        Ok(Self {
            inner: Arc::new(Inner {
                credentials,
                state: Mutex::new(State {
                    snapshot,
                    generation: 0,
                }),
                publisher,
            }),
        })
    }

    /// Fresh anonymous session over in-memory storage.
    #[must_use]
    pub fn in_memory() -> Self {
        let (publisher, _) = watch::channel(Arc::new(SessionSnapshot::default()));
        Self {
            inner: Arc::new(Inner {
                credentials: CredentialStore::in_memory(),
                state: Mutex::new(State::default()),
                publisher,
            }),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        self.inner.publisher.borrow().clone()
    }

    /// Receiver that yields every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<SessionSnapshot>> {
        self.inner.publisher.subscribe()
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        self.snapshot().token.clone()
    }

    /// Token to attach to the next request. An expired session is torn down
    /// here instead of being sent to the server.
    #[must_use]
    pub fn active_token(&self) -> Option<SecretString> {
        let mut state = self.lock();
        if state.snapshot.is_expired_at(Utc::now()) {
            info!("session expired, clearing");
            let result = self.teardown(&mut state, Some("Session expired".to_string()));
            drop(state);
            if let Err(err) = result {
                warn!("failed to clear expired credential: {}", err);
            }
            return None;
        }
        state.snapshot.token.clone()
    }

    /// Marks an operation as in flight until the guard is dropped.
    #[must_use]
    pub fn begin(&self, operation: Operation) -> OperationGuard {
        let mut state = self.lock();
        state.snapshot.pending += 1;
        if operation == Operation::Login {
            state.snapshot.authenticating += 1;
        }
        let generation = state.generation;
        self.publish(&state);

        OperationGuard {
            session: self.clone(),
            operation,
            generation,
        }
    }

    /// Activates a session, replacing any current one.
    ///
    /// # Errors
    /// Returns `Superseded` if the session was torn down after `generation`
    /// was taken, or a storage error if the credential cannot be saved.
    pub fn establish(
        &self,
        generation: u64,
        token: SecretString,
        user: User,
        abilities: Abilities,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut state = self.lock();
        Self::ensure_current(&state, generation)?;

        self.inner.credentials.save(&token, &user, expires_at)?;

        info!("session established for user {}", user.id);
        state.snapshot.user = Some(user);
        state.snapshot.abilities = abilities;
        state.snapshot.token = Some(token);
        state.snapshot.expires_at = expires_at;
        state.snapshot.last_error = None;
        self.publish(&state);
        Ok(())
    }

    /// Swaps token and expiry in place, keeping the user. `previous` must
    /// still be the active token.
    ///
    /// # Errors
    /// Returns `Superseded` if the session is gone or was replaced, or a
    /// storage error.
    pub fn replace_token(
        &self,
        generation: u64,
        previous: &SecretString,
        token: SecretString,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut state = self.lock();
        Self::ensure_current(&state, generation)?;
        if state.snapshot.user.is_none() || !Self::is_active(&state, previous) {
            return Err(Error::Superseded);
        }

        self.inner.credentials.save_token(&token, expires_at)?;

        debug!("session token replaced");
        state.snapshot.token = Some(token);
        state.snapshot.expires_at = expires_at;
        state.snapshot.last_error = None;
        self.publish(&state);
        Ok(())
    }

    /// Merges a fresh user snapshot into the active session. Abilities are
    /// replaced only when provided. `token` is the bearer the user was fetched
    /// with and must still be the active one.
    ///
    /// # Errors
    /// Returns `Superseded` if the session is gone or was replaced by another
    /// login, or a storage error.
    pub fn replace_user(
        &self,
        generation: u64,
        token: &SecretString,
        user: User,
        abilities: Option<Abilities>,
    ) -> Result<User> {
        let mut state = self.lock();
        Self::ensure_current(&state, generation)?;
        if !Self::is_active(&state, token) {
            debug!("discarding user fetched with an inactive token");
            return Err(Error::Superseded);
        }
        let Some(current) = state.snapshot.user.as_ref() else {
            return Err(Error::Superseded);
        };

        let merged = current.merged_with(user);
        self.inner.credentials.save_user(&merged)?;

        if let Some(abilities) = abilities {
            state.snapshot.abilities = abilities;
        }
        state.snapshot.user = Some(merged.clone());
        state.snapshot.last_error = None;
        self.publish(&state);
        Ok(merged)
    }

    /// Records a failure message unless the session moved on meanwhile.
    pub fn record_error(&self, generation: u64, message: impl Into<String>) {
        let mut state = self.lock();
        if state.generation != generation {
            return;
        }
        state.snapshot.last_error = Some(message.into());
        self.publish(&state);
    }

    /// Unconditionally returns to anonymous and clears storage. The in-memory
    /// transition happens even if storage fails.
    ///
    /// # Errors
    /// Returns a storage error after the state has been reset.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.lock();
        self.teardown(&mut state, None)
    }

    /// Tears the session down if `token` is still the active one. Returns
    /// whether anything was cleared.
    ///
    /// # Errors
    /// Returns a storage error after the state has been reset.
    pub fn invalidate(&self, token: &SecretString, reason: &str) -> Result<bool> {
        let mut state = self.lock();
        if !Self::is_active(&state, token) {
            debug!("ignoring invalidation for inactive token");
            return Ok(false);
        }

        info!("session invalidated: {}", reason);
        self.teardown(&mut state, Some(reason.to_string()))?;
        Ok(true)
    }

    fn teardown(&self, state: &mut State, last_error: Option<String>) -> Result<()> {
        state.generation += 1;
        state.snapshot.user = None;
        state.snapshot.abilities = Abilities::new();
        state.snapshot.token = None;
        state.snapshot.expires_at = None;
        state.snapshot.last_error = last_error;
        self.publish(state);

        self.inner.credentials.clear()?;
        Ok(())
    }

    fn is_active(state: &State, token: &SecretString) -> bool {
        state
            .snapshot
            .token
            .as_ref()
            .is_some_and(|active| active.expose_secret() == token.expose_secret())
    }

    fn ensure_current(state: &State, generation: u64) -> Result<()> {
        if state.generation == generation {
            Ok(())
        } else {
            debug!(
                "discarding result from generation {generation}, current is {}",
                state.generation
            );
            Err(Error::Superseded)
        }
    }

    fn publish(&self, state: &State) {
        self.inner
            .publisher
            .send_replace(Arc::new(state.snapshot.clone()));
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self, operation: Operation) {
        let mut state = self.lock();
        state.snapshot.pending = state.snapshot.pending.saturating_sub(1);
        if operation == Operation::Login {
            state.snapshot.authenticating = state.snapshot.authenticating.saturating_sub(1);
        }
        self.publish(&state);
    }
}

/// Keeps `is_loading` raised while alive.
#[must_use = "the operation ends when the guard is dropped"]
pub struct OperationGuard {
    session: SessionStore,
    operation: Operation,
    generation: u64,
}

impl OperationGuard {
    /// Generation the operation started in.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.session.finish(self.operation);
    }
}
