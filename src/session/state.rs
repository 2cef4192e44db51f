use super::user::{is_truthy, Abilities, Role, User};
use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use std::fmt;

/// Remaining lifetime (seconds) under which a token should be refreshed.
pub const REFRESH_THRESHOLD_SECS: i64 = 300;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Anonymous,
    Authenticating,
    Authenticated,
}

/// Immutable view of the session at one point in time.
///
/// `is_authenticated` is derived from the user, so the two cannot disagree.
#[derive(Clone, Default)]
pub struct SessionSnapshot {
    pub(crate) user: Option<User>,
    pub(crate) abilities: Abilities,
    pub(crate) token: Option<SecretString>,
    pub(crate) expires_at: Option<DateTime<Utc>>,
    pub(crate) pending: usize,
    pub(crate) authenticating: usize,
    pub(crate) last_error: Option<String>,
}

impl SessionSnapshot {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    #[must_use]
    pub const fn abilities(&self) -> &Abilities {
        &self.abilities
    }

    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.pending > 0
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        if self.user.is_some() {
            SessionPhase::Authenticated
        } else if self.authenticating > 0 {
            SessionPhase::Authenticating
        } else {
            SessionPhase::Anonymous
        }
    }

    /// A user without a role counts as a customer.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.user
            .as_ref()
            .map(|user| user.role().unwrap_or(Role::Customer))
    }

    /// Recomputed from the user on every call; false without a user.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(User::is_admin)
    }

    #[must_use]
    pub fn has_role(&self, role: &Role) -> bool {
        self.role().as_ref() == Some(role)
    }

    #[must_use]
    pub fn can(&self, ability: &str) -> bool {
        self.abilities.get(ability).is_some_and(is_truthy)
    }

    /// True when an expiry is known and less than five minutes remain.
    #[must_use]
    pub fn should_refresh_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|expiry| expiry - now < Duration::seconds(REFRESH_THRESHOLD_SECS))
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

impl fmt::Debug for SessionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSnapshot")
            .field("phase", &self.phase())
            .field("user", &self.user)
            .field("abilities", &self.abilities)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("expires_at", &self.expires_at)
            .field("is_loading", &self.is_loading())
            .field("last_error", &self.last_error)
            .finish()
    }
}
