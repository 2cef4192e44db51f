//! # Sesame (client session manager)
//!
//! `sesame` is the client half of a token-authenticated REST API. It keeps the
//! current bearer credential, persists it between runs, attaches it to every
//! outgoing request and tears the session down the moment the server says the
//! token is no longer valid.
//!
//! ## Layers
//!
//! - [`storage`]: durable key-value storage for the token, the user snapshot and
//!   the optional expiry (`auth_token`, `user_data`, `token_expiry`).
//! - [`session`]: the single shared session state. Every transition publishes a
//!   new immutable snapshot; readers subscribe instead of polling.
//! - [`api`]: one request pipeline with a pre-request hook (bearer header) and
//!   a post-response hook (classify the status, react to `401`).
//! - [`auth`]: lifecycle operations (login, logout, register, refresh, profile).
//! - [`resources`]: CRUD passthrough stores such as locations.
//!
//! ## Session Flow
//!
//! 1. **Hydrate:** [`SessionStore::open`] loads the stored credential. A
//!    non-expired credential yields an authenticated session without any
//!    network call; an expired or corrupted one is cleared.
//! 2. **Login:** [`AuthService::login`] validates input locally, posts the
//!    credentials and activates the session only when the response carries
//!    both a token and a user.
//! 3. **Invalidation:** any `401` for the active token, on any request, clears
//!    storage and state and asks the host [`Navigator`] to show the login route.
//!
//! Tokens are held in [`secrecy::SecretString`] and are never logged.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod resources;
pub mod session;
pub mod storage;

pub use api::{ApiClient, Navigator, RequestOptions, Route};
pub use auth::AuthService;
pub use config::ApiConfig;
pub use error::{Error, ErrorKind, Result};
pub use session::{SessionSnapshot, SessionStore};
pub use storage::CredentialStore;

use std::sync::Arc;

pub const GIT_COMMIT_HASH: &str = env!("SESAME_GIT_SHA");

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// Everything a host needs, wired around one shared session.
#[derive(Clone)]
pub struct AppContext {
    pub session: SessionStore,
    pub api: ApiClient,
    pub auth: AuthService,
}

impl AppContext {
    /// Hydrates the session from `credentials` and builds the client and the
    /// auth service on top of it.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built or storage fails.
    pub fn new(
        config: &ApiConfig,
        credentials: CredentialStore,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let session = SessionStore::open(credentials)?;
        let api = ApiClient::new(config, session.clone(), navigator)?;
        let auth = AuthService::new(api.clone(), session.clone());

        Ok(Self { session, api, auth })
    }
}
