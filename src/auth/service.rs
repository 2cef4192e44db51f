use super::types::{
    expiry_from, Credentials, NewSession, RefreshResponse, Registration, SessionResponse,
    UserPayload,
};
use crate::{
    api::{ApiClient, RequestOptions, Route},
    error::{Error, Result},
    session::{Operation, OperationGuard, SessionStore, User},
};
use chrono::Utc;
use secrecy::SecretString;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

pub const LOGIN_PATH: &str = "auth/login";
pub const LOGOUT_PATH: &str = "auth/logout";
pub const REGISTER_PATH: &str = "auth/register";
pub const REFRESH_PATH: &str = "auth/refresh";
pub const ME_PATH: &str = "me";
pub const PROFILE_PATH: &str = "user/profile";

/// Lifecycle operations over the shared session.
#[derive(Clone, Debug)]
pub struct AuthService {
    api: ApiClient,
    session: SessionStore,
}

impl AuthService {
    #[must_use]
    pub const fn new(api: ApiClient, session: SessionStore) -> Self {
        Self { api, session }
    }

    #[must_use]
    pub const fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Validates locally, then exchanges credentials for a session. Logging in
    /// while authenticated replaces the current session.
    ///
    /// # Errors
    /// - `Validation` for missing or malformed input; no request is sent.
    /// - `Protocol` if the response lacks a token or a user; state is unchanged.
    /// - Auth, server and network failures, recorded as the last error.
    pub async fn login(&self, credentials: &Credentials) -> Result<User> {
        credentials.validate()?;

        let guard = self.session.begin(Operation::Login);
        let result = self.perform_login(credentials, guard.generation()).await;
        self.settle(&guard, result)
    }

    async fn perform_login(&self, credentials: &Credentials, generation: u64) -> Result<User> {
        let response: SessionResponse = self
            .api
            .post(LOGIN_PATH, &credentials.request(), &RequestOptions::anonymous())
            .await?;

        let session = response.into_session().ok_or_else(|| {
            Error::Protocol("Login response is missing the token or the user".to_string())
        })?;
        self.activate(generation, session)
    }

    /// Ends the session locally right away, then tells the server using the
    /// token captured beforehand. The server call is best effort.
    ///
    /// # Errors
    /// Returns a storage error if the stored credential could not be removed;
    /// the in-memory session is anonymous either way.
    pub async fn logout(&self) -> Result<()> {
        let _guard = self.session.begin(Operation::Logout);
        let token = self.session.token();
        let cleared = self.session.clear();
        info!("logged out");

        if let Some(token) = token {
            self.notify_logout(token).await;
        }
        cleared
    }

    /// [`Self::logout`] followed by a redirect to the login route.
    ///
    /// # Errors
    /// Same as [`Self::logout`].
    pub async fn logout_to_login(&self) -> Result<()> {
        let result = self.logout().await;
        self.api.navigate(Route::Login);
        result
    }

    async fn notify_logout(&self, token: SecretString) {
        let result: Result<Value> = self
            .api
            .post_empty(LOGOUT_PATH, &RequestOptions::with_bearer(token))
            .await;
        if let Err(err) = result {
            warn!("logout request failed: {}", err);
        }
    }

    /// Creates an account. A session is established only when the server
    /// returns both a token and a user; otherwise the caller must log in.
    ///
    /// # Errors
    /// Returns the request error, recorded as the last error.
    pub async fn register<R>(&self, data: &R) -> Result<Registration>
    where
        R: Serialize + ?Sized,
    {
        let guard = self.session.begin(Operation::Register);
        let result = self.perform_register(data, guard.generation()).await;
        self.settle(&guard, result)
    }

    async fn perform_register<R>(&self, data: &R, generation: u64) -> Result<Registration>
    where
        R: Serialize + ?Sized,
    {
        let response: SessionResponse = self
            .api
            .post(REGISTER_PATH, data, &RequestOptions::anonymous())
            .await?;

        let user = response.user.clone();
        match response.into_session() {
            Some(session) => {
                let user = self.activate(generation, session)?;
                Ok(Registration {
                    user: Some(user),
                    session_established: true,
                })
            }
            None => {
                debug!("registration returned no token, login required");
                Ok(Registration {
                    user,
                    session_established: false,
                })
            }
        }
    }

    /// Swaps the token for a fresh one, keeping the user. Any failure ends the
    /// session.
    ///
    /// # Errors
    /// - `Authentication` when there is no session to refresh; nothing changes.
    /// - `Protocol` if the response has no token, and any request error. The
    ///   session is cleared in both cases.
    pub async fn refresh_token(&self) -> Result<()> {
        let Some(previous) = self.session.active_token() else {
            return Err(Error::Authentication {
                message: "No active session to refresh".to_string(),
            });
        };

        let guard = self.session.begin(Operation::Refresh);
        match self.perform_refresh(&previous, guard.generation()).await {
            Ok(()) => Ok(()),
            Err(Error::Superseded) => Err(Error::Superseded),
            Err(err) => {
                warn!("token refresh failed: {}", err);
                if let Err(clear_err) = self.session.invalidate(&previous, &err.to_string()) {
                    warn!("failed to clear credential: {}", clear_err);
                }
                Err(err)
            }
        }
    }

    async fn perform_refresh(&self, previous: &SecretString, generation: u64) -> Result<()> {
        let response: RefreshResponse = self
            .api
            .post_empty(REFRESH_PATH, &RequestOptions::with_bearer(previous.clone()))
            .await?;

        let token = response
            .token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::Protocol("Refresh response is missing the token".to_string()))?;

        self.session.replace_token(
            generation,
            previous,
            SecretString::from(token),
            expiry_from(response.expires_in),
        )?;
        debug!("token refreshed");
        Ok(())
    }

    /// True when the token expires within five minutes.
    #[must_use]
    pub fn should_refresh(&self) -> bool {
        self.session.snapshot().should_refresh_at(Utc::now())
    }

    /// Sends a partial profile and stores the returned user. Role and
    /// abilities survive unless the response carries new ones.
    ///
    /// # Errors
    /// `Authentication` without a session, otherwise the request error.
    pub async fn update_profile<P>(&self, data: &P) -> Result<User>
    where
        P: Serialize + ?Sized,
    {
        let token = self.require_session()?;

        let guard = self.session.begin(Operation::UpdateProfile);
        let result = async {
            let payload: UserPayload = self
                .api
                .put(PROFILE_PATH, data, &RequestOptions::with_bearer(token.clone()))
                .await?;
            let (user, abilities) = payload.into_parts();
            self.session
                .replace_user(guard.generation(), &token, user, abilities)
        }
        .await;
        self.settle(&guard, result)
    }

    /// Confirms the optimistic session against `GET me` and refreshes the user
    /// and abilities. A `401` ends the session through the response hook;
    /// other failures leave it in place.
    ///
    /// # Errors
    /// `Authentication` without a session, otherwise the request error.
    pub async fn revalidate(&self) -> Result<User> {
        let token = self.require_session()?;

        let guard = self.session.begin(Operation::Revalidate);
        let result = async {
            let payload: UserPayload = self
                .api
                .get(ME_PATH, &RequestOptions::with_bearer(token.clone()))
                .await?;
            let (user, abilities) = payload.into_parts();
            self.session
                .replace_user(guard.generation(), &token, user, abilities)
        }
        .await;
        self.settle(&guard, result)
    }

    /// The active token, captured before a request so its result can be
    /// matched against the session it was sent for.
    fn require_session(&self) -> Result<SecretString> {
        match self.session.active_token() {
            Some(token) if self.session.snapshot().is_authenticated() => Ok(token),
            _ => Err(Error::Authentication {
                message: "Not logged in".to_string(),
            }),
        }
    }

    fn activate(&self, generation: u64, session: NewSession) -> Result<User> {
        self.session.establish(
            generation,
            session.token,
            session.user.clone(),
            session.abilities,
            session.expires_at,
        )?;
        Ok(session.user)
    }

    /// Records failures that belong in `last_error`.
    fn settle<T>(&self, guard: &OperationGuard, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            debug!("{:?} failed: {}", guard.operation(), err);
            if err.records_last_error() {
                self.session.record_error(guard.generation(), err.to_string());
            }
        }
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        api::NoopNavigator,
        config::ApiConfig,
        error::ErrorKind,
        session::{Abilities, Role},
    };
    use secrecy::ExposeSecret;
    use serde_json::json;
    use std::{net::TcpListener, sync::Arc, time::Duration};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn service(server: &MockServer) -> AuthService {
        let session = SessionStore::in_memory();
        let config = ApiConfig::new(&server.uri()).unwrap();
        let api = ApiClient::new(&config, session.clone(), Arc::new(NoopNavigator)).unwrap();
        AuthService::new(api, session)
    }

    fn credentials() -> Credentials {
        Credentials::new("ada@example.com", SecretString::from("pw".to_string()))
    }

    fn establish(service: &AuthService, token: &str, user: User) {
        let guard = service.session.begin(Operation::Login);
        service
            .session
            .establish(
                guard.generation(),
                SecretString::from(token.to_string()),
                user,
                Abilities::new(),
                None,
            )
            .unwrap();
    }

    #[tokio::test]
    async fn login_establishes_session() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(json!({"email": "ada@example.com", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "T1",
                "user": {"id": 1, "role": "admin"},
                "abilities": {"edit": true},
                "expiresIn": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = service(&server);
        let user = service.login(&credentials()).await.unwrap();
        assert_eq!(user.role(), Some(Role::Admin));

        let snapshot = service.session().snapshot();
        assert!(snapshot.is_authenticated());
        assert!(snapshot.is_admin());
        assert!(snapshot.can("edit"));
        assert!(!snapshot.is_loading());
        assert!(snapshot.expires_at().is_some());
        assert!(!service.should_refresh());

        let stored = service.session().credentials().load().unwrap().unwrap();
        assert_eq!(stored.token.expose_secret(), "T1");
    }

    #[tokio::test]
    async fn invalid_input_sends_nothing() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let service = service(&server);
        let bad = Credentials::new("", SecretString::from("pw".to_string()));
        let err = service.login(&bad).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(service.session().snapshot().last_error().is_none());
    }

    #[tokio::test]
    async fn login_without_token_is_protocol_error() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user": {"id": 1}})))
            .mount(&server)
            .await;

        let service = service(&server);
        let err = service.login(&credentials()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);

        let snapshot = service.session().snapshot();
        assert!(!snapshot.is_authenticated());
        assert!(snapshot.last_error().is_none());
        assert!(!service.session().credentials().is_present().unwrap());
    }

    #[tokio::test]
    async fn rejected_login_records_error() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(path("/auth/login"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid credentials"})),
            )
            .mount(&server)
            .await;

        let service = service(&server);
        let err = service.login(&credentials()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);

        let snapshot = service.session().snapshot();
        assert!(!snapshot.is_authenticated());
        assert_eq!(
            snapshot.last_error(),
            Some("Authentication failed: Invalid credentials")
        );
    }

    #[tokio::test]
    async fn logout_clears_before_server_answers() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/logout"))
            .and(header("Authorization", "Bearer T1"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let service = service(&server);
        establish(&service, "T1", User::new(1));

        service.logout().await.unwrap();
        let snapshot = service.session().snapshot();
        assert!(!snapshot.is_authenticated());
        assert!(service.session().token().is_none());
        assert!(!service.session().credentials().is_present().unwrap());
    }

    #[tokio::test]
    async fn register_without_token_requires_login() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(path("/auth/register"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"user": {"id": 7, "name": "Ada"}})),
            )
            .mount(&server)
            .await;

        let service = service(&server);
        let registration = service
            .register(&json!({"name": "Ada", "email": "ada@example.com", "password": "pw"}))
            .await
            .unwrap();
        assert!(!registration.session_established);
        assert_eq!(registration.user.unwrap().id, 7.into());
        assert!(!service.session().snapshot().is_authenticated());
    }

    #[tokio::test]
    async fn register_with_token_logs_in() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(path("/auth/register"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "token": "T9",
                "user": {"id": 9}
            })))
            .mount(&server)
            .await;

        let service = service(&server);
        let registration = service.register(&json!({"name": "Ada"})).await.unwrap();
        assert!(registration.session_established);
        assert_eq!(service.session().token().unwrap().expose_secret(), "T9");
    }

    #[tokio::test]
    async fn refresh_replaces_token() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .and(header("Authorization", "Bearer T1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"token": "T2", "expiresIn": 60})),
            )
            .mount(&server)
            .await;

        let service = service(&server);
        establish(&service, "T1", User::new(1).with_role("manager"));

        service.refresh_token().await.unwrap();
        let snapshot = service.session().snapshot();
        assert!(snapshot.is_admin());
        assert_eq!(service.session().token().unwrap().expose_secret(), "T2");
        assert!(service.should_refresh());
    }

    #[tokio::test]
    async fn refresh_failure_logs_out() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let service = service(&server);
        establish(&service, "T1", User::new(1));

        let err = service.refresh_token().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(!service.session().snapshot().is_authenticated());
        assert!(!service.session().credentials().is_present().unwrap());
    }

    #[tokio::test]
    async fn refresh_without_session_changes_nothing() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        let service = service(&server);

        let err = service.refresh_token().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert!(service.session().snapshot().last_error().is_none());
    }

    #[tokio::test]
    async fn update_profile_keeps_role() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/user/profile"))
            .and(body_json(json!({"name": "Ada L."})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"user": {"id": 1, "name": "Ada L."}})),
            )
            .mount(&server)
            .await;

        let service = service(&server);
        establish(&service, "T1", User::new(1).with_role("admin"));

        let user = service
            .update_profile(&json!({"name": "Ada L."}))
            .await
            .unwrap();
        assert_eq!(user.name.as_deref(), Some("Ada L."));
        assert!(service.session().snapshot().is_admin());

        let stored = service.session().credentials().load().unwrap().unwrap();
        assert_eq!(stored.user.name.as_deref(), Some("Ada L."));
    }

    #[tokio::test]
    async fn revalidate_keeps_session_on_server_error() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(path("/me"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let service = service(&server);
        establish(&service, "T1", User::new(1));

        let err = service.revalidate().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Server);
        let snapshot = service.session().snapshot();
        assert!(snapshot.is_authenticated());
        assert!(snapshot.last_error().is_some());
    }

    #[tokio::test]
    async fn revalidate_replaces_abilities() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(path("/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": {"id": 1, "email": "ada@example.com"},
                "abilities": {"locations.edit": true}
            })))
            .mount(&server)
            .await;

        let service = service(&server);
        establish(&service, "T1", User::new(1));

        let user = service.revalidate().await.unwrap();
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
        assert!(service.session().snapshot().can("locations.edit"));
    }

    #[tokio::test]
    async fn protocol_failure_keeps_previous_error() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(path("/auth/login"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid credentials"})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user": {"id": 1}})))
            .mount(&server)
            .await;

        let service = service(&server);
        service.login(&credentials()).await.unwrap_err();
        let err = service.login(&credentials()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(
            service.session().snapshot().last_error(),
            Some("Authentication failed: Invalid credentials")
        );
    }

    #[tokio::test]
    async fn late_login_after_logout_is_discarded() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"token": "T1", "user": {"id": 1}}))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;

        let service = service(&server);
        let pending = tokio::spawn({
            let service = service.clone();
            async move { service.login(&credentials()).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(service.session().snapshot().is_loading());

        service.logout().await.unwrap();
        let err = pending.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Superseded);

        let snapshot = service.session().snapshot();
        assert!(!snapshot.is_authenticated());
        assert!(!snapshot.is_loading());
        assert!(service.session().token().is_none());
        assert!(!service.session().credentials().is_present().unwrap());
    }

    #[tokio::test]
    async fn late_revalidate_after_relogin_is_discarded() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .and(header("Authorization", "Bearer T1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"user": {"id": 1, "role": "admin"}}))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "T2",
                "user": {"id": 2, "role": "customer"}
            })))
            .mount(&server)
            .await;

        let service = service(&server);
        establish(&service, "T1", User::new(1).with_role("admin"));

        let pending = tokio::spawn({
            let service = service.clone();
            async move { service.revalidate().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        service.login(&credentials()).await.unwrap();

        let err = pending.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Superseded);

        let snapshot = service.session().snapshot();
        assert_eq!(snapshot.user().unwrap().id, 2.into());
        assert!(!snapshot.is_admin());
        assert_eq!(service.session().token().unwrap().expose_secret(), "T2");

        let stored = service.session().credentials().load().unwrap().unwrap();
        assert_eq!(stored.user.id, 2.into());
        assert_eq!(stored.token.expose_secret(), "T2");
    }

    #[tokio::test]
    async fn late_profile_update_after_relogin_is_discarded() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/user/profile"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"user": {"id": 1, "name": "Ada", "role": "manager"}}))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "T2",
                "user": {"id": 2, "name": "Grace"}
            })))
            .mount(&server)
            .await;

        let service = service(&server);
        establish(&service, "T1", User::new(1).with_role("manager"));

        let pending = tokio::spawn({
            let service = service.clone();
            async move { service.update_profile(&json!({"name": "Ada"})).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        service.login(&credentials()).await.unwrap();

        let err = pending.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Superseded);

        let user = service.session().snapshot().user().cloned().unwrap();
        assert_eq!(user.id, 2.into());
        assert_eq!(user.name.as_deref(), Some("Grace"));
        assert!(!service.session().snapshot().is_admin());
    }

    #[tokio::test]
    async fn overlapping_logins_stay_loading_until_both_settle() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(path("/auth/login"))
            .and(body_json(json!({"email": "ada@example.com", "password": "pw"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"token": "T1", "user": {"id": 1}}))
                    .set_delay(Duration::from_millis(100)),
            )
            .mount(&server)
            .await;
        Mock::given(path("/auth/login"))
            .and(body_json(json!({"email": "grace@example.com", "password": "pw"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"token": "T2", "user": {"id": 2}}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let service = service(&server);
        let first = tokio::spawn({
            let service = service.clone();
            async move { service.login(&credentials()).await }
        });
        let second = tokio::spawn({
            let service = service.clone();
            async move {
                let grace =
                    Credentials::new("grace@example.com", SecretString::from("pw".to_string()));
                service.login(&grace).await
            }
        });

        first.await.unwrap().unwrap();
        let snapshot = service.session().snapshot();
        assert!(snapshot.is_loading());
        assert_eq!(snapshot.user().unwrap().id, 1.into());

        second.await.unwrap().unwrap();
        let snapshot = service.session().snapshot();
        assert!(!snapshot.is_loading());
        assert_eq!(snapshot.user().unwrap().id, 2.into());
        assert_eq!(service.session().token().unwrap().expose_secret(), "T2");
    }
}
