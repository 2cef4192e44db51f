//! The shared request pipeline. Every call goes through the same two hooks:
//! before sending, the active bearer token is attached; after receiving, the
//! status is classified and auth failures are handled here, once, for every
//! caller. A `401` for the active token clears the session no matter which
//! request triggered it.

use super::classify::{classify, error_message, Navigator, Route};
use crate::{
    config::ApiConfig,
    error::{Error, ErrorKind, Result},
    session::SessionStore,
};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE},
    multipart::Form,
    Client, Method, Response,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, error, info_span, warn, Instrument};

/// Per-request adjustments.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    /// Send without the session's bearer token.
    pub anonymous: bool,
    /// Send with this token instead of the session's.
    pub bearer: Option<SecretString>,
}

impl RequestOptions {
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            anonymous: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_bearer(token: SecretString) -> Self {
        Self {
            bearer: Some(token),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

pub(super) enum Payload {
    Empty,
    Json(String),
    Multipart(Form),
}

struct Inner {
    http: Client,
    config: ApiConfig,
    session: SessionStore,
    navigator: Arc<dyn Navigator>,
}

#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.config.base_url.as_str())
            .field("timeout", &self.inner.config.timeout)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// # Errors
    /// Returns `Config` if the HTTP client cannot be built.
    pub fn new(
        config: &ApiConfig,
        session: SessionStore,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static("x-requested-with"),
            HeaderValue::from_static("XMLHttpRequest"),
        );

        let http = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|err| Error::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                config: config.clone(),
                session,
                navigator,
            }),
        })
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Forwards a route to the host navigator.
    pub fn navigate(&self, route: Route) {
        self.inner.navigator.navigate(route);
    }

    /// # Errors
    /// Returns the classified error for a failed request or an undecodable body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, options: &RequestOptions) -> Result<T> {
        let response = self.send(Method::GET, path, Payload::Empty, options).await?;
        decode(response).await
    }

    /// # Errors
    /// Returns the classified error for a failed request or an undecodable body.
    pub async fn post<B, T>(&self, path: &str, body: &B, options: &RequestOptions) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send(Method::POST, path, json_payload(body)?, options)
            .await?;
        decode(response).await
    }

    /// POST without a body.
    ///
    /// # Errors
    /// Returns the classified error for a failed request or an undecodable body.
    pub async fn post_empty<T: DeserializeOwned>(
        &self,
        path: &str,
        options: &RequestOptions,
    ) -> Result<T> {
        let response = self.send(Method::POST, path, Payload::Empty, options).await?;
        decode(response).await
    }

    /// # Errors
    /// Returns the classified error for a failed request or an undecodable body.
    pub async fn put<B, T>(&self, path: &str, body: &B, options: &RequestOptions) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send(Method::PUT, path, json_payload(body)?, options)
            .await?;
        decode(response).await
    }

    /// # Errors
    /// Returns the classified error for a failed request or an undecodable body.
    pub async fn patch<B, T>(&self, path: &str, body: &B, options: &RequestOptions) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send(Method::PATCH, path, json_payload(body)?, options)
            .await?;
        decode(response).await
    }

    /// # Errors
    /// Returns the classified error for a failed request or an undecodable body.
    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        options: &RequestOptions,
    ) -> Result<T> {
        let response = self
            .send(Method::DELETE, path, Payload::Empty, options)
            .await?;
        decode(response).await
    }

    pub(super) async fn send(
        &self,
        method: Method,
        path: &str,
        payload: Payload,
        options: &RequestOptions,
    ) -> Result<Response> {
        let url = self.inner.config.endpoint(path)?;
        let token = self.bearer_for(options);

        let mut builder = self.inner.http.request(method.clone(), url);
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(token) = &token {
            builder = builder.bearer_auth(token.expose_secret());
        }
        builder = match payload {
            Payload::Empty => builder,
            Payload::Json(body) => builder.body(body),
            Payload::Multipart(form) => builder.multipart(form),
        };

        debug!("{} {}", method, path);
        let span = info_span!(
            "api.request",
            http.method = %method,
            path = %path,
            authenticated = token.is_some()
        );
        let result = builder.send().instrument(span).await;

        self.intercept(result, token.as_ref()).await
    }

    /// Pre-request hook: the token to attach, if any.
    fn bearer_for(&self, options: &RequestOptions) -> Option<SecretString> {
        if options.anonymous {
            return None;
        }
        options
            .bearer
            .clone()
            .or_else(|| self.inner.session.active_token())
    }

    /// Post-response hook: passes success through, reacts to failures.
    async fn intercept(
        &self,
        result: reqwest::Result<Response>,
        token: Option<&SecretString>,
    ) -> Result<Response> {
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                let err = map_request_error(&err);
                error!("{}", err);
                return Err(err);
            }
        };

        let status = response.status();
        let Some(kind) = classify(status) else {
            return Ok(response);
        };

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);

        match kind {
            ErrorKind::Authentication => {
                // Only a rejected active token ends the session; anonymous
                // calls such as login just fail.
                if let Some(token) = token {
                    match self
                        .inner
                        .session
                        .invalidate(token, "Session expired or revoked")
                    {
                        Ok(true) => self.inner.navigator.navigate(Route::Login),
                        Ok(false) => {}
                        Err(err) => {
                            warn!("failed to clear credential after 401: {}", err);
                            self.inner.navigator.navigate(Route::Login);
                        }
                    }
                }
            }
            ErrorKind::Authorization | ErrorKind::NotFound => {
                if let Some(route) = Route::for_kind(kind) {
                    self.inner.navigator.navigate(route);
                }
            }
            ErrorKind::Server => error!("server error {}: {}", status, message),
            _ => debug!("request rejected {}: {}", status, message),
        }

        Err(Error::from_status(status.as_u16(), message))
    }
}

fn json_payload<B: Serialize + ?Sized>(body: &B) -> Result<Payload> {
    serde_json::to_string(body)
        .map(Payload::Json)
        .map_err(|err| Error::Validation(format!("Failed to encode request: {err}")))
}

/// Decodes a JSON body. An empty body reads as `null`, so `()` and `Option<T>`
/// work for endpoints that answer with no content.
pub(super) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|err| Error::Network(format!("Failed to read response: {err}")))?;

    let body: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        &bytes
    };

    serde_json::from_slice(body)
        .map_err(|err| Error::Protocol(format!("Failed to decode response: {err}")))
}

/// Maps transport failures (no response received) into errors.
fn map_request_error(err: &reqwest::Error) -> Error {
    if err.is_builder() {
        Error::Config(format!("Failed to build request: {err}"))
    } else if err.is_timeout() {
        Error::Network("Request timed out. Please try again.".to_string())
    } else {
        Error::Network(format!("Unable to reach the server: {err}"))
    }
}
