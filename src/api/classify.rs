//! Pure response classification and the navigation seam the host provides.
//! Keeping the status mapping free of side effects lets the reaction (logout,
//! redirect) be tested without a router.

use crate::error::ErrorKind;
use reqwest::StatusCode;
use serde_json::Value;

/// Maximum number of error body characters surfaced to callers.
const MAX_ERROR_CHARS: usize = 200;

/// Maps a status to the error kind it represents; `None` for success.
#[must_use]
pub fn classify(status: StatusCode) -> Option<ErrorKind> {
    if status.is_success() {
        return None;
    }

    Some(match status.as_u16() {
        401 => ErrorKind::Authentication,
        403 => ErrorKind::Authorization,
        404 => ErrorKind::NotFound,
        code if code >= 500 => ErrorKind::Server,
        _ => ErrorKind::Rejected,
    })
}

/// Where the host should send the user after a failed request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Login,
    Forbidden,
    NotFound,
}

impl Route {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::Forbidden => "/forbidden",
            Self::NotFound => "/not-found",
        }
    }

    /// Route the host should show for an error kind, if any.
    #[must_use]
    pub const fn for_kind(kind: ErrorKind) -> Option<Self> {
        match kind {
            ErrorKind::Authentication => Some(Self::Login),
            ErrorKind::Authorization => Some(Self::Forbidden),
            ErrorKind::NotFound => Some(Self::NotFound),
            _ => None,
        }
    }
}

/// Navigation side effect injected by the host application.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Navigator for hosts without routes.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, _route: Route) {}
}

/// Extracts a user-facing message from an error body: the JSON `message`
/// field when present, otherwise the trimmed and truncated text.
#[must_use]
pub fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let message = value
            .get("message")
            .or_else(|| value.get("error"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|message| !message.is_empty());
        if let Some(message) = message {
            return message.chars().take(MAX_ERROR_CHARS).collect();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}
