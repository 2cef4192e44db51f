//! Client configuration: API base URL, request timeout, and where the session
//! file lives. Defaults can be overridden from the environment (and by the CLI
//! flags that map onto the same variables). Blank values count as unset.
//! Configuration values are public; do not store secrets here.

use crate::{
    error::{Error, Result},
    APP_USER_AGENT,
};
use std::{env, path::PathBuf, time::Duration};
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

pub const ENV_API_URL: &str = "SESAME_API_URL";
pub const ENV_API_TIMEOUT: &str = "SESAME_API_TIMEOUT";
pub const ENV_STORAGE_PATH: &str = "SESAME_STORAGE_PATH";

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: Url,
    pub timeout: Duration,
    pub user_agent: String,
}

impl ApiConfig {
    /// Builds a config for `base_url` with the default timeout.
    ///
    /// # Errors
    /// Returns `Config` if the URL is invalid or not http(s).
    pub fn new(base_url: &str) -> Result<Self> {
        parse_base_url(base_url).map(Self::from_url)
    }

    #[must_use]
    pub fn from_url(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            user_agent: APP_USER_AGENT.to_string(),
        }
    }

    /// Defaults overridden by `SESAME_API_URL` and `SESAME_API_TIMEOUT`.
    ///
    /// # Errors
    /// Returns `Config` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self> {
        let overrides = Overrides {
            api_base_url: env::var(ENV_API_URL).ok().as_deref().and_then(normalize_value),
            timeout_seconds: env::var(ENV_API_TIMEOUT)
                .ok()
                .as_deref()
                .and_then(normalize_value),
        };

        let mut config = Self::new(DEFAULT_API_BASE_URL)?;
        apply_overrides(&mut config, overrides)?;
        Ok(config)
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolves `path` below the base URL.
    ///
    /// # Errors
    /// Returns `Config` if the joined URL is invalid.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let path = path.trim().trim_start_matches('/');
        self.base_url
            .join(path)
            .map_err(|err| Error::Config(format!("invalid request path {path}: {err}")))
    }
}

#[derive(Default)]
struct Overrides {
    api_base_url: Option<String>,
    timeout_seconds: Option<String>,
}

fn apply_overrides(config: &mut ApiConfig, overrides: Overrides) -> Result<()> {
    if let Some(value) = overrides.api_base_url {
        config.base_url = parse_base_url(&value)?;
    }
    if let Some(value) = overrides.timeout_seconds {
        let seconds = value
            .parse::<u64>()
            .map_err(|_| Error::Config(format!("invalid timeout: {value}")))?;
        config.timeout = Duration::from_secs(seconds);
    }
    Ok(())
}

fn normalize_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parses the API base and forces a trailing slash so relative paths join
/// below it instead of replacing its last segment.
///
/// # Errors
/// Returns `Config` if the URL is invalid or not http(s).
pub fn parse_base_url(value: &str) -> Result<Url> {
    let trimmed = value.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };

    let url = Url::parse(&with_slash)
        .map_err(|err| Error::Config(format!("invalid API base URL {trimmed}: {err}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(Error::Config(format!(
            "unsupported API base URL scheme: {scheme}"
        ))),
    }
}

/// `$SESAME_STORAGE_PATH`, else `$HOME/.sesame/session.json`, else a file in
/// the working directory.
#[must_use]
pub fn default_storage_path() -> PathBuf {
    if let Some(path) = env::var(ENV_STORAGE_PATH)
        .ok()
        .as_deref()
        .and_then(normalize_value)
    {
        return PathBuf::from(path);
    }

    env::var_os("HOME").map_or_else(
        || PathBuf::from(".sesame-session.json"),
        |home| PathBuf::from(home).join(".sesame").join("session.json"),
    )
}
