use super::navigator::TerminalNavigator;
use crate::{
    config::{default_storage_path, ApiConfig, DEFAULT_API_BASE_URL, DEFAULT_TIMEOUT_SECONDS},
    storage::{CredentialStore, FileStore},
    AppContext,
};
use anyhow::Result;
use std::{path::PathBuf, sync::Arc, time::Duration};

/// Settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub api_url: String,
    pub timeout: u64,
    pub storage_path: PathBuf,
}

impl Default for GlobalArgs {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL.to_string())
    }
}

impl GlobalArgs {
    #[must_use]
    pub fn new(api_url: String) -> Self {
        Self {
            api_url,
            timeout: DEFAULT_TIMEOUT_SECONDS,
            storage_path: default_storage_path(),
        }
    }

    /// # Errors
    /// Returns an error if the API URL is invalid.
    pub fn config(&self) -> Result<ApiConfig> {
        Ok(ApiConfig::new(&self.api_url)?.with_timeout(Duration::from_secs(self.timeout)))
    }

    /// Hydrates the session from the session file and wires the client.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the session file
    /// cannot be read.
    pub fn context(&self) -> Result<AppContext> {
        let credentials = CredentialStore::new(Arc::new(FileStore::new(self.storage_path.clone())));
        Ok(AppContext::new(
            &self.config()?,
            credentials,
            Arc::new(TerminalNavigator),
        )?)
    }
}
