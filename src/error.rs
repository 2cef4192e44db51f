use crate::storage::StorageError;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Authentication failed: {message}")]
    Authentication { message: String },
    #[error("Forbidden: {message}")]
    Authorization { message: String },
    #[error("Not found: {message}")]
    NotFound { message: String },
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("Request failed ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Response error: {0}")]
    Protocol(String),
    #[error("Session attempt superseded")]
    Superseded,
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Config error: {0}")]
    Config(String),
}

/// Error category, independent of the payload carried by [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Server,
    Rejected,
    Network,
    Protocol,
    Superseded,
    Storage,
    Config,
}

impl Error {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::Authorization { .. } => ErrorKind::Authorization,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Server { .. } => ErrorKind::Server,
            Self::Rejected { .. } => ErrorKind::Rejected,
            Self::Network(_) => ErrorKind::Network,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Superseded => ErrorKind::Superseded,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Builds the error for a non-success HTTP status.
    #[must_use]
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => Self::Authentication { message },
            403 => Self::Authorization { message },
            404 => Self::NotFound { message },
            500..=u16::MAX => Self::Server { status, message },
            _ => Self::Rejected { status, message },
        }
    }

    /// Whether this failure should be recorded as the session's last error.
    /// Local validation and malformed responses never touch session state.
    #[must_use]
    pub const fn records_last_error(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::Protocol | ErrorKind::Superseded
        )
    }
}
