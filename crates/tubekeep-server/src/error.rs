//! Server error types.

use thiserror::Error;

use crate::additions::AdditionsError;
use crate::config::ConfigError;
use crate::logging::LoggingError;

/// Errors that stop the server or one of its one-shot commands.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration file problem.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging could not be initialized.
    #[error(transparent)]
    Logging(#[from] LoggingError),

    /// Additions store problem.
    #[error(transparent)]
    Additions(#[from] AdditionsError),

    /// Engine failure.
    #[error(transparent)]
    Core(#[from] tubekeep_core::Error),

    /// The OAuth client ID or secret is not configured.
    #[error("client_id and client_secret must be set in {0}")]
    MissingClient(String),

    /// The token endpoint answered without a refresh token.
    #[error("Token response did not include a refresh token; revoke access and retry")]
    NoRefreshToken,

    /// Listener or socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
