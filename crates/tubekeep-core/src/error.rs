//! Error types for Tubekeep core operations.
//!
//! Every fallible operation returns [`Result`]. Remote failures are grouped
//! under [`RemoteError`] so callers can tell a typed miss (`PlaylistNotFound`,
//! `VideoNotFound`) apart from an unreachable catalog. Use [`Error::kind`] to
//! classify an error without matching every variant.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Tubekeep core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Required credentials are missing from the configuration.
    #[error("YouTube configuration is incomplete: missing {}", .0.join(", "))]
    ConfigIncomplete(Vec<&'static str>),

    /// The remote catalog or token endpoint failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// No cached playlist matches the requested name.
    #[error("Playlist not found: {0}")]
    PlaylistNotFound(String),

    /// The remote catalog has no video with this identifier.
    #[error("Video not found: {0}")]
    VideoNotFound(String),

    /// The video reference could not be parsed into a canonical identifier.
    #[error("Invalid video reference: {0}")]
    InvalidReference(String),

    /// The playlist name is empty or otherwise unusable.
    #[error("Invalid playlist name: {0}")]
    InvalidPlaylistName(String),

    /// The privacy level is not one the catalog accepts.
    #[error("Invalid privacy level: {0}")]
    InvalidPrivacy(String),

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// The caller's deadline elapsed before the operation finished.
    #[error("Deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures while talking to the remote catalog or the token endpoint.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The request never produced a response.
    #[error("Request to {endpoint} failed: {reason}")]
    Transport {
        /// Endpoint that was called.
        endpoint: String,
        /// Underlying transport error.
        reason: String,
    },

    /// The remote API answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}: {message}")]
    Api {
        /// Endpoint that was called.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Error body or message reported by the API.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("Unexpected response from {endpoint}: {reason}")]
    Decode {
        /// Endpoint that was called.
        endpoint: String,
        /// Decoding failure.
        reason: String,
    },

    /// The refresh credential could not be exchanged for an access token.
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing credentials; fatal at construction.
    ConfigIncomplete,
    /// Network or remote API failure.
    RemoteUnavailable,
    /// Playlist or video absent.
    NotFound,
    /// Caller input rejected before any remote call.
    InvalidInput,
    /// Cancelled or timed out by the caller.
    Cancelled,
    /// Anything else.
    Internal,
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigIncomplete(_) => ErrorKind::ConfigIncomplete,
            Self::Remote(_) => ErrorKind::RemoteUnavailable,
            Self::PlaylistNotFound(_) | Self::VideoNotFound(_) => ErrorKind::NotFound,
            Self::InvalidReference(_) | Self::InvalidPlaylistName(_) | Self::InvalidPrivacy(_) => {
                ErrorKind::InvalidInput
            }
            Self::Cancelled | Self::DeadlineExceeded(_) => ErrorKind::Cancelled,
            Self::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error is a typed miss rather than a failure.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound)
    }
}

impl RemoteError {
    /// Build a transport error from a `reqwest` failure.
    pub(crate) fn transport(endpoint: &str, err: &reqwest::Error) -> Self {
        Self::Transport {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        }
    }

    /// Build a decode error.
    pub(crate) fn decode(endpoint: &str, reason: impl std::fmt::Display) -> Self {
        Self::Decode {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }
}
