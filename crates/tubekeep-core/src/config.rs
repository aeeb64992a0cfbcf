//! Playlist service configuration.
//!
//! Holds the YouTube credentials and the tunables for caching, duplicate
//! detection and credential rotation. The embedding application decides
//! where the values live on disk.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CACHE_TTL;
use crate::duplicate::DEFAULT_TITLE_THRESHOLD;
use crate::error::{Error, Result};
use crate::token::{DEFAULT_ROTATION_INTERVAL, MAX_ROTATION_INTERVAL};

/// Default cache lifetime in minutes.
pub const DEFAULT_CACHE_MINUTES: i64 = 10;

/// Longest cache lifetime in minutes (one week); larger values are clamped.
pub const MAX_CACHE_MINUTES: i64 = 7 * 24 * 60;

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Longest per-request timeout in seconds (one day); larger values are clamped.
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Configuration for the playlist service.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// OAuth client ID.
    #[serde(default)]
    pub client_id: String,
    /// OAuth client secret.
    #[serde(default)]
    pub client_secret: String,
    /// Long-lived refresh credential.
    #[serde(default)]
    pub refresh_token: String,
    /// Channel the credentials belong to. Informational only.
    #[serde(default)]
    pub default_channel_id: String,
    /// Cache lifetime in minutes. Zero or negative uses the default.
    #[serde(default = "default_cache_minutes")]
    pub cache_minutes: i64,
    /// Fraction of title length two titles may differ by and still match.
    #[serde(default = "default_title_threshold")]
    pub duplicate_title_threshold: f64,
    /// Seconds between scheduled credential rotations.
    #[serde(default = "default_rotation_interval_secs")]
    pub rotation_interval_secs: u64,
    /// Timeout applied to each request by the embedding application.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

const fn default_cache_minutes() -> i64 {
    DEFAULT_CACHE_MINUTES
}

const fn default_title_threshold() -> f64 {
    DEFAULT_TITLE_THRESHOLD
}

const fn default_rotation_interval_secs() -> u64 {
    DEFAULT_ROTATION_INTERVAL.as_secs()
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            default_channel_id: String::new(),
            cache_minutes: DEFAULT_CACHE_MINUTES,
            duplicate_title_threshold: DEFAULT_TITLE_THRESHOLD,
            rotation_interval_secs: DEFAULT_ROTATION_INTERVAL.as_secs(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &redacted(&self.client_secret))
            .field("refresh_token", &redacted(&self.refresh_token))
            .field("default_channel_id", &self.default_channel_id)
            .field("cache_minutes", &self.cache_minutes)
            .field("duplicate_title_threshold", &self.duplicate_title_threshold)
            .field("rotation_interval_secs", &self.rotation_interval_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

const fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() { "" } else { "<redacted>" }
}

impl ServiceConfig {
    /// Create a config with the given credentials and default tunables.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
            ..Self::default()
        }
    }

    /// Set the cache lifetime in minutes.
    #[must_use]
    pub const fn with_cache_minutes(mut self, minutes: i64) -> Self {
        self.cache_minutes = minutes;
        self
    }

    /// Set the duplicate-title threshold.
    #[must_use]
    pub const fn with_title_threshold(mut self, threshold: f64) -> Self {
        self.duplicate_title_threshold = threshold;
        self
    }

    /// Set the rotation interval.
    #[must_use]
    pub const fn with_rotation_interval(mut self, interval: Duration) -> Self {
        self.rotation_interval_secs = interval.as_secs();
        self
    }

    /// Check that every credential is present.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&'static str> = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("refresh_token", &self.refresh_token),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::ConfigIncomplete(missing))
        }
    }

    /// Whether the OAuth client half of the credentials is present.
    #[must_use]
    pub fn has_client(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.trim().is_empty()
    }

    /// Effective cache lifetime, clamped to [`MAX_CACHE_MINUTES`].
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        if self.cache_minutes <= 0 {
            DEFAULT_CACHE_TTL
        } else if self.cache_minutes > MAX_CACHE_MINUTES {
            Duration::from_secs(MAX_CACHE_MINUTES as u64 * 60)
        } else {
            Duration::from_secs(self.cache_minutes as u64 * 60)
        }
    }

    /// Effective rotation interval. Zero uses the default.
    #[must_use]
    pub const fn rotation_interval(&self) -> Duration {
        if self.rotation_interval_secs == 0 {
            DEFAULT_ROTATION_INTERVAL
        } else if self.rotation_interval_secs > MAX_ROTATION_INTERVAL.as_secs() {
            MAX_ROTATION_INTERVAL
        } else {
            Duration::from_secs(self.rotation_interval_secs)
        }
    }

    /// Effective per-request timeout. Zero uses the default.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        if self.request_timeout_secs == 0 {
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        } else if self.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS {
            Duration::from_secs(MAX_REQUEST_TIMEOUT_SECS)
        } else {
            Duration::from_secs(self.request_timeout_secs)
        }
    }
}
