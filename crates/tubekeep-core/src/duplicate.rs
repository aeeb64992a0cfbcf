//! Duplicate detection for playlist additions.
//!
//! A candidate video is a duplicate of a playlist's content when its ID is
//! already a member, or when its title is within a fraction of its length
//! (edit distance) of any member's title.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::CacheStore;
use crate::catalog::CatalogClient;
use crate::context::CallContext;
use crate::error::{Error, Result};
use crate::similarity::{levenshtein, normalize};

/// Default title-similarity threshold: titles within 10% edit distance match.
pub const DEFAULT_TITLE_THRESHOLD: f64 = 0.1;

/// Why an addition was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicateReason {
    /// The video ID is already in the playlist.
    #[serde(rename = "duplicate by id")]
    ById,
    /// A member has a near-identical title.
    #[serde(rename = "duplicate by title")]
    ByTitle,
}

impl DuplicateReason {
    /// Human-readable reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ById => "duplicate by id",
            Self::ByTitle => "duplicate by title",
        }
    }
}

impl fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running the detector against a playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// The candidate is already effectively present.
    Duplicate(DuplicateReason),
    /// The candidate is new; carries its canonical title.
    Unique {
        /// Title fetched from the remote catalog.
        title: String,
    },
}

/// Identity and title-similarity checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicateDetector {
    threshold: f64,
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_TITLE_THRESHOLD,
        }
    }
}

impl DuplicateDetector {
    /// Create a detector with a custom threshold.
    ///
    /// Negative or non-finite thresholds fall back to [`DEFAULT_TITLE_THRESHOLD`].
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        if threshold.is_finite() && threshold >= 0.0 {
            Self { threshold }
        } else {
            Self::default()
        }
    }

    /// Configured threshold.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Whether two titles are near-identical after normalization.
    ///
    /// Lengths are counted in characters. Two empty titles never match.
    #[must_use]
    pub fn titles_match(&self, a: &str, b: &str) -> bool {
        let a = normalize(a);
        let b = normalize(b);
        let max_len = a.chars().count().max(b.chars().count());
        if max_len == 0 {
            return false;
        }
        levenshtein(&a, &b) as f64 <= self.threshold * max_len as f64
    }

    /// First existing title that matches `candidate`.
    pub fn find_similar_title<'a, I>(&self, candidate: &str, existing: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        existing
            .into_iter()
            .find(|title| self.titles_match(candidate, title))
    }

    /// Run both checks for `video_id` against a cached playlist.
    ///
    /// The identity check uses only the cache. The title check fetches the
    /// candidate's title, which fails with [`Error::VideoNotFound`] when the
    /// catalog does not know the video.
    pub async fn detect(
        &self,
        client: &dyn CatalogClient,
        ctx: &CallContext,
        cache: &CacheStore,
        playlist_id: &str,
        video_id: &str,
    ) -> Result<Detection> {
        if cache.contains_video(playlist_id, video_id).await {
            debug!("Video {} already in playlist {}", video_id, playlist_id);
            return Ok(Detection::Duplicate(DuplicateReason::ById));
        }

        let title = ctx
            .run(client.video_title(ctx, video_id))
            .await?
            .ok_or_else(|| Error::VideoNotFound(video_id.to_string()))?;

        let existing = cache.titles_in(playlist_id).await;
        let similar = self.find_similar_title(&title, existing.iter().map(String::as_str));
        if let Some(similar) = similar {
            debug!(
                "Video {} title '{}' matches existing '{}' in playlist {}",
                video_id, title, similar, playlist_id
            );
            return Ok(Detection::Duplicate(DuplicateReason::ByTitle));
        }

        Ok(Detection::Unique { title })
    }
}
