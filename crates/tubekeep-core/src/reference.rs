//! Video reference parsing.
//!
//! Users hand us videos in several shapes. This module reduces all of them to
//! the canonical 11-character identifier.
//!
//! # Supported Formats
//!
//! - `dQw4w9WgXcQ` - bare identifier
//! - `https://youtu.be/dQw4w9WgXcQ` - short link
//! - `https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=...` - watch link
//! - `https://www.youtube.com/embed/dQw4w9WgXcQ` - embed link
//!
//! ```rust
//! use tubekeep_core::reference::extract_video_id;
//!
//! assert_eq!(
//!     extract_video_id("https://youtu.be/dQw4w9WgXcQ"),
//!     Some("dQw4w9WgXcQ".to_string())
//! );
//! assert_eq!(extract_video_id("not a video"), None);
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Length of a canonical video identifier.
pub const VIDEO_ID_LEN: usize = 11;

static BARE_ID: LazyLock<Regex> = LazyLock::new(|| compile(r"^[A-Za-z0-9_-]{11}$"));
static SHORT_LINK: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)^(?:https?://)?(?:www\.)?youtu\.be/([A-Za-z0-9_-]{11})"));
static WATCH_LINK: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)[?&]v=([A-Za-z0-9_-]{11})"));
static EMBED_LINK: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)/embed/([A-Za-z0-9_-]{11})"));

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static video reference pattern is valid")
}

/// The shape a video reference was given in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// Already a canonical identifier.
    BareId,
    /// `youtu.be/<id>`
    ShortLink,
    /// `youtube.com/watch?v=<id>`
    WatchLink,
    /// `youtube.com/embed/<id>`
    EmbedLink,
}

/// A parsed video reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoReference {
    /// Canonical video identifier.
    pub video_id: String,
    /// Shape the input was recognized as.
    pub kind: ReferenceKind,
}

impl VideoReference {
    /// Parse a user-supplied reference.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidReference`] when no identifier can be extracted.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if is_canonical_id(input) {
            return Ok(Self {
                video_id: input.to_string(),
                kind: ReferenceKind::BareId,
            });
        }

        let patterns = [
            (&*SHORT_LINK, ReferenceKind::ShortLink),
            (&*WATCH_LINK, ReferenceKind::WatchLink),
            (&*EMBED_LINK, ReferenceKind::EmbedLink),
        ];

        patterns
            .into_iter()
            .find_map(|(re, kind)| {
                re.captures(input).map(|caps| Self {
                    video_id: caps[1].to_string(),
                    kind,
                })
            })
            .ok_or_else(|| Error::InvalidReference(input.to_string()))
    }

    /// Watch URL for this video.
    #[must_use]
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

/// Whether `input` is already a canonical video identifier.
#[must_use]
pub fn is_canonical_id(input: &str) -> bool {
    BARE_ID.is_match(input)
}

/// Extract the canonical video identifier from `input`, if any.
#[must_use]
pub fn extract_video_id(input: &str) -> Option<String> {
    VideoReference::parse(input).ok().map(|r| r.video_id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_id_is_returned_unchanged() {
        let parsed = VideoReference::parse("dQw4w9WgXcQ").unwrap();
        assert_eq!(parsed.video_id, "dQw4w9WgXcQ");
        assert_eq!(parsed.kind, ReferenceKind::BareId);
    }

    #[test]
    fn test_bare_id_with_dash_and_underscore() {
        assert_eq!(extract_video_id("a-b_c-d_e-f"), Some("a-b_c-d_e-f".to_string()));
    }

    #[test]
    fn test_parsing_is_idempotent() {
        let once = extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        let twice = extract_video_id(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_short_link() {
        let parsed = VideoReference::parse("https://youtu.be/dQw4w9WgXcQ?t=42").unwrap();
        assert_eq!(parsed.video_id, "dQw4w9WgXcQ");
        assert_eq!(parsed.video_id.len(), VIDEO_ID_LEN);
        assert_eq!(parsed.kind, ReferenceKind::ShortLink);
    }

    #[test]
    fn test_short_link_without_scheme() {
        assert_eq!(
            extract_video_id("youtu.be/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_watch_link_with_playlist() {
        let parsed =
            VideoReference::parse("https://www.youtube.com/watch?list=PLtest&v=dQw4w9WgXcQ")
                .unwrap();
        assert_eq!(parsed.video_id, "dQw4w9WgXcQ");
        assert_eq!(parsed.kind, ReferenceKind::WatchLink);
    }

    #[test]
    fn test_embed_link() {
        let parsed = VideoReference::parse("https://www.youtube.com/embed/dQw4w9WgXcQ").unwrap();
        assert_eq!(parsed.video_id, "dQw4w9WgXcQ");
        assert_eq!(parsed.kind, ReferenceKind::EmbedLink);
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        assert_eq!(
            extract_video_id("  dQw4w9WgXcQ \n"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_unrelated_text_is_rejected() {
        assert_eq!(extract_video_id("hello world"), None);
        assert_eq!(extract_video_id(""), None);
        assert_eq!(extract_video_id("https://example.com/page"), None);
        assert!(matches!(
            VideoReference::parse("nope"),
            Err(Error::InvalidReference(_))
        ));
    }

    #[test]
    fn test_wrong_length_ids_are_rejected() {
        assert!(!is_canonical_id("dQw4w9WgXc"));
        assert!(!is_canonical_id("dQw4w9WgXcQQ"));
        assert!(!is_canonical_id("dQw4w9Wg/cQ"));
    }

    #[test]
    fn test_watch_url() {
        let parsed = VideoReference::parse("dQw4w9WgXcQ").unwrap();
        assert_eq!(parsed.watch_url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }
}
