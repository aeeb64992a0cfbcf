//! Remote catalog abstraction.
//!
//! [`CatalogClient`] is the seam between the core and the remote video
//! catalog. The production implementation lives in [`crate::youtube`]; tests
//! substitute their own.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::CallContext;
use crate::error::{Error, Result};

/// Page size used for every paginated catalog listing.
pub const PAGE_SIZE: u32 = 50;

/// A playlist owned by the authorized principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaylistRecord {
    /// Remote-assigned playlist ID.
    pub id: String,
    /// Playlist title.
    pub title: String,
}

impl PlaylistRecord {
    /// Create a new playlist record.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// A video that is a member of a playlist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoRecord {
    /// Canonical video ID.
    #[serde(rename = "videoId")]
    pub id: String,
    /// Video title as stored in the playlist.
    pub title: String,
}

impl VideoRecord {
    /// Create a new video record.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Token for the next page, `None` on the last page.
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    /// A final page.
    #[must_use]
    pub const fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_page_token: None,
        }
    }

    /// A page followed by `next`.
    #[must_use]
    pub fn with_next(items: Vec<T>, next: impl Into<String>) -> Self {
        Self {
            items,
            next_page_token: Some(next.into()),
        }
    }
}

/// Privacy level of a playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    /// Only the owner can see it (default).
    #[default]
    Private,
    /// Anyone with the link.
    Unlisted,
    /// Listed publicly.
    Public,
}

impl Privacy {
    /// The value the remote API expects.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Unlisted => "unlisted",
            Self::Public => "public",
        }
    }

    /// Parse an optional privacy string; empty or missing means [`Privacy::Private`].
    pub fn parse_or_default(value: Option<&str>) -> Result<Self> {
        match value.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(v) => v.parse(),
        }
    }
}

impl fmt::Display for Privacy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Privacy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "private" => Ok(Self::Private),
            "unlisted" => Ok(Self::Unlisted),
            "public" => Ok(Self::Public),
            _ => Err(Error::InvalidPrivacy(s.to_string())),
        }
    }
}

/// Remote video catalog operations used by the core.
///
/// Every call takes the caller's [`CallContext`]; implementations should
/// abort promptly once it is cancelled or expired.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// List one page of playlists owned by the authorized principal.
    async fn list_playlists(
        &self,
        ctx: &CallContext,
        page_token: Option<String>,
    ) -> Result<Page<PlaylistRecord>>;

    /// List one page of a playlist's items.
    async fn list_playlist_items(
        &self,
        ctx: &CallContext,
        playlist_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<VideoRecord>>;

    /// Fetch a video's canonical title. `Ok(None)` when the video does not exist.
    async fn video_title(&self, ctx: &CallContext, video_id: &str) -> Result<Option<String>>;

    /// Insert a video into a playlist.
    async fn insert_playlist_item(
        &self,
        ctx: &CallContext,
        playlist_id: &str,
        video_id: &str,
    ) -> Result<()>;

    /// Create a playlist and return its record.
    async fn create_playlist(
        &self,
        ctx: &CallContext,
        title: &str,
        privacy: Privacy,
    ) -> Result<PlaylistRecord>;
}

/// Fetch every playlist, following continuation tokens until exhausted.
pub async fn fetch_all_playlists(
    client: &dyn CatalogClient,
    ctx: &CallContext,
) -> Result<Vec<PlaylistRecord>> {
    let mut results = Vec::new();
    let mut page_token = None;
    loop {
        let page = client.list_playlists(ctx, page_token).await?;
        results.extend(page.items);
        match page.next_page_token {
            Some(next) if !next.is_empty() => page_token = Some(next),
            _ => break,
        }
    }
    Ok(results)
}

/// Fetch a playlist's complete membership, following continuation tokens.
pub async fn fetch_all_items(
    client: &dyn CatalogClient,
    ctx: &CallContext,
    playlist_id: &str,
) -> Result<Vec<VideoRecord>> {
    let mut results = Vec::new();
    let mut page_token = None;
    loop {
        let page = client
            .list_playlist_items(ctx, playlist_id, page_token)
            .await?;
        results.extend(page.items);
        match page.next_page_token {
            Some(next) if !next.is_empty() => page_token = Some(next),
            _ => break,
        }
    }
    Ok(results)
}
