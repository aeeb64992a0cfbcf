//! In-memory playlist cache.
//!
//! This module holds the current snapshot of the authorized principal's
//! playlists and their video membership:
//! - TTL-based staleness tracking (`ensure_fresh`)
//! - Full refreshes that fetch everything before swapping the snapshot in
//! - Incremental patches after successful writes, avoiding a full refresh
//!
//! # Locking
//!
//! The snapshot sits behind a single [`tokio::sync::RwLock`]. Reads take the
//! read lock; the final swap of a refresh and every patch take the write lock.
//! Network I/O never happens while the lock is held. A separate mutex keeps
//! concurrent refreshes from all hitting the remote catalog at once.
//!
//! Patches that land while a refresh is still fetching are journaled and
//! replayed onto the new snapshot before it is swapped in.
//!
//! ```rust,ignore
//! use tubekeep_core::cache::CacheStore;
//!
//! let cache = CacheStore::new(Duration::from_secs(600));
//! cache.ensure_fresh(&client, &ctx).await?;
//! let snapshot = cache.read().await;
//! println!("{} playlists cached", snapshot.playlists().len());
//! ```

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock, RwLockReadGuard};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::catalog::{
    CatalogClient, PlaylistRecord, VideoRecord, fetch_all_items, fetch_all_playlists,
};
use crate::context::CallContext;
use crate::error::Result;

/// Default cache TTL (10 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

/// Video membership of one playlist, keyed by video ID, in playlist order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    videos: Vec<VideoRecord>,
    index: HashMap<String, usize>,
}

impl Membership {
    /// Create an empty membership map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a video. An existing entry with the same ID keeps its position
    /// and takes the new title.
    pub fn insert(&mut self, video: VideoRecord) {
        if let Some(&pos) = self.index.get(&video.id) {
            self.videos[pos] = video;
        } else {
            self.index.insert(video.id.clone(), self.videos.len());
            self.videos.push(video);
        }
    }

    /// Whether a video with this ID is a member.
    #[must_use]
    pub fn contains(&self, video_id: &str) -> bool {
        self.index.contains_key(video_id)
    }

    /// Look up a member by ID.
    #[must_use]
    pub fn get(&self, video_id: &str) -> Option<&VideoRecord> {
        self.index.get(video_id).map(|&pos| &self.videos[pos])
    }

    /// Members in playlist order.
    pub fn iter(&self) -> impl Iterator<Item = &VideoRecord> {
        self.videos.iter()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.videos.len()
    }

    /// Whether there are no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }
}

impl FromIterator<VideoRecord> for Membership {
    fn from_iter<I: IntoIterator<Item = VideoRecord>>(iter: I) -> Self {
        let mut membership = Self::new();
        for video in iter {
            membership.insert(video);
        }
        membership
    }
}

/// A consistent view of playlists and their membership at one point in time.
///
/// Invariant: every key of the membership map is the ID of a listed playlist.
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    playlists: Vec<PlaylistRecord>,
    membership: HashMap<String, Membership>,
    last_refreshed: Option<Instant>,
}

impl CacheSnapshot {
    /// Playlists in the order they were fetched or appended.
    #[must_use]
    pub fn playlists(&self) -> &[PlaylistRecord] {
        &self.playlists
    }

    /// Membership of a playlist, `None` if it was never populated.
    #[must_use]
    pub fn membership(&self, playlist_id: &str) -> Option<&Membership> {
        self.membership.get(playlist_id)
    }

    /// Look up a playlist by ID.
    #[must_use]
    pub fn playlist(&self, playlist_id: &str) -> Option<&PlaylistRecord> {
        self.playlists.iter().find(|p| p.id == playlist_id)
    }

    /// When the last full refresh completed.
    #[must_use]
    pub const fn last_refreshed(&self) -> Option<Instant> {
        self.last_refreshed
    }

    /// Whether no playlists are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.playlists.is_empty()
    }

    /// Freshness predicate: refreshed less than `ttl` ago and non-empty.
    #[must_use]
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        match self.last_refreshed {
            Some(at) => at.elapsed() < ttl && !self.playlists.is_empty(),
            None => false,
        }
    }

    /// Total number of cached videos across all playlists.
    #[must_use]
    pub fn video_count(&self) -> usize {
        self.membership.values().map(Membership::len).sum()
    }
}

/// A write applied to the snapshot outside a full refresh.
#[derive(Debug, Clone)]
enum CacheWrite {
    Member {
        playlist_id: String,
        video: VideoRecord,
    },
    Playlist(PlaylistRecord),
}

impl CacheSnapshot {
    fn apply(&mut self, write: CacheWrite) {
        match write {
            CacheWrite::Member { playlist_id, video } => {
                if self.playlist(&playlist_id).is_none() {
                    warn!("Ignoring cache patch for unknown playlist {}", playlist_id);
                    return;
                }
                self.membership.entry(playlist_id).or_default().insert(video);
            }
            CacheWrite::Playlist(record) => {
                if self.playlist(&record.id).is_some() {
                    debug!("Playlist {} already cached", record.id);
                    return;
                }
                self.membership.entry(record.id.clone()).or_default();
                self.playlists.push(record);
            }
        }
    }
}

#[derive(Debug, Default)]
struct CacheState {
    snapshot: CacheSnapshot,
    /// Writes made since the running refresh started; `None` when idle.
    journal: Option<Vec<CacheWrite>>,
}

/// Shared, TTL-bounded cache of playlists and membership.
///
/// Patches made while a refresh is fetching are journaled and replayed onto
/// the refreshed snapshot, so a slow refresh never loses them.
#[derive(Debug)]
pub struct CacheStore {
    state: RwLock<CacheState>,
    refresh_lock: Mutex<()>,
    ttl: Duration,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl CacheStore {
    /// Create an empty cache with the given TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            refresh_lock: Mutex::new(()),
            ttl,
        }
    }

    /// Configured TTL.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Read-lock the current snapshot.
    pub async fn read(&self) -> RwLockReadGuard<'_, CacheSnapshot> {
        RwLockReadGuard::map(self.state.read().await, |state| &state.snapshot)
    }

    /// Whether the snapshot is currently fresh.
    pub async fn is_fresh(&self) -> bool {
        self.read().await.is_fresh(self.ttl)
    }

    /// Refresh when the snapshot is empty or older than the TTL.
    ///
    /// Returns `true` when a full refresh was performed.
    pub async fn ensure_fresh(
        &self,
        client: &dyn CatalogClient,
        ctx: &CallContext,
    ) -> Result<bool> {
        if self.is_fresh().await {
            debug!("Playlist cache is fresh");
            return Ok(false);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another task may have refreshed while we waited
        if self.is_fresh().await {
            debug!("Playlist cache refreshed by a concurrent caller");
            return Ok(false);
        }

        self.refresh_unlocked(client, ctx).await?;
        Ok(true)
    }

    /// Unconditionally rebuild the snapshot from the remote catalog.
    ///
    /// On failure the previous snapshot is left untouched.
    pub async fn refresh(&self, client: &dyn CatalogClient, ctx: &CallContext) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_unlocked(client, ctx).await
    }

    async fn refresh_unlocked(&self, client: &dyn CatalogClient, ctx: &CallContext) -> Result<()> {
        let started = Instant::now();
        self.state.write().await.journal = Some(Vec::new());

        let fetched = Self::fetch_snapshot(client, ctx).await;

        let mut state = self.state.write().await;
        let journal = state.journal.take().unwrap_or_default();
        let mut next = fetched?;
        let replayed = journal.len();
        for write in journal {
            next.apply(write);
        }
        let playlist_count = next.playlists.len();
        let video_count = next.video_count();
        state.snapshot = next;
        drop(state);

        info!(
            "Refreshed playlist cache: {} playlists, {} videos in {:?} ({} writes replayed)",
            playlist_count,
            video_count,
            started.elapsed(),
            replayed
        );
        Ok(())
    }

    async fn fetch_snapshot(
        client: &dyn CatalogClient,
        ctx: &CallContext,
    ) -> Result<CacheSnapshot> {
        let playlists = ctx.run(fetch_all_playlists(client, ctx)).await?;
        let mut membership = HashMap::with_capacity(playlists.len());
        for playlist in &playlists {
            let videos = ctx.run(fetch_all_items(client, ctx, &playlist.id)).await?;
            debug!(
                "Fetched {} items for playlist '{}'",
                videos.len(),
                playlist.title
            );
            membership.insert(playlist.id.clone(), videos.into_iter().collect());
        }

        Ok(CacheSnapshot {
            playlists,
            membership,
            last_refreshed: Some(Instant::now()),
        })
    }

    async fn write(&self, write: CacheWrite) {
        let mut state = self.state.write().await;
        if let Some(journal) = state.journal.as_mut() {
            journal.push(write.clone());
        }
        state.snapshot.apply(write);
    }

    /// Record a video as a member of a cached playlist.
    pub async fn patch(&self, playlist_id: &str, video: VideoRecord) {
        self.write(CacheWrite::Member {
            playlist_id: playlist_id.to_string(),
            video,
        })
        .await;
    }

    /// Append a newly created playlist with an empty membership map.
    pub async fn append_playlist(&self, record: PlaylistRecord) {
        self.write(CacheWrite::Playlist(record)).await;
    }

    /// Install a lazily fetched membership map for a cached playlist.
    pub async fn populate(&self, playlist_id: &str, videos: Vec<VideoRecord>) {
        let mut state = self.state.write().await;
        if state.snapshot.playlist(playlist_id).is_none() {
            warn!("Ignoring membership for unknown playlist {}", playlist_id);
            return;
        }
        state
            .snapshot
            .membership
            .insert(playlist_id.to_string(), videos.into_iter().collect());
    }

    /// Cached playlists in order.
    pub async fn playlists(&self) -> Vec<PlaylistRecord> {
        self.read().await.playlists.clone()
    }

    /// Members of a playlist in order, `None` if never populated.
    pub async fn membership(&self, playlist_id: &str) -> Option<Vec<VideoRecord>> {
        self.read()
            .await
            .membership(playlist_id)
            .map(|m| m.iter().cloned().collect())
    }

    /// Whether a video is a cached member of a playlist.
    pub async fn contains_video(&self, playlist_id: &str, video_id: &str) -> bool {
        self.read()
            .await
            .membership(playlist_id)
            .is_some_and(|m| m.contains(video_id))
    }

    /// Titles of a playlist's cached members.
    pub async fn titles_in(&self, playlist_id: &str) -> Vec<String> {
        self.read()
            .await
            .membership(playlist_id)
            .map(|m| m.iter().map(|v| v.title.clone()).collect())
            .unwrap_or_default()
    }
}
