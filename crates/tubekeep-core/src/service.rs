//! Playlist service: the operations the embedding application calls.
//!
//! [`PlaylistService`] ties the cache, resolver, duplicate detector and
//! remote catalog together:
//!
//! - `add_video`: normalize the reference, resolve the playlist, reject
//!   duplicates, insert, patch the cache
//! - `list_items`: resolve the playlist and return its cached membership
//! - `create_playlist`: create remotely and append to the cache
//!
//! Soft rejections (duplicates) come back as [`AddOutcome`] data. Everything
//! else that goes wrong is an [`Error`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::catalog::{CatalogClient, PlaylistRecord, Privacy, VideoRecord, fetch_all_items};
use crate::config::ServiceConfig;
use crate::context::CallContext;
use crate::duplicate::{Detection, DuplicateDetector, DuplicateReason};
use crate::error::{Error, Result};
use crate::oauth::GoogleTokenSource;
use crate::reference::VideoReference;
use crate::resolver;
use crate::token::{HookError, TokenManager};
use crate::youtube::YouTubeClient;

/// Result of an `add_video` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOutcome {
    /// Whether the video was inserted.
    pub added: bool,
    /// Why it was not inserted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<DuplicateReason>,
    /// Resolved playlist ID.
    pub playlist_id: String,
    /// Resolved playlist title.
    pub playlist_title: String,
    /// Canonical video ID.
    pub video_id: String,
}

impl AddOutcome {
    fn added(playlist: &PlaylistRecord, video_id: &str) -> Self {
        Self {
            added: true,
            reason: None,
            playlist_id: playlist.id.clone(),
            playlist_title: playlist.title.clone(),
            video_id: video_id.to_string(),
        }
    }

    fn rejected(playlist: &PlaylistRecord, video_id: &str, reason: DuplicateReason) -> Self {
        Self {
            added: false,
            reason: Some(reason),
            ..Self::added(playlist, video_id)
        }
    }
}

/// Playlist cache-and-reconciliation service for one authorized principal.
pub struct PlaylistService {
    client: Arc<dyn CatalogClient>,
    cache: CacheStore,
    detector: DuplicateDetector,
    tokens: Arc<TokenManager>,
    config: ServiceConfig,
}

impl std::fmt::Debug for PlaylistService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistService")
            .field("cache", &self.cache)
            .field("detector", &self.detector)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PlaylistService {
    /// Build a service around an existing catalog client and token manager.
    ///
    /// Fails with [`Error::ConfigIncomplete`] when credentials are missing.
    pub fn new(
        config: ServiceConfig,
        client: Arc<dyn CatalogClient>,
        tokens: Arc<TokenManager>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client,
            cache: CacheStore::new(config.cache_ttl()),
            detector: DuplicateDetector::new(config.duplicate_title_threshold),
            tokens,
            config,
        })
    }

    /// Build a service against the YouTube Data API.
    ///
    /// `on_rotated` receives every rotated refresh credential and should
    /// persist it.
    pub fn connect<F>(config: ServiceConfig, on_rotated: F) -> Result<Self>
    where
        F: Fn(&str) -> std::result::Result<(), HookError> + Send + Sync + 'static,
    {
        config.validate()?;
        let http = reqwest::Client::new();
        let source = GoogleTokenSource::new(
            http.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
        );
        let tokens = Arc::new(
            TokenManager::new(Arc::new(source), config.refresh_token.clone())
                .on_credential_rotated(on_rotated),
        );
        let client = Arc::new(YouTubeClient::new(http, Arc::clone(&tokens)));
        Self::new(config, client, tokens)
    }

    /// Service configuration.
    #[must_use]
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The playlist cache.
    #[must_use]
    pub const fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// The credential manager, for starting the rotation loop.
    #[must_use]
    pub const fn token_manager(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Force a full cache refresh.
    pub async fn refresh_cache(&self, ctx: &CallContext) -> Result<()> {
        self.cache.refresh(self.client.as_ref(), ctx).await
    }

    /// Add a video to the playlist whose title best matches `playlist_name`.
    ///
    /// Without `force`, a video already present by ID or by near-identical
    /// title is not inserted and the outcome says why.
    pub async fn add_video(
        &self,
        ctx: &CallContext,
        playlist_name: &str,
        video_reference: &str,
        force: bool,
    ) -> Result<AddOutcome> {
        let video_id = VideoReference::parse(video_reference)?.video_id;

        let playlist = self.resolve(ctx, playlist_name, true).await?;
        self.ensure_membership(ctx, &playlist).await?;

        let title = if force {
            debug!("Forced add of {} to '{}'", video_id, playlist.title);
            None
        } else {
            match self
                .detector
                .detect(self.client.as_ref(), ctx, &self.cache, &playlist.id, &video_id)
                .await?
            {
                Detection::Duplicate(reason) => {
                    info!(
                        "Not adding {} to '{}': {}",
                        video_id, playlist.title, reason
                    );
                    return Ok(AddOutcome::rejected(&playlist, &video_id, reason));
                }
                Detection::Unique { title } => Some(title),
            }
        };

        ctx.run(self.client.insert_playlist_item(ctx, &playlist.id, &video_id))
            .await?;

        let title = match title {
            Some(title) => title,
            None => self.title_for_cache(ctx, &video_id).await,
        };
        self.cache
            .patch(&playlist.id, VideoRecord::new(video_id.clone(), title))
            .await;

        info!("Added {} to playlist '{}'", video_id, playlist.title);
        Ok(AddOutcome::added(&playlist, &video_id))
    }

    /// Items of a playlist resolved exactly or fuzzily, with the playlist.
    pub async fn list_items(
        &self,
        ctx: &CallContext,
        playlist_name: &str,
        fuzzy: bool,
    ) -> Result<(Vec<VideoRecord>, PlaylistRecord)> {
        let playlist = self.resolve(ctx, playlist_name, fuzzy).await?;
        let items = self.ensure_membership(ctx, &playlist).await?;
        Ok((items, playlist))
    }

    /// Create a playlist and add it to the cache.
    pub async fn create_playlist(
        &self,
        ctx: &CallContext,
        name: &str,
        privacy: Privacy,
    ) -> Result<PlaylistRecord> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidPlaylistName(
                "playlist name is required".to_string(),
            ));
        }

        let record = ctx
            .run(self.client.create_playlist(ctx, name, privacy))
            .await?;
        self.cache.append_playlist(record.clone()).await;
        Ok(record)
    }

    /// Canonical title of a video.
    pub async fn video_title(&self, ctx: &CallContext, video_id: &str) -> Result<String> {
        ctx.run(self.client.video_title(ctx, video_id))
            .await?
            .ok_or_else(|| Error::VideoNotFound(video_id.to_string()))
    }

    async fn resolve(
        &self,
        ctx: &CallContext,
        playlist_name: &str,
        fuzzy: bool,
    ) -> Result<PlaylistRecord> {
        self.cache.ensure_fresh(self.client.as_ref(), ctx).await?;

        let snapshot = self.cache.read().await;
        resolver::resolve(snapshot.playlists(), playlist_name, fuzzy)
            .cloned()
            .ok_or_else(|| Error::PlaylistNotFound(playlist_name.trim().to_string()))
    }

    /// Cached membership of `playlist`, fetching it if it was never populated.
    async fn ensure_membership(
        &self,
        ctx: &CallContext,
        playlist: &PlaylistRecord,
    ) -> Result<Vec<VideoRecord>> {
        if let Some(items) = self.cache.membership(&playlist.id).await {
            return Ok(items);
        }

        debug!("Fetching membership of '{}' on demand", playlist.title);
        let items = ctx
            .run(fetch_all_items(self.client.as_ref(), ctx, &playlist.id))
            .await?;
        self.cache.populate(&playlist.id, items.clone()).await;
        Ok(items)
    }

    /// Best-effort title lookup after a forced insert.
    async fn title_for_cache(&self, ctx: &CallContext, video_id: &str) -> String {
        match self.video_title(ctx, video_id).await {
            Ok(title) => title,
            Err(e) => {
                warn!("Could not fetch title of {} for the cache: {}", video_id, e);
                String::new()
            }
        }
    }
}
