//! Integration tests for the playlist service.
//!
//! These tests drive `PlaylistService` end to end against an in-memory
//! catalog that counts every remote call, so cache behavior can be asserted
//! exactly.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tubekeep_core::{
    CallContext, CatalogClient, DuplicateReason, Error, ErrorKind, Page, PlaylistRecord,
    PlaylistService, Privacy, RemoteError, Result, ServiceConfig, TokenGrant, TokenManager,
    TokenSource, VideoRecord,
};

// =============================================================================
// Test Fixtures
// =============================================================================

const V1: &str = "V1aaaaaaaaa";
const V2: &str = "V2bbbbbbbbb";
const V3: &str = "V3ccccccccc";

/// Items per page served by the fake, small enough to force pagination.
const FAKE_PAGE_SIZE: usize = 2;

/// In-memory catalog that records how often each operation is called.
#[derive(Default)]
struct FakeCatalog {
    playlists: Mutex<Vec<PlaylistRecord>>,
    items: Mutex<HashMap<String, Vec<VideoRecord>>>,
    titles: Mutex<HashMap<String, String>>,
    playlist_calls: AtomicUsize,
    item_calls: AtomicUsize,
    title_calls: AtomicUsize,
    insert_calls: AtomicUsize,
    fail_items: AtomicBool,
    fail_inserts: AtomicBool,
}

impl FakeCatalog {
    fn with_playlist(self, id: &str, title: &str, videos: &[(&str, &str)]) -> Self {
        self.playlists
            .lock()
            .unwrap()
            .push(PlaylistRecord::new(id, title));
        self.items.lock().unwrap().insert(
            id.to_string(),
            videos
                .iter()
                .map(|(vid, vtitle)| VideoRecord::new(*vid, *vtitle))
                .collect(),
        );
        for (vid, vtitle) in videos {
            self.titles
                .lock()
                .unwrap()
                .insert((*vid).to_string(), (*vtitle).to_string());
        }
        self
    }

    fn with_video(self, id: &str, title: &str) -> Self {
        self.titles
            .lock()
            .unwrap()
            .insert(id.to_string(), title.to_string());
        self
    }

    /// Remote list calls made so far (playlists + items).
    fn list_calls(&self) -> usize {
        self.playlist_calls.load(Ordering::SeqCst) + self.item_calls.load(Ordering::SeqCst)
    }

    fn page<T: Clone>(all: &[T], token: Option<String>) -> Page<T> {
        let start: usize = token.map_or(0, |t| t.parse().unwrap());
        let end = (start + FAKE_PAGE_SIZE).min(all.len());
        let items = all[start..end].to_vec();
        if end < all.len() {
            Page::with_next(items, end.to_string())
        } else {
            Page::last(items)
        }
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn list_playlists(
        &self,
        _ctx: &CallContext,
        page_token: Option<String>,
    ) -> Result<Page<PlaylistRecord>> {
        self.playlist_calls.fetch_add(1, Ordering::SeqCst);
        let all = self.playlists.lock().unwrap().clone();
        Ok(Self::page(&all, page_token))
    }

    async fn list_playlist_items(
        &self,
        _ctx: &CallContext,
        playlist_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<VideoRecord>> {
        self.item_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_items.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport {
                endpoint: "playlistItems".to_string(),
                reason: "connection reset by peer".to_string(),
            }
            .into());
        }
        let all = self
            .items
            .lock()
            .unwrap()
            .get(playlist_id)
            .cloned()
            .unwrap_or_default();
        Ok(Self::page(&all, page_token))
    }

    async fn video_title(&self, _ctx: &CallContext, video_id: &str) -> Result<Option<String>> {
        self.title_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.titles.lock().unwrap().get(video_id).cloned())
    }

    async fn insert_playlist_item(
        &self,
        _ctx: &CallContext,
        playlist_id: &str,
        video_id: &str,
    ) -> Result<()> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(RemoteError::Api {
                endpoint: "playlistItems".to_string(),
                status: 409,
                message: "conflict".to_string(),
            }
            .into());
        }
        let title = self
            .titles
            .lock()
            .unwrap()
            .get(video_id)
            .cloned()
            .unwrap_or_default();
        self.items
            .lock()
            .unwrap()
            .entry(playlist_id.to_string())
            .or_default()
            .push(VideoRecord::new(video_id, title));
        Ok(())
    }

    async fn create_playlist(
        &self,
        _ctx: &CallContext,
        title: &str,
        _privacy: Privacy,
    ) -> Result<PlaylistRecord> {
        let mut playlists = self.playlists.lock().unwrap();
        let record = PlaylistRecord::new(format!("PL-new-{}", playlists.len()), title);
        playlists.push(record.clone());
        Ok(record)
    }
}

/// Token source that hands out a fixed refresh credential on every exchange.
struct FixedTokens {
    refresh_token: Option<String>,
    calls: AtomicUsize,
}

impl FixedTokens {
    fn rotating_to(token: &str) -> Self {
        Self {
            refresh_token: Some(token.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    fn stable() -> Self {
        Self {
            refresh_token: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TokenSource for FixedTokens {
    async fn exchange(&self, _ctx: &CallContext, _refresh_token: &str) -> Result<TokenGrant> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(TokenGrant {
            access_token: "access".to_string(),
            refresh_token: self.refresh_token.clone(),
            expires_in: Duration::from_secs(3600),
        })
    }
}

fn coding_catalog() -> FakeCatalog {
    FakeCatalog::default()
        .with_playlist("PL1", "Coding Tutorials", &[(V1, "Intro to Go")])
        .with_playlist("PL2", "Cooking", &[])
        .with_playlist("PL3", "Road Trip Mix", &[])
        .with_video(V2, "Intro to Go ")
        .with_video(V3, "Ownership in Rust")
}

fn build_service(catalog: &Arc<FakeCatalog>, config: ServiceConfig) -> PlaylistService {
    let tokens = Arc::new(TokenManager::new(Arc::new(FixedTokens::stable()), "rt"));
    PlaylistService::new(config, Arc::clone(catalog) as Arc<dyn CatalogClient>, tokens).unwrap()
}

fn default_config() -> ServiceConfig {
    ServiceConfig::new("client", "secret", "rt")
}

// =============================================================================
// Duplicate Detection
// =============================================================================

#[tokio::test]
async fn test_readding_same_video_is_duplicate_by_id() {
    let catalog = Arc::new(coding_catalog());
    let service = build_service(&catalog, default_config());

    let outcome = service
        .add_video(&CallContext::new(), "Coding Tutorials", V1, false)
        .await
        .unwrap();

    assert!(!outcome.added);
    assert_eq!(outcome.reason, Some(DuplicateReason::ById));
    assert_eq!(outcome.playlist_id, "PL1");
    assert_eq!(catalog.insert_calls.load(Ordering::SeqCst), 0);
    assert_eq!(catalog.title_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_trailing_space_title_is_duplicate_by_title() {
    let catalog = Arc::new(coding_catalog());
    let service = build_service(&catalog, default_config());

    let outcome = service
        .add_video(
            &CallContext::new(),
            "Coding Tutorials",
            &format!("https://www.youtube.com/watch?v={V2}"),
            false,
        )
        .await
        .unwrap();

    assert!(!outcome.added);
    assert_eq!(outcome.reason, Some(DuplicateReason::ByTitle));
    assert_eq!(catalog.insert_calls.load(Ordering::SeqCst), 0);

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["reason"], "duplicate by title");
}

#[tokio::test]
async fn test_force_attempts_insertion_for_duplicates() {
    let catalog = Arc::new(coding_catalog());
    let service = build_service(&catalog, default_config());
    let ctx = CallContext::new();

    for video in [V1, V2] {
        let outcome = service
            .add_video(&ctx, "Coding Tutorials", video, true)
            .await
            .unwrap();
        assert!(outcome.added);
    }
    assert_eq!(catalog.insert_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_force_propagates_insert_failure() {
    let catalog = Arc::new(coding_catalog());
    catalog.fail_inserts.store(true, Ordering::SeqCst);
    let service = build_service(&catalog, default_config());

    let err = service
        .add_video(&CallContext::new(), "Coding Tutorials", V1, true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteUnavailable);
    assert_eq!(catalog.insert_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_new_video_is_added_and_cached() {
    let catalog = Arc::new(coding_catalog());
    let service = build_service(&catalog, default_config());
    let ctx = CallContext::new();

    let outcome = service
        .add_video(&ctx, "coding tutorial", &format!("youtu.be/{V3}"), false)
        .await
        .unwrap();
    assert!(outcome.added);
    assert_eq!(outcome.playlist_title, "Coding Tutorials");
    assert_eq!(outcome.video_id, V3);

    let calls_before = catalog.list_calls();
    let (items, _) = service
        .list_items(&ctx, "Coding Tutorials", false)
        .await
        .unwrap();
    let titles: Vec<_> = items.iter().map(|v| v.title.as_str()).collect();
    assert_eq!(titles, vec!["Intro to Go", "Ownership in Rust"]);
    assert_eq!(catalog.list_calls(), calls_before, "patched, not refreshed");
}

#[tokio::test]
async fn test_unknown_video_is_not_found() {
    let catalog = Arc::new(coding_catalog());
    let service = build_service(&catalog, default_config());

    let err = service
        .add_video(&CallContext::new(), "Coding Tutorials", "ZZZZZZZZZZZ", false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::VideoNotFound(_)));
    assert_eq!(catalog.insert_calls.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Cache Freshness
// =============================================================================

#[tokio::test]
async fn test_first_call_refreshes_once_then_cache_serves() {
    let catalog = Arc::new(coding_catalog());
    let service = build_service(&catalog, default_config());
    let ctx = CallContext::new();

    service.list_items(&ctx, "Cooking", false).await.unwrap();
    assert_eq!(catalog.playlist_calls.load(Ordering::SeqCst), 2, "two pages");
    assert_eq!(catalog.item_calls.load(Ordering::SeqCst), 3, "one per playlist");

    let after_first = catalog.list_calls();
    service.list_items(&ctx, "Road Trip", true).await.unwrap();
    service
        .add_video(&ctx, "Coding Tutorials", V1, false)
        .await
        .unwrap();
    assert_eq!(catalog.list_calls(), after_first);
}

#[tokio::test(start_paused = true)]
async fn test_stale_cache_is_refreshed() {
    let catalog = Arc::new(coding_catalog());
    let service = build_service(&catalog, default_config().with_cache_minutes(1));
    let ctx = CallContext::new();

    service.list_items(&ctx, "Cooking", false).await.unwrap();
    let playlist_calls = catalog.playlist_calls.load(Ordering::SeqCst);

    tokio::time::advance(Duration::from_secs(61)).await;
    service.list_items(&ctx, "Cooking", false).await.unwrap();
    assert_eq!(
        catalog.playlist_calls.load(Ordering::SeqCst),
        playlist_calls * 2
    );
}

#[tokio::test]
async fn test_concurrent_cold_reads_share_one_refresh() {
    let catalog = Arc::new(coding_catalog());
    let service = Arc::new(build_service(&catalog, default_config()));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .list_items(&CallContext::new(), "Cooking", false)
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(catalog.playlist_calls.load(Ordering::SeqCst), 2);
    assert_eq!(catalog.item_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_keeps_last_snapshot() {
    let catalog = Arc::new(coding_catalog());
    let service = build_service(&catalog, default_config().with_cache_minutes(1));
    let ctx = CallContext::new();

    service.list_items(&ctx, "Cooking", false).await.unwrap();
    catalog.fail_items.store(true, Ordering::SeqCst);
    catalog
        .playlists
        .lock()
        .unwrap()
        .push(PlaylistRecord::new("PL4", "Added Remotely"));

    tokio::time::advance(Duration::from_secs(61)).await;
    let err = service.list_items(&ctx, "Cooking", false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteUnavailable);

    let snapshot = service.cache().read().await;
    assert_eq!(snapshot.playlists().len(), 3);
    assert!(snapshot.playlist("PL4").is_none());
    assert!(snapshot.membership("PL1").unwrap().contains(V1));
}

// =============================================================================
// Playlist Creation
// =============================================================================

#[tokio::test]
async fn test_created_playlist_is_immediately_resolvable() {
    let catalog = Arc::new(coding_catalog());
    let service = build_service(&catalog, default_config());
    let ctx = CallContext::new();

    service.refresh_cache(&ctx).await.unwrap();
    let calls = catalog.list_calls();

    let created = service
        .create_playlist(&ctx, "Jazz Standards", Privacy::Unlisted)
        .await
        .unwrap();
    let (items, playlist) = service
        .list_items(&ctx, "Jazz Standards", false)
        .await
        .unwrap();

    assert_eq!(playlist, created);
    assert!(items.is_empty());
    assert_eq!(catalog.list_calls(), calls);
}

// =============================================================================
// Credential Rotation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_rotation_loop_persists_new_credential_once() {
    let persisted = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&persisted);
    let source = Arc::new(FixedTokens::rotating_to("rt-rotated"));

    let tokens = Arc::new(
        TokenManager::new(Arc::clone(&source) as Arc<dyn TokenSource>, "rt-original")
            .on_credential_rotated(move |token| {
                sink.lock().unwrap().push(token.to_string());
                Ok(())
            }),
    );
    let catalog: Arc<dyn CatalogClient> = Arc::new(coding_catalog());
    let service = PlaylistService::new(default_config(), catalog, tokens).unwrap();

    let period = Duration::from_secs(7 * 24 * 60 * 60);
    let handle = service.token_manager().start(period);

    tokio::time::sleep(period * 3 + Duration::from_secs(1)).await;
    handle.stop().await;

    assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    assert_eq!(*persisted.lock().unwrap(), vec!["rt-rotated".to_string()]);
    assert_eq!(
        service.token_manager().current_refresh_token().await,
        "rt-rotated"
    );
}
