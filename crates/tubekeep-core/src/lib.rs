//! `Tubekeep` Core Library
//!
//! This crate provides the playlist cache-and-reconciliation engine that sits
//! in front of the `YouTube` Data API:
//! - A time-bounded in-memory cache of playlists and their videos
//! - Playlist resolution by exact or approximate name
//! - Duplicate detection by video ID and by near-identical title
//! - Refresh-credential management with background rotation
//! - OAuth helpers for bootstrapping a refresh credential
//!
//! # Error Handling
//!
//! Every fallible operation returns [`Result`]. Duplicates are not errors;
//! they come back as [`AddOutcome`] with `added: false`. See the [`error`]
//! module for the rest.
//!
//! ```rust,ignore
//! use tubekeep_core::{CallContext, PlaylistService, ServiceConfig};
//!
//! let service = PlaylistService::connect(config, |token| persist(token))?;
//! let rotation = service.token_manager().start(service.config().rotation_interval());
//!
//! let ctx = CallContext::with_timeout(Duration::from_secs(30));
//! let outcome = service
//!     .add_video(&ctx, "coding tutorials", "https://youtu.be/dQw4w9WgXcQ", false)
//!     .await?;
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod context;
pub mod duplicate;
pub mod error;
pub mod oauth;
pub mod reference;
pub mod resolver;
pub mod service;
pub mod similarity;
pub mod token;
pub mod youtube;

pub use cache::{CacheSnapshot, CacheStore, DEFAULT_CACHE_TTL, Membership};
pub use catalog::{
    CatalogClient, PAGE_SIZE, Page, PlaylistRecord, Privacy, VideoRecord, fetch_all_items,
    fetch_all_playlists,
};
pub use config::{
    DEFAULT_CACHE_MINUTES, DEFAULT_REQUEST_TIMEOUT_SECS, MAX_CACHE_MINUTES,
    MAX_REQUEST_TIMEOUT_SECS, ServiceConfig,
};
pub use context::CallContext;
pub use duplicate::{DEFAULT_TITLE_THRESHOLD, Detection, DuplicateDetector, DuplicateReason};
pub use error::{Error, ErrorKind, RemoteError, Result};
pub use oauth::{DeviceAuthorization, GoogleTokenSource, authorization_url, exchange_code};
pub use reference::{ReferenceKind, VideoReference, extract_video_id};
pub use resolver::{resolve_exact, resolve_fuzzy};
pub use service::{AddOutcome, PlaylistService};
pub use similarity::{levenshtein, normalize};
pub use token::{
    CredentialHook, CredentialState, DEFAULT_ROTATION_INTERVAL, HookError,
    MAX_ACCESS_TOKEN_LIFETIME, MAX_ROTATION_INTERVAL, RotationHandle, TokenGrant, TokenManager,
    TokenSource,
};
pub use youtube::{YOUTUBE_API_BASE, YouTubeClient};
