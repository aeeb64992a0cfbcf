//! `Tubekeep` Server
//!
//! A small JSON API over [`tubekeep_core::PlaylistService`]:
//!
//! - `POST /youtube/v1/playlist/add`
//! - `POST /youtube/v1/playlist/create`
//! - `GET /youtube/v1/playlist/items`
//! - `GET /youtube/v1/playlist/video/meta`
//! - `GET /version`
//!
//! Successful additions are recorded in an [`additions::AdditionsStore`]
//! next to the configured data directory.

pub mod additions;
pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod routes;

pub use additions::{Addition, AdditionsError, AdditionsStore};
pub use app::{device_auth, exchange_auth_code, run, serve, token_source};
pub use config::{ApiConfig, AppConfig, ConfigError, ConfigFile, DEFAULT_CONFIG_PATH};
pub use error::{Result, ServerError};
pub use logging::{LogRotation, LoggingConfig, LoggingError, LoggingGuard};
pub use routes::{ApiError, AppState, router};
