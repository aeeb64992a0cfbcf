//! HTTP routes.
//!
//! Every handler runs the service call under a fresh [`CallContext`]
//! bounded by the configured request timeout. Errors become
//! `{"error": message}` bodies with a status derived from [`ErrorKind`].

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use tubekeep_core::{
    AddOutcome, CallContext, Error, ErrorKind, PlaylistService, Privacy, VideoRecord,
};

use crate::additions::{Addition, AdditionsStore};

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    service: Arc<PlaylistService>,
    additions: Arc<AdditionsStore>,
    request_timeout: Duration,
}

impl AppState {
    /// Bundle the service and additions store.
    pub fn new(service: Arc<PlaylistService>, additions: Arc<AdditionsStore>) -> Self {
        let request_timeout = service.config().request_timeout();
        Self {
            service,
            additions,
            request_timeout,
        }
    }

    fn call_context(&self) -> CallContext {
        CallContext::with_timeout(self.request_timeout)
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let youtube = Router::new()
        .route("/playlist/add", post(add_video))
        .route("/playlist/create", post(create_playlist))
        .route("/playlist/items", get(list_items))
        .route("/playlist/video/meta", get(video_meta));

    Router::new()
        .route("/version", get(version))
        .nest("/youtube/v1", youtube)
        .with_state(state)
}

/// Error returned by handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The engine rejected or failed the request.
    #[error(transparent)]
    Service(#[from] Error),

    /// The request could not be parsed.
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Service(err) => match err.kind() {
                ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::RemoteUnavailable => StatusCode::BAD_GATEWAY,
                ErrorKind::Cancelled => StatusCode::GATEWAY_TIMEOUT,
                ErrorKind::ConfigIncomplete | ErrorKind::Internal => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(status = status.as_u16(), "Request failed: {}", self);
        } else {
            debug!(status = status.as_u16(), "Request rejected: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddRequest {
    playlist_name: String,
    video: String,
    #[serde(default)]
    force: bool,
    #[serde(default)]
    user: String,
}

#[derive(Debug, Deserialize)]
struct CreateRequest {
    name: String,
    #[serde(default)]
    privacy: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    playlist_id: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ItemsQuery {
    #[serde(default)]
    name: String,
    fuzzy: Option<String>,
    metadata: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetaQuery {
    #[serde(default)]
    name: String,
    #[serde(default)]
    video_id: String,
    fuzzy: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemsResponse<T> {
    playlist_id: String,
    title: String,
    items: Vec<T>,
}

#[derive(Debug, Serialize)]
struct ItemWithAddition {
    #[serde(flatten)]
    video: VideoRecord,
    #[serde(flatten)]
    addition: Option<Addition>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MetaResponse {
    playlist_id: String,
    title: String,
    video_id: String,
    #[serde(flatten)]
    addition: Option<Addition>,
}

/// Query flags are on only when spelled `true`.
fn flag(value: Option<&str>, default: bool) -> bool {
    value.map_or(default, |v| v == "true")
}

async fn add_video(
    State(state): State<AppState>,
    payload: Result<Json<AddRequest>, JsonRejection>,
) -> Result<Json<AddOutcome>, ApiError> {
    let Json(req) = payload?;
    let ctx = state.call_context();

    let outcome = state
        .service
        .add_video(&ctx, &req.playlist_name, &req.video, req.force)
        .await?;

    if outcome.added {
        let addition = Addition::now(req.playlist_name, req.user, req.force);
        if let Err(e) = state.additions.record(&outcome.video_id, addition).await {
            warn!("Failed to record addition of {}: {}", outcome.video_id, e);
        }
    }
    Ok(Json(outcome))
}

async fn create_playlist(
    State(state): State<AppState>,
    payload: Result<Json<CreateRequest>, JsonRejection>,
) -> Result<Json<CreateResponse>, ApiError> {
    let Json(req) = payload?;
    let privacy = Privacy::parse_or_default(req.privacy.as_deref())?;
    let ctx = state.call_context();

    let playlist = state
        .service
        .create_playlist(&ctx, &req.name, privacy)
        .await?;
    Ok(Json(CreateResponse {
        playlist_id: playlist.id,
        title: playlist.title,
    }))
}

async fn list_items(
    State(state): State<AppState>,
    query: Result<Query<ItemsQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let fuzzy = flag(query.fuzzy.as_deref(), false);
    let ctx = state.call_context();

    let (items, playlist) = state.service.list_items(&ctx, &query.name, fuzzy).await?;

    if !flag(query.metadata.as_deref(), false) {
        return Ok(Json(ItemsResponse {
            playlist_id: playlist.id,
            title: playlist.title,
            items,
        })
        .into_response());
    }

    let mut additions = state
        .additions
        .get_many(items.iter().map(|v| v.id.as_str()))
        .await;
    let items = items
        .into_iter()
        .map(|video| {
            let addition = additions.remove(&video.id);
            ItemWithAddition { video, addition }
        })
        .collect();

    Ok(Json(ItemsResponse {
        playlist_id: playlist.id,
        title: playlist.title,
        items,
    })
    .into_response())
}

async fn video_meta(
    State(state): State<AppState>,
    query: Result<Query<MetaQuery>, QueryRejection>,
) -> Result<Json<MetaResponse>, ApiError> {
    let Query(query) = query?;
    if query.name.trim().is_empty() || query.video_id.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "name and videoId are required".to_string(),
        ));
    }
    let fuzzy = flag(query.fuzzy.as_deref(), true);
    let ctx = state.call_context();

    let (_, playlist) = state.service.list_items(&ctx, &query.name, fuzzy).await?;
    let addition = state.additions.get(&query.video_id).await;

    Ok(Json(MetaResponse {
        playlist_id: playlist.id,
        title: playlist.title,
        video_id: query.video_id,
        addition,
    }))
}

async fn version() -> Json<serde_json::Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_defaults() {
        assert!(!flag(None, false));
        assert!(flag(None, true));
        assert!(flag(Some("true"), false));
        assert!(!flag(Some("TRUE"), true));
        assert!(!flag(Some("1"), true));
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::Service(Error::PlaylistNotFound("x".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Service(Error::InvalidReference("x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::Service(Error::Cancelled), StatusCode::GATEWAY_TIMEOUT),
            (
                ApiError::Service(Error::ConfigIncomplete(vec!["client_id"])),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::BadRequest("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{err}");
        }
    }

    #[test]
    fn test_item_with_addition_flattens() {
        let item = ItemWithAddition {
            video: VideoRecord::new("v1", "Intro"),
            addition: Some(Addition {
                added_at: 5,
                playlist: "music".into(),
                user: "alice".into(),
                force: false,
            }),
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["videoId"], "v1");
        assert_eq!(value["user"], "alice");
        assert_eq!(value["addedAt"], 5);

        let bare = ItemWithAddition {
            video: VideoRecord::new("v2", "Other"),
            addition: None,
        };
        let value = serde_json::to_value(&bare).unwrap();
        assert!(value.get("user").is_none());
    }
}
