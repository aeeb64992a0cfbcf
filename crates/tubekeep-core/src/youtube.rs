//! YouTube Data API v3 client.
//!
//! [`YouTubeClient`] implements [`CatalogClient`] against the public REST
//! endpoints, authenticating each call with a bearer token obtained from the
//! shared [`TokenManager`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::catalog::{CatalogClient, PAGE_SIZE, Page, PlaylistRecord, Privacy, VideoRecord};
use crate::context::CallContext;
use crate::error::{RemoteError, Result};
use crate::token::TokenManager;

/// Base URL of the YouTube Data API v3.
pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistResource {
    id: String,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentDetails {
    video_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemResource {
    snippet: Snippet,
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

/// HTTP client for the YouTube Data API.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    http: Client,
    base_url: String,
    tokens: Arc<TokenManager>,
}

impl YouTubeClient {
    /// Create a client against the public API.
    #[must_use]
    pub fn new(http: Client, tokens: Arc<TokenManager>) -> Self {
        Self::with_base_url(http, tokens, YOUTUBE_API_BASE)
    }

    /// Create a client against a custom API base URL.
    #[must_use]
    pub fn with_base_url(
        http: Client,
        tokens: Arc<TokenManager>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url, resource)
    }

    async fn authorized(
        &self,
        ctx: &CallContext,
        request: RequestBuilder,
    ) -> Result<RequestBuilder> {
        let token = self.tokens.access_token(ctx).await?;
        Ok(request.bearer_auth(token))
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::transport(endpoint, &e))?;
        check_status(endpoint, response).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let request = self.authorized(ctx, self.http.get(self.url(endpoint)).query(query)).await?;
        let response = self.send(endpoint, request).await?;
        decode_json(endpoint, response).await
    }
}

async fn check_status(endpoint: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|b| b.error.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or(body);

    Err(RemoteError::Api {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        message,
    }
    .into())
}

async fn decode_json<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| RemoteError::transport(endpoint, &e))?;
    serde_json::from_slice(&bytes).map_err(|e| RemoteError::decode(endpoint, e).into())
}

#[async_trait]
impl CatalogClient for YouTubeClient {
    async fn list_playlists(
        &self,
        ctx: &CallContext,
        page_token: Option<String>,
    ) -> Result<Page<PlaylistRecord>> {
        let max_results = PAGE_SIZE.to_string();
        let mut query = vec![
            ("part", "snippet"),
            ("mine", "true"),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(token) = page_token.as_deref() {
            query.push(("pageToken", token));
        }

        let response: ListResponse<PlaylistResource> =
            self.get_json(ctx, "playlists", &query).await?;
        debug!("Fetched page of {} playlists", response.items.len());

        Ok(Page {
            items: response
                .items
                .into_iter()
                .map(|p| PlaylistRecord::new(p.id, p.snippet.title))
                .collect(),
            next_page_token: response.next_page_token,
        })
    }

    async fn list_playlist_items(
        &self,
        ctx: &CallContext,
        playlist_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<VideoRecord>> {
        let max_results = PAGE_SIZE.to_string();
        let mut query = vec![
            ("part", "snippet,contentDetails"),
            ("playlistId", playlist_id),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(token) = page_token.as_deref() {
            query.push(("pageToken", token));
        }

        let response: ListResponse<PlaylistItemResource> =
            self.get_json(ctx, "playlistItems", &query).await?;
        debug!(
            "Fetched page of {} items for playlist {}",
            response.items.len(),
            playlist_id
        );

        Ok(Page {
            items: response
                .items
                .into_iter()
                .map(|i| VideoRecord::new(i.content_details.video_id, i.snippet.title))
                .collect(),
            next_page_token: response.next_page_token,
        })
    }

    async fn video_title(&self, ctx: &CallContext, video_id: &str) -> Result<Option<String>> {
        let response: ListResponse<VideoResource> = self
            .get_json(ctx, "videos", &[("part", "snippet"), ("id", video_id)])
            .await?;
        Ok(response.items.into_iter().next().map(|v| v.snippet.title))
    }

    async fn insert_playlist_item(
        &self,
        ctx: &CallContext,
        playlist_id: &str,
        video_id: &str,
    ) -> Result<()> {
        let body = json!({
            "snippet": {
                "playlistId": playlist_id,
                "resourceId": { "kind": "youtube#video", "videoId": video_id },
            }
        });
        let request = self
            .http
            .post(self.url("playlistItems"))
            .query(&[("part", "snippet")])
            .json(&body);
        let request = self.authorized(ctx, request).await?;
        self.send("playlistItems", request).await?;

        info!("Inserted video {} into playlist {}", video_id, playlist_id);
        Ok(())
    }

    async fn create_playlist(
        &self,
        ctx: &CallContext,
        title: &str,
        privacy: Privacy,
    ) -> Result<PlaylistRecord> {
        let body = json!({
            "snippet": { "title": title },
            "status": { "privacyStatus": privacy.as_str() },
        });
        let request = self
            .http
            .post(self.url("playlists"))
            .query(&[("part", "snippet,status")])
            .json(&body);
        let request = self.authorized(ctx, request).await?;
        let response = self.send("playlists", request).await?;
        let created: PlaylistResource = decode_json("playlists", response).await?;

        info!("Created {} playlist '{}' ({})", privacy, title, created.id);
        Ok(PlaylistRecord::new(created.id, title))
    }
}
