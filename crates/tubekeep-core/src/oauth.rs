//! Google OAuth 2.0 helpers.
//!
//! - [`GoogleTokenSource`] exchanges the refresh credential for access tokens
//! - [`authorization_url`] and [`exchange_code`] bootstrap a refresh
//!   credential on a headless machine (copy the URL, paste the code back)
//! - The device flow ([`GoogleTokenSource::start_device_flow`] and
//!   [`GoogleTokenSource::poll_device_token`]) does the same without a
//!   browser on the server

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::form_urlencoded;

use crate::context::CallContext;
use crate::error::{Error, RemoteError, Result};
use crate::token::{MAX_ACCESS_TOKEN_LIFETIME, TokenGrant, TokenSource};

/// Google's OAuth 2.0 consent endpoint.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google's OAuth 2.0 token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Google's device authorization endpoint.
pub const GOOGLE_DEVICE_CODE_URL: &str = "https://oauth2.googleapis.com/device/code";

/// Redirect URI that shows the authorization code to the user.
pub const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Full read/write access to the account's YouTube data.
pub const YOUTUBE_SCOPE: &str = "https://www.googleapis.com/auth/youtube";

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_ACCESS_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Polling interval used when the device endpoint does not suggest one.
const DEFAULT_DEVICE_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Extra delay added whenever the token endpoint answers `slow_down`.
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl From<TokenResponse> for TokenGrant {
    fn from(token: TokenResponse) -> Self {
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token
                .expires_in
                .map_or(DEFAULT_ACCESS_TOKEN_LIFETIME, Duration::from_secs)
                .min(MAX_ACCESS_TOKEN_LIFETIME),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl fmt::Display for OAuthErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(description) if !description.is_empty() => {
                write!(f, "{}: {}", self.error, description)
            }
            _ => f.write_str(&self.error),
        }
    }
}

/// Outcome of one form POST to an OAuth endpoint.
enum FormReply<T> {
    Success(T),
    Rejected(OAuthErrorResponse),
}

/// A pending device authorization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceAuthorization {
    /// Code the client polls with.
    pub device_code: String,
    /// Code the user types on the verification page.
    pub user_code: String,
    /// Page where the user enters `user_code`.
    pub verification_url: String,
    /// Seconds until `device_code` expires.
    #[serde(default)]
    pub expires_in: u64,
    /// Suggested polling interval in seconds.
    #[serde(default)]
    pub interval: u64,
}

impl DeviceAuthorization {
    /// Effective polling interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        if self.interval > 0 {
            Duration::from_secs(self.interval)
        } else {
            DEFAULT_DEVICE_POLL_INTERVAL
        }
    }
}

/// [`TokenSource`] backed by Google's OAuth endpoints.
#[derive(Clone)]
pub struct GoogleTokenSource {
    http: Client,
    client_id: String,
    client_secret: String,
    token_url: String,
    device_code_url: String,
}

impl fmt::Debug for GoogleTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleTokenSource")
            .field("client_id", &self.client_id)
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

impl GoogleTokenSource {
    /// Create a token source for an OAuth client.
    pub fn new(
        http: Client,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            device_code_url: GOOGLE_DEVICE_CODE_URL.to_string(),
        }
    }

    /// Use a different token endpoint.
    #[must_use]
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Use a different device authorization endpoint.
    #[must_use]
    pub fn with_device_code_url(mut self, url: impl Into<String>) -> Self {
        self.device_code_url = url.into();
        self
    }

    /// Consent URL for this client.
    #[must_use]
    pub fn authorization_url(&self) -> String {
        authorization_url(&self.client_id)
    }

    /// Trade an authorization code for a grant that carries a refresh token.
    pub async fn exchange_code(&self, ctx: &CallContext, code: &str) -> Result<TokenGrant> {
        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code.trim()),
            ("redirect_uri", OOB_REDIRECT_URI),
        ];
        match ctx
            .run(self.post_form::<TokenResponse>(&self.token_url, &form))
            .await?
        {
            FormReply::Success(token) => Ok(token.into()),
            FormReply::Rejected(err) => Err(RemoteError::TokenExchange(err.to_string()).into()),
        }
    }

    /// Begin a device authorization.
    pub async fn start_device_flow(&self, ctx: &CallContext) -> Result<DeviceAuthorization> {
        let form = [("client_id", self.client_id.as_str()), ("scope", YOUTUBE_SCOPE)];
        match ctx
            .run(self.post_form::<DeviceAuthorization>(&self.device_code_url, &form))
            .await?
        {
            FormReply::Success(auth) => Ok(auth),
            FormReply::Rejected(err) => Err(RemoteError::TokenExchange(err.to_string()).into()),
        }
    }

    /// Poll until the user approves the device authorization.
    ///
    /// Waits `interval` between polls, backing off on `slow_down`. Ends when
    /// the user approves, denies, the code expires, or `ctx` ends.
    pub async fn poll_device_token(
        &self,
        ctx: &CallContext,
        auth: &DeviceAuthorization,
    ) -> Result<TokenGrant> {
        let mut interval = auth.poll_interval();
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("device_code", auth.device_code.as_str()),
            ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
        ];

        loop {
            ctx.run(async {
                tokio::time::sleep(interval).await;
                Ok::<(), Error>(())
            })
            .await?;

            match ctx
                .run(self.post_form::<TokenResponse>(&self.token_url, &form))
                .await?
            {
                FormReply::Success(token) => {
                    info!("Device authorization approved");
                    return Ok(token.into());
                }
                FormReply::Rejected(err) => match err.error.as_str() {
                    "authorization_pending" => debug!("Device authorization pending"),
                    "slow_down" => {
                        interval += SLOW_DOWN_STEP;
                        debug!("Device authorization polling slowed to {:?}", interval);
                    }
                    _ => return Err(RemoteError::TokenExchange(err.to_string()).into()),
                },
            }
        }
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<FormReply<T>> {
        let endpoint = "oauth";
        let response = self
            .http
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| RemoteError::transport(endpoint, &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::transport(endpoint, &e))?;

        if status.is_success() {
            let value = serde_json::from_str(&body).map_err(|e| RemoteError::decode(endpoint, e))?;
            return Ok(FormReply::Success(value));
        }

        match serde_json::from_str::<OAuthErrorResponse>(&body) {
            Ok(err) => Ok(FormReply::Rejected(err)),
            Err(_) => Err(Error::Remote(RemoteError::Api {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message: body,
            })),
        }
    }
}

#[async_trait]
impl TokenSource for GoogleTokenSource {
    async fn exchange(&self, ctx: &CallContext, refresh_token: &str) -> Result<TokenGrant> {
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ];
        match ctx
            .run(self.post_form::<TokenResponse>(&self.token_url, &form))
            .await?
        {
            FormReply::Success(token) => Ok(token.into()),
            FormReply::Rejected(err) => Err(RemoteError::TokenExchange(err.to_string()).into()),
        }
    }
}

/// Consent URL requesting offline access with forced approval, so the
/// resulting code always yields a refresh token.
#[must_use]
pub fn authorization_url(client_id: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", OOB_REDIRECT_URI)
        .append_pair("response_type", "code")
        .append_pair("scope", YOUTUBE_SCOPE)
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent")
        .append_pair("state", "state")
        .finish();
    format!("{GOOGLE_AUTH_URL}?{query}")
}

/// Trade an authorization code for a grant using the default endpoints.
pub async fn exchange_code(
    ctx: &CallContext,
    client_id: &str,
    client_secret: &str,
    code: &str,
) -> Result<TokenGrant> {
    GoogleTokenSource::new(Client::new(), client_id, client_secret)
        .exchange_code(ctx, code)
        .await
}
