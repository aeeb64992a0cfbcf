//! Server bootstrap and one-shot credential commands.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tubekeep_core::{
    CallContext, DeviceAuthorization, GoogleTokenSource, HookError, PlaylistService, TokenGrant,
};

use crate::additions::AdditionsStore;
use crate::config::ConfigFile;
use crate::error::{Result, ServerError};
use crate::routes::{AppState, router};

/// Device codes without an advertised lifetime are abandoned after this long.
const DEFAULT_DEVICE_CODE_LIFETIME: Duration = Duration::from_secs(15 * 60);

/// Serve `state` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Start the playlist service, the rotation loop and the HTTP listener.
///
/// Rotated credentials are written back to `file`. Returns once
/// `shutdown` resolves and in-flight requests have drained.
pub async fn run<F>(file: Arc<ConfigFile>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let config = file.snapshot()?;

    let hook_file = Arc::clone(&file);
    let service = Arc::new(PlaylistService::connect(
        config.youtube.clone(),
        move |token| hook_file.set_refresh_token(token).map_err(HookError::from),
    )?);
    let additions = Arc::new(AdditionsStore::open(&config.data_dir).await?);
    let listener = TcpListener::bind(config.api.socket_addr()).await?;
    info!("Listening on {}", listener.local_addr()?);

    let rotation = service
        .token_manager()
        .start(service.config().rotation_interval());
    let result = serve(listener, AppState::new(service, additions), shutdown).await;
    rotation.stop().await;

    info!("Server stopped");
    result
}

/// OAuth token source for the configured client.
pub fn token_source(file: &ConfigFile) -> Result<GoogleTokenSource> {
    let config = file.snapshot()?;
    if !config.youtube.has_client() {
        return Err(ServerError::MissingClient(file.path().display().to_string()));
    }
    Ok(GoogleTokenSource::new(
        reqwest::Client::new(),
        config.youtube.client_id,
        config.youtube.client_secret,
    ))
}

/// Exchange a consent-page code and store the resulting refresh token.
pub async fn exchange_auth_code(
    file: &ConfigFile,
    source: &GoogleTokenSource,
    code: &str,
    timeout: Duration,
) -> Result<()> {
    let ctx = CallContext::with_timeout(timeout);
    let grant = source.exchange_code(&ctx, code).await?;
    persist_grant(file, &grant)
}

/// Run the device authorization flow and store the resulting refresh token.
///
/// `prompt` is shown the user code and verification URL before polling starts.
pub async fn device_auth<P>(file: &ConfigFile, source: &GoogleTokenSource, prompt: P) -> Result<()>
where
    P: FnOnce(&DeviceAuthorization),
{
    let ctx = CallContext::new();
    let auth = source.start_device_flow(&ctx).await?;
    prompt(&auth);

    let lifetime = if auth.expires_in > 0 {
        Duration::from_secs(auth.expires_in)
    } else {
        DEFAULT_DEVICE_CODE_LIFETIME
    };
    let ctx = CallContext::with_timeout(lifetime);
    let grant = source.poll_device_token(&ctx, &auth).await?;
    persist_grant(file, &grant)
}

fn persist_grant(file: &ConfigFile, grant: &TokenGrant) -> Result<()> {
    let Some(refresh_token) = grant.refresh_token.as_deref() else {
        warn!("Token endpoint returned no refresh token");
        return Err(ServerError::NoRefreshToken);
    };
    file.set_refresh_token(refresh_token)?;
    info!("Stored refresh token in {}", file.path().display());
    Ok(())
}
