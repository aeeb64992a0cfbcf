//! Refresh-credential management and background rotation.
//!
//! The [`TokenManager`] owns the refresh credential. It trades it for access
//! tokens through a [`TokenSource`], caches the last access token until just
//! before it expires, and on a fixed schedule renews the credential so a
//! rotated value reaches the persistence hook well before the old one lapses.
//!
//! # Rotation
//!
//! When an exchange reports a refresh credential different from the current
//! one, the manager stores it first and then calls the hook registered with
//! [`TokenManager::on_credential_rotated`] exactly once, before the exchange
//! returns. All exchanges are serialized, so concurrent callers never report
//! the same rotation twice.
//!
//! ```rust,ignore
//! let manager = Arc::new(
//!     TokenManager::new(source, config.refresh_token.clone())
//!         .on_credential_rotated(move |token| persist(token)),
//! );
//! let handle = manager.start(Duration::from_secs(7 * 24 * 60 * 60));
//! // ...
//! handle.stop().await;
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::CallContext;
use crate::error::Result;

/// Default rotation interval (one week).
pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Longest rotation period the loop accepts; longer requests are clamped.
pub const MAX_ROTATION_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Access tokens are renewed this long before they expire.
pub const ACCESS_TOKEN_MARGIN: Duration = Duration::from_secs(60);

/// Longest access-token lifetime trusted from the token endpoint.
pub const MAX_ACCESS_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Error returned by a credential hook.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Callback receiving each newly rotated refresh credential.
pub type CredentialHook = Arc<dyn Fn(&str) -> std::result::Result<(), HookError> + Send + Sync>;

/// Result of exchanging a refresh credential.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    /// Short-lived bearer token.
    pub access_token: String,
    /// Replacement refresh credential, when the issuer rotated it.
    pub refresh_token: Option<String>,
    /// Lifetime of `access_token`.
    pub expires_in: Duration,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Exchanges a refresh credential for an access token.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Perform one exchange.
    async fn exchange(&self, ctx: &CallContext, refresh_token: &str) -> Result<TokenGrant>;
}

/// The current refresh credential and when it last changed.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialState {
    /// Current refresh credential.
    pub refresh_token: String,
    /// When the credential was last rotated, `None` if never.
    pub last_rotated_at: Option<SystemTime>,
}

impl fmt::Debug for CredentialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialState")
            .field("refresh_token", &"<redacted>")
            .field("last_rotated_at", &self.last_rotated_at)
            .finish()
    }
}

struct CachedAccess {
    token: String,
    expires_at: Instant,
}

/// Owner of the refresh credential.
pub struct TokenManager {
    source: Arc<dyn TokenSource>,
    state: RwLock<CredentialState>,
    access: Mutex<Option<CachedAccess>>,
    hook: Option<CredentialHook>,
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("has_hook", &self.hook.is_some())
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Create a manager for `refresh_token`.
    pub fn new(source: Arc<dyn TokenSource>, refresh_token: impl Into<String>) -> Self {
        Self {
            source,
            state: RwLock::new(CredentialState {
                refresh_token: refresh_token.into(),
                last_rotated_at: None,
            }),
            access: Mutex::new(None),
            hook: None,
        }
    }

    /// Register the persistence hook for rotated credentials.
    #[must_use]
    pub fn on_credential_rotated<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<(), HookError> + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// The refresh credential currently in use.
    pub async fn current_refresh_token(&self) -> String {
        self.state.read().await.refresh_token.clone()
    }

    /// Snapshot of the credential state.
    pub async fn state(&self) -> CredentialState {
        self.state.read().await.clone()
    }

    /// A valid access token, exchanging the refresh credential when the
    /// cached one is missing or about to expire.
    pub async fn access_token(&self, ctx: &CallContext) -> Result<String> {
        let mut access = self.access.lock().await;
        if let Some(cached) = access.as_ref()
            && Instant::now() + ACCESS_TOKEN_MARGIN < cached.expires_at
        {
            return Ok(cached.token.clone());
        }

        debug!("Exchanging refresh credential for an access token");
        let grant = self.exchange(ctx).await?;
        let token = grant.access_token.clone();
        *access = Some(self.apply_grant(grant).await);
        Ok(token)
    }

    /// Run one exchange now. Returns `true` when the refresh credential changed.
    pub async fn rotate_once(&self, ctx: &CallContext) -> Result<bool> {
        let mut access = self.access.lock().await;
        let before = self.current_refresh_token().await;

        let grant = self.exchange(ctx).await?;
        *access = Some(self.apply_grant(grant).await);

        let rotated = self.current_refresh_token().await != before;
        if !rotated {
            debug!("Refresh credential unchanged after scheduled exchange");
        }
        Ok(rotated)
    }

    async fn exchange(&self, ctx: &CallContext) -> Result<TokenGrant> {
        let refresh_token = self.current_refresh_token().await;
        ctx.run(self.source.exchange(ctx, &refresh_token)).await
    }

    /// Store a grant's rotated credential and fire the hook. Callers hold the
    /// access lock, so rotations are applied one at a time.
    async fn apply_grant(&self, grant: TokenGrant) -> CachedAccess {
        let cached = CachedAccess {
            token: grant.access_token,
            expires_at: Instant::now() + grant.expires_in.min(MAX_ACCESS_TOKEN_LIFETIME),
        };

        let Some(new_token) = grant.refresh_token.filter(|t| !t.is_empty()) else {
            return cached;
        };

        {
            let mut state = self.state.write().await;
            if state.refresh_token == new_token {
                return cached;
            }
            state.refresh_token.clone_from(&new_token);
            state.last_rotated_at = Some(SystemTime::now());
        }
        info!("Refresh credential rotated");

        if let Some(hook) = &self.hook
            && let Err(e) = hook(&new_token)
        {
            warn!("Failed to persist rotated refresh credential: {}", e);
        }
        cached
    }

    /// Start the background rotation loop.
    ///
    /// The first exchange happens one `period` after start. Failures are
    /// logged and the loop keeps its schedule. Periods above
    /// [`MAX_ROTATION_INTERVAL`] are clamped.
    #[must_use]
    pub fn start(self: &Arc<Self>, period: Duration) -> RotationHandle {
        let period = period.min(MAX_ROTATION_INTERVAL);
        let cancel = CancellationToken::new();

        let manager = Arc::clone(self);
        let task_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("Credential rotation scheduled every {:?}", period);

            loop {
                tokio::select! {
                    () = task_cancel.cancelled() => {
                        debug!("Credential rotation loop shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let ctx = CallContext::with_token(task_cancel.child_token());
                        match manager.rotate_once(&ctx).await {
                            Ok(true) => info!("Scheduled credential rotation completed"),
                            Ok(false) => {}
                            Err(e) => warn!("Scheduled credential rotation failed: {}", e),
                        }
                    }
                }
            }
        });

        RotationHandle { cancel, task }
    }
}

/// Handle for stopping a running rotation loop.
#[derive(Debug)]
pub struct RotationHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RotationHandle {
    /// Stop the loop, aborting an exchange that is in flight, and wait for
    /// the task to exit. No hook call is running once this returns.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Credential rotation task ended abnormally: {}", e);
        }
    }

    /// Whether the loop task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
