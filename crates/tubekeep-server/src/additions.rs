//! Record of who added which video, and when.
//!
//! Entries are keyed by video ID; a later addition of the same video
//! replaces the earlier record. The whole map is written through to
//! `additions.json` in the data directory after every change, and an entry
//! is only visible in memory once that write has landed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// File name inside the data directory.
pub const ADDITIONS_FILE: &str = "additions.json";

/// One recorded addition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addition {
    /// Seconds since the Unix epoch.
    pub added_at: u64,
    /// Playlist name as the caller supplied it.
    pub playlist: String,
    /// Caller-supplied user label.
    #[serde(default)]
    pub user: String,
    /// Whether the add bypassed duplicate detection.
    #[serde(default)]
    pub force: bool,
}

impl Addition {
    /// A record stamped with the current time.
    pub fn now(playlist: impl Into<String>, user: impl Into<String>, force: bool) -> Self {
        let added_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        Self {
            added_at,
            playlist: playlist.into(),
            user: user.into(),
            force,
        }
    }
}

/// JSON-backed additions store.
#[derive(Debug)]
pub struct AdditionsStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, Addition>>,
}

impl AdditionsStore {
    /// Open the store in `data_dir`, creating the directory if needed.
    pub async fn open(data_dir: &Path) -> Result<Self, AdditionsError> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(|e| AdditionsError::Io {
                path: data_dir.to_path_buf(),
                reason: e.to_string(),
            })?;

        let path = data_dir.join(ADDITIONS_FILE);
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| AdditionsError::Corrupt {
                    path: path.clone(),
                    reason: e.to_string(),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(AdditionsError::Io {
                    path,
                    reason: e.to_string(),
                });
            }
        };

        debug!(
            "Opened additions store at {} with {} entries",
            path.display(),
            entries.len()
        );
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record an addition. Empty video IDs are ignored.
    pub async fn record(&self, video_id: &str, addition: Addition) -> Result<(), AdditionsError> {
        if video_id.is_empty() {
            return Ok(());
        }

        let mut entries = self.entries.write().await;
        let mut next = entries.clone();
        next.insert(video_id.to_string(), addition);

        // Written under the lock so file order matches map order.
        self.persist(&next).await?;
        *entries = next;

        info!(video_id, "Recorded addition");
        Ok(())
    }

    /// Replace the backing file with `entries`.
    ///
    /// The map goes to a sibling temp file first and is renamed over the
    /// real one, so a failed write never leaves a truncated file behind.
    async fn persist(&self, entries: &HashMap<String, Addition>) -> Result<(), AdditionsError> {
        let io_err = |path: &Path, e: std::io::Error| AdditionsError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let content = serde_json::to_string_pretty(entries).map_err(|e| {
            AdditionsError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            }
        })?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| io_err(tmp.as_path(), e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_err(self.path.as_path(), e));
        }
        Ok(())
    }

    /// The latest addition of `video_id`, if any.
    pub async fn get(&self, video_id: &str) -> Option<Addition> {
        self.entries.read().await.get(video_id).cloned()
    }

    /// Latest additions for several videos at once.
    pub async fn get_many<'a, I>(&self, video_ids: I) -> HashMap<String, Addition>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let entries = self.entries.read().await;
        video_ids
            .into_iter()
            .filter_map(|id| entries.get(id).map(|a| (id.to_string(), a.clone())))
            .collect()
    }

    /// Number of recorded videos.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether nothing has been recorded.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Additions store errors.
#[derive(Debug, thiserror::Error)]
pub enum AdditionsError {
    /// Filesystem failure.
    #[error("Additions store I/O error at {path}: {reason}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        reason: String,
    },

    /// The backing file is not a valid additions map.
    #[error("Additions store at {path} is corrupt: {reason}")]
    Corrupt {
        /// Path involved.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },
}
