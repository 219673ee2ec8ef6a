//! Persisted release-catalog cache.
//!
//! One JSON file under the config directory holds the last fetched release
//! list together with the `ETag` that produced it and the identifying triple
//! `(channel, owner, repo)`. The cache is only trusted when the triple
//! matches the current settings; corruption, a missing file, or a mismatch
//! all mean "no cache". Writes go through a temp file and rename so a crash
//! mid-write cannot leave a truncated cache behind.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use stratus_schema::{Channel, Release};

use crate::error::UpdateError;
use crate::fsutil;
use crate::settings::UpdateSettings;

/// How long a fetched release list stays fresh.
pub const CACHE_TTL: Duration = Duration::from_secs(3600);

/// The on-disk (and in-memory) release-catalog cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogCache {
    /// Unix timestamp of the last successful check (including 304s).
    pub last_check: i64,
    /// The cached release list.
    pub releases: Vec<Release>,
    /// `ETag` from the last 200 response, for conditional requests.
    pub etag: Option<String>,
    /// Channel the list was fetched under.
    pub channel: Channel,
    /// Repository owner the list was fetched from.
    pub owner: String,
    /// Repository name the list was fetched from.
    pub repo: String,
}

impl CatalogCache {
    /// Build a cache entry for the given settings, stamped now.
    pub fn new(releases: Vec<Release>, etag: Option<String>, settings: &UpdateSettings) -> Self {
        Self {
            last_check: Utc::now().timestamp(),
            releases,
            etag,
            channel: settings.channel,
            owner: settings.owner.clone(),
            repo: settings.repo.clone(),
        }
    }

    /// Whether the cache was produced under the given settings.
    pub fn matches(&self, settings: &UpdateSettings) -> bool {
        self.channel == settings.channel
            && self.owner == settings.owner
            && self.repo == settings.repo
    }

    /// Whether the cache is younger than the TTL.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        let age = Utc::now().timestamp().saturating_sub(self.last_check);
        age >= 0 && (age as u64) < ttl.as_secs()
    }

    /// Re-stamp the cache as checked now (after a 304 Not Modified).
    pub fn touch(&mut self) {
        self.last_check = Utc::now().timestamp();
    }

    /// Read and parse the cache file.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Io`] when the file cannot be read and
    /// [`UpdateError::CacheCorrupt`] when its contents do not parse as a
    /// cache.
    pub fn try_load(path: &Path) -> Result<Self, UpdateError> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::debug!(path = %path.display(), error = %e, "discarding corrupt catalog cache");
            UpdateError::CacheCorrupt
        })
    }

    /// Read the cache file. A missing, unreadable, or schema-mismatched file
    /// is treated as "no cache".
    pub fn load(path: &Path) -> Option<Self> {
        Self::try_load(path).ok()
    }

    /// Write the cache file atomically.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Io`] when the file cannot be written.
    pub fn store(&self, path: &Path) -> Result<(), UpdateError> {
        let body = serde_json::to_vec(self).map_err(|e| UpdateError::Io(std::io::Error::other(e)))?;
        fsutil::write_atomic(path, &body)?;
        Ok(())
    }
}
