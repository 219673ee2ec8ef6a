//! Persisted update settings.
//!
//! A single JSON file under the config directory holds the user-facing knobs:
//! release channel, repository owner, repository name. A missing or
//! unreadable file yields defaults; an unknown channel string degrades to
//! `stable` via the channel's own fallback rule, so loading never fails.

use std::path::Path;

use serde::{Deserialize, Serialize};
use stratus_schema::Channel;

use crate::error::UpdateError;
use crate::{fsutil, paths};

/// Default repository owner for release lookups.
pub const DEFAULT_OWNER: &str = "stratus-app";
/// Default repository name for release lookups.
pub const DEFAULT_REPO: &str = "stratus";

/// User-facing update settings, persisted as `update-settings.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSettings {
    /// Release channel to follow.
    #[serde(default)]
    pub channel: Channel,
    /// Repository owner on the release host.
    #[serde(default = "default_owner")]
    pub owner: String,
    /// Repository name on the release host.
    #[serde(default = "default_repo")]
    pub repo: String,
}

fn default_owner() -> String {
    DEFAULT_OWNER.to_string()
}

fn default_repo() -> String {
    DEFAULT_REPO.to_string()
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self {
            channel: Channel::Stable,
            owner: default_owner(),
            repo: default_repo(),
        }
    }
}

impl UpdateSettings {
    /// Load settings from the config directory. Missing or unreadable files
    /// yield defaults.
    pub fn load(config_dir: &Path) -> Self {
        let path = paths::settings_path(config_dir);
        match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "unreadable update settings, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Persist settings atomically to the config directory.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Io`] when the file cannot be written.
    pub fn save(&self, config_dir: &Path) -> Result<(), UpdateError> {
        let body = serde_json::to_vec_pretty(self)
            .map_err(|e| UpdateError::Io(std::io::Error::other(e)))?;
        fsutil::write_atomic(&paths::settings_path(config_dir), &body)?;
        Ok(())
    }

    /// The `owner/repo` identity these settings point at.
    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}
