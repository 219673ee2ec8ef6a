//! Release, asset, and update-candidate records.
//!
//! [`Release`] and [`ReleaseAsset`] mirror the JSON served by a
//! GitHub-compatible `/repos/{owner}/{repo}/releases` endpoint; unknown
//! fields are ignored and optional fields default so a sparse payload still
//! deserializes. [`UpdateInfo`] is the selector's output: everything a caller
//! needs to download, verify, and describe one update candidate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single release as listed by the release host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    /// Git tag the release was cut from (e.g. `v0.9.5`).
    pub tag_name: String,
    /// Publisher's not-for-general-audiences flag.
    #[serde(default)]
    pub prerelease: bool,
    /// Publication timestamp; absent for drafts.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Downloadable files attached to the release.
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
    /// Release notes, treated as opaque text.
    #[serde(default)]
    pub body: String,
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseAsset {
    /// Asset filename; its suffix drives platform matching.
    pub name: String,
    /// Direct download URL.
    pub browser_download_url: String,
    /// Declared size in bytes.
    #[serde(default)]
    pub size: u64,
}

impl ReleaseAsset {
    /// Whether this asset is a detached signature (`.sig` or `.asc`) for the
    /// named artifact.
    pub fn is_signature_for(&self, artifact_name: &str) -> bool {
        self.name
            .strip_prefix(artifact_name)
            .is_some_and(|rest| rest == ".sig" || rest == ".asc")
    }
}

/// An update candidate chosen by the release selector.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateInfo {
    /// Version string with any `v` tag prefix stripped.
    pub version: String,
    /// Direct download URL of the selected artifact.
    pub download_url: String,
    /// Filename of the selected artifact.
    pub artifact_name: String,
    /// Declared artifact size in bytes (0 when the host omitted it).
    pub size: u64,
    /// Release notes body.
    pub notes: String,
    /// Publication timestamp of the release.
    pub published_at: Option<DateTime<Utc>>,
    /// Whether the release is flagged as a prerelease.
    pub is_prerelease: bool,
    /// URL of the release's `checksums.txt` manifest, when present.
    pub checksum_url: Option<String>,
    /// URL of the artifact's detached signature, when present.
    pub signature_url: Option<String>,
}
