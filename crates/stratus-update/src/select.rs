//! Release selection.
//!
//! Takes the fetched release list and answers one question: is there an
//! update for this channel, platform, and installed version? Selection never
//! fails - missing or malformed data simply yields "no update".

use stratus_schema::{Channel, Release, ReleaseAsset, ReleaseVersion, UpdateInfo};
use stratus_schema::version::strip_tag_prefix;

/// Well-known names for a release's checksum manifest asset.
const CHECKSUM_MANIFEST_NAMES: &[&str] = &["checksums.txt", "SHA256SUMS"];

/// The platform an artifact is being selected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Microsoft Windows.
    Windows,
    /// Apple macOS.
    MacOs,
    /// Linux-based operating systems.
    Linux,
}

impl Platform {
    /// The platform this build is running on.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }

    /// Canonical lowercase platform name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::MacOs => "macos",
            Self::Linux => "linux",
        }
    }

    /// Artifact suffixes for this platform, in priority order. Lowercase;
    /// matching is case-insensitive.
    fn suffixes(self) -> &'static [&'static str] {
        match self {
            Self::Windows => &[".exe", ".msi", ".zip"],
            Self::MacOs => &[".dmg", ".pkg"],
            Self::Linux => &[".deb", ".tar.gz", ".appimage", ".rpm"],
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the best update candidate, or `None` when there is no update.
///
/// Releases are filtered by channel, sorted by version (descending, with
/// `published_at` as the tiebreak), and walked until one with assets is
/// found. The candidate must be strictly newer than `current_version`.
pub fn select_update(
    releases: &[Release],
    channel: Channel,
    platform: Platform,
    current_version: &str,
) -> Option<UpdateInfo> {
    let mut candidates: Vec<(ReleaseVersion, &Release)> = releases
        .iter()
        .filter(|r| channel.admits(r))
        .map(|r| (ReleaseVersion::parse(&r.tag_name), r))
        .collect();
    candidates.sort_by(|(va, ra), (vb, rb)| {
        vb.cmp(va).then_with(|| rb.published_at.cmp(&ra.published_at))
    });

    let current = ReleaseVersion::parse(current_version);
    for (version, release) in candidates {
        if release.assets.is_empty() {
            tracing::debug!(tag = %release.tag_name, "skipping release with no assets");
            continue;
        }
        let asset = match_platform_asset(&release.assets, platform)
            .unwrap_or_else(|| {
                tracing::debug!(tag = %release.tag_name, platform = %platform,
                    "no platform asset, falling back to the first asset");
                &release.assets[0]
            });

        if version <= current {
            tracing::debug!(tag = %release.tag_name, current = %current, "no newer release");
            return None;
        }

        return Some(UpdateInfo {
            version: strip_tag_prefix(&release.tag_name).to_string(),
            download_url: asset.browser_download_url.clone(),
            artifact_name: asset.name.clone(),
            size: asset.size,
            notes: release.body.clone(),
            published_at: release.published_at,
            is_prerelease: release.prerelease,
            checksum_url: find_checksums_asset(release)
                .map(|a| a.browser_download_url.clone()),
            signature_url: find_signature_asset(release, &asset.name)
                .map(|a| a.browser_download_url.clone()),
        });
    }
    None
}

/// First asset matching the platform's suffix priority list.
pub fn match_platform_asset(assets: &[ReleaseAsset], platform: Platform) -> Option<&ReleaseAsset> {
    for suffix in platform.suffixes() {
        if let Some(asset) = assets
            .iter()
            .find(|a| a.name.to_lowercase().ends_with(suffix))
        {
            return Some(asset);
        }
    }
    None
}

/// The release's checksum manifest asset, when it carries one.
pub fn find_checksums_asset(release: &Release) -> Option<&ReleaseAsset> {
    release.assets.iter().find(|a| {
        CHECKSUM_MANIFEST_NAMES
            .iter()
            .any(|name| a.name.eq_ignore_ascii_case(name))
    })
}

/// The detached signature asset for `artifact_name`: `<name>.sig` wins over
/// `<name>.asc`.
pub fn find_signature_asset<'a>(
    release: &'a Release,
    artifact_name: &str,
) -> Option<&'a ReleaseAsset> {
    release
        .assets
        .iter()
        .find(|a| a.is_signature_for(artifact_name) && a.name.ends_with(".sig"))
        .or_else(|| {
            release
                .assets
                .iter()
                .find(|a| a.is_signature_for(artifact_name))
        })
}
