//! Update channel policy.
//!
//! Channels form a hierarchy: `stable` admits only finished releases, `beta`
//! additionally admits `beta`/`rc`-tagged prereleases, and `dev` admits
//! everything. Unknown channel names are routed through `stable` so a stale
//! or hand-edited settings file can never widen what a user sees.

use serde::{Deserialize, Serialize};

use crate::release::Release;

/// A user-selectable policy bucket governing which releases are visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Channel {
    /// Finished releases only.
    #[default]
    Stable,
    /// Finished releases plus `beta`/`rc` prereleases.
    Beta,
    /// Every release, nightlies included.
    Dev,
}

impl Channel {
    /// Whether this channel admits the given release.
    pub fn admits(self, release: &Release) -> bool {
        match self {
            Self::Stable => !release.prerelease,
            Self::Beta => {
                if !release.prerelease {
                    return true;
                }
                let tag = release.tag_name.to_lowercase();
                tag.contains("beta") || tag.contains("rc")
            }
            Self::Dev => true,
        }
    }

    /// The canonical lowercase name of the channel.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Beta => "beta",
            Self::Dev => "dev",
        }
    }
}

impl From<String> for Channel {
    fn from(s: String) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl std::str::FromStr for Channel {
    type Err = std::convert::Infallible;

    /// Parse a channel name; anything unrecognized falls back to `stable`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "beta" => Self::Beta,
            "dev" => Self::Dev,
            _ => Self::Stable,
        })
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
