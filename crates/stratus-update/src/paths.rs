use std::path::{Path, PathBuf};

/// Returns the primary configuration directory, or None if it cannot be
/// resolved.
pub fn try_config_dir() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("STRATUS_HOME") {
        return Some(PathBuf::from(val));
    }
    dirs::config_dir().map(|d| d.join("Stratus"))
}

/// Returns the canonical Stratus configuration directory.
///
/// # Panics
///
/// Panics if neither `STRATUS_HOME` is set nor the platform config directory
/// can be resolved. On desktop platforms this should never happen in normal
/// use.
pub fn config_dir() -> PathBuf {
    try_config_dir().expect("Could not determine config directory. Set STRATUS_HOME to override.")
}

/// Staging directory for downloaded artifacts: `<config-dir>/updates`
pub fn updates_dir(config_dir: &Path) -> PathBuf {
    config_dir.join("updates")
}

/// Persisted update settings: `<config-dir>/update-settings.json`
pub fn settings_path(config_dir: &Path) -> PathBuf {
    config_dir.join("update-settings.json")
}

/// Persisted release-catalog cache: `<config-dir>/update-cache.json`
pub fn cache_path(config_dir: &Path) -> PathBuf {
    config_dir.join("update-cache.json")
}
