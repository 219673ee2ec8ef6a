//! Staging-path safety validation.
//!
//! Artifact names come from a remote catalog, so the engine treats them as
//! hostile until proven otherwise: no path separators, no `..` components,
//! none of the shell-metacharacter set `< > : " | ? *`. After a download
//! completes, [`validate_staged_artifact`] re-checks the file where it landed:
//! it must exist, resolve inside the staging directory, carry the expected
//! suffix, and have a clean name.

use std::path::{Path, PathBuf};

use crate::error::UpdateError;

/// Characters never allowed in an artifact filename.
const SUSPICIOUS_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// Validate a bare artifact filename before it is joined to the staging
/// directory.
///
/// # Errors
///
/// Returns [`UpdateError::InvalidPath`] for empty names, path separators,
/// `..`, or suspicious characters.
pub fn validate_artifact_name(name: &str) -> Result<(), UpdateError> {
    if name.is_empty() {
        return Err(UpdateError::InvalidPath("empty artifact name".to_string()));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(UpdateError::InvalidPath(format!(
            "path separator in artifact name '{name}'"
        )));
    }
    if name == ".." || name.split('.').all(str::is_empty) {
        return Err(UpdateError::InvalidPath(format!(
            "traversal component in artifact name '{name}'"
        )));
    }
    validate_no_suspicious_characters(name)
}

/// Reject filenames containing shell metacharacters.
///
/// Only the final path component is inspected, so drive letters and
/// directory separators in a full path stay valid.
///
/// # Errors
///
/// Returns [`UpdateError::InvalidPath`] when the filename contains any of
/// `< > : " | ? *`.
pub fn validate_no_suspicious_characters(path: &str) -> Result<(), UpdateError> {
    let filename = path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(path);
    if filename.contains(SUSPICIOUS_CHARS) {
        return Err(UpdateError::InvalidPath(format!(
            "suspicious characters in filename '{filename}'"
        )));
    }
    Ok(())
}

/// Reject paths containing a `..` component (a literal `..` inside a single
/// filename, like `a..b.msi`, is fine).
///
/// # Errors
///
/// Returns [`UpdateError::InvalidPath`] when any component is `..`.
pub fn validate_no_traversal(path: &Path) -> Result<(), UpdateError> {
    if path
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(UpdateError::InvalidPath(format!(
            "parent-directory traversal in '{}'",
            path.display()
        )));
    }
    Ok(())
}

/// Require the filename to end with `suffix`, case-insensitively.
///
/// # Errors
///
/// Returns [`UpdateError::InvalidPath`] on a suffix mismatch.
pub fn validate_file_suffix(path: &Path, suffix: &str) -> Result<(), UpdateError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if !name.to_ascii_lowercase().ends_with(&suffix.to_ascii_lowercase()) {
        return Err(UpdateError::InvalidPath(format!(
            "expected '{suffix}' suffix on '{name}'"
        )));
    }
    Ok(())
}

/// Require `path` to resolve inside `dir` after canonicalization, so a
/// symlink or `..` cannot escape the staging directory.
///
/// # Errors
///
/// Returns [`UpdateError::InvalidPath`] when either path cannot be resolved
/// or the resolved path lands outside `dir`.
pub fn validate_within_dir(path: &Path, dir: &Path) -> Result<PathBuf, UpdateError> {
    let resolved = path.canonicalize().map_err(|_| {
        UpdateError::InvalidPath(format!("cannot resolve '{}'", path.display()))
    })?;
    let root = dir.canonicalize().map_err(|_| {
        UpdateError::InvalidPath(format!("cannot resolve '{}'", dir.display()))
    })?;
    if !resolved.starts_with(&root) {
        return Err(UpdateError::InvalidPath(format!(
            "'{}' is outside expected directory '{}'",
            resolved.display(),
            root.display()
        )));
    }
    Ok(resolved)
}

/// Full post-download check: the file exists, resolves within the staging
/// directory, carries the expected suffix (when one is specified), and its
/// name is free of suspicious characters. Returns the resolved absolute path.
///
/// # Errors
///
/// Returns [`UpdateError::InvalidPath`] when any of those conditions fails.
pub fn validate_staged_artifact(
    path: &Path,
    staging_dir: &Path,
    expected_suffix: Option<&str>,
) -> Result<PathBuf, UpdateError> {
    if !path.exists() {
        return Err(UpdateError::InvalidPath(format!(
            "staged artifact '{}' does not exist",
            path.display()
        )));
    }
    validate_no_traversal(path)?;
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        validate_no_suspicious_characters(name)?;
    }
    if let Some(suffix) = expected_suffix {
        validate_file_suffix(path, suffix)?;
    }
    validate_within_dir(path, staging_dir)
}
