use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// Newtype for a SHA-256 digest string (64 hex characters).
///
/// Provides compile-time distinction from other strings and optional runtime
/// validation. Comparison against another digest is constant-time so manifest
/// verification never leaks how far a comparison got.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Create a new `Sha256Digest` without validation (for deserialized data).
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().to_ascii_lowercase())
    }

    /// Create a validated `Sha256Digest` (64 hex characters, normalized to
    /// lowercase).
    ///
    /// # Errors
    ///
    /// Returns an error string if `s` is not exactly 64 ASCII hex characters.
    pub fn validated(s: &str) -> Result<Self, String> {
        if s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(format!(
                "Invalid SHA-256 digest: expected 64 hex chars, got '{s}'"
            ))
        }
    }

    /// Return the inner hex string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time equality against another digest.
    pub fn matches(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && bool::from(self.0.as_bytes().ct_eq(other.0.as_bytes()))
    }
}

impl PartialEq for Sha256Digest {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl Eq for Sha256Digest {}

impl std::fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Sha256Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Sha256Digest {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Sha256Digest {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
