//! Domain errors for the update subsystem.
//!
//! Every expected failure mode surfaces through [`UpdateError`]; the
//! orchestrator never converts one into a panic. The catalog layer prefers
//! cached data over `Network`/`RateLimited`, the verifier fails closed on
//! `Checksum*`/`SignatureInvalid`, and the download engine guarantees no
//! partial file survives any variant.

use thiserror::Error;

/// Failure modes of the update subsystem.
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("rate limited by the release host")]
    RateLimited,

    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode),

    #[error("catalog cache unreadable or stale schema")]
    CacheCorrupt,

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("no checksum row for '{0}' in the manifest")]
    ChecksumMissing(String),

    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("no signature backend available")]
    SignatureUnavailable,

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid staging path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpdateError {
    /// Whether this failure left the artifact in place (the policy for an
    /// absent crypto backend: integrity has not been disproven).
    pub fn keeps_artifact(&self) -> bool {
        matches!(self, Self::SignatureUnavailable)
    }
}
