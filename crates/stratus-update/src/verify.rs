//! Artifact verification: checksums and detached signatures.
//!
//! Checksum verification fetches a `checksums.txt` manifest, finds the row
//! for the artifact, and compares a streaming SHA-256 of the staged file in
//! constant time. Signature verification downloads the detached OpenPGP
//! signature (with bounded, exponentially backed-off retries for transport
//! failures) and verifies it against the embedded release-signing key. The
//! verifier fails closed: a bad digest or signature removes the artifact.
//! The one exception is a build without a signature backend, which reports
//! failure but keeps the file - its integrity has not been disproven.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use sha2::{Digest, Sha256};
use stratus_schema::Sha256Digest;
use tokio::io::AsyncReadExt;

use crate::error::UpdateError;

/// Buffer size for streaming file hashing.
const HASH_BUF_SIZE: usize = 64 * 1024;

/// Verify the staged file at `file_path` against the release's checksum
/// manifest.
///
/// # Errors
///
/// Returns [`UpdateError::Network`]/[`UpdateError::Http`] when the manifest
/// cannot be fetched, [`UpdateError::ChecksumMissing`] when it has no row
/// for `expected_name`, and [`UpdateError::ChecksumMismatch`] when the
/// digests disagree. The caller is responsible for discarding the artifact.
pub async fn verify_checksum(
    client: &Client,
    file_path: &Path,
    checksums_url: &str,
    expected_name: &str,
) -> Result<(), UpdateError> {
    let response = client.get(checksums_url).send().await?;
    let status = response.status();
    if status.as_u16() >= 400 {
        return Err(UpdateError::Http(status));
    }
    let manifest = response.text().await?;

    let expected = find_manifest_digest(&manifest, expected_name)
        .ok_or_else(|| UpdateError::ChecksumMissing(expected_name.to_string()))?;
    let actual = sha256_file(file_path).await?;

    if expected.matches(&actual) {
        tracing::debug!(file = %file_path.display(), "checksum verified");
        Ok(())
    } else {
        tracing::warn!(file = %file_path.display(), expected = %expected, actual = %actual,
            "checksum mismatch");
        Err(UpdateError::ChecksumMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

/// Find the digest for `name` in a checksum manifest.
///
/// Canonical rows are `<64-hex-digits>  <filename>`; single spaces and tabs
/// are accepted, a BSD-style `*` binary marker on the filename is stripped,
/// and blank or `#`-prefixed lines are skipped. The filename match is exact
/// and case-sensitive.
pub fn find_manifest_digest(manifest: &str, name: &str) -> Option<Sha256Digest> {
    for line in manifest.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((digest, rest)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        let filename = rest.trim_start().trim_start_matches('*');
        if filename == name {
            return Sha256Digest::validated(digest).ok();
        }
    }
    None
}

/// Streaming SHA-256 of a file, read with a fixed-size buffer.
async fn sha256_file(path: &Path) -> Result<Sha256Digest, UpdateError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_BUF_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Sha256Digest::new(hex::encode(hasher.finalize())))
}

/// Downloads and verifies detached OpenPGP signatures for staged artifacts.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    max_retries: u32,
    retry_delay: Duration,
    public_key: String,
}

impl Default for SignatureVerifier {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            public_key: stratus_schema::RELEASE_SIGNING_KEY.to_string(),
        }
    }
}

impl SignatureVerifier {
    /// A verifier trusting `public_key` (ASCII-armored) instead of the
    /// embedded release-signing key.
    pub fn with_public_key(public_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            ..Self::default()
        }
    }

    /// Override the signature-download retry policy.
    pub fn set_retry_policy(&mut self, max_retries: u32, retry_delay: Duration) {
        self.max_retries = max_retries.max(1);
        self.retry_delay = retry_delay;
    }

    /// Download the detached signature at `signature_url` and verify it
    /// against the artifact at `file_path`.
    ///
    /// Transport failures and timeouts are retried up to the configured
    /// budget with exponential backoff; explicit HTTP errors and an empty
    /// response body fail immediately. On any verification failure the
    /// artifact is removed - except when no signature backend is compiled
    /// in, which fails but keeps the file.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::SignatureInvalid`] (artifact removed),
    /// [`UpdateError::SignatureUnavailable`] (artifact kept), or the
    /// download failure that prevented verification (artifact removed).
    pub async fn verify(
        &self,
        client: &Client,
        file_path: &Path,
        signature_url: &str,
    ) -> Result<(), UpdateError> {
        if !file_path.exists() {
            tracing::warn!(file = %file_path.display(), "artifact missing before signature check");
            return Err(UpdateError::SignatureInvalid);
        }

        let signature = match self.fetch_signature(client, signature_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                discard_artifact(file_path).await;
                return Err(e);
            }
        };

        match verify_detached(&self.public_key, &signature, file_path).await {
            Ok(()) => {
                tracing::debug!(file = %file_path.display(), "signature verified");
                Ok(())
            }
            Err(e) if e.keeps_artifact() => Err(e),
            Err(e) => {
                tracing::warn!(file = %file_path.display(), error = %e, "signature rejected");
                discard_artifact(file_path).await;
                Err(e)
            }
        }
    }

    async fn fetch_signature(
        &self,
        client: &Client,
        url: &str,
    ) -> Result<Vec<u8>, UpdateError> {
        let mut attempt: u32 = 0;
        loop {
            match self.fetch_signature_once(client, url).await {
                Ok(bytes) => return Ok(bytes),
                // Explicit HTTP errors and empty bodies are not retried.
                Err(e @ (UpdateError::Http(_) | UpdateError::SignatureInvalid)) => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_retries {
                        return Err(e);
                    }
                    let delay = self.retry_delay * 2u32.saturating_pow(attempt - 1);
                    tracing::warn!(error = %e, attempt, delay_ms = delay.as_millis() as u64,
                        "signature download failed, backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn fetch_signature_once(
        &self,
        client: &Client,
        url: &str,
    ) -> Result<Vec<u8>, UpdateError> {
        let response = client.get(url).send().await?;
        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(UpdateError::Http(status));
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            tracing::warn!(url, "empty signature body");
            return Err(UpdateError::SignatureInvalid);
        }
        Ok(bytes.to_vec())
    }
}

async fn discard_artifact(file_path: &Path) {
    if let Err(e) = tokio::fs::remove_file(file_path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(error = %e, file = %file_path.display(),
                "failed to remove rejected artifact");
        }
    }
}

#[cfg(feature = "signatures")]
async fn verify_detached(
    armored_key: &str,
    signature: &[u8],
    file_path: &Path,
) -> Result<(), UpdateError> {
    let content = tokio::fs::read(file_path).await?;
    let key = armored_key.to_string();
    let signature = signature.to_vec();
    tokio::task::spawn_blocking(move || verify_detached_blocking(&key, &signature, &content))
        .await
        .map_err(|e| UpdateError::Io(std::io::Error::other(e)))?
}

#[cfg(feature = "signatures")]
fn verify_detached_blocking(
    armored_key: &str,
    signature: &[u8],
    content: &[u8],
) -> Result<(), UpdateError> {
    use pgp::{Deserializable, SignedPublicKey, StandaloneSignature};

    let (key, _) =
        SignedPublicKey::from_string(armored_key).map_err(|_| UpdateError::SignatureInvalid)?;

    let parsed = if signature.starts_with(b"-----BEGIN") {
        std::str::from_utf8(signature)
            .ok()
            .and_then(|s| StandaloneSignature::from_string(s).ok())
            .map(|(sig, _)| sig)
    } else {
        StandaloneSignature::from_bytes(std::io::Cursor::new(signature)).ok()
    };
    let Some(sig) = parsed else {
        return Err(UpdateError::SignatureInvalid);
    };

    if sig.verify(&key, content).is_ok() {
        return Ok(());
    }
    // Release artifacts are commonly signed by a subkey.
    for subkey in &key.public_subkeys {
        if sig.verify(subkey, content).is_ok() {
            return Ok(());
        }
    }
    Err(UpdateError::SignatureInvalid)
}

#[cfg(not(feature = "signatures"))]
async fn verify_detached(
    _armored_key: &str,
    _signature: &[u8],
    _file_path: &Path,
) -> Result<(), UpdateError> {
    Err(UpdateError::SignatureUnavailable)
}
