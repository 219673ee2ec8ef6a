//! Streaming artifact downloads.
//!
//! The engine writes one artifact into the staging directory: chunks land in
//! order, progress fires after every chunk, cancellation is polled at chunk
//! boundaries, and every failure path removes the partial file. At the
//! moment a call returns, the destination file exists if and only if the
//! call returned its path.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::error::UpdateError;
use crate::progress::ProgressSink;
use crate::validate;

/// Download `url` into `dest_dir/file_name`, streaming chunks to disk.
///
/// The directory is created on demand (owner-only on unix). The destination
/// is created exclusively; a leftover file with the same name is a caller
/// error. Progress callbacks report strictly increasing byte counts; the
/// last one of a completed transfer reports the final count.
///
/// # Errors
///
/// Returns [`UpdateError::InvalidPath`] for a hostile filename (nothing is
/// written), [`UpdateError::Http`] for status >= 400,
/// [`UpdateError::Cancelled`] when the token fires, and
/// [`UpdateError::Network`]/[`UpdateError::Io`] for stream or disk failures.
/// On every failure after creation the partial file is removed.
pub async fn download_file<P>(
    client: &Client,
    url: &str,
    dest_dir: &Path,
    file_name: &str,
    progress: &P,
    cancel: &CancellationToken,
) -> Result<PathBuf, UpdateError>
where
    P: ProgressSink + ?Sized,
{
    validate::validate_artifact_name(file_name)?;

    tokio::fs::create_dir_all(dest_dir).await?;
    restrict_dir_permissions(dest_dir);

    let response = client.get(url).send().await?;
    let status = response.status();
    if status.as_u16() >= 400 {
        return Err(UpdateError::Http(status));
    }
    let total = response.content_length();

    let dest = dest_dir.join(file_name);
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&dest)
        .await?;

    tracing::debug!(url, dest = %dest.display(), total = ?total, "starting download");

    match stream_to_file(response, &mut file, progress, cancel, total).await {
        Ok(written) => {
            drop(file);
            tracing::debug!(written, dest = %dest.display(), "download complete");
            Ok(dest)
        }
        Err(e) => {
            drop(file);
            if let Err(remove_err) = tokio::fs::remove_file(&dest).await {
                tracing::warn!(error = %remove_err, dest = %dest.display(),
                    "failed to remove partial download");
            }
            Err(e)
        }
    }
}

async fn stream_to_file<P>(
    response: reqwest::Response,
    file: &mut File,
    progress: &P,
    cancel: &CancellationToken,
    total: Option<u64>,
) -> Result<u64, UpdateError>
where
    P: ProgressSink + ?Sized,
{
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
        progress.transferred(written, total);

        // Cancellation is observed at chunk boundaries only; a partially
        // written chunk is never interrupted mid-write.
        if cancel.is_cancelled() {
            tracing::debug!(written, "download cancelled");
            return Err(UpdateError::Cancelled);
        }
    }

    file.flush().await?;
    Ok(written)
}

#[cfg(unix)]
fn restrict_dir_permissions(dir: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)) {
        tracing::debug!(error = %e, dir = %dir.display(), "could not restrict staging permissions");
    }
}

#[cfg(not(unix))]
fn restrict_dir_permissions(_dir: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgress;
    use mockito::Server;
    use std::sync::Mutex;

    #[tokio::test]
    async fn streams_body_and_reports_ordered_progress() {
        let mut server = Server::new_async().await;
        let body = vec![0xAB_u8; 4096];
        let _mock = server
            .mock("GET", "/file.bin")
            .with_status(200)
            .with_header("content-length", "4096")
            .with_body(&body)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let seen: Mutex<Vec<(u64, Option<u64>)>> = Mutex::new(Vec::new());
        let sink = |current: u64, total: Option<u64>| {
            seen.lock().unwrap().push((current, total));
        };

        let client = Client::new();
        let dest = download_file(
            &client,
            &format!("{}/file.bin", server.url()),
            dir.path(),
            "file.bin",
            &sink,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), body);
        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
        assert_eq!(seen.last().unwrap().0, 4096);
        assert_eq!(seen.last().unwrap().1, Some(4096));
    }

    #[tokio::test]
    async fn http_error_leaves_no_file() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.bin")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = download_file(
            &Client::new(),
            &format!("{}/missing.bin", server.url()),
            dir.path(),
            "missing.bin",
            &NullProgress,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, UpdateError::Http(status) if status.as_u16() == 404));
        assert!(!dir.path().join("missing.bin").exists());
    }

    #[tokio::test]
    async fn cancellation_removes_the_partial_file() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/big.bin")
            .with_status(200)
            .with_body(vec![0u8; 1 << 16])
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let sink = move |current: u64, _: Option<u64>| {
            if current > 0 {
                trigger.cancel();
            }
        };

        let err = download_file(
            &Client::new(),
            &format!("{}/big.bin", server.url()),
            dir.path(),
            "big.bin",
            &sink,
            &cancel,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, UpdateError::Cancelled));
        assert!(!dir.path().join("big.bin").exists());
    }

    #[tokio::test]
    async fn hostile_names_are_rejected_before_any_network_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = download_file(
            &Client::new(),
            "http://127.0.0.1:9/na",
            dir.path(),
            "../evil.exe",
            &NullProgress,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, UpdateError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn existing_destination_is_a_caller_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/file.bin")
            .with_status(200)
            .with_body("payload")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file.bin"), b"previous").unwrap();

        let err = download_file(
            &Client::new(),
            &format!("{}/file.bin", server.url()),
            dir.path(),
            "file.bin",
            &NullProgress,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, UpdateError::Io(_)));
        // The pre-existing file is untouched.
        assert_eq!(std::fs::read(dir.path().join("file.bin")).unwrap(), b"previous");
    }
}
