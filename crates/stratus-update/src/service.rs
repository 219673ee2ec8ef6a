//! The orchestrating update service.
//!
//! `UpdateService` composes the catalog client, the release selector, the
//! download engine, and the verifier behind the three-operation surface the
//! host process uses: `check_for_updates`, `download_update`, `cleanup`. It
//! also owns the persisted settings and the staging directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use stratus_schema::{Channel, UpdateInfo};
use tokio_util::sync::CancellationToken;

use crate::catalog::CatalogClient;
use crate::error::UpdateError;
use crate::progress::ProgressSink;
use crate::select::{self, Platform};
use crate::settings::UpdateSettings;
use crate::verify::{self, SignatureVerifier};
use crate::{download, paths, validate};

/// Connect/read timeouts for artifact and manifest transfers. Streaming
/// downloads carry no overall deadline, only a per-read one.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// A support-tooling snapshot of the updater's state.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    /// Resolved `owner/repo` identity.
    pub repo: String,
    /// Active release channel.
    pub channel: Channel,
    /// Platform artifacts are selected for.
    pub platform: &'static str,
    /// HTTP status of the most recent catalog response.
    pub last_status: Option<u16>,
    /// Seconds since the catalog cache was last confirmed.
    pub cache_age_secs: Option<i64>,
}

/// Discovers, downloads, verifies, and stages application updates.
#[derive(Debug)]
pub struct UpdateService {
    config_dir: PathBuf,
    settings: UpdateSettings,
    platform: Platform,
    catalog: CatalogClient,
    transfer: Client,
    signature: SignatureVerifier,
}

impl UpdateService {
    /// Create a service rooted at `config_dir`, loading persisted settings.
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        let settings = UpdateSettings::load(&config_dir);
        let catalog = CatalogClient::new(paths::cache_path(&config_dir));
        let transfer = Client::builder()
            .user_agent(crate::USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            config_dir,
            settings,
            platform: Platform::current(),
            catalog,
            transfer,
            signature: SignatureVerifier::default(),
        }
    }

    /// Create a service rooted at the platform config directory.
    ///
    /// # Panics
    ///
    /// Panics if the config directory cannot be resolved; see
    /// [`paths::config_dir`].
    pub fn from_default_config_dir() -> Self {
        Self::new(paths::config_dir())
    }

    /// The active settings.
    pub fn settings(&self) -> &UpdateSettings {
        &self.settings
    }

    /// Replace and persist the settings. A changed `owner` or `repo`
    /// invalidates the catalog cache; a changed channel invalidates it via
    /// the cache's own triple rule.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Io`] when the settings file cannot be written.
    pub fn save_settings(&mut self, settings: UpdateSettings) -> Result<(), UpdateError> {
        if settings.owner != self.settings.owner || settings.repo != self.settings.repo {
            tracing::debug!(repo = %settings.repo_slug(), "repository changed, dropping catalog cache");
            self.catalog.invalidate();
        }
        settings.save(&self.config_dir)?;
        self.settings = settings;
        Ok(())
    }

    /// Override the selection platform (the host platform by default).
    pub fn set_platform(&mut self, platform: Platform) {
        self.platform = platform;
    }

    /// Point the catalog client at a different API root (test servers,
    /// mirrors).
    pub fn set_api_base(&mut self, base: impl Into<String>) {
        self.catalog.set_api_base(base);
    }

    /// Override the catalog retry policy.
    pub fn set_catalog_retry_policy(&mut self, max_attempts: u32, retry_delay: Duration) {
        self.catalog.set_retry_policy(max_attempts, retry_delay);
    }

    /// Replace the signature verifier (e.g. to trust a different key).
    pub fn set_signature_verifier(&mut self, verifier: SignatureVerifier) {
        self.signature = verifier;
    }

    /// The staging directory artifacts are downloaded into.
    pub fn staging_dir(&self) -> PathBuf {
        paths::updates_dir(&self.config_dir)
    }

    /// Check the release host for an update newer than `current_version`.
    ///
    /// Composes the catalog fetch and the selector. Never fails: any error
    /// is logged and reported as "no update".
    pub async fn check_for_updates(&mut self, current_version: &str) -> Option<UpdateInfo> {
        let releases = match self.catalog.fetch_releases(&self.settings).await {
            Ok(releases) => releases,
            Err(e) => {
                tracing::warn!(error = %e, "update check failed");
                return None;
            }
        };
        let info = select::select_update(
            &releases,
            self.settings.channel,
            self.platform,
            current_version,
        );
        match &info {
            Some(info) => tracing::info!(version = %info.version, "update available"),
            None => tracing::debug!(current = current_version, "no update available"),
        }
        info
    }

    /// Download the selected update into the staging directory, verify it,
    /// and return the staged artifact's absolute path.
    ///
    /// The artifact streams to `<config-dir>/updates/<artifact-name>`; its
    /// checksum is verified when the release carries a manifest, and its
    /// detached signature when one was selected. Cancellation between
    /// phases cancels verification symmetrically.
    ///
    /// # Errors
    ///
    /// Any download or verification failure is returned as the matching
    /// [`UpdateError`]; on every failure except
    /// [`UpdateError::SignatureUnavailable`] the staged file is removed.
    pub async fn download_update<P>(
        &mut self,
        info: &UpdateInfo,
        progress: &P,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, UpdateError>
    where
        P: ProgressSink + ?Sized,
    {
        let staging = self.staging_dir();
        validate::validate_artifact_name(&info.artifact_name)?;

        // A leftover from an earlier attempt would make the exclusive create
        // fail; stale files are not worth keeping.
        let dest = staging.join(&info.artifact_name);
        if dest.exists() {
            tracing::debug!(dest = %dest.display(), "removing stale staged artifact");
            tokio::fs::remove_file(&dest).await?;
        }

        let staged = download::download_file(
            &self.transfer,
            &info.download_url,
            &staging,
            &info.artifact_name,
            progress,
            cancel,
        )
        .await?;

        if cancel.is_cancelled() {
            discard(&staged).await;
            return Err(UpdateError::Cancelled);
        }

        if let Some(checksums_url) = &info.checksum_url {
            if let Err(e) = verify::verify_checksum(
                &self.transfer,
                &staged,
                checksums_url,
                &info.artifact_name,
            )
            .await
            {
                discard(&staged).await;
                return Err(e);
            }
        }

        if cancel.is_cancelled() {
            discard(&staged).await;
            return Err(UpdateError::Cancelled);
        }

        if let Some(signature_url) = &info.signature_url {
            // The verifier removes the artifact itself on rejection, and
            // deliberately keeps it when no backend is compiled in.
            self.signature
                .verify(&self.transfer, &staged, signature_url)
                .await?;
        }

        let staged = validate::validate_staged_artifact(&staged, &staging, None)?;
        tracing::info!(version = %info.version, path = %staged.display(), "update staged");
        Ok(staged)
    }

    /// Support-tooling snapshot: repo identity, channel, platform, last HTTP
    /// status, cache staleness. Makes no network calls.
    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            repo: self.settings.repo_slug(),
            channel: self.settings.channel,
            platform: self.platform.as_str(),
            last_status: self.catalog.last_status(),
            cache_age_secs: self.catalog.cache_age(),
        }
    }

    /// Purge staged artifacts left over from previous attempts.
    pub async fn cleanup(&self) {
        let staging = self.staging_dir();
        let Ok(mut entries) = tokio::fs::read_dir(&staging).await else {
            return;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if entry.file_type().await.is_ok_and(|t| t.is_file()) {
                tracing::debug!(path = %path.display(), "purging staged artifact");
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(error = %e, path = %path.display(), "failed to purge artifact");
                }
            }
        }
    }
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(error = %e, path = %path.display(), "failed to remove staged artifact");
        }
    }
}
