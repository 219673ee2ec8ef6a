//! Release catalog client.
//!
//! Fetches the paginated release list from a GitHub-compatible
//! `/repos/{owner}/{repo}/releases` endpoint with conditional requests, and
//! maintains the memory + disk cache keyed by `(channel, owner, repo)`. The
//! availability policy is cache-first: rate limits and transport failures
//! fall back to the last good list whenever one exists for the current
//! settings.

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use reqwest::header::{ACCEPT, ETAG, HeaderMap, IF_NONE_MATCH, LINK};
use reqwest::{Client, StatusCode};
use stratus_schema::Release;

use crate::cache::{CACHE_TTL, CatalogCache};
use crate::error::UpdateError;
use crate::settings::UpdateSettings;

/// Production release host API root.
pub const GITHUB_API: &str = "https://api.github.com";

/// Media type for the release host's JSON API.
const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";

/// Hard cap on followed pagination links per fetch.
const MAX_PAGES: usize = 10;

/// Total request attempts for transient transport failures.
const MAX_ATTEMPTS: u32 = 3;

/// Base backoff delay; attempt `n` sleeps `RETRY_DELAY * 2^n`.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Total timeout for a single catalog request.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the remote release catalog.
#[derive(Debug)]
pub struct CatalogClient {
    http: Client,
    api_base: String,
    cache_file: PathBuf,
    cache: Option<CatalogCache>,
    last_status: Option<u16>,
    max_attempts: u32,
    retry_delay: Duration,
}

enum Fetched {
    NotModified,
    Fresh {
        releases: Vec<Release>,
        etag: Option<String>,
    },
}

impl CatalogClient {
    /// Create a client persisting its cache at `cache_file`.
    pub fn new(cache_file: PathBuf) -> Self {
        let http = Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            api_base: GITHUB_API.to_string(),
            cache_file,
            cache: None,
            last_status: None,
            max_attempts: MAX_ATTEMPTS,
            retry_delay: RETRY_DELAY,
        }
    }

    /// Point the client at a different API root (test servers, mirrors).
    pub fn set_api_base(&mut self, base: impl Into<String>) {
        self.api_base = base.into();
    }

    /// Override the transient-failure retry policy.
    pub fn set_retry_policy(&mut self, max_attempts: u32, retry_delay: Duration) {
        self.max_attempts = max_attempts.max(1);
        self.retry_delay = retry_delay;
    }

    /// HTTP status of the most recent catalog response, for diagnostics.
    pub fn last_status(&self) -> Option<u16> {
        self.last_status
    }

    /// Seconds since the cached list was last confirmed, for diagnostics.
    pub fn cache_age(&self) -> Option<i64> {
        let cache = self.cache.as_ref()?;
        Some(chrono::Utc::now().timestamp().saturating_sub(cache.last_check))
    }

    /// Drop the memory cache and delete the cache file.
    pub fn invalidate(&mut self) {
        self.cache = None;
        if let Err(e) = std::fs::remove_file(&self.cache_file) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(error = %e, "could not remove catalog cache file");
            }
        }
    }

    /// Fetch the current release list for `settings`.
    ///
    /// Serves from the memory cache within the TTL, promotes a matching disk
    /// cache, sends a conditional request when an `ETag` is remembered for
    /// the same `(channel, owner, repo)` triple, and follows `rel="next"`
    /// pagination up to the page cap. Transport failures are retried with
    /// exponential backoff; after the retry budget (and on rate limits) the
    /// cached list is served when one matches.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Network`], [`UpdateError::RateLimited`], or
    /// [`UpdateError::Http`] when the host cannot be reached and no matching
    /// cache exists.
    pub async fn fetch_releases(
        &mut self,
        settings: &UpdateSettings,
    ) -> Result<Vec<Release>, UpdateError> {
        if let Some(cache) = &self.cache {
            if cache.matches(settings) && cache.is_fresh(CACHE_TTL) {
                tracing::debug!("catalog served from memory cache");
                return Ok(cache.releases.clone());
            }
        }

        if self.cache.as_ref().is_none_or(|c| !c.matches(settings)) {
            if let Some(disk) = CatalogCache::load(&self.cache_file) {
                if disk.matches(settings) {
                    let fresh = disk.is_fresh(CACHE_TTL);
                    tracing::debug!(fresh, "promoted catalog cache from disk");
                    let releases = disk.releases.clone();
                    self.cache = Some(disk);
                    if fresh {
                        return Ok(releases);
                    }
                } else {
                    self.cache = None;
                }
            } else {
                self.cache = None;
            }
        }

        // An ETag is only sent when the remembered triple matches the current
        // settings, so a channel or repo switch can never masquerade as
        // "not modified".
        let etag = self
            .cache
            .as_ref()
            .filter(|c| c.matches(settings))
            .and_then(|c| c.etag.clone());

        match self.fetch_remote(settings, etag.as_deref()).await {
            Ok(Fetched::NotModified) => {
                if let Some(cache) = &mut self.cache {
                    cache.touch();
                    if let Err(e) = cache.store(&self.cache_file) {
                        tracing::warn!(error = %e, "failed to persist catalog cache");
                    }
                    Ok(cache.releases.clone())
                } else {
                    Ok(Vec::new())
                }
            }
            Ok(Fetched::Fresh { releases, etag }) => {
                let cache = CatalogCache::new(releases, etag, settings);
                if let Err(e) = cache.store(&self.cache_file) {
                    tracing::warn!(error = %e, "failed to persist catalog cache");
                }
                let releases = cache.releases.clone();
                self.cache = Some(cache);
                Ok(releases)
            }
            Err(e @ (UpdateError::Network(_) | UpdateError::RateLimited)) => {
                if let Some(cache) = self.cache.as_ref().filter(|c| c.matches(settings)) {
                    tracing::warn!(error = %e, "catalog fetch failed, serving cached releases");
                    Ok(cache.releases.clone())
                } else {
                    Err(e)
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_remote(
        &mut self,
        settings: &UpdateSettings,
        etag: Option<&str>,
    ) -> Result<Fetched, UpdateError> {
        let url = format!(
            "{}/repos/{}/{}/releases",
            self.api_base, settings.owner, settings.repo
        );
        let response = self.send_with_retry(&url, etag).await?;
        let status = response.status();
        self.last_status = Some(status.as_u16());

        if status == StatusCode::NOT_MODIFIED {
            tracing::debug!(repo = %settings.repo_slug(), "catalog not modified");
            return Ok(Fetched::NotModified);
        }
        if status == StatusCode::FORBIDDEN && is_rate_limited(response.headers()) {
            return Err(UpdateError::RateLimited);
        }
        if status.as_u16() >= 400 {
            return Err(UpdateError::Http(status));
        }

        let etag = header_string(response.headers(), &ETAG);
        let mut next = next_link(response.headers());
        let mut releases: Vec<Release> = response.json().await?;
        let mut pages = 1;

        // Follow-up pages are plain GETs; the ETag only covers page 1.
        while let Some(page_url) = next.take() {
            if pages >= MAX_PAGES {
                tracing::debug!(pages, "stopping catalog pagination at the page cap");
                break;
            }
            let response = self
                .http
                .get(&page_url)
                .header(ACCEPT, GITHUB_MEDIA_TYPE)
                .send()
                .await?;
            self.last_status = Some(response.status().as_u16());
            if response.status().as_u16() >= 400 {
                return Err(UpdateError::Http(response.status()));
            }
            next = next_link(response.headers());
            let mut page: Vec<Release> = response.json().await?;
            releases.append(&mut page);
            pages += 1;
        }

        tracing::debug!(count = releases.len(), pages, "fetched release catalog");
        Ok(Fetched::Fresh { releases, etag })
    }

    async fn send_with_retry(
        &self,
        url: &str,
        etag: Option<&str>,
    ) -> Result<reqwest::Response, UpdateError> {
        let mut attempt: u32 = 0;
        loop {
            let mut request = self.http.get(url).header(ACCEPT, GITHUB_MEDIA_TYPE);
            if let Some(etag) = etag {
                request = request.header(IF_NONE_MATCH, etag);
            }
            match request.send().await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(UpdateError::Network(e));
                    }
                    let delay = self.retry_delay * 2u32.saturating_pow(attempt - 1);
                    tracing::warn!(error = %e, attempt, delay_ms = delay.as_millis() as u64,
                        "catalog request failed, backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

fn is_rate_limited(headers: &HeaderMap) -> bool {
    headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        == Some("0")
        || headers.contains_key("x-ratelimit-reset")
        || headers.contains_key("retry-after")
}

fn header_string(headers: &HeaderMap, name: &reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

/// Extract the `rel="next"` URL from a `Link` response header.
fn next_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    let re = Regex::new(r#"<([^>]+)>\s*;\s*rel="next""#).unwrap();
    re.captures(link).map(|c| c[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use stratus_schema::Channel;

    fn settings() -> UpdateSettings {
        UpdateSettings {
            channel: Channel::Stable,
            owner: "o".to_string(),
            repo: "r".to_string(),
        }
    }

    fn client_for(server: &Server, dir: &tempfile::TempDir) -> CatalogClient {
        let mut client = CatalogClient::new(dir.path().join("update-cache.json"));
        client.set_api_base(server.url());
        client.set_retry_policy(2, Duration::from_millis(1));
        client
    }

    fn release_json(tag: &str) -> String {
        format!(
            r#"{{"tag_name": "{tag}", "prerelease": false, "published_at": "2024-01-01T00:00:00Z", "assets": [], "body": ""}}"#
        )
    }

    #[tokio::test]
    async fn first_fetch_sends_no_conditional_header() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let mock = server
            .mock("GET", "/repos/o/r/releases")
            .match_header("if-none-match", Matcher::Missing)
            .with_status(200)
            .with_header("etag", "W/\"etag-123\"")
            .with_body(format!("[{}]", release_json("v1.0.0")))
            .expect(1)
            .create_async()
            .await;

        let mut client = client_for(&server, &dir);
        let releases = client.fetch_releases(&settings()).await.unwrap();
        assert_eq!(releases.len(), 1);
        assert_eq!(client.last_status(), Some(200));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fresh_memory_cache_skips_the_network() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let mock = server
            .mock("GET", "/repos/o/r/releases")
            .with_status(200)
            .with_body(format!("[{}]", release_json("v1.0.0")))
            .expect(1)
            .create_async()
            .await;

        let mut client = client_for(&server, &dir);
        let first = client.fetch_releases(&settings()).await.unwrap();
        let second = client.fetch_releases(&settings()).await.unwrap();
        assert_eq!(first.len(), second.len());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn not_modified_serves_cached_list_and_sends_etag() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();

        // Pre-seed an expired disk cache with a remembered ETag.
        let mut cache = CatalogCache::new(
            vec![serde_json::from_str(&release_json("v0.9.5")).unwrap()],
            Some("W/\"etag-123\"".to_string()),
            &settings(),
        );
        cache.last_check -= 7200;
        cache.store(&dir.path().join("update-cache.json")).unwrap();

        let mock = server
            .mock("GET", "/repos/o/r/releases")
            .match_header("if-none-match", "W/\"etag-123\"")
            .with_status(304)
            .expect(1)
            .create_async()
            .await;

        let mut client = client_for(&server, &dir);
        let releases = client.fetch_releases(&settings()).await.unwrap();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].tag_name, "v0.9.5");
        assert_eq!(client.last_status(), Some(304));
        mock.assert_async().await;

        // The 304 refreshed last_check, so the next call is served from memory.
        let again = client.fetch_releases(&settings()).await.unwrap();
        assert_eq!(again[0].tag_name, "v0.9.5");
    }

    #[tokio::test]
    async fn etag_is_not_sent_for_a_mismatched_triple() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();

        let mut other = settings();
        other.channel = Channel::Dev;
        let mut cache = CatalogCache::new(Vec::new(), Some("W/\"stale\"".to_string()), &other);
        cache.last_check -= 10;
        cache.store(&dir.path().join("update-cache.json")).unwrap();

        let mock = server
            .mock("GET", "/repos/o/r/releases")
            .match_header("if-none-match", Matcher::Missing)
            .with_status(200)
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;

        let mut client = client_for(&server, &dir);
        let releases = client.fetch_releases(&settings()).await.unwrap();
        assert!(releases.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn pagination_follows_next_links() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let link = format!(
            "<{}/repos/o/r/releases?page=2>; rel=\"next\", <{0}/repos/o/r/releases?page=5>; rel=\"last\"",
            server.url()
        );
        let page1 = server
            .mock("GET", "/repos/o/r/releases")
            .with_status(200)
            .with_header("link", &link)
            .with_body(format!("[{}]", release_json("v0.9.1")))
            .create_async()
            .await;
        let page2 = server
            .mock("GET", "/repos/o/r/releases?page=2")
            .with_status(200)
            .with_body(format!("[{}]", release_json("v0.9.2")))
            .create_async()
            .await;

        let mut client = client_for(&server, &dir);
        let releases = client.fetch_releases(&settings()).await.unwrap();
        let tags: Vec<_> = releases.iter().map(|r| r.tag_name.as_str()).collect();
        assert_eq!(tags, vec!["v0.9.1", "v0.9.2"]);
        page1.assert_async().await;
        page2.assert_async().await;
    }

    #[tokio::test]
    async fn rate_limit_falls_back_to_cached_list() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();

        let mut cache = CatalogCache::new(
            vec![serde_json::from_str(&release_json("v0.9.5")).unwrap()],
            None,
            &settings(),
        );
        cache.last_check -= 7200;
        cache.store(&dir.path().join("update-cache.json")).unwrap();

        let _mock = server
            .mock("GET", "/repos/o/r/releases")
            .with_status(403)
            .with_header("x-ratelimit-remaining", "0")
            .with_header("x-ratelimit-reset", "123")
            .create_async()
            .await;

        let mut client = client_for(&server, &dir);
        let releases = client.fetch_releases(&settings()).await.unwrap();
        assert_eq!(releases[0].tag_name, "v0.9.5");
    }

    #[tokio::test]
    async fn rate_limit_without_cache_is_an_error() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let _mock = server
            .mock("GET", "/repos/o/r/releases")
            .with_status(403)
            .with_header("x-ratelimit-remaining", "0")
            .create_async()
            .await;

        let mut client = client_for(&server, &dir);
        let err = client.fetch_releases(&settings()).await.unwrap_err();
        assert!(matches!(err, UpdateError::RateLimited));
    }

    #[tokio::test]
    async fn transport_failure_falls_back_to_cached_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = CatalogCache::new(
            vec![serde_json::from_str(&release_json("v0.9.5")).unwrap()],
            None,
            &settings(),
        );
        cache.last_check -= 7200;
        cache.store(&dir.path().join("update-cache.json")).unwrap();

        let mut client = CatalogClient::new(dir.path().join("update-cache.json"));
        // Nothing listens here; connections are refused immediately.
        client.set_api_base("http://127.0.0.1:9");
        client.set_retry_policy(2, Duration::from_millis(1));

        let releases = client.fetch_releases(&settings()).await.unwrap();
        assert_eq!(releases[0].tag_name, "v0.9.5");
    }

    #[tokio::test]
    async fn transport_failure_without_cache_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = CatalogClient::new(dir.path().join("update-cache.json"));
        client.set_api_base("http://127.0.0.1:9");
        client.set_retry_policy(2, Duration::from_millis(1));

        let err = client.fetch_releases(&settings()).await.unwrap_err();
        assert!(matches!(err, UpdateError::Network(_)));
    }

    #[tokio::test]
    async fn http_error_propagates_without_retry() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let mock = server
            .mock("GET", "/repos/o/r/releases")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let mut client = client_for(&server, &dir);
        let err = client.fetch_releases(&settings()).await.unwrap_err();
        assert!(matches!(err, UpdateError::Http(status) if status.as_u16() == 404));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn corrupt_disk_cache_is_ignored() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("update-cache.json"), "invalid json").unwrap();

        let mock = server
            .mock("GET", "/repos/o/r/releases")
            .with_status(200)
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;

        let mut client = client_for(&server, &dir);
        let releases = client.fetch_releases(&settings()).await.unwrap();
        assert!(releases.is_empty());
        mock.assert_async().await;
    }

    #[test]
    fn next_link_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            "<https://api.example.com/repos/o/r/releases?page=2>; rel=\"next\", <x>; rel=\"last\""
                .parse()
                .unwrap(),
        );
        assert_eq!(
            next_link(&headers).as_deref(),
            Some("https://api.example.com/repos/o/r/releases?page=2")
        );

        let mut headers = HeaderMap::new();
        headers.insert(LINK, "<x>; rel=\"last\"".parse().unwrap());
        assert_eq!(next_link(&headers), None);
    }
}
