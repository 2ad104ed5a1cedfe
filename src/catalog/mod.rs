//! Remote catalog cache and downloads
//!
//! The cache holds the last fetched listing and is replaced wholesale on each
//! refresh. It says nothing about what is on disk: the selection store's
//! download records are the ground truth for that.

mod http;
pub mod posts;

pub use http::HttpTransports;

use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::store::partial_path;
use crate::constants::{catalog::REQUEST_RETRIES, http as status};
use crate::error::FetchError;
use crate::types::CatalogEntry;

/// Status plus body of one HTTP exchange
#[derive(Debug, Clone)]
pub struct HttpResponse<B> {
    pub status: u16,
    pub body: B,
}

/// HTTP transport consumed by the catalog
///
/// Connection-level failures are `FetchError::Fatal`; any response that
/// arrived is returned with its status for the caller to judge.
pub trait Transport: Send + Sync {
    /// Body is parsed only for 200 responses, `Null` otherwise
    fn fetch_json(&self, url: &str) -> impl Future<Output = Result<HttpResponse<serde_json::Value>, FetchError>> + Send;

    fn fetch_bytes(&self, url: &str) -> impl Future<Output = Result<HttpResponse<Vec<u8>>, FetchError>> + Send;
}

/// Picks a transport for the current network preference
pub trait TransportPool: Send + Sync {
    type Transport: Transport;

    fn select(&self, force_ipv4: bool) -> &Self::Transport;
}

/// Fetch and translate the listing at `url`
///
/// 200 succeeds, 429 aborts at once, anything else is retried up to
/// `REQUEST_RETRIES` attempts in total.
pub async fn fetch_catalog<T: Transport>(transport: &T, url: &str) -> Result<Vec<CatalogEntry>, FetchError> {
    let mut last_status = 0;
    for attempt in 1..=REQUEST_RETRIES {
        let response = transport.fetch_json(url).await?;
        match response.status {
            status::OK => {
                let entries = posts::parse_posts(response.body)
                    .map_err(|e| FetchError::fatal(format!("invalid catalog body: {e}")))?;
                debug!(attempt, count = entries.len(), "Fetched catalog");
                return Ok(entries);
            }
            status::TOO_MANY_REQUESTS => {
                warn!(url, "Catalog fetch rate limited");
                return Err(FetchError::RateLimited);
            }
            other => {
                warn!(url, attempt, status = other, "Catalog fetch failed");
                last_status = other;
            }
        }
    }
    Err(FetchError::Transient { status: last_status })
}

/// Last fetched catalog snapshot
#[derive(Debug, Default)]
pub struct CatalogCache {
    snapshot: RwLock<Arc<Vec<CatalogEntry>>>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<Vec<CatalogEntry>> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn get(&self, id: &str) -> Option<CatalogEntry> {
        self.snapshot().iter().find(|entry| entry.id == id).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Swap in a new snapshot; readers holding the old one are unaffected
    pub fn replace(&self, entries: Vec<CatalogEntry>) -> Arc<Vec<CatalogEntry>> {
        let entries = Arc::new(entries);
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = entries.clone();
        entries
    }

    /// Fetch and replace; on failure the previous snapshot is kept
    pub async fn refresh<T: Transport>(&self, transport: &T, url: &str) -> Result<Arc<Vec<CatalogEntry>>, FetchError> {
        match fetch_catalog(transport, url).await {
            Ok(entries) => {
                info!(count = entries.len(), "Updated animation cache");
                Ok(self.replace(entries))
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch catalog");
                Err(e)
            }
        }
    }
}

/// Download failure
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to write {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Removes the in-progress file unless committed
struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed && fs::remove_file(&self.path).is_ok() {
            debug!(path = %self.path.display(), "Removed partial download");
        }
    }
}

/// Write through `<dest>.part` and rename into place
fn write_atomically(dest: &Path, body: &[u8]) -> Result<(), DownloadError> {
    let mut partial = PartialFile {
        path: partial_path(dest),
        committed: false,
    };
    fs::write(&partial.path, body).map_err(|source| DownloadError::Io {
        path: partial.path.clone(),
        source,
    })?;
    fs::rename(&partial.path, dest).map_err(|source| DownloadError::Io {
        path: dest.to_path_buf(),
        source,
    })?;
    partial.committed = true;
    Ok(())
}

/// Fetch `entry` into `dest` in a single attempt
///
/// The write runs to completion on the blocking pool even if this future is
/// dropped, so `dest` is either absent or complete and no `.part` file stays.
pub async fn download_to<T: Transport>(transport: &T, entry: &CatalogEntry, dest: &Path) -> Result<(), DownloadError> {
    let response = transport.fetch_bytes(&entry.download_url).await?;
    match response.status {
        status::OK => {}
        status::TOO_MANY_REQUESTS => return Err(FetchError::RateLimited.into()),
        other => {
            warn!(id = %entry.id, status = other, "Invalid download request status");
            return Err(FetchError::Transient { status: other }.into());
        }
    }

    let bytes = response.body.len();
    let path = dest.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomically(&path, &response.body))
        .await
        .map_err(|e| DownloadError::Io {
            path: dest.to_path_buf(),
            source: std::io::Error::other(e),
        })??;

    info!(id = %entry.id, bytes, path = %dest.display(), "Downloaded animation");
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::types::Target;

    const URL: &str = "https://example.invalid/posts";

    #[tokio::test]
    async fn test_rate_limit_stops_without_further_attempts() {
        let transport = ScriptedTransport::with_statuses(&[503, 503, 429, 200]);
        let err = fetch_catalog(&transport, URL).await.unwrap_err();
        assert!(matches!(err, FetchError::RateLimited));
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted_reports_last_status() {
        let transport = ScriptedTransport::with_statuses(&[503, 503, 503, 503, 503, 200]);
        let err = fetch_catalog(&transport, URL).await.unwrap_err();
        assert!(matches!(err, FetchError::Transient { status: 503 }));
        assert_eq!(transport.call_count(), 5);
    }

    #[tokio::test]
    async fn test_success_after_retry() {
        let transport = ScriptedTransport::with_statuses(&[500]);
        transport.push_json(200, posts_body());
        let entries = fetch_catalog(&transport, URL).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].target, Target::Suspend);
    }

    #[tokio::test]
    async fn test_refresh_replaces_snapshot_and_keeps_it_on_failure() {
        let cache = CatalogCache::new();
        let transport = ScriptedTransport::default();
        transport.push_json(200, posts_body());
        cache.refresh(&transport, URL).await.unwrap();
        assert_eq!(cache.snapshot().len(), 2);
        assert_eq!(cache.get("boot1").unwrap().name, "Boot One");

        transport.push_json(429, serde_json::Value::Null);
        assert!(cache.refresh(&transport, URL).await.is_err());
        assert_eq!(cache.snapshot().len(), 2);

        transport.push_json(200, serde_json::json!({"posts": []}));
        cache.refresh(&transport, URL).await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_download_writes_complete_file() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::default();
        transport.push_json(200, posts_body());
        let entry = fetch_catalog(&transport, URL).await.unwrap().remove(0);

        transport.push_bytes(200, b"video bytes");
        let dest = dir.path().join("boot1.webm");
        download_to(&transport, &entry, &dest).await.unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"video bytes");
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_failed_download_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::default();
        transport.push_json(200, posts_body());
        let entry = fetch_catalog(&transport, URL).await.unwrap().remove(0);

        transport.push_bytes(404, b"");
        let dest = dir.path().join("boot1.webm");
        let err = download_to(&transport, &entry, &dest).await.unwrap_err();
        assert!(matches!(err, DownloadError::Fetch(FetchError::Transient { status: 404 })));
        assert!(!dest.exists());

        transport.push_bytes(429, b"");
        let err = download_to(&transport, &entry, &dest).await.unwrap_err();
        assert!(matches!(err, DownloadError::Fetch(FetchError::RateLimited)));
        // single attempt per call
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_failed_rename_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::default();
        transport.push_json(200, posts_body());
        let entry = fetch_catalog(&transport, URL).await.unwrap().remove(0);

        // a non-empty directory where the file should land
        let dest = dir.path().join("boot1.webm");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("keep"), b"x").unwrap();

        transport.push_bytes(200, b"video bytes");
        let err = download_to(&transport, &entry, &dest).await.unwrap_err();
        assert!(matches!(err, DownloadError::Io { ref path, .. } if *path == dest));
        assert!(!partial_path(&dest).exists());
        assert!(dest.join("keep").exists());
    }

    #[tokio::test]
    async fn test_dropped_download_finishes_or_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::default();
        transport.push_json(200, posts_body());
        let entry = fetch_catalog(&transport, URL).await.unwrap().remove(0);

        transport.push_bytes(200, b"video bytes");
        let dest = dir.path().join("boot1.webm");
        let _ = tokio::time::timeout(std::time::Duration::ZERO, download_to(&transport, &entry, &dest)).await;

        for _ in 0..200 {
            if dest.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(fs::read(&dest).unwrap(), b"video bytes");
        assert!(!partial_path(&dest).exists());
    }

    #[test]
    fn test_uncommitted_partial_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.webm.part");
        fs::write(&path, b"half").unwrap();
        drop(PartialFile {
            path: path.clone(),
            committed: false,
        });
        assert!(!path.exists());

        fs::write(&path, b"whole").unwrap();
        drop(PartialFile {
            path: path.clone(),
            committed: true,
        });
        assert!(path.exists());
    }
}
