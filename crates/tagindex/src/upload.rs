//! Content-addressed cache of external upload URLs.
//!
//! Uploads are keyed by content hash, so two paths with identical bytes share
//! one URL. The table is a flat JSON object persisted next to the server and
//! rewritten whole after every new entry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{IndexError, Result};
use crate::hash::{ContentHash, Fingerprint, HashMemo};
use crate::index::split_extension;

/// An external host that turns file bytes into a public URL.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Uploads `bytes`; `suffix` is the original extension including the dot.
    async fn upload(&self, bytes: Vec<u8>, suffix: &str) -> Result<String>;
}

pub type SharedUploader = Arc<dyn Uploader>;

#[derive(Debug)]
pub struct UploadCache {
    table_path: PathBuf,
    hashes: Arc<HashMemo>,
    // Held across the upload call so each hash is uploaded at most once.
    table: Mutex<BTreeMap<String, String>>,
}

impl UploadCache {
    /// Loads the table at `table_path`, creating an empty one if it is missing.
    pub async fn open(table_path: impl Into<PathBuf>) -> Result<Self> {
        let table_path = table_path.into();
        let table = match tokio::fs::read(&table_path).await {
            Ok(bytes) => serde_json::from_slice::<BTreeMap<String, String>>(&bytes)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                let table = BTreeMap::new();
                write_table(&table_path, &table).await?;
                table
            }
            Err(error) => return Err(IndexError::Io(error)),
        };
        log::info!(
            "upload table path={} entries={}",
            table_path.display(),
            table.len()
        );
        Ok(Self {
            table_path,
            hashes: Arc::new(HashMemo::new()),
            table: Mutex::new(table),
        })
    }

    /// Shares a hash memo with the rest of the library.
    pub fn with_hash_memo(mut self, hashes: Arc<HashMemo>) -> Self {
        self.hashes = hashes;
        self
    }

    pub fn table_path(&self) -> &Path {
        &self.table_path
    }

    pub async fn get(&self, hash: &ContentHash) -> Option<String> {
        self.table.lock().await.get(hash.as_str()).cloned()
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Returns the cached URL for the content of `path`, uploading it on a miss.
    pub async fn get_or_upload(
        &self,
        path: &Path,
        uploader: &dyn Uploader,
        timeout: Duration,
    ) -> Result<String> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|error| IndexError::from_io_at(path, error))?;
        let fingerprint = Fingerprint::from_metadata(&metadata);

        let (hash, bytes) = match self.hashes.lookup(path, fingerprint) {
            Some(hash) => (hash, None),
            None => {
                let bytes = read_file(path).await?;
                let hash = ContentHash::of_bytes(&bytes);
                self.hashes.insert(path.to_path_buf(), fingerprint, hash.clone());
                (hash, Some(bytes))
            }
        };

        let mut table = self.table.lock().await;
        if let Some(url) = table.get(hash.as_str()) {
            log::debug!("upload cache hit hash={hash}");
            return Ok(url.clone());
        }

        let bytes = match bytes {
            Some(bytes) => bytes,
            None => read_file(path).await?,
        };
        let suffix = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .and_then(|name| split_extension(&name).map(|(_, ext)| format!(".{ext}")))
            .unwrap_or_default();

        let url = match tokio::time::timeout(timeout, uploader.upload(bytes, &suffix)).await {
            Ok(Ok(url)) => url.trim().to_string(),
            Ok(Err(IndexError::UploadFailed(message))) => {
                return Err(IndexError::UploadFailed(message))
            }
            Ok(Err(error)) => return Err(IndexError::UploadFailed(error.to_string())),
            Err(_) => {
                return Err(IndexError::UploadFailed(format!("upload timed out after {timeout:?}")))
            }
        };
        if url.is_empty() {
            return Err(IndexError::UploadFailed(
                "uploader returned an empty url".to_string(),
            ));
        }

        let key = hash.into_string();
        table.insert(key.clone(), url.clone());
        if let Err(error) = write_table(&self.table_path, &table).await {
            table.remove(&key);
            return Err(error);
        }
        log::info!("uploaded {} -> {url}", path.display());
        Ok(url)
    }
}

async fn read_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|error| IndexError::from_io_at(path, error))
}

async fn write_table(path: &Path, table: &BTreeMap<String, String>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let serialized = serde_json::to_vec_pretty(table)?;
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);
    tokio::fs::write(&temp, serialized).await?;
    tokio::fs::rename(&temp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[derive(Default)]
    struct CountingUploader {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Uploader for CountingUploader {
        async fn upload(&self, bytes: Vec<u8>, suffix: &str) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("https://paste.test/{call}-{}{suffix}\n", bytes.len()))
        }
    }

    struct FailingUploader;

    #[async_trait]
    impl Uploader for FailingUploader {
        async fn upload(&self, _bytes: Vec<u8>, _suffix: &str) -> Result<String> {
            Err(IndexError::InvalidInput("host rejected file".to_string()))
        }
    }

    struct SlowUploader;

    #[async_trait]
    impl Uploader for SlowUploader {
        async fn upload(&self, _bytes: Vec<u8>, _suffix: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("https://paste.test/late".to_string())
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn open_creates_empty_table() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("state/uploaded.json");
        let cache = UploadCache::open(&path).await.expect("open");
        assert!(cache.is_empty().await);
        let stored = std::fs::read_to_string(&path).expect("table written");
        assert_eq!(stored.trim(), "{}");
    }

    #[tokio::test]
    async fn identical_content_is_uploaded_once() {
        let dir = tempdir().expect("tempdir");
        let first = dir.path().join("(a).jpg");
        let second = dir.path().join("(b).jpg");
        std::fs::write(&first, b"same bytes").expect("write");
        std::fs::write(&second, b"same bytes").expect("write");
        let cache = UploadCache::open(dir.path().join("uploaded.json"))
            .await
            .expect("open");
        let uploader = CountingUploader::default();

        let url = cache
            .get_or_upload(&first, &uploader, TIMEOUT)
            .await
            .expect("upload");
        assert_eq!(url, "https://paste.test/0-10.jpg");
        let again = cache
            .get_or_upload(&second, &uploader, TIMEOUT)
            .await
            .expect("cached");
        assert_eq!(again, url);
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn table_survives_reopen() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("(a).png");
        std::fs::write(&file, b"png").expect("write");
        let table = dir.path().join("uploaded.json");
        let uploader = CountingUploader::default();

        let url = UploadCache::open(&table)
            .await
            .expect("open")
            .get_or_upload(&file, &uploader, TIMEOUT)
            .await
            .expect("upload");

        let reopened = UploadCache::open(&table).await.expect("reopen");
        assert_eq!(reopened.len().await, 1);
        assert_eq!(
            reopened.get(&ContentHash::of_bytes(b"png")).await,
            Some(url)
        );
        let stored: BTreeMap<String, String> =
            serde_json::from_slice(&std::fs::read(&table).expect("read")).expect("parse");
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("(a).gif");
        std::fs::write(&file, b"gif").expect("write");
        let cache = UploadCache::open(dir.path().join("uploaded.json"))
            .await
            .expect("open");

        let error = cache
            .get_or_upload(&file, &FailingUploader, TIMEOUT)
            .await
            .expect_err("failure");
        assert!(matches!(error, IndexError::UploadFailed(message) if message.contains("rejected")));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn slow_upload_times_out() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("(a).mp4");
        std::fs::write(&file, b"mp4").expect("write");
        let cache = UploadCache::open(dir.path().join("uploaded.json"))
            .await
            .expect("open");

        let error = cache
            .get_or_upload(&file, &SlowUploader, Duration::from_millis(20))
            .await
            .expect_err("timeout");
        assert!(
            matches!(&error, IndexError::UploadFailed(message) if message.ends_with("after 20ms")),
            "unexpected error: {error:?}"
        );
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempdir().expect("tempdir");
        let cache = UploadCache::open(dir.path().join("uploaded.json"))
            .await
            .expect("open");
        let error = cache
            .get_or_upload(&dir.path().join("gone.jpg"), &CountingUploader::default(), TIMEOUT)
            .await
            .expect_err("missing");
        assert!(matches!(error, IndexError::NotFound(_)));
    }
}
