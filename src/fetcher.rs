use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Downloads and validates catalogue source files into a local cache
/// directory. Idempotent: repeated calls for the same filename are cheap
/// once a valid file is on disk, and concurrent calls need no mutual
/// exclusion beyond filesystem atomicity since only the prefetch worker
/// ever calls `ensure`.
pub struct Fetcher {
    client: reqwest::Client,
    cache_dir: PathBuf,
    source_base: String,
    min_valid_bytes: u64,
}

impl Fetcher {
    pub fn new(cache_dir: PathBuf, source_base: String, min_valid_bytes: u64, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("reqwest client configuration is valid");

        Fetcher {
            client,
            cache_dir,
            source_base,
            min_valid_bytes,
        }
    }

    pub async fn ensure(&self, filename: &str) -> Result<PathBuf, FetchError> {
        let local_path = self.cache_dir.join(filename);

        if let Some(path) = self.valid_cached_path(&local_path).await {
            return Ok(path);
        }

        let _ = tokio::fs::remove_file(&local_path).await;

        let url = format!("{}{}", self.source_base, filename);
        info!(url = %url, "downloading track");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), url = %url, "fetch failed");
            return Err(FetchError::Status(response.status()));
        }

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(&local_path).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;

        info!(filename, "downloaded track");
        Ok(local_path)
    }

    /// Returns the cached path only if it exists and passes the
    /// minimum-size validity check; a too-small file is treated as
    /// corrupt/truncated and left for the caller to redownload.
    async fn valid_cached_path(&self, path: &Path) -> Option<PathBuf> {
        let metadata = tokio::fs::metadata(path).await.ok()?;
        if metadata.len() >= self.min_valid_bytes {
            Some(path.to_path_buf())
        } else {
            None
        }
    }
}
