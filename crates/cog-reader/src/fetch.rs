//! Fetching raster bytes from HTTP(S) or the local filesystem.

use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::{CogError, Result};

/// Largest raster accepted by default (128 MiB).
pub const DEFAULT_MAX_SOURCE_BYTES: u64 = 128 * 1024 * 1024;

/// Fetches whole raster files.
///
/// `http://` and `https://` URLs go through a shared `reqwest` client;
/// `file://` URLs and bare paths are read from disk. Timeouts and
/// connection reuse are the client's business; nothing here retries.
/// Sources larger than `max_bytes` are refused before (or while) reading.
#[derive(Debug, Clone)]
pub struct RasterFetcher {
    client: Client,
    max_bytes: u64,
}

impl RasterFetcher {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| CogError::open("<client>", format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_bytes: DEFAULT_MAX_SOURCE_BYTES,
        })
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    fn check_size(&self, url: &str, len: u64) -> Result<()> {
        if len > self.max_bytes {
            return Err(CogError::open(
                url,
                format!("{len} bytes exceeds the {} byte source limit", self.max_bytes),
            ));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<Bytes> {
        if url.starts_with("http://") || url.starts_with("https://") {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| CogError::open(url, e))?;
            if let Some(len) = response.content_length() {
                self.check_size(url, len)?;
            }
            let body = response.bytes().await.map_err(|e| CogError::open(url, e))?;
            self.check_size(url, body.len() as u64)?;
            debug!(bytes = body.len(), "Fetched remote raster");
            return Ok(body);
        }

        let path = url.strip_prefix("file://").unwrap_or(url);
        let len = tokio::fs::metadata(path)
            .await
            .map_err(|e| CogError::open(url, e))?
            .len();
        self.check_size(url, len)?;
        let body = tokio::fs::read(path)
            .await
            .map_err(|e| CogError::open(url, e))?;
        debug!(bytes = body.len(), "Read local raster");
        Ok(Bytes::from(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_local_file() {
        let file = test_utils::write_temp_geotiff(b"not really a tiff");
        let fetcher = RasterFetcher::new(Duration::from_secs(5)).unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let body = fetcher.fetch(&path).await.unwrap();
        assert_eq!(&body[..], b"not really a tiff");

        let body = fetcher.fetch(&format!("file://{path}")).await.unwrap();
        assert_eq!(&body[..], b"not really a tiff");
    }

    #[tokio::test]
    async fn test_oversized_source_is_refused() {
        let file = test_utils::write_temp_geotiff(&[0u8; 64]);
        let fetcher = RasterFetcher::new(Duration::from_secs(5))
            .unwrap()
            .with_max_bytes(32);
        assert_eq!(fetcher.max_bytes(), 32);

        let err = fetcher
            .fetch(file.path().to_str().unwrap())
            .await
            .unwrap_err();
        assert!(err.is_open_failure());
        assert!(err.to_string().contains("64 bytes exceeds the 32 byte source limit"), "{err}");

        let fetcher = fetcher.with_max_bytes(64);
        assert_eq!(fetcher.fetch(file.path().to_str().unwrap()).await.unwrap().len(), 64);
    }

    #[tokio::test]
    async fn test_missing_file_is_open_failure() {
        let fetcher = RasterFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher
            .fetch("/definitely/not/here/006.tif")
            .await
            .unwrap_err();
        assert!(err.is_open_failure());
    }
}
