//! Opened raster sources and the seams the tile pipeline depends on.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use forecast_common::BoundingBox;
use tracing::{debug, info, instrument};

use crate::fetch::RasterFetcher;
use crate::geotiff::RasterPyramid;
use crate::pool::DecodePool;
use crate::window::{decode_window, DecodedWindow};
use crate::{CogError, Result};

/// Anything that can produce RGBA windows for map boxes.
///
/// Implementations must accept concurrent calls; callers make no ordering
/// assumptions between them.
#[async_trait]
pub trait WindowSource: Send + Sync {
    /// Location the source was opened from.
    fn url(&self) -> &str;

    async fn read_window(&self, bbox: &BoundingBox, width: u32, height: u32)
        -> Result<DecodedWindow>;
}

/// Opens raster sources by URL.
#[async_trait]
pub trait SourceOpener: Send + Sync {
    async fn open(&self, url: &str) -> Result<Box<dyn WindowSource>>;
}

/// A GeoTIFF held in memory, decoded window by window on a [`DecodePool`].
///
/// Each window is read from the coarsest overview that still resolves it,
/// falling back to the full-resolution image.
pub struct GeoTiffSource {
    url: String,
    data: Bytes,
    pyramid: Arc<RasterPyramid>,
    pool: DecodePool,
}

impl GeoTiffSource {
    /// Fetch `url` and parse its metadata.
    #[instrument(skip(fetcher, pool))]
    pub async fn open(url: &str, fetcher: &RasterFetcher, pool: DecodePool) -> Result<Self> {
        let data = fetcher.fetch(url).await?;
        Self::from_bytes(url, data, pool).await
    }

    /// Parse metadata from bytes already in memory.
    pub async fn from_bytes(url: impl Into<String>, data: Bytes, pool: DecodePool) -> Result<Self> {
        let url = url.into();
        let header = data.clone();
        let pyramid = pool
            .run(move || RasterPyramid::parse(header))
            .await?
            .map_err(|e| CogError::open(url.clone(), e))?;

        let full = pyramid.full();
        info!(
            url = %url,
            width = full.width,
            height = full.height,
            bands = full.bands,
            overviews = pyramid.levels().len() - 1,
            "Opened raster source"
        );

        Ok(Self {
            url,
            data,
            pyramid: Arc::new(pyramid),
            pool,
        })
    }
}

#[async_trait]
impl WindowSource for GeoTiffSource {
    fn url(&self) -> &str {
        &self.url
    }

    async fn read_window(
        &self,
        bbox: &BoundingBox,
        width: u32,
        height: u32,
    ) -> Result<DecodedWindow> {
        let data = self.data.clone();
        let level = self.pyramid.level_for(bbox, width).clone();
        let level_width = level.width;
        let bbox = *bbox;

        let window = self
            .pool
            .run(move || decode_window(data, &level, &bbox, width, height))
            .await??;

        debug!(
            url = %self.url,
            level_width = level_width,
            opaque = window.opaque_pixel_count(),
            "Decoded raster window"
        );
        Ok(window)
    }
}

/// Production [`SourceOpener`]: fetches over HTTP (or from disk) and decodes
/// on the shared pool.
#[derive(Debug, Clone)]
pub struct CogOpener {
    fetcher: RasterFetcher,
    pool: DecodePool,
}

impl CogOpener {
    pub fn new(fetcher: RasterFetcher, pool: DecodePool) -> Self {
        Self { fetcher, pool }
    }
}

#[async_trait]
impl SourceOpener for CogOpener {
    async fn open(&self, url: &str) -> Result<Box<dyn WindowSource>> {
        let source = GeoTiffSource::open(url, &self.fetcher, self.pool.clone()).await?;
        Ok(Box::new(source))
    }
}
