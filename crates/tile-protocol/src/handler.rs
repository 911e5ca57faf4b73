//! Tile handler for one raster source.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use cog_reader::WindowSource;
use forecast_common::{TileCoord, TILE_SIZE};
use metrics::{counter, histogram};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::url::TileRequest;
use crate::{Result, TileError};

/// A successfully rendered tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileResponse {
    /// PNG bytes.
    pub data: Bytes,
    pub cache_control: Option<String>,
    pub expires: Option<String>,
}

/// Completion callback for [`CogTileHandler::request`].
pub type TileCallback = Box<dyn FnOnce(Result<TileResponse>) + Send + 'static>;

/// Handle to an in-flight tile request.
#[derive(Debug)]
pub struct TileRequestHandle {
    task: JoinHandle<()>,
}

impl TileRequestHandle {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    /// Cancellation is not supported; the decode runs to completion and the
    /// callback still fires.
    pub fn cancel(&self) {
        debug!("Tile request cancel ignored");
    }

    /// Wait until the callback has run.
    pub async fn finished(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "Tile request task failed");
        }
    }
}

/// Serves `<scheme>://…/{z}/{x}/{y}` requests from a single raster source.
pub struct CogTileHandler {
    scheme: String,
    source: Box<dyn WindowSource>,
    cache_control: Option<String>,
}

impl CogTileHandler {
    pub fn new(scheme: impl Into<String>, source: Box<dyn WindowSource>) -> Self {
        Self {
            scheme: scheme.into(),
            source,
            cache_control: None,
        }
    }

    /// Set the `Cache-Control` value attached to every response.
    pub fn with_cache_control(mut self, value: impl Into<String>) -> Self {
        self.cache_control = Some(value.into());
        self
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// URL of the underlying raster.
    pub fn source_url(&self) -> &str {
        self.source.url()
    }

    /// Render one tile: tile box → raster window → PNG.
    #[instrument(skip(self), fields(scheme = %self.scheme))]
    pub async fn fetch_tile(&self, coord: TileCoord) -> Result<TileResponse> {
        let started = Instant::now();
        let result = self.render(coord).await;

        histogram!("forecast_tile_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(tile) => {
                counter!("forecast_tiles_total", "scheme" => self.scheme.clone()).increment(1);
                debug!(
                    tile = %coord.cache_key(),
                    bytes = tile.data.len(),
                    "Tile rendered"
                );
            }
            Err(e) => {
                counter!(
                    "forecast_tile_errors_total",
                    "scheme" => self.scheme.clone(),
                    "kind" => e.kind()
                )
                .increment(1);
                match e {
                    TileError::Encode(_) => {
                        error!(tile = %coord.cache_key(), error = %e, "Tile encode failed")
                    }
                    _ => warn!(tile = %coord.cache_key(), error = %e, "Tile render failed"),
                }
            }
        }
        result
    }

    async fn render(&self, coord: TileCoord) -> Result<TileResponse> {
        let bbox = coord.mercator_bbox();
        let window = self.source.read_window(&bbox, TILE_SIZE, TILE_SIZE).await?;
        let png = tile_encoder::encode_tile(&window.pixels, window.width, window.height)?;

        Ok(TileResponse {
            data: Bytes::from(png),
            cache_control: self.cache_control.clone(),
            expires: None,
        })
    }

    /// Parse a full tile URL and render it.
    pub async fn fetch(&self, url: &str) -> Result<TileResponse> {
        let request = TileRequest::parse(url)?;
        if request.scheme != self.scheme {
            return Err(TileError::UnknownScheme(request.scheme));
        }
        self.fetch_tile(request.coord).await
    }

    /// Start a tile request on its own task and report through `callback`.
    ///
    /// Returns immediately. Must be called from within a tokio runtime.
    pub fn request(self: Arc<Self>, url: String, callback: TileCallback) -> TileRequestHandle {
        TileRequestHandle::new(tokio::spawn(async move {
            let result = self.fetch(&url).await;
            callback(result);
        }))
    }
}

impl std::fmt::Debug for CogTileHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CogTileHandler")
            .field("scheme", &self.scheme)
            .field("source", &self.source.url())
            .field("cache_control", &self.cache_control)
            .finish()
    }
}
