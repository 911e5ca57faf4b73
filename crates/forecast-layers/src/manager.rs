//! Overlay lifecycle: load per horizon, then keep exactly one visible.

use std::collections::BTreeMap;
use std::sync::Arc;

use cog_reader::SourceOpener;
use forecast_common::ForecastHorizon;
use serde::Serialize;
use tile_protocol::{scheme_for, tile_url_template, CogTileHandler, TileProtocolRegistry};
use tracing::{info, instrument, warn};

use crate::dataset::ForecastDataset;
use crate::map::{
    LayerHandle, LayerStyle, MapRenderer, RasterLayerSpec, RasterSourceSpec, Visibility,
};
use crate::{LayerError, Result};

/// A loaded overlay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastLayer {
    pub horizon: ForecastHorizon,
    pub source_id: String,
    pub layer: LayerHandle,
    pub scheme: String,
    pub source_url: String,
    pub visibility: Visibility,
}

impl ForecastLayer {
    pub fn source_id_for(horizon: ForecastHorizon) -> String {
        format!("weather-cog-{}", horizon.hours())
    }

    pub fn layer_id_for(horizon: ForecastHorizon) -> String {
        format!("weather-cog-layer-{}", horizon.hours())
    }

    pub fn is_visible(&self) -> bool {
        self.visibility == Visibility::Visible
    }
}

/// Outcome of [`ForecastLayerManager::load_all`].
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<ForecastHorizon>,
    pub failed: Vec<(ForecastHorizon, LayerError)>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.loaded.len() + self.failed.len()
    }
}

/// Owns the forecast overlays of one map.
pub struct ForecastLayerManager<R: MapRenderer> {
    renderer: R,
    opener: Arc<dyn SourceOpener>,
    registry: Arc<TileProtocolRegistry>,
    dataset: ForecastDataset,
    style: LayerStyle,
    cache_control: Option<String>,
    layers: BTreeMap<ForecastHorizon, ForecastLayer>,
    active: Option<ForecastHorizon>,
}

impl<R: MapRenderer> ForecastLayerManager<R> {
    pub fn new(
        renderer: R,
        opener: Arc<dyn SourceOpener>,
        registry: Arc<TileProtocolRegistry>,
        dataset: ForecastDataset,
    ) -> Self {
        Self {
            renderer,
            opener,
            registry,
            dataset,
            style: LayerStyle::default(),
            cache_control: None,
            layers: BTreeMap::new(),
            active: None,
        }
    }

    pub fn with_style(mut self, style: LayerStyle) -> Self {
        self.style = style;
        self
    }

    /// `Cache-Control` attached to every tile served for these layers.
    pub fn with_cache_control(mut self, value: impl Into<String>) -> Self {
        self.cache_control = Some(value.into());
        self
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn registry(&self) -> &Arc<TileProtocolRegistry> {
        &self.registry
    }

    /// The visible horizon, once `activate` has succeeded.
    pub fn active(&self) -> Option<ForecastHorizon> {
        self.active
    }

    pub fn layer(&self, horizon: ForecastHorizon) -> Option<&ForecastLayer> {
        self.layers.get(&horizon)
    }

    /// Loaded layers in horizon order.
    pub fn layers(&self) -> impl Iterator<Item = &ForecastLayer> {
        self.layers.values()
    }

    /// Open the horizon's raster, register its tile scheme and add a hidden
    /// layer for it.
    ///
    /// If the renderer rejects the source or layer, the scheme and any
    /// source already added are removed again, so the horizon can be retried.
    #[instrument(skip(self, horizon), fields(horizon = horizon.hours()))]
    pub async fn load(&mut self, horizon: ForecastHorizon) -> Result<&ForecastLayer> {
        if self.layers.contains_key(&horizon) {
            return Err(LayerError::AlreadyLoaded(horizon));
        }

        let url = self.dataset.source_url(horizon);
        let source = self
            .opener
            .open(&url)
            .await
            .map_err(|source| LayerError::Open { horizon, source })?;

        let scheme = scheme_for(horizon.hours());
        let mut handler = CogTileHandler::new(&scheme, source);
        if let Some(cache_control) = &self.cache_control {
            handler = handler.with_cache_control(cache_control.clone());
        }
        self.registry.register(handler).await?;

        let source_id = ForecastLayer::source_id_for(horizon);
        let layer = match self.add_to_renderer(horizon, &source_id, &scheme, &url) {
            Ok(layer) => layer,
            Err(e) => {
                self.registry.unregister(&scheme).await;
                return Err(e);
            }
        };

        info!(scheme = %scheme, url = %url, layer = %layer, "Loaded forecast layer");

        let entry = self.layers.entry(horizon).or_insert(ForecastLayer {
            horizon,
            source_id,
            layer,
            scheme,
            source_url: url,
            visibility: Visibility::Hidden,
        });
        Ok(entry)
    }

    fn add_to_renderer(
        &mut self,
        horizon: ForecastHorizon,
        source_id: &str,
        scheme: &str,
        url: &str,
    ) -> Result<LayerHandle> {
        let tile_url = tile_url_template(scheme, url);
        self.renderer
            .add_source(source_id, RasterSourceSpec::new(tile_url, &self.style))?;

        let layer = RasterLayerSpec::hidden(
            ForecastLayer::layer_id_for(horizon),
            source_id,
            &self.style,
        );
        self.renderer.add_layer(layer).map_err(|e| {
            if let Err(cleanup) = self.renderer.remove_source(source_id) {
                warn!(source = %source_id, error = %cleanup, "Failed to remove orphaned source");
            }
            e
        })
    }

    /// Load each horizon in order, one at a time. Failures are logged and
    /// collected; the remaining horizons still load.
    pub async fn load_all(&mut self, horizons: &[ForecastHorizon]) -> LoadReport {
        let mut report = LoadReport::default();
        for &horizon in horizons {
            match self.load(horizon).await {
                Ok(_) => report.loaded.push(horizon),
                Err(e) => {
                    warn!(horizon = horizon.hours(), error = %e, "Skipping forecast layer");
                    report.failed.push((horizon, e));
                }
            }
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "Forecast layers loaded"
        );
        report
    }

    /// Show the layer for `hours` and hide every other one.
    ///
    /// An unknown or unloaded horizon leaves visibility untouched.
    pub fn activate(&mut self, hours: u32) -> Result<()> {
        let result = ForecastHorizon::new(hours)
            .map_err(|_| LayerError::InvalidHorizon(hours))
            .and_then(|horizon| self.show_only(horizon));

        if let Err(e) = &result {
            warn!(hours, error = %e, "Forecast layer not activated");
        }
        result
    }

    fn show_only(&mut self, horizon: ForecastHorizon) -> Result<()> {
        let target = self
            .layers
            .get(&horizon)
            .map(|layer| layer.layer.clone())
            .ok_or(LayerError::NotLoaded(horizon))?;

        let mut updates: Vec<(LayerHandle, Visibility)> = self
            .layers
            .values()
            .filter(|layer| layer.horizon != horizon)
            .map(|layer| (layer.layer.clone(), Visibility::Hidden))
            .collect();
        updates.push((target, Visibility::Visible));

        self.renderer.apply_visibility(&updates)?;

        for layer in self.layers.values_mut() {
            layer.visibility = if layer.horizon == horizon {
                Visibility::Visible
            } else {
                Visibility::Hidden
            };
        }
        self.active = Some(horizon);
        info!(horizon = horizon.hours(), "Activated forecast layer");
        Ok(())
    }
}
