//! Shared application state.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use cog_reader::SourceOpener;
use forecast_common::time::{forecast_date_label, headline};
use forecast_common::display_date;
use forecast_layers::{ForecastDataset, ForecastLayerManager, LoadReport};
use metrics_exporter_prometheus::PrometheusHandle;
use tile_protocol::TileProtocolRegistry;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::ViewerConfig;
use crate::style::StyleDocument;

pub type LayerManager = ForecastLayerManager<StyleDocument>;

pub struct AppState {
    pub config: ViewerConfig,
    pub registry: Arc<TileProtocolRegistry>,
    /// Serialises `activate` calls and style reads.
    pub manager: Mutex<LayerManager>,
    pub run_date: NaiveDate,
    pub display_date: NaiveDate,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Load every configured horizon, then show the initial one.
    ///
    /// Horizons that fail to load are skipped; the returned report says which.
    pub async fn initialize(
        config: ViewerConfig,
        run_date: NaiveDate,
        opener: Arc<dyn SourceOpener>,
    ) -> Result<(Self, LoadReport)> {
        config
            .validate()
            .map_err(anyhow::Error::msg)
            .context("Invalid viewer configuration")?;
        let horizons = config.horizons()?;

        let registry = Arc::new(TileProtocolRegistry::new());
        let dataset = ForecastDataset::new(&config.dataset.base_url, run_date)
            .with_cycle_hour(config.dataset.cycle_hour);
        let mut manager = ForecastLayerManager::new(
            StyleDocument::new(config.map.clone()),
            opener,
            registry.clone(),
            dataset,
        )
        .with_style(config.layer.clone())
        .with_cache_control(config.tile_cache_control.clone());

        info!(
            run_date = %run_date,
            horizons = horizons.len(),
            "Loading forecast layers"
        );
        let report = manager.load_all(&horizons).await;

        if manager.activate(config.dataset.initial_horizon).is_err() {
            warn!(
                horizon = config.dataset.initial_horizon,
                "Initial forecast layer unavailable, all layers hidden"
            );
        }

        let state = Self {
            config,
            registry,
            manager: Mutex::new(manager),
            run_date,
            display_date: display_date(run_date),
            metrics: None,
        };
        Ok((state, report))
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// `YYYY/MM/DD 3時の予報`
    pub fn headline(&self) -> String {
        headline(self.display_date)
    }

    pub fn forecast_date_label(&self) -> String {
        forecast_date_label(self.display_date)
    }
}
