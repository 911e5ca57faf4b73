//! Viewer configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, an optional
//! YAML file, environment variables, command-line flags (applied by `main`).

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::FixedOffset;
use cog_reader::DEFAULT_MAX_SOURCE_BYTES;
use forecast_common::{ForecastHorizon, ForecastResult};
use forecast_layers::dataset::{DEFAULT_BASE_URL, DEFAULT_CYCLE_HOUR};
use forecast_layers::LayerStyle;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Where the forecast rasters come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub base_url: String,
    pub cycle_hour: u32,
    /// Horizons to load, in load order.
    pub horizons: Vec<u32>,
    /// Horizon shown once loading finishes.
    pub initial_horizon: u32,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            cycle_hour: DEFAULT_CYCLE_HOUR,
            horizons: ForecastHorizon::all().map(|h| h.hours()).collect(),
            initial_horizon: ForecastHorizon::INITIAL.hours(),
        }
    }
}

/// Initial map view written into the style document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapView {
    /// `[lon, lat]`
    pub center: [f64; 2],
    pub zoom: f64,
    pub min_zoom: u32,
    pub max_zoom: u32,
}

impl Default for MapView {
    fn default() -> Self {
        Self {
            center: [139.036, 36.685],
            zoom: 1.0,
            min_zoom: 1,
            max_zoom: 11,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub dataset: DatasetConfig,
    pub layer: LayerStyle,
    pub map: MapView,
    /// Minutes east of UTC used to decide which run is current.
    pub utc_offset_minutes: i32,
    /// Decode pool size; `None` uses every available core.
    pub decode_threads: Option<usize>,
    pub request_timeout_secs: u64,
    /// Rasters are fetched whole; larger sources fail to load.
    pub max_source_bytes: u64,
    pub tile_cache_control: String,
    /// Base URL clients reach this service at. Derived from the `Host`
    /// header when unset.
    pub public_url: Option<String>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            dataset: DatasetConfig::default(),
            layer: LayerStyle::default(),
            map: MapView::default(),
            utc_offset_minutes: 9 * 60,
            decode_threads: None,
            request_timeout_secs: 120,
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
            tile_cache_control: "max-age=300".to_string(),
            public_url: None,
        }
    }
}

impl ViewerConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse viewer configuration")
    }

    /// Load the YAML file if given, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                info!(path = %path.display(), "Loaded viewer configuration");
                Self::from_yaml_str(&content)?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Override fields from environment variables.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override fields from any key/value lookup. Unparseable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("FORECAST_BASE_URL") {
            self.dataset.base_url = val;
        }

        if let Some(val) = lookup("FORECAST_CYCLE_HOUR") {
            if let Ok(hour) = val.parse() {
                self.dataset.cycle_hour = hour;
            }
        }

        if let Some(val) = lookup("FORECAST_UTC_OFFSET_MINUTES") {
            if let Ok(minutes) = val.parse() {
                self.utc_offset_minutes = minutes;
            }
        }

        if let Some(val) = lookup("DECODE_THREADS") {
            if let Ok(threads) = val.parse() {
                self.decode_threads = Some(threads);
            }
        }

        if let Some(val) = lookup("REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.request_timeout_secs = secs;
            }
        }

        if let Some(val) = lookup("MAX_SOURCE_BYTES") {
            if let Ok(bytes) = val.parse() {
                self.max_source_bytes = bytes;
            }
        }

        if let Some(val) = lookup("TILE_CACHE_CONTROL") {
            self.tile_cache_control = val;
        }

        if let Some(val) = lookup("PUBLIC_URL") {
            self.public_url = Some(val);
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.dataset.base_url.is_empty() {
            return Err("dataset.base_url must not be empty".to_string());
        }

        if self.dataset.cycle_hour > 23 {
            return Err("dataset.cycle_hour must be 0-23".to_string());
        }

        if self.dataset.horizons.is_empty() {
            return Err("dataset.horizons must not be empty".to_string());
        }

        self.horizons().map_err(|e| format!("dataset.horizons: {e}"))?;
        ForecastHorizon::new(self.dataset.initial_horizon)
            .map_err(|e| format!("dataset.initial_horizon: {e}"))?;

        if self.utc_offset().is_none() {
            return Err("utc_offset_minutes must be within ±24h".to_string());
        }

        if !(0.0..=1.0).contains(&self.layer.opacity) {
            return Err("layer.opacity must be between 0 and 1".to_string());
        }

        if self.layer.min_zoom > self.layer.max_zoom {
            return Err("layer.min_zoom must not exceed layer.max_zoom".to_string());
        }

        if self.map.min_zoom > self.map.max_zoom {
            return Err("map.min_zoom must not exceed map.max_zoom".to_string());
        }

        if self.max_source_bytes == 0 {
            return Err("max_source_bytes must be positive".to_string());
        }

        Ok(())
    }

    pub fn horizons(&self) -> ForecastResult<Vec<ForecastHorizon>> {
        self.dataset
            .horizons
            .iter()
            .map(|&h| ForecastHorizon::new(h))
            .collect()
    }

    pub fn utc_offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes.checked_mul(60)?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = ViewerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.horizons().unwrap().len(), 12);
        assert_eq!(config.utc_offset().unwrap().local_minus_utc(), 9 * 3600);
        assert_eq!(config.layer.opacity, 0.7);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = ViewerConfig::from_yaml_str(
            r#"
dataset:
  base_url: file:///data/apcp
  horizons: [6, 12]
decode_threads: 2
"#,
        )
        .unwrap();

        assert_eq!(config.dataset.base_url, "file:///data/apcp");
        assert_eq!(config.dataset.cycle_hour, 18);
        assert_eq!(config.dataset.horizons, vec![6, 12]);
        assert_eq!(config.decode_threads, Some(2));
        assert_eq!(config.layer, LayerStyle::default());
        assert_eq!(config.tile_cache_control, "max-age=300");
    }

    #[test]
    fn test_shipped_config_parses() {
        let yaml = include_str!("../config/forecast.yaml");
        let config = ViewerConfig::from_yaml_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("FORECAST_BASE_URL", "http://localhost:9000/apcp"),
            ("FORECAST_CYCLE_HOUR", "6"),
            ("FORECAST_UTC_OFFSET_MINUTES", "0"),
            ("DECODE_THREADS", "not-a-number"),
            ("MAX_SOURCE_BYTES", "1048576"),
        ]
        .into_iter()
        .collect();

        let mut config = ViewerConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.dataset.base_url, "http://localhost:9000/apcp");
        assert_eq!(config.dataset.cycle_hour, 6);
        assert_eq!(config.utc_offset_minutes, 0);
        assert_eq!(config.decode_threads, None);
        assert_eq!(config.max_source_bytes, 1024 * 1024);
    }

    #[test]
    fn test_validate_rejects_bad_horizons() {
        let mut config = ViewerConfig::default();
        config.dataset.horizons = vec![6, 7];
        assert!(config.validate().unwrap_err().contains("dataset.horizons"));

        let mut config = ViewerConfig::default();
        config.dataset.initial_horizon = 0;
        assert!(config.validate().is_err());

        let mut config = ViewerConfig::default();
        config.utc_offset_minutes = 25 * 60;
        assert!(config.validate().is_err());

        let mut config = ViewerConfig::default();
        config.map.min_zoom = 12;
        assert!(config.validate().unwrap_err().contains("map.min_zoom"));
    }
}
