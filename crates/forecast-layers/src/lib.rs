//! Forecast overlay layers.
//!
//! [`ForecastLayerManager`] opens one raster per forecast horizon, registers
//! a tile scheme for it, adds a hidden raster layer to a [`MapRenderer`] and
//! then switches which single layer is visible.

pub mod dataset;
pub mod error;
pub mod manager;
pub mod map;

pub use dataset::ForecastDataset;
pub use error::{LayerError, Result};
pub use manager::{ForecastLayer, ForecastLayerManager, LoadReport};
pub use map::{
    LayerHandle, LayerStyle, MapRenderer, RasterLayerSpec, RasterSourceSpec, Visibility,
};
