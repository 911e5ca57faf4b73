//! Error types for layer management.

use cog_reader::CogError;
use forecast_common::ForecastHorizon;
use thiserror::Error;
use tile_protocol::TileError;

/// Result type for layer operations.
pub type Result<T> = std::result::Result<T, LayerError>;

#[derive(Debug, Error)]
pub enum LayerError {
    /// Not one of the published horizons.
    #[error("invalid forecast horizon: {0}")]
    InvalidHorizon(u32),

    #[error("no layer loaded for {0}")]
    NotLoaded(ForecastHorizon),

    #[error("layer for {0} is already loaded")]
    AlreadyLoaded(ForecastHorizon),

    /// The horizon's raster could not be opened.
    #[error("failed to open source for {horizon}: {source}")]
    Open {
        horizon: ForecastHorizon,
        #[source]
        source: CogError,
    },

    #[error("tile protocol registration failed: {0}")]
    Registration(#[from] TileError),

    #[error("map renderer rejected update: {0}")]
    Renderer(String),
}

impl LayerError {
    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            LayerError::InvalidHorizon(_) | LayerError::NotLoaded(_) => 404,
            LayerError::AlreadyLoaded(_) => 409,
            LayerError::Open { .. } => 502,
            LayerError::Registration(_) | LayerError::Renderer(_) => 500,
        }
    }
}
