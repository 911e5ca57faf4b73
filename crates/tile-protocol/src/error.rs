//! Error types for tile requests.

use cog_reader::CogError;
use forecast_common::ForecastError;
use thiserror::Error;
use tile_encoder::PngError;

/// Result type for tile protocol operations.
pub type Result<T> = std::result::Result<T, TileError>;

/// Errors delivered through a tile request's error arm.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TileError {
    #[error("invalid tile URL: {0}")]
    InvalidUrl(String),

    #[error("no handler registered for scheme '{0}'")]
    UnknownScheme(String),

    #[error("scheme '{0}' is already registered")]
    DuplicateScheme(String),

    /// The raster window could not be read.
    #[error("tile decode failed: {0}")]
    Decode(String),

    /// The decoded window could not be encoded as PNG.
    #[error("tile encode failed: {0}")]
    Encode(String),
}

impl TileError {
    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            TileError::InvalidUrl(_) => 400,
            TileError::UnknownScheme(_) => 404,
            TileError::DuplicateScheme(_) => 409,
            TileError::Decode(_) => 502,
            TileError::Encode(_) => 500,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TileError::InvalidUrl(_) => "invalid_url",
            TileError::UnknownScheme(_) => "unknown_scheme",
            TileError::DuplicateScheme(_) => "duplicate_scheme",
            TileError::Decode(_) => "decode",
            TileError::Encode(_) => "encode",
        }
    }
}

impl From<CogError> for TileError {
    fn from(err: CogError) -> Self {
        TileError::Decode(err.to_string())
    }
}

impl From<PngError> for TileError {
    fn from(err: PngError) -> Self {
        TileError::Encode(err.to_string())
    }
}

impl From<ForecastError> for TileError {
    fn from(err: ForecastError) -> Self {
        match err {
            ForecastError::InvalidTilePath(path) => TileError::InvalidUrl(path),
            other => TileError::InvalidUrl(other.to_string()),
        }
    }
}
