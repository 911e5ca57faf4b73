//! Error types for the shared forecast types.

use thiserror::Error;

/// Result type alias using ForecastError.
pub type ForecastResult<T> = Result<T, ForecastError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ForecastError {
    #[error("invalid forecast horizon: {0} (expected 6..=72 in steps of 6)")]
    InvalidHorizon(u32),

    #[error("invalid tile path: {0}")]
    InvalidTilePath(String),
}
