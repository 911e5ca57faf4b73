//! Error types for raster access.

use thiserror::Error;

/// Errors that can occur while opening or reading a raster source.
#[derive(Error, Debug)]
pub enum CogError {
    /// The source could not be fetched or is not a usable GeoTIFF.
    #[error("failed to open raster {url}: {message}")]
    Open { url: String, message: String },

    /// A window could not be decoded.
    #[error("failed to decode raster window: {0}")]
    Decode(String),

    /// Georeferencing tags are missing or inconsistent.
    #[error("invalid georeferencing: {0}")]
    InvalidGeoreference(String),

    /// The raster layout or sample format is not supported.
    #[error("unsupported raster layout: {0}")]
    Unsupported(String),

    /// The decode pool dropped the job before it finished.
    #[error("decode pool error: {0}")]
    Pool(String),
}

impl CogError {
    /// Create an Open error.
    pub fn open(url: impl Into<String>, message: impl ToString) -> Self {
        Self::Open {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a Decode error.
    pub fn decode(message: impl ToString) -> Self {
        Self::Decode(message.to_string())
    }

    /// Whether this error happened while opening the source (as opposed to
    /// reading a window from an already-open one).
    pub fn is_open_failure(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

impl From<tiff::TiffError> for CogError {
    fn from(err: tiff::TiffError) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result type for raster operations.
pub type Result<T> = std::result::Result<T, CogError>;
