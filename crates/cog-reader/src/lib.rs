//! Windowed reads from Cloud Optimized GeoTIFFs.
//!
//! A [`GeoTiffSource`] wraps one opened raster. Given a Web Mercator
//! [`BoundingBox`](forecast_common::BoundingBox) and an output size it returns
//! a [`DecodedWindow`] of interleaved RGBA samples, sampled from the best
//! fitting overview level. Decompression runs on a
//! [`DecodePool`] shared between all sources so async callers never block.

pub mod error;
pub mod fetch;
pub mod geotiff;
pub mod pool;
pub mod source;
pub mod window;

pub use error::{CogError, Result};
pub use fetch::{RasterFetcher, DEFAULT_MAX_SOURCE_BYTES};
pub use geotiff::{GeoTransform, RasterMetadata, RasterPyramid};
pub use pool::DecodePool;
pub use source::{CogOpener, GeoTiffSource, SourceOpener, WindowSource};
pub use window::DecodedWindow;
