//! PNG encoding for decoded raster tiles.
//!
//! Tiles arrive as tightly packed RGBA buffers and leave as PNG bytes ready
//! to hand to a map client.

pub mod png;

pub use png::{encode_tile, PngError, PNG_SIGNATURE};
