//! Custom tile URL schemes for forecast rasters.
//!
//! Every raster source gets its own scheme (`cog<id>`). A tile URL such as
//! `cog6://bucket.example.com/apcp/20240101/18/006.tif/5/28/12` is routed by
//! scheme to a [`CogTileHandler`], which turns the trailing `z/x/y` into a
//! Web Mercator window, reads that window from its source and answers with a
//! PNG.

pub mod error;
pub mod handler;
pub mod registry;
pub mod url;

pub use error::{Result, TileError};
pub use handler::{CogTileHandler, TileCallback, TileRequestHandle, TileResponse};
pub use registry::TileProtocolRegistry;
pub use url::{scheme_for, tile_url_template, TileRequest};
