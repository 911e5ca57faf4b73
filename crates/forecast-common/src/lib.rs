//! Common types shared by the forecast tile crates and the viewer service.

pub mod bbox;
pub mod error;
pub mod horizon;
pub mod tile;
pub mod time;

pub use bbox::BoundingBox;
pub use error::{ForecastError, ForecastResult};
pub use horizon::ForecastHorizon;
pub use tile::{TileCoord, TILE_SIZE};
pub use time::{display_date, resolve_target_date};
