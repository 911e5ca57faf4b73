//! Slippy-map tile addressing and the tile → Web Mercator transform.

use crate::{BoundingBox, ForecastError, ForecastResult};
use serde::{Deserialize, Serialize};

/// Radius of the reference sphere used by spherical Web Mercator (meters).
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Full width (and height) of the Web Mercator plane in meters.
pub const WORLD_EXTENT_M: f64 = 2.0 * std::f64::consts::PI * EARTH_RADIUS_M;

/// Edge length, in pixels, of every tile produced by the tile protocol.
pub const TILE_SIZE: u32 = 256;

/// A tile coordinate (z/x/y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y), counted from the top
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Parse the trailing `z/x/y` segments of a URL path.
    ///
    /// Leading segments are ignored, so `host/prefix/006.tif/3/7/2` yields
    /// `z=3, x=7, y=2`. A `.png` suffix on the last segment is tolerated.
    pub fn from_path_segments(path: &str) -> ForecastResult<Self> {
        let segments: Vec<&str> = path.trim_end_matches('/').rsplitn(4, '/').collect();
        if segments.len() < 3 {
            return Err(ForecastError::InvalidTilePath(path.to_string()));
        }

        let y_segment = segments[0]
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(segments[0]);
        let parse = |s: &str| -> ForecastResult<u32> {
            s.parse()
                .map_err(|_| ForecastError::InvalidTilePath(path.to_string()))
        };

        Ok(Self {
            z: parse(segments[2])?,
            x: parse(segments[1])?,
            y: parse(y_segment)?,
        })
    }

    /// Generate a cache key string.
    pub fn cache_key(&self) -> String {
        format!("{}/{}/{}", self.z, self.x, self.y)
    }

    /// Web Mercator bounding box of this tile, in meters.
    ///
    /// Total for any input: zoom levels outside the usable range just give
    /// very large or very small boxes.
    pub fn mercator_bbox(&self) -> BoundingBox {
        let origin_x = -WORLD_EXTENT_M / 2.0;
        let origin_y = WORLD_EXTENT_M / 2.0;
        let unit = WORLD_EXTENT_M / 2f64.powi(self.z as i32);

        let x = self.x as f64;
        let y = self.y as f64;

        BoundingBox::new(
            origin_x + x * unit,
            origin_y - (y + 1.0) * unit,
            origin_x + (x + 1.0) * unit,
            origin_y - y * unit,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::assert_approx_eq;

    const HALF_EXTENT: f64 = 20_037_508.342_789_244;

    #[test]
    fn test_zoom_zero_covers_world() {
        let bbox = TileCoord::new(0, 0, 0).mercator_bbox();
        assert_approx_eq!(bbox.min_x, -HALF_EXTENT, 1e-6);
        assert_approx_eq!(bbox.max_x, HALF_EXTENT, 1e-6);
        assert_approx_eq!(bbox.min_y, -HALF_EXTENT, 1e-6);
        assert_approx_eq!(bbox.max_y, HALF_EXTENT, 1e-6);
    }

    #[test]
    fn test_zoom_one_north_west_quadrant() {
        let bbox = TileCoord::new(1, 0, 0).mercator_bbox();
        assert_approx_eq!(bbox.min_x, -HALF_EXTENT, 1e-6);
        assert_approx_eq!(bbox.max_x, 0.0, 1e-6);
        assert_approx_eq!(bbox.min_y, 0.0, 1e-6);
        assert_approx_eq!(bbox.max_y, HALF_EXTENT, 1e-6);
    }

    #[test]
    fn test_from_path_segments() {
        let coord = TileCoord::from_path_segments("example.com/apcp/20240115/18/006.tif/3/7/2")
            .unwrap();
        assert_eq!(coord, TileCoord::new(3, 7, 2));

        let coord = TileCoord::from_path_segments("4/1/9.png").unwrap();
        assert_eq!(coord, TileCoord::new(4, 1, 9));
    }

    #[test]
    fn test_from_path_segments_rejects_garbage() {
        assert!(TileCoord::from_path_segments("a/b/c").is_err());
        assert!(TileCoord::from_path_segments("1/2").is_err());
        assert!(TileCoord::from_path_segments("host/{z}/{x}/{y}").is_err());
        assert!(TileCoord::from_path_segments("host/1/-2/3").is_err());
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(TileCoord::new(3, 4, 5).cache_key(), "3/4/5");
    }
}
