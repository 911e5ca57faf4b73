//! Tile URL construction and parsing.

use std::fmt;

use forecast_common::TileCoord;

use crate::{Result, TileError};

/// Scheme prefix shared by every raster source.
pub const SCHEME_PREFIX: &str = "cog";

/// The custom scheme for a source, e.g. `cog6`.
pub fn scheme_for(source_id: impl fmt::Display) -> String {
    format!("{SCHEME_PREFIX}{source_id}")
}

/// Tile URL template handed to the map renderer.
///
/// The remote URL's own scheme is replaced by `scheme` and the renderer's
/// `{z}/{x}/{y}` placeholders are appended:
/// `https://host/a/006.tif` → `cog6://host/a/006.tif/{z}/{x}/{y}`.
pub fn tile_url_template(scheme: &str, remote_url: &str) -> String {
    let remote_path = remote_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(remote_url);
    format!("{scheme}://{remote_path}/{{z}}/{{x}}/{{y}}")
}

/// A parsed tile request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRequest {
    pub scheme: String,
    /// Everything between `://` and the trailing `z/x/y`.
    pub remote_path: String,
    pub coord: TileCoord,
}

impl TileRequest {
    pub fn new(scheme: impl Into<String>, remote_path: impl Into<String>, coord: TileCoord) -> Self {
        Self {
            scheme: scheme.into(),
            remote_path: remote_path.into(),
            coord,
        }
    }

    /// Parse `<scheme>://<remote-path>/<z>/<x>/<y>`.
    pub fn parse(url: &str) -> Result<Self> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| TileError::InvalidUrl(url.to_string()))?;
        if scheme.is_empty() {
            return Err(TileError::InvalidUrl(url.to_string()));
        }

        let coord = TileCoord::from_path_segments(rest)?;

        let mut remote = rest.trim_end_matches('/');
        for _ in 0..3 {
            remote = remote.rsplit_once('/').map(|(head, _)| head).unwrap_or("");
        }

        Ok(Self {
            scheme: scheme.to_string(),
            remote_path: remote.to_string(),
            coord,
        })
    }
}

impl fmt::Display for TileRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let TileCoord { z, x, y } = self.coord;
        if self.remote_path.is_empty() {
            write!(f, "{}://{}/{}/{}", self.scheme, z, x, y)
        } else {
            write!(f, "{}://{}/{}/{}/{}", self.scheme, self.remote_path, z, x, y)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REMOTE: &str = "https://bucket.example.com/apcp/20240101/18/006.tif";

    #[test]
    fn test_scheme_for() {
        assert_eq!(scheme_for(6), "cog6");
        assert_eq!(scheme_for(72), "cog72");
    }

    #[test]
    fn test_tile_url_template() {
        assert_eq!(
            tile_url_template("cog6", REMOTE),
            "cog6://bucket.example.com/apcp/20240101/18/006.tif/{z}/{x}/{y}"
        );
        assert_eq!(
            tile_url_template("cog6", "/data/006.tif"),
            "cog6:///data/006.tif/{z}/{x}/{y}"
        );
    }

    #[test]
    fn test_parse_request() {
        let req =
            TileRequest::parse("cog12://bucket.example.com/apcp/20240101/18/012.tif/5/28/12")
                .unwrap();
        assert_eq!(req.scheme, "cog12");
        assert_eq!(req.remote_path, "bucket.example.com/apcp/20240101/18/012.tif");
        assert_eq!(req.coord, TileCoord::new(5, 28, 12));
    }

    #[test]
    fn test_parse_filled_template_roundtrips() {
        let url = tile_url_template("cog6", REMOTE)
            .replace("{z}", "3")
            .replace("{x}", "6")
            .replace("{y}", "2");
        let req = TileRequest::parse(&url).unwrap();
        assert_eq!(req.coord, TileCoord::new(3, 6, 2));
        assert_eq!(req.to_string(), url);
    }

    #[test]
    fn test_parse_bare_coordinates() {
        let req = TileRequest::parse("cog6://1/0/1").unwrap();
        assert_eq!(req.remote_path, "");
        assert_eq!(req.coord, TileCoord::new(1, 0, 1));
        assert_eq!(req.to_string(), "cog6://1/0/1");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for url in [
            "no-scheme/1/2/3",
            "://host/1/2/3",
            "cog6://host/a/b/c",
            "cog6://host/1/2",
            "cog6://host/1/-2/3",
        ] {
            assert!(
                matches!(TileRequest::parse(url), Err(TileError::InvalidUrl(_))),
                "{url} should be rejected"
            );
        }
    }
}
