//! The map renderer seam and the source/layer descriptions handed to it.
//!
//! The shapes serialize to the MapLibre style specification, so a renderer
//! backed by a style document can store them as-is.

use serde::{Deserialize, Serialize};

use crate::Result;

/// Layout visibility of a map layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    #[serde(rename = "none")]
    Hidden,
}

/// Identifier of a layer inside the renderer, produced when it is added.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerHandle(String);

impl LayerHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Appearance shared by every forecast overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerStyle {
    pub opacity: f64,
    pub tile_size: u32,
    pub min_zoom: u32,
    pub max_zoom: u32,
    pub attribution: String,
}

impl Default for LayerStyle {
    fn default() -> Self {
        Self {
            opacity: 0.7,
            tile_size: 512,
            min_zoom: 1,
            max_zoom: 11,
            attribution: "© ONE COMPATH".to_string(),
        }
    }
}

/// A `raster` source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterSourceSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub tiles: Vec<String>,
    #[serde(rename = "tileSize")]
    pub tile_size: u32,
    pub minzoom: u32,
    pub maxzoom: u32,
    pub attribution: String,
}

impl RasterSourceSpec {
    pub fn new(tile_url: impl Into<String>, style: &LayerStyle) -> Self {
        Self {
            kind: "raster".to_string(),
            tiles: vec![tile_url.into()],
            tile_size: style.tile_size,
            minzoom: style.min_zoom,
            maxzoom: style.max_zoom,
            attribution: style.attribution.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerLayout {
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterPaint {
    #[serde(rename = "raster-opacity")]
    pub raster_opacity: f64,
}

/// A `raster` layer drawing one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterLayerSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
    pub layout: LayerLayout,
    pub paint: RasterPaint,
}

impl RasterLayerSpec {
    /// A layer that starts hidden.
    pub fn hidden(id: impl Into<String>, source: impl Into<String>, style: &LayerStyle) -> Self {
        Self {
            id: id.into(),
            kind: "raster".to_string(),
            source: source.into(),
            layout: LayerLayout {
                visibility: Visibility::Hidden,
            },
            paint: RasterPaint {
                raster_opacity: style.opacity,
            },
        }
    }
}

/// The map rendering engine, reduced to what overlay management needs.
pub trait MapRenderer: Send {
    fn add_source(&mut self, id: &str, source: RasterSourceSpec) -> Result<()>;

    /// Drop a source that has no layers referring to it.
    fn remove_source(&mut self, id: &str) -> Result<()>;

    fn add_layer(&mut self, layer: RasterLayerSpec) -> Result<LayerHandle>;

    /// Apply several visibility changes as one update, in order.
    fn apply_visibility(&mut self, updates: &[(LayerHandle, Visibility)]) -> Result<()>;
}
