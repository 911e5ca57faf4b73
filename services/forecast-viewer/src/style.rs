//! In-memory MapLibre style document acting as the map renderer.
//!
//! The layer manager drives it through [`MapRenderer`]; `/style.json`
//! serializes it with custom tile schemes rewritten to this service's HTTP
//! tile endpoint.

use forecast_layers::{
    LayerError, LayerHandle, MapRenderer, RasterLayerSpec, RasterSourceSpec, Visibility,
};
use serde_json::{json, Map, Value};

use crate::config::MapView;

/// Rewrite `cog6://host/path/{z}/{x}/{y}` to `<base>/tiles/cog6/host/path/{z}/{x}/{y}`.
pub fn http_tile_url(template: &str, base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    match template.split_once("://") {
        Some((scheme, rest)) if scheme.starts_with(tile_protocol::url::SCHEME_PREFIX) => {
            format!("{base}/tiles/{scheme}/{}", rest.trim_start_matches('/'))
        }
        _ => template.to_string(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct StyleDocument {
    view: MapView,
    sources: Vec<(String, RasterSourceSpec)>,
    layers: Vec<RasterLayerSpec>,
}

impl StyleDocument {
    pub fn new(view: MapView) -> Self {
        Self {
            view,
            sources: Vec::new(),
            layers: Vec::new(),
        }
    }

    pub fn source(&self, id: &str) -> Option<&RasterSourceSpec> {
        self.sources.iter().find(|(sid, _)| sid == id).map(|(_, s)| s)
    }

    pub fn layers(&self) -> &[RasterLayerSpec] {
        &self.layers
    }

    pub fn visibility(&self, layer_id: &str) -> Option<Visibility> {
        self.layers
            .iter()
            .find(|l| l.id == layer_id)
            .map(|l| l.layout.visibility)
    }

    /// Serialize as a MapLibre style with tile URLs pointing at `base_url`.
    ///
    /// Zoom bounds are map options rather than style properties, so they
    /// travel in the style's free-form `metadata` object.
    pub fn to_json(&self, base_url: &str) -> Value {
        let mut sources = Map::new();
        for (id, source) in &self.sources {
            let mut source = source.clone();
            source.tiles = source
                .tiles
                .iter()
                .map(|t| http_tile_url(t, base_url))
                .collect();
            sources.insert(id.clone(), json!(source));
        }

        json!({
            "version": 8,
            "name": "precipitation-forecast",
            "center": self.view.center,
            "zoom": self.view.zoom,
            "metadata": {
                "viewer:min_zoom": self.view.min_zoom,
                "viewer:max_zoom": self.view.max_zoom,
            },
            "sources": sources,
            "layers": self.layers,
        })
    }
}

impl MapRenderer for StyleDocument {
    fn add_source(&mut self, id: &str, source: RasterSourceSpec) -> forecast_layers::Result<()> {
        if self.source(id).is_some() {
            return Err(LayerError::Renderer(format!("source '{id}' already exists")));
        }
        self.sources.push((id.to_string(), source));
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> forecast_layers::Result<()> {
        if self.layers.iter().any(|l| l.source == id) {
            return Err(LayerError::Renderer(format!("source '{id}' is still in use")));
        }
        self.sources.retain(|(sid, _)| sid != id);
        Ok(())
    }

    fn add_layer(&mut self, layer: RasterLayerSpec) -> forecast_layers::Result<LayerHandle> {
        if self.source(&layer.source).is_none() {
            return Err(LayerError::Renderer(format!(
                "layer '{}' references unknown source '{}'",
                layer.id, layer.source
            )));
        }
        if self.visibility(&layer.id).is_some() {
            return Err(LayerError::Renderer(format!("layer '{}' already exists", layer.id)));
        }
        let handle = LayerHandle::new(&layer.id);
        self.layers.push(layer);
        Ok(handle)
    }

    fn apply_visibility(
        &mut self,
        updates: &[(LayerHandle, Visibility)],
    ) -> forecast_layers::Result<()> {
        // Reject the whole batch before touching anything.
        if let Some((missing, _)) = updates
            .iter()
            .find(|(handle, _)| self.visibility(handle.as_str()).is_none())
        {
            return Err(LayerError::Renderer(format!("unknown layer '{missing}'")));
        }

        for (handle, visibility) in updates {
            if let Some(layer) = self.layers.iter_mut().find(|l| l.id == handle.as_str()) {
                layer.layout.visibility = *visibility;
            }
        }
        Ok(())
    }
}
