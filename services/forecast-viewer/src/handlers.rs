//! HTTP handlers.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Extension, Path},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use forecast_common::time::horizon_label;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::state::{AppState, LayerManager};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct LayerInfo {
    pub hours: u32,
    pub label: String,
    pub layer_id: String,
    pub source_id: String,
    pub scheme: String,
    pub source_url: String,
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LayersResponse {
    pub run_date: String,
    pub forecast_date: String,
    pub headline: String,
    pub active: Option<u32>,
    pub active_label: Option<String>,
    pub layers: Vec<LayerInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(code: u16, message: String) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse { error: message })).into_response()
}

fn layers_response(state: &AppState, manager: &LayerManager) -> LayersResponse {
    let active = manager.active();
    LayersResponse {
        run_date: state.run_date.format("%Y-%m-%d").to_string(),
        forecast_date: state.forecast_date_label(),
        headline: state.headline(),
        active: active.map(|h| h.hours()),
        active_label: active.map(horizon_label),
        layers: manager
            .layers()
            .map(|layer| LayerInfo {
                hours: layer.horizon.hours(),
                label: horizon_label(layer.horizon),
                layer_id: layer.layer.to_string(),
                source_id: layer.source_id.clone(),
                scheme: layer.scheme.clone(),
                source_url: layer.source_url.clone(),
                visible: layer.is_visible(),
            })
            .collect(),
    }
}

// ============================================================================
// Tiles
// ============================================================================

/// GET /tiles/:scheme/*path
///
/// `path` is the remote path followed by `z/x/y`, exactly as in the
/// custom-scheme URL the map was given.
#[instrument(skip(state))]
pub async fn tile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((scheme, path)): Path<(String, String)>,
) -> Response {
    let url = format!("{scheme}://{}", path.trim_start_matches('/'));

    match state.registry.fetch(&url).await {
        Ok(tile) => {
            let mut builder = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "image/png");
            if let Some(cache_control) = &tile.cache_control {
                builder = builder.header(header::CACHE_CONTROL, cache_control.as_str());
            }
            if let Some(expires) = &tile.expires {
                builder = builder.header(header::EXPIRES, expires.as_str());
            }
            builder
                .body(Body::from(tile.data))
                .unwrap_or_else(|e| error_response(500, e.to_string()))
        }
        Err(e) => {
            debug!(url = %url, error = %e, "Tile request failed");
            error_response(e.http_status_code(), e.to_string())
        }
    }
}

// ============================================================================
// Style and layer state
// ============================================================================

/// GET /style.json
pub async fn style_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let base_url = match &state.config.public_url {
        Some(url) => url.clone(),
        None => {
            let host = headers
                .get(header::HOST)
                .and_then(|h| h.to_str().ok())
                .unwrap_or("localhost");
            format!("http://{host}")
        }
    };

    let manager = state.manager.lock().await;
    Json(manager.renderer().to_json(&base_url))
}

/// GET /api/layers
pub async fn layers_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let manager = state.manager.lock().await;
    Json(layers_response(&state, &manager))
}

/// POST /api/layers/active/:horizon
#[instrument(skip(state))]
pub async fn activate_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(hours): Path<u32>,
) -> Response {
    let mut manager = state.manager.lock().await;
    match manager.activate(hours) {
        Ok(()) => Json(layers_response(&state, &manager)).into_response(),
        Err(e) => error_response(e.http_status_code(), e.to_string()),
    }
}

// ============================================================================
// Health and metrics
// ============================================================================

/// GET /health
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus text exposition
pub async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}
