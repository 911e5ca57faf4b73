//! Forecast viewer service library.
//!
//! Exposes the router and its parts so the HTTP surface can be exercised
//! in tests without binding a socket.

pub mod config;
pub mod handlers;
pub mod state;
pub mod style;

use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use state::AppState;

/// Build the HTTP router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // On-demand tiles for every registered scheme
        .route("/tiles/:scheme/*path", get(handlers::tile_handler))
        // Map style with the forecast overlays
        .route("/style.json", get(handlers::style_handler))
        // Layer state and the horizon slider
        .route("/api/layers", get(handlers::layers_handler))
        .route(
            "/api/layers/active/:horizon",
            post(handlers::activate_handler),
        )
        // Health check
        .route("/health", get(handlers::health_handler))
        // Metrics
        .route("/metrics", get(handlers::metrics_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
