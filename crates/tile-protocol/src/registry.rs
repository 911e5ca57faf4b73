//! Scheme → handler routing.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::handler::{CogTileHandler, TileCallback, TileRequestHandle, TileResponse};
use crate::url::TileRequest;
use crate::{Result, TileError};

/// Registered tile handlers, keyed by scheme.
///
/// Shared between whatever registers sources and whatever serves tiles;
/// clone the `Arc` rather than the registry.
#[derive(Debug, Default)]
pub struct TileProtocolRegistry {
    handlers: RwLock<BTreeMap<String, Arc<CogTileHandler>>>,
}

impl TileProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its scheme. Each scheme may be taken once.
    pub async fn register(&self, handler: CogTileHandler) -> Result<Arc<CogTileHandler>> {
        let mut handlers = self.handlers.write().await;
        let scheme = handler.scheme().to_string();
        if handlers.contains_key(&scheme) {
            return Err(TileError::DuplicateScheme(scheme));
        }

        info!(scheme = %scheme, source = %handler.source_url(), "Registered tile protocol");
        let handler = Arc::new(handler);
        handlers.insert(scheme, handler.clone());
        Ok(handler)
    }

    /// Remove a scheme so it can be registered again.
    pub async fn unregister(&self, scheme: &str) -> Option<Arc<CogTileHandler>> {
        let removed = self.handlers.write().await.remove(scheme);
        if removed.is_some() {
            info!(scheme = %scheme, "Unregistered tile protocol");
        }
        removed
    }

    /// Registered schemes in sorted order.
    pub async fn schemes(&self) -> Vec<String> {
        self.handlers.read().await.keys().cloned().collect()
    }

    pub async fn handler(&self, scheme: &str) -> Option<Arc<CogTileHandler>> {
        self.handlers.read().await.get(scheme).cloned()
    }

    async fn resolve(&self, url: &str) -> Result<Arc<CogTileHandler>> {
        let request = TileRequest::parse(url)?;
        self.handler(&request.scheme)
            .await
            .ok_or(TileError::UnknownScheme(request.scheme))
    }

    /// Route `url` to its handler and render the tile.
    pub async fn fetch(&self, url: &str) -> Result<TileResponse> {
        self.resolve(url).await?.fetch(url).await
    }

    /// Callback form of [`fetch`](Self::fetch). Returns immediately; the
    /// callback receives routing errors as well as render errors.
    pub fn request(self: &Arc<Self>, url: impl Into<String>, callback: TileCallback) -> TileRequestHandle {
        let registry = Arc::clone(self);
        let url = url.into();
        TileRequestHandle::new(tokio::spawn(async move {
            callback(registry.fetch(&url).await);
        }))
    }
}
