//! End-to-end tile requests: URL → registry → handler → window → PNG.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use cog_reader::{CogError, DecodePool, DecodedWindow, GeoTiffSource, WindowSource};
use forecast_common::BoundingBox;
use test_utils::{decode_png, world_quadrant_geotiff, Quadrant};
use tile_protocol::{
    scheme_for, tile_url_template, CogTileHandler, TileError, TileProtocolRegistry, TileResponse,
};
use tokio::sync::oneshot;

const REMOTE: &str = "https://bucket.example.com/apcp/20240101/18/006.tif";
const RAIN: [u8; 4] = [33, 140, 255, 200];

async fn quadrant_source(quadrant: Quadrant) -> Box<dyn WindowSource> {
    let bytes = world_quadrant_geotiff(512, quadrant, RAIN);
    let pool = DecodePool::new(Some(2)).unwrap();
    Box::new(
        GeoTiffSource::from_bytes(REMOTE, Bytes::from(bytes), pool)
            .await
            .unwrap(),
    )
}

fn tile_url(scheme: &str, z: u32, x: u32, y: u32) -> String {
    tile_url_template(scheme, REMOTE)
        .replace("{z}", &z.to_string())
        .replace("{x}", &x.to_string())
        .replace("{y}", &y.to_string())
}

/// Always fails, standing in for a source whose bytes turn out corrupt.
struct BrokenSource;

#[async_trait]
impl WindowSource for BrokenSource {
    fn url(&self) -> &str {
        "memory://broken.tif"
    }

    async fn read_window(
        &self,
        _bbox: &BoundingBox,
        _width: u32,
        _height: u32,
    ) -> cog_reader::Result<DecodedWindow> {
        Err(CogError::decode("corrupt strip"))
    }
}

#[tokio::test]
async fn test_quadrant_raster_at_zoom_one() {
    let registry = TileProtocolRegistry::new();
    let scheme = scheme_for(6);
    registry
        .register(CogTileHandler::new(&scheme, quadrant_source(Quadrant::NorthWest).await))
        .await
        .unwrap();

    let tile = registry.fetch(&tile_url(&scheme, 1, 0, 0)).await.unwrap();
    let png = decode_png(&tile.data);
    assert_eq!((png.width, png.height), (256, 256));
    assert!(png.opaque_pixel_count() > 0);
    assert_eq!(png.pixel(128, 128), RAIN);

    for (x, y) in [(1, 0), (0, 1), (1, 1)] {
        let tile = registry.fetch(&tile_url(&scheme, 1, x, y)).await.unwrap();
        let png = decode_png(&tile.data);
        assert_eq!((png.width, png.height), (256, 256));
        assert!(png.is_fully_transparent(), "tile 1/{x}/{y} should be empty");
    }
}

#[tokio::test]
async fn test_tiles_outside_raster_are_transparent() {
    let registry = TileProtocolRegistry::new();
    registry
        .register(CogTileHandler::new("cog6", quadrant_source(Quadrant::SouthEast).await))
        .await
        .unwrap();

    // Column 4 at z=2 lies east of the world extent.
    let tile = registry.fetch(&tile_url("cog6", 2, 4, 3)).await.unwrap();
    assert!(decode_png(&tile.data).is_fully_transparent());
}

#[tokio::test]
async fn test_callback_delivers_tile() {
    let registry = Arc::new(TileProtocolRegistry::new());
    registry
        .register(
            CogTileHandler::new("cog12", quadrant_source(Quadrant::NorthEast).await)
                .with_cache_control("max-age=300"),
        )
        .await
        .unwrap();

    let (tx, rx) = oneshot::channel::<Result<TileResponse, TileError>>();
    let handle = registry.request(
        tile_url("cog12", 1, 1, 0),
        Box::new(move |result| {
            let _ = tx.send(result);
        }),
    );
    handle.cancel();

    let tile = rx.await.unwrap().unwrap();
    assert_eq!(tile.cache_control.as_deref(), Some("max-age=300"));
    assert_eq!(tile.expires, None);
    assert!(!decode_png(&tile.data).is_fully_transparent());
}

#[tokio::test]
async fn test_concurrent_requests_across_schemes() {
    let registry = Arc::new(TileProtocolRegistry::new());
    for (hours, quadrant) in [(6, Quadrant::NorthWest), (12, Quadrant::SouthEast)] {
        registry
            .register(CogTileHandler::new(
                scheme_for(hours),
                quadrant_source(quadrant).await,
            ))
            .await
            .unwrap();
    }

    let requests = [
        (scheme_for(6), 0, 0, true),
        (scheme_for(12), 0, 0, false),
        (scheme_for(6), 1, 1, false),
        (scheme_for(12), 1, 1, true),
    ];
    let mut receivers = Vec::new();
    let mut handles = Vec::new();
    for (scheme, x, y, expect_data) in requests {
        let (tx, rx) = oneshot::channel();
        handles.push(registry.request(
            tile_url(&scheme, 1, x, y),
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        ));
        receivers.push((rx, expect_data));
    }

    for handle in handles {
        handle.finished().await;
    }
    for (rx, expect_data) in receivers {
        let tile = rx.await.unwrap().unwrap();
        assert_eq!(!decode_png(&tile.data).is_fully_transparent(), expect_data);
    }
}

#[tokio::test]
async fn test_decode_failure_reaches_callback() {
    let registry = Arc::new(TileProtocolRegistry::new());
    registry
        .register(CogTileHandler::new("cog18", Box::new(BrokenSource)))
        .await
        .unwrap();

    let (tx, rx) = oneshot::channel();
    registry.request(
        tile_url("cog18", 3, 1, 1),
        Box::new(move |result| {
            let _ = tx.send(result);
        }),
    );

    let err = rx.await.unwrap().unwrap_err();
    assert!(matches!(err, TileError::Decode(ref m) if m.contains("corrupt strip")));
    assert_eq!(err.http_status_code(), 502);
}

#[tokio::test]
async fn test_routing_errors() {
    let registry = Arc::new(TileProtocolRegistry::new());
    registry
        .register(CogTileHandler::new("cog6", quadrant_source(Quadrant::NorthWest).await))
        .await
        .unwrap();

    let err = registry.fetch(&tile_url("cog24", 1, 0, 0)).await.unwrap_err();
    assert_eq!(err, TileError::UnknownScheme("cog24".to_string()));

    let err = registry.fetch("cog6://host/not/a/tile").await.unwrap_err();
    assert!(matches!(err, TileError::InvalidUrl(_)));

    let (tx, rx) = oneshot::channel();
    registry.request(
        "cog99://host/1/0/0",
        Box::new(move |result| {
            let _ = tx.send(result);
        }),
    );
    assert!(matches!(
        rx.await.unwrap(),
        Err(TileError::UnknownScheme(_))
    ));
}

#[tokio::test]
async fn test_duplicate_scheme_rejected() {
    let registry = TileProtocolRegistry::new();
    registry
        .register(CogTileHandler::new("cog6", Box::new(BrokenSource)))
        .await
        .unwrap();
    let err = registry
        .register(CogTileHandler::new("cog6", Box::new(BrokenSource)))
        .await
        .unwrap_err();

    assert_eq!(err, TileError::DuplicateScheme("cog6".to_string()));
    assert_eq!(registry.schemes().await, vec!["cog6".to_string()]);
}

#[tokio::test]
async fn test_unregistered_scheme_can_be_taken_again() {
    let registry = TileProtocolRegistry::new();
    registry
        .register(CogTileHandler::new("cog6", Box::new(BrokenSource)))
        .await
        .unwrap();

    assert!(registry.unregister("cog6").await.is_some());
    assert!(registry.unregister("cog6").await.is_none());
    assert!(matches!(
        registry.fetch("cog6://host/1/0/0").await,
        Err(TileError::UnknownScheme(_))
    ));

    registry
        .register(CogTileHandler::new("cog6", Box::new(BrokenSource)))
        .await
        .unwrap();
    assert_eq!(registry.schemes().await, vec!["cog6".to_string()]);
}

#[tokio::test]
async fn test_handler_rejects_foreign_scheme() {
    let handler = CogTileHandler::new("cog6", Box::new(BrokenSource));
    let err = handler.fetch("cog12://host/1/0/0").await.unwrap_err();
    assert_eq!(err, TileError::UnknownScheme("cog12".to_string()));
}
