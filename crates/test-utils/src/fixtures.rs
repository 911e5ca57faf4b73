//! Synthetic GeoTIFF fixtures.
//!
//! Files are written with the `tiff` encoder and georeferenced with
//! `ModelPixelScale` + `ModelTiepoint` in Web Mercator meters, which is
//! what the forecast COGs carry.

use std::io::{Cursor, Write};

use tempfile::NamedTempFile;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

use crate::generators::{quadrant_pixels, Quadrant};

/// Half the width of the Web Mercator plane in meters.
pub const HALF_WORLD_M: f64 = 20_037_508.342_789_244;

/// Placement of a raster on the Web Mercator plane.
#[derive(Debug, Clone, Copy)]
pub struct RasterPlacement {
    pub width: u32,
    pub height: u32,
    /// X of the top-left corner of the top-left pixel
    pub origin_x: f64,
    /// Y of the top-left corner of the top-left pixel
    pub origin_y: f64,
    pub pixel_size_x: f64,
    pub pixel_size_y: f64,
}

impl RasterPlacement {
    /// A square raster exactly covering the Web Mercator world.
    pub fn world(size: u32) -> Self {
        let pixel = 2.0 * HALF_WORLD_M / size as f64;
        Self {
            width: size,
            height: size,
            origin_x: -HALF_WORLD_M,
            origin_y: HALF_WORLD_M,
            pixel_size_x: pixel,
            pixel_size_y: pixel,
        }
    }

    fn pixel_scale(&self) -> [f64; 3] {
        [self.pixel_size_x, self.pixel_size_y, 0.0]
    }

    fn tiepoint(&self) -> [f64; 6] {
        [0.0, 0.0, 0.0, self.origin_x, self.origin_y, 0.0]
    }
}

/// Encode an RGBA8 raster as a georeferenced TIFF.
pub fn encode_rgba_geotiff(placement: &RasterPlacement, pixels: &[u8]) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buffer).expect("create TIFF encoder");
        let mut image = encoder
            .new_image::<colortype::RGBA8>(placement.width, placement.height)
            .expect("create TIFF image");
        image
            .encoder()
            .write_tag(Tag::ModelPixelScaleTag, &placement.pixel_scale()[..])
            .expect("write pixel scale");
        image
            .encoder()
            .write_tag(Tag::ModelTiepointTag, &placement.tiepoint()[..])
            .expect("write tiepoint");
        image.write_data(pixels).expect("write RGBA data");
    }
    buffer.into_inner()
}

/// Encode a single-band 8-bit raster as a georeferenced TIFF.
pub fn encode_gray_geotiff(placement: &RasterPlacement, samples: &[u8]) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buffer).expect("create TIFF encoder");
        let mut image = encoder
            .new_image::<colortype::Gray8>(placement.width, placement.height)
            .expect("create TIFF image");
        image
            .encoder()
            .write_tag(Tag::ModelPixelScaleTag, &placement.pixel_scale()[..])
            .expect("write pixel scale");
        image
            .encoder()
            .write_tag(Tag::ModelTiepointTag, &placement.tiepoint()[..])
            .expect("write tiepoint");
        image.write_data(samples).expect("write gray data");
    }
    buffer.into_inner()
}

/// Encode an RGBA8 TIFF without any georeferencing tags.
pub fn encode_plain_tiff(width: u32, height: u32, pixels: &[u8]) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    TiffEncoder::new(&mut buffer)
        .expect("create TIFF encoder")
        .write_image::<colortype::RGBA8>(width, height, pixels)
        .expect("write RGBA data");
    buffer.into_inner()
}

/// World-covering raster with data only in one quadrant.
pub fn world_quadrant_geotiff(size: u32, quadrant: Quadrant, color: [u8; 4]) -> Vec<u8> {
    let pixels = quadrant_pixels(size, quadrant, color);
    encode_rgba_geotiff(&RasterPlacement::world(size), &pixels)
}

/// Write bytes to a temporary `.tif` file that lives as long as the handle.
pub fn write_temp_geotiff(bytes: &[u8]) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".tif")
        .tempfile()
        .expect("create temp file");
    file.write_all(bytes).expect("write temp GeoTIFF");
    file.flush().expect("flush temp GeoTIFF");
    file
}

/// Hand-assembled tiled GeoTIFF with optional overviews, laid out the way
/// a COG is: one uncompressed RGBA8 image directory per level, finest first.
///
/// The `tiff` encoder only writes strips, so the bytes are assembled here.
/// Edge tiles are padded to the full tile size as the format requires.
#[derive(Debug, Clone)]
pub struct TiledGeoTiff {
    placement: RasterPlacement,
    tile_size: u32,
    /// (width, height, RGBA pixels) per level
    levels: Vec<(u32, u32, Vec<u8>)>,
}

// TIFF field types
const SHORT: u16 = 3;
const LONG: u16 = 4;
const DOUBLE: u16 = 12;

struct IfdEntry {
    tag: u16,
    kind: u16,
    count: u32,
    value: [u8; 4],
}

impl IfdEntry {
    fn short(tag: u16, value: u16) -> Self {
        let [a, b] = value.to_le_bytes();
        Self { tag, kind: SHORT, count: 1, value: [a, b, 0, 0] }
    }

    fn long(tag: u16, value: u32) -> Self {
        Self { tag, kind: LONG, count: 1, value: value.to_le_bytes() }
    }

    fn at(tag: u16, kind: u16, count: u32, offset: usize) -> Self {
        Self { tag, kind, count, value: (offset as u32).to_le_bytes() }
    }
}

impl TiledGeoTiff {
    /// Full-resolution level; `pixels` must be `placement.width × placement.height` RGBA.
    pub fn new(placement: RasterPlacement, tile_size: u32, pixels: Vec<u8>) -> Self {
        assert_eq!(
            pixels.len(),
            (placement.width * placement.height * 4) as usize,
            "full-resolution pixel buffer"
        );
        Self {
            placement,
            tile_size,
            levels: vec![(placement.width, placement.height, pixels)],
        }
    }

    /// Append a reduced-resolution level covering the same extent.
    pub fn with_overview(mut self, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        assert_eq!(pixels.len(), (width * height * 4) as usize, "overview pixel buffer");
        self.levels.push((width, height, pixels));
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        // Little-endian header; first IFD offset patched below
        let mut buf = vec![0x49, 0x49, 0x2a, 0x00, 0, 0, 0, 0];
        let mut link = 4;

        for (level, (width, height, pixels)) in self.levels.iter().enumerate() {
            let tile = self.tile_size as usize;
            let (width, height) = (*width as usize, *height as usize);
            let across = width.div_ceil(tile);
            let down = height.div_ceil(tile);
            let tile_bytes = tile * tile * 4;

            let mut offsets = Vec::with_capacity(across * down);
            for ty in 0..down {
                for tx in 0..across {
                    offsets.push(buf.len() as u32);
                    let mut data = vec![0u8; tile_bytes];
                    for row in 0..tile {
                        let y = ty * tile + row;
                        if y >= height {
                            break;
                        }
                        let x0 = tx * tile;
                        let cols = tile.min(width - x0);
                        let src = (y * width + x0) * 4;
                        let dst = row * tile * 4;
                        data[dst..dst + cols * 4].copy_from_slice(&pixels[src..src + cols * 4]);
                    }
                    buf.extend_from_slice(&data);
                }
            }

            let bits_at = buf.len();
            for _ in 0..4 {
                buf.extend_from_slice(&8u16.to_le_bytes());
            }
            let offsets_at = buf.len();
            for offset in &offsets {
                buf.extend_from_slice(&offset.to_le_bytes());
            }
            let counts_at = buf.len();
            for _ in &offsets {
                buf.extend_from_slice(&(tile_bytes as u32).to_le_bytes());
            }
            let scale_at = buf.len();
            for v in self.placement.pixel_scale() {
                buf.extend_from_slice(&v.to_le_bytes());
            }
            let tiepoint_at = buf.len();
            for v in self.placement.tiepoint() {
                buf.extend_from_slice(&v.to_le_bytes());
            }

            let count = offsets.len() as u32;
            let mut entries = vec![
                IfdEntry::long(254, if level == 0 { 0 } else { 1 }),
                IfdEntry::long(256, width as u32),
                IfdEntry::long(257, height as u32),
                IfdEntry::at(258, SHORT, 4, bits_at),
                IfdEntry::short(259, 1),
                IfdEntry::short(262, 2),
                IfdEntry::short(277, 4),
                IfdEntry::short(284, 1),
                IfdEntry::long(322, self.tile_size),
                IfdEntry::long(323, self.tile_size),
                if count == 1 {
                    IfdEntry::long(324, offsets[0])
                } else {
                    IfdEntry::at(324, LONG, count, offsets_at)
                },
                if count == 1 {
                    IfdEntry::long(325, tile_bytes as u32)
                } else {
                    IfdEntry::at(325, LONG, count, counts_at)
                },
                // Unassociated alpha
                IfdEntry::short(338, 2),
            ];
            if level == 0 {
                entries.push(IfdEntry::at(33550, DOUBLE, 3, scale_at));
                entries.push(IfdEntry::at(33922, DOUBLE, 6, tiepoint_at));
            }

            // IFDs start on a word boundary
            if buf.len() % 2 == 1 {
                buf.push(0);
            }
            let ifd_at = buf.len() as u32;
            buf[link..link + 4].copy_from_slice(&ifd_at.to_le_bytes());

            buf.extend_from_slice(&(entries.len() as u16).to_le_bytes());
            for entry in &entries {
                buf.extend_from_slice(&entry.tag.to_le_bytes());
                buf.extend_from_slice(&entry.kind.to_le_bytes());
                buf.extend_from_slice(&entry.count.to_le_bytes());
                buf.extend_from_slice(&entry.value);
            }
            link = buf.len();
            buf.extend_from_slice(&0u32.to_le_bytes());
        }

        buf
    }
}
