//! PNG inspection for asserting on encoded tiles.
//!
//! Pixels are decoded with the `image` crate; the chunk walk only reports
//! chunk order and the IHDR color type, which `image` hides.

use image::ImageFormat;

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPng {
    pub width: u32,
    pub height: u32,
    /// IHDR color type byte (3 indexed, 6 RGBA)
    pub color_type: u8,
    /// Chunk types in file order, e.g. `["IHDR", "PLTE", "IDAT", "IEND"]`.
    pub chunks: Vec<String>,
    /// Expanded RGBA8 pixels.
    pub pixels: Vec<u8>,
}

impl DecodedPng {
    pub fn pixel(&self, col: u32, row: u32) -> [u8; 4] {
        let i = ((row * self.width + col) * 4) as usize;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    pub fn opaque_pixel_count(&self) -> usize {
        self.pixels.chunks_exact(4).filter(|p| p[3] != 0).count()
    }

    pub fn is_fully_transparent(&self) -> bool {
        self.opaque_pixel_count() == 0
    }
}

/// Chunk types of a PNG stream in file order.
pub fn png_chunk_types(bytes: &[u8]) -> Vec<String> {
    assert_eq!(&bytes[0..8], &[137, 80, 78, 71, 13, 10, 26, 10], "PNG signature");

    let mut pos = 8;
    let mut chunks = Vec::new();
    while pos + 8 <= bytes.len() {
        let len = u32::from_be_bytes([bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]])
            as usize;
        chunks.push(String::from_utf8_lossy(&bytes[pos + 4..pos + 8]).into_owned());
        pos += 12 + len;
    }
    chunks
}

/// Decode PNG bytes, panicking on anything malformed.
pub fn decode_png(bytes: &[u8]) -> DecodedPng {
    let image = image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .expect("decode PNG");
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();

    // IHDR is always first: signature(8) + length(4) + type(4) + width(4) + height(4) + depth(1)
    let color_type = bytes[25];

    DecodedPng {
        width,
        height,
        color_type,
        chunks: png_chunk_types(bytes),
        pixels: rgba.into_raw(),
    }
}
