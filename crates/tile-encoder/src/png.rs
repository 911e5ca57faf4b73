//! PNG encoding for RGBA tile data.
//!
//! Two encodings are produced:
//! - **Indexed PNG (color type 3)** when the tile has at most 256 distinct
//!   RGBA values. Precipitation tiles are drawn from a small colour ramp, so
//!   this is the common case.
//! - **RGBA PNG (color type 6)** otherwise.
//!
//! The palette is built in first-appearance order while scanning rows top to
//! bottom, so the same pixels always encode to the same bytes.

use std::collections::HashMap;
use std::io::Write;

use thiserror::Error;
use tracing::trace;

/// The eight byte PNG file signature.
pub const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Maximum colors for indexed PNG (PNG8)
const MAX_PALETTE_SIZE: usize = 256;

const BYTES_PER_PIXEL: usize = 4;

#[derive(Debug, Error)]
pub enum PngError {
    #[error("pixel buffer holds {actual} bytes, expected {expected} for the tile dimensions")]
    BufferSize { expected: usize, actual: usize },

    #[error("IDAT compression failed: {0}")]
    Compression(#[from] std::io::Error),
}

/// Encode a tile as PNG.
///
/// `pixels` must hold exactly `width * height * 4` bytes of RGBA data in
/// row-major order.
pub fn encode_tile(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, PngError> {
    let expected = width as usize * height as usize * BYTES_PER_PIXEL;
    if pixels.len() != expected {
        return Err(PngError::BufferSize {
            expected,
            actual: pixels.len(),
        });
    }

    match extract_palette(pixels) {
        Some((palette, indices)) => {
            trace!(colors = palette.len(), width, height, "Encoding indexed PNG");
            create_png_indexed(width, height, &palette, &indices)
        }
        None => {
            trace!(width, height, "Encoding RGBA PNG");
            create_png_rgba(pixels, width, height)
        }
    }
}

/// Pack RGBA bytes into a u32 for faster hashing and comparison
#[inline(always)]
fn pack_color(r: u8, g: u8, b: u8, a: u8) -> u32 {
    (r as u32) | ((g as u32) << 8) | ((b as u32) << 16) | ((a as u32) << 24)
}

type Palette = Vec<[u8; 4]>;

/// Returns `None` as soon as a 257th colour shows up.
fn extract_palette(pixels: &[u8]) -> Option<(Palette, Vec<u8>)> {
    let mut color_to_index: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette: Palette = Vec::with_capacity(MAX_PALETTE_SIZE);
    let mut indices: Vec<u8> = Vec::with_capacity(pixels.len() / BYTES_PER_PIXEL);

    for px in pixels.chunks_exact(BYTES_PER_PIXEL) {
        let packed = pack_color(px[0], px[1], px[2], px[3]);

        let index = match color_to_index.get(&packed) {
            Some(&idx) => idx,
            None => {
                if palette.len() >= MAX_PALETTE_SIZE {
                    return None;
                }
                let idx = palette.len() as u8;
                palette.push([px[0], px[1], px[2], px[3]]);
                color_to_index.insert(packed, idx);
                idx
            }
        };
        indices.push(index);
    }

    Some((palette, indices))
}

fn write_header(png: &mut Vec<u8>, width: u32, height: u32, color_type: u8) {
    png.extend_from_slice(&PNG_SIGNATURE);

    let mut ihdr_data = Vec::with_capacity(13);
    ihdr_data.extend_from_slice(&width.to_be_bytes());
    ihdr_data.extend_from_slice(&height.to_be_bytes());
    ihdr_data.push(8); // bit depth
    ihdr_data.push(color_type);
    ihdr_data.push(0); // compression method
    ihdr_data.push(0); // filter method
    ihdr_data.push(0); // interlace method
    write_chunk(png, b"IHDR", &ihdr_data);
}

fn create_png_indexed(
    width: u32,
    height: u32,
    palette: &[[u8; 4]],
    indices: &[u8],
) -> Result<Vec<u8>, PngError> {
    let mut png = Vec::new();
    write_header(&mut png, width, height, 3);

    let plte_data: Vec<u8> = palette.iter().flat_map(|c| [c[0], c[1], c[2]]).collect();
    write_chunk(&mut png, b"PLTE", &plte_data);

    // tRNS only when some entry is not fully opaque
    if palette.iter().any(|c| c[3] < 255) {
        let trns_data: Vec<u8> = palette.iter().map(|c| c[3]).collect();
        write_chunk(&mut png, b"tRNS", &trns_data);
    }

    let idat_data = deflate_scanlines(indices, width as usize, height as usize)?;
    write_chunk(&mut png, b"IDAT", &idat_data);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

fn create_png_rgba(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, PngError> {
    let mut png = Vec::new();
    write_header(&mut png, width, height, 6);

    let idat_data = deflate_scanlines(pixels, width as usize * BYTES_PER_PIXEL, height as usize)?;
    write_chunk(&mut png, b"IDAT", &idat_data);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Write a PNG chunk
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Prefix each scanline with filter type 0 and zlib-compress the result.
fn deflate_scanlines(data: &[u8], row_bytes: usize, rows: usize) -> std::io::Result<Vec<u8>> {
    let mut uncompressed = Vec::with_capacity(rows * (1 + row_bytes));
    if row_bytes > 0 {
        for row in data.chunks_exact(row_bytes).take(rows) {
            uncompressed.push(0);
            uncompressed.extend_from_slice(row);
        }
    } else {
        uncompressed.resize(rows, 0);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(&uncompressed)?;
    encoder.finish()
}
