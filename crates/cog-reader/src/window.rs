//! Decoding a map window into an RGBA pixel buffer.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

use bytes::Bytes;
use forecast_common::BoundingBox;
use tiff::decoder::{Decoder, DecodingResult};

use crate::geotiff::RasterMetadata;
use crate::{CogError, Result};

/// Decoded pixels for one requested window.
///
/// Always four bands (RGBA), interleaved, row-major from the top-left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedWindow {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl DecodedWindow {
    pub const BANDS: usize = 4;

    /// A window with every pixel fully transparent.
    pub fn transparent(width: u32, height: u32) -> Self {
        Self {
            pixels: vec![0; width as usize * height as usize * Self::BANDS],
            width,
            height,
        }
    }

    pub fn pixel(&self, col: u32, row: u32) -> [u8; 4] {
        let start = (row as usize * self.width as usize + col as usize) * Self::BANDS;
        let mut rgba = [0u8; 4];
        rgba.copy_from_slice(&self.pixels[start..start + Self::BANDS]);
        rgba
    }

    fn set_pixel(&mut self, col: u32, row: u32, rgba: [u8; 4]) {
        let start = (row as usize * self.width as usize + col as usize) * Self::BANDS;
        self.pixels[start..start + Self::BANDS].copy_from_slice(&rgba);
    }

    /// Number of pixels with non-zero alpha.
    pub fn opaque_pixel_count(&self) -> usize {
        self.pixels
            .chunks_exact(Self::BANDS)
            .filter(|p| p[3] != 0)
            .count()
    }

    pub fn is_fully_transparent(&self) -> bool {
        self.opaque_pixel_count() == 0
    }
}

/// One decompressed strip or tile, reduced to 8-bit samples.
struct DecodedChunk {
    samples: Vec<u8>,
    /// Pixels per row of `samples`
    stride: u32,
}

impl DecodedChunk {
    fn read<R: Read + Seek>(decoder: &mut Decoder<R>, index: u32) -> Result<Self> {
        let (stride, _) = decoder.chunk_data_dimensions(index);
        let samples = match decoder.read_chunk(index)? {
            DecodingResult::U8(samples) => samples,
            DecodingResult::U16(samples) => samples.iter().map(|s| (s >> 8) as u8).collect(),
            _ => {
                return Err(CogError::Unsupported(
                    "sample format other than 8/16-bit unsigned".to_string(),
                ))
            }
        };
        Ok(Self { samples, stride })
    }

    fn rgba_at(&self, col: u32, row: u32, bands: u8) -> [u8; 4] {
        let bands = bands as usize;
        let start = (row as usize * self.stride as usize + col as usize) * bands;
        let Some(s) = self.samples.get(start..start + bands) else {
            return [0, 0, 0, 0];
        };
        match bands {
            1 => [s[0], s[0], s[0], 255],
            2 => [s[0], s[0], s[0], s[1]],
            3 => [s[0], s[1], s[2], 255],
            _ => [s[0], s[1], s[2], s[3]],
        }
    }
}

/// Sample `bbox` onto a `width`×`height` RGBA grid, nearest neighbour at
/// each output pixel centre.
///
/// `metadata` names the pyramid level to sample. Output pixels whose centre
/// falls off the raster stay transparent. Only the chunks that are actually
/// sampled are decompressed, each once.
pub fn decode_window(
    data: Bytes,
    metadata: &RasterMetadata,
    bbox: &BoundingBox,
    width: u32,
    height: u32,
) -> Result<DecodedWindow> {
    let mut window = DecodedWindow::transparent(width, height);
    if width == 0 || height == 0 || !bbox.intersects(&metadata.bounds()) {
        return Ok(window);
    }

    let mut decoder = Decoder::new(Cursor::new(data))?;
    if metadata.ifd_index != 0 {
        decoder.seek_to_image(metadata.ifd_index)?;
    }
    let mut chunks: HashMap<u32, DecodedChunk> = HashMap::new();

    let step_x = bbox.width() / width as f64;
    let step_y = bbox.height() / height as f64;

    for row in 0..height {
        let y = bbox.max_y - (row as f64 + 0.5) * step_y;
        for col in 0..width {
            let x = bbox.min_x + (col as f64 + 0.5) * step_x;
            let Some((src_col, src_row)) = metadata.pixel_at(x, y) else {
                continue;
            };

            let index = metadata.chunk_index(src_col, src_row);
            let chunk = match chunks.entry(index) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(DecodedChunk::read(&mut decoder, index)?),
            };

            let rgba = chunk.rgba_at(
                src_col % metadata.chunk_width,
                src_row % metadata.chunk_height,
                metadata.bands,
            );
            window.set_pixel(col, row, rgba);
        }
    }

    Ok(window)
}
