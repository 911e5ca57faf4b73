//! RGBA pixel generators for synthetic rasters.
//!
//! All generators return row-major, interleaved RGBA8 buffers.

/// One quarter of a square raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    NorthWest,
    NorthEast,
    SouthWest,
    SouthEast,
}

impl Quadrant {
    /// Whether pixel (`col`, `row`) of a `size`×`size` raster lies in this quadrant.
    pub fn contains(&self, col: u32, row: u32, size: u32) -> bool {
        let half = size / 2;
        let west = col < half;
        let north = row < half;
        match self {
            Quadrant::NorthWest => west && north,
            Quadrant::NorthEast => !west && north,
            Quadrant::SouthWest => west && !north,
            Quadrant::SouthEast => !west && !north,
        }
    }
}

/// Square raster that is `color` inside `quadrant` and fully transparent elsewhere.
pub fn quadrant_pixels(size: u32, quadrant: Quadrant, color: [u8; 4]) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for row in 0..size {
        for col in 0..size {
            if quadrant.contains(col, row, size) {
                pixels.extend_from_slice(&color);
            } else {
                pixels.extend_from_slice(&[0, 0, 0, 0]);
            }
        }
    }
    pixels
}

/// Uniform raster of a single color.
pub fn solid_pixels(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    color
        .iter()
        .copied()
        .cycle()
        .take((width * height * 4) as usize)
        .collect()
}

/// Precipitation-like banding: a handful of blue shades by row, semi-opaque.
///
/// Uses few distinct colors so encoders take the palette path.
pub fn precipitation_bands(width: u32, height: u32) -> Vec<u8> {
    const SHADES: [[u8; 4]; 5] = [
        [0, 0, 0, 0],
        [160, 210, 255, 180],
        [33, 140, 255, 200],
        [0, 65, 255, 220],
        [250, 245, 0, 240],
    ];
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for row in 0..height {
        let shade = SHADES[(row as usize * SHADES.len()) / height.max(1) as usize];
        for _ in 0..width {
            pixels.extend_from_slice(&shade);
        }
    }
    pixels
}

/// Smooth gradient with (almost) every pixel distinct; forces RGBA encoding.
pub fn gradient_pixels(width: u32, height: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for row in 0..height {
        for col in 0..width {
            pixels.extend_from_slice(&[
                (col % 256) as u8,
                (row % 256) as u8,
                ((col + row) % 256) as u8,
                255,
            ]);
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadrant_pixels() {
        let pixels = quadrant_pixels(4, Quadrant::NorthWest, [1, 2, 3, 4]);
        assert_eq!(pixels.len(), 64);
        assert_eq!(&pixels[0..4], &[1, 2, 3, 4]);
        // (col 2, row 0) is north-east
        assert_eq!(&pixels[8..12], &[0, 0, 0, 0]);
        // (col 0, row 2) is south-west
        assert_eq!(&pixels[32..36], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_solid_pixels() {
        let pixels = solid_pixels(3, 2, [9, 8, 7, 6]);
        assert_eq!(pixels.len(), 24);
        assert!(pixels.chunks_exact(4).all(|p| p == [9, 8, 7, 6]));
    }

    #[test]
    fn test_precipitation_bands_has_few_colors() {
        let pixels = precipitation_bands(16, 20);
        let mut colors: Vec<&[u8]> = pixels.chunks_exact(4).collect();
        colors.sort();
        colors.dedup();
        assert_eq!(colors.len(), 5);
    }
}
