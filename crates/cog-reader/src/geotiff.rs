//! GeoTIFF metadata: raster layout, overview levels and the pixel ↔ map
//! affine transform.

use std::io::{Cursor, Read, Seek};

use bytes::Bytes;
use forecast_common::BoundingBox;
use tiff::decoder::Decoder;
use tiff::tags::Tag;
use tiff::ColorType;

use crate::{CogError, Result};

/// Affine transform from pixel (col, row) to map (x, y).
///
/// `x = origin_x + col * pixel_width + row * row_rotation`
/// `y = origin_y + col * col_rotation + row * pixel_height`
///
/// `pixel_height` is negative for north-up rasters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub row_rotation: f64,
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Build from `ModelPixelScale` and one `ModelTiepoint`.
    pub fn from_scale_and_tiepoint(scale: &[f64], tiepoint: &[f64]) -> Result<Self> {
        if scale.len() < 2 || tiepoint.len() < 6 {
            return Err(CogError::InvalidGeoreference(format!(
                "expected 3 scale and 6 tiepoint values, got {} and {}",
                scale.len(),
                tiepoint.len()
            )));
        }
        let (sx, sy) = (scale[0], scale[1]);
        if sx == 0.0 || sy == 0.0 {
            return Err(CogError::InvalidGeoreference("zero pixel scale".to_string()));
        }
        let (i, j) = (tiepoint[0], tiepoint[1]);
        let (x, y) = (tiepoint[3], tiepoint[4]);

        Ok(Self {
            origin_x: x - i * sx,
            origin_y: y + j * sy,
            pixel_width: sx,
            pixel_height: -sy,
            row_rotation: 0.0,
            col_rotation: 0.0,
        })
    }

    /// Build from a row-major 4×4 `ModelTransformation` matrix.
    pub fn from_model_transformation(matrix: &[f64]) -> Result<Self> {
        if matrix.len() < 16 {
            return Err(CogError::InvalidGeoreference(format!(
                "expected 16 transformation values, got {}",
                matrix.len()
            )));
        }
        let transform = Self {
            origin_x: matrix[3],
            origin_y: matrix[7],
            pixel_width: matrix[0],
            pixel_height: matrix[5],
            row_rotation: matrix[1],
            col_rotation: matrix[4],
        };
        if transform.determinant().abs() < f64::EPSILON {
            return Err(CogError::InvalidGeoreference(
                "degenerate transformation matrix".to_string(),
            ));
        }
        Ok(transform)
    }

    /// The same mapping for an image resampled by `sx` horizontally and
    /// `sy` vertically (an overview `sx` times narrower than the original).
    pub fn scaled(&self, sx: f64, sy: f64) -> Self {
        Self {
            origin_x: self.origin_x,
            origin_y: self.origin_y,
            pixel_width: self.pixel_width * sx,
            pixel_height: self.pixel_height * sy,
            row_rotation: self.row_rotation * sy,
            col_rotation: self.col_rotation * sx,
        }
    }

    /// Ground size of one pixel step along a raster row.
    pub fn resolution(&self) -> f64 {
        self.pixel_width.hypot(self.col_rotation)
    }

    fn determinant(&self) -> f64 {
        self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation
    }

    /// Map coordinates of a (fractional) pixel position.
    pub fn pixel_to_map(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.col_rotation + row * self.pixel_height,
        )
    }

    /// Fractional pixel position of a map coordinate.
    pub fn map_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.determinant();
        let dx = x - self.origin_x;
        let dy = y - self.origin_y;
        (
            (self.pixel_height * dx - self.row_rotation * dy) / det,
            (self.pixel_width * dy - self.col_rotation * dx) / det,
        )
    }
}

/// Layout of an opened raster.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterMetadata {
    pub width: u32,
    pub height: u32,
    /// Samples per pixel (1 gray, 2 gray+alpha, 3 RGB, 4 RGBA)
    pub bands: u8,
    pub bits_per_sample: u8,
    /// Width of a strip or tile in pixels
    pub chunk_width: u32,
    /// Height of a strip or tile in pixels
    pub chunk_height: u32,
    pub transform: GeoTransform,
    /// Image file directory this level is stored in
    pub ifd_index: usize,
}

impl RasterMetadata {
    /// Parse the first image directory of a TIFF held in memory.
    pub fn parse(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(Cursor::new(data))?;
        Self::from_decoder(&mut decoder)
    }

    /// Read the current image directory, which must carry georeferencing.
    pub fn from_decoder<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Self> {
        let layout = read_layout(decoder)?;
        let transform = read_transform(decoder)?;
        Ok(layout.into_metadata(transform, 0))
    }

    /// Map extent covered by the raster.
    pub fn bounds(&self) -> BoundingBox {
        let corners = [
            self.transform.pixel_to_map(0.0, 0.0),
            self.transform.pixel_to_map(self.width as f64, 0.0),
            self.transform.pixel_to_map(0.0, self.height as f64),
            self.transform
                .pixel_to_map(self.width as f64, self.height as f64),
        ];
        corners.iter().skip(1).fold(
            BoundingBox::new(corners[0].0, corners[0].1, corners[0].0, corners[0].1),
            |acc, &(x, y)| acc.union(&BoundingBox::new(x, y, x, y)),
        )
    }

    /// Integer pixel containing a map coordinate, if it lies on the raster.
    pub fn pixel_at(&self, x: f64, y: f64) -> Option<(u32, u32)> {
        let (col, row) = self.transform.map_to_pixel(x, y);
        if !(col >= 0.0 && row >= 0.0 && col < self.width as f64 && row < self.height as f64) {
            return None;
        }
        Some((col.floor() as u32, row.floor() as u32))
    }

    /// Number of strips or tiles per row of chunks.
    pub fn chunks_across(&self) -> u32 {
        self.width.div_ceil(self.chunk_width)
    }

    /// Index of the strip or tile holding a pixel.
    ///
    /// Strips are chunks one raster wide, so the same formula covers both.
    pub fn chunk_index(&self, col: u32, row: u32) -> u32 {
        (row / self.chunk_height) * self.chunks_across() + col / self.chunk_width
    }
}

/// Full-resolution image plus its reduced-resolution overviews.
///
/// Levels are ordered finest first; `levels()[0]` is always the
/// full-resolution image. Overviews inherit the full image's
/// georeferencing scaled by their size ratio.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterPyramid {
    levels: Vec<RasterMetadata>,
}

impl RasterPyramid {
    /// Walk every image directory of a TIFF held in memory.
    ///
    /// Transparency masks and directories whose sample layout differs from
    /// the full-resolution image are skipped.
    pub fn parse(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(Cursor::new(data))?;
        let full = RasterMetadata::from_decoder(&mut decoder)?;

        let mut levels = vec![full];
        let mut ifd_index = 0;
        while decoder.more_images() {
            decoder.next_image()?;
            ifd_index += 1;

            let subfile_type = decoder
                .find_tag_unsigned::<u32>(Tag::NewSubfileType)?
                .unwrap_or(0);
            if subfile_type & SUBFILE_MASK != 0 {
                continue;
            }
            let Ok(layout) = read_layout(&mut decoder) else {
                continue;
            };
            let full = &levels[0];
            if layout.bands != full.bands
                || layout.bits_per_sample != full.bits_per_sample
                || layout.width >= full.width
            {
                continue;
            }

            let transform = full.transform.scaled(
                full.width as f64 / layout.width as f64,
                full.height as f64 / layout.height as f64,
            );
            levels.push(layout.into_metadata(transform, ifd_index));
        }

        levels[1..].sort_by(|a, b| b.width.cmp(&a.width));
        Ok(Self { levels })
    }

    /// The full-resolution image.
    pub fn full(&self) -> &RasterMetadata {
        &self.levels[0]
    }

    pub fn levels(&self) -> &[RasterMetadata] {
        &self.levels
    }

    /// Coarsest level still at least as fine as `bbox` spread over
    /// `width` output pixels.
    pub fn level_for(&self, bbox: &BoundingBox, width: u32) -> &RasterMetadata {
        if width == 0 {
            return self.full();
        }
        let wanted = bbox.width() / width as f64;
        self.levels
            .iter()
            .rev()
            .find(|level| level.transform.resolution() <= wanted * (1.0 + 1e-9))
            .unwrap_or_else(|| self.full())
    }
}

/// `NewSubfileType` bit marking a transparency mask
const SUBFILE_MASK: u32 = 4;

/// Sample layout of one image directory, before georeferencing.
struct Layout {
    width: u32,
    height: u32,
    bands: u8,
    bits_per_sample: u8,
    chunk_width: u32,
    chunk_height: u32,
}

impl Layout {
    fn into_metadata(self, transform: GeoTransform, ifd_index: usize) -> RasterMetadata {
        RasterMetadata {
            width: self.width,
            height: self.height,
            bands: self.bands,
            bits_per_sample: self.bits_per_sample,
            chunk_width: self.chunk_width,
            chunk_height: self.chunk_height,
            transform,
            ifd_index,
        }
    }
}

fn read_layout<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Layout> {
    let (width, height) = decoder.dimensions()?;

    let (bands, bits_per_sample) = match decoder.colortype()? {
        ColorType::Gray(bits) => (1, bits),
        ColorType::GrayA(bits) => (2, bits),
        ColorType::RGB(bits) => (3, bits),
        ColorType::RGBA(bits) => (4, bits),
        other => {
            return Err(CogError::Unsupported(format!("color type {other:?}")));
        }
    };
    if bits_per_sample != 8 && bits_per_sample != 16 {
        return Err(CogError::Unsupported(format!(
            "{bits_per_sample}-bit samples"
        )));
    }

    // 2 = band-separate planes
    if let Some(planar) = decoder.find_tag(Tag::PlanarConfiguration)? {
        if planar.into_u16()? == 2 {
            return Err(CogError::Unsupported(
                "planar (band-separate) layout".to_string(),
            ));
        }
    }

    let (chunk_width, chunk_height) = decoder.chunk_dimensions();
    Ok(Layout {
        width,
        height,
        bands,
        bits_per_sample,
        chunk_width: chunk_width.max(1),
        chunk_height: chunk_height.max(1),
    })
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    if let Some(matrix) = optional_f64_vec(decoder, Tag::ModelTransformationTag)? {
        return GeoTransform::from_model_transformation(&matrix);
    }

    let scale = optional_f64_vec(decoder, Tag::ModelPixelScaleTag)?;
    let tiepoint = optional_f64_vec(decoder, Tag::ModelTiepointTag)?;
    match (scale, tiepoint) {
        (Some(scale), Some(tiepoint)) => GeoTransform::from_scale_and_tiepoint(&scale, &tiepoint),
        _ => Err(CogError::InvalidGeoreference(
            "missing ModelPixelScale/ModelTiepoint tags".to_string(),
        )),
    }
}

fn optional_f64_vec<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    tag: Tag,
) -> Result<Option<Vec<f64>>> {
    match decoder.find_tag(tag)? {
        Some(value) => Ok(Some(value.into_f64_vec()?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, HALF_WORLD_M};

    #[test]
    fn test_scale_and_tiepoint() {
        let transform =
            GeoTransform::from_scale_and_tiepoint(&[10.0, 20.0, 0.0], &[0.0, 0.0, 0.0, 100.0, 500.0, 0.0])
                .unwrap();
        assert_eq!(transform.pixel_to_map(0.0, 0.0), (100.0, 500.0));
        assert_eq!(transform.pixel_to_map(2.0, 3.0), (120.0, 440.0));

        let (col, row) = transform.map_to_pixel(125.0, 430.0);
        assert_approx_eq!(col, 2.5, 1e-12);
        assert_approx_eq!(row, 3.5, 1e-12);
    }

    #[test]
    fn test_tiepoint_not_at_origin() {
        // Pixel (10, 5) is pinned to (0, 0)
        let transform =
            GeoTransform::from_scale_and_tiepoint(&[2.0, 2.0, 0.0], &[10.0, 5.0, 0.0, 0.0, 0.0, 0.0])
                .unwrap();
        assert_eq!(transform.pixel_to_map(10.0, 5.0), (0.0, 0.0));
        assert_eq!(transform.pixel_to_map(0.0, 0.0), (-20.0, 10.0));
    }

    #[test]
    fn test_rejects_zero_scale() {
        assert!(GeoTransform::from_scale_and_tiepoint(&[0.0, 1.0, 0.0], &[0.0; 6]).is_err());
    }

    #[test]
    fn test_model_transformation() {
        let matrix = [
            4.0, 0.0, 0.0, -50.0, //
            0.0, -4.0, 0.0, 80.0, //
            0.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        let transform = GeoTransform::from_model_transformation(&matrix).unwrap();
        assert_eq!(transform.pixel_to_map(1.0, 1.0), (-46.0, 76.0));
        assert!(GeoTransform::from_model_transformation(&[0.0; 16]).is_err());
    }

    #[test]
    fn test_parse_world_fixture() {
        let bytes = test_utils::world_quadrant_geotiff(
            64,
            test_utils::Quadrant::NorthWest,
            [255, 0, 0, 255],
        );
        let metadata = RasterMetadata::parse(Bytes::from(bytes)).unwrap();

        assert_eq!((metadata.width, metadata.height), (64, 64));
        assert_eq!(metadata.bands, 4);
        assert_eq!(metadata.bits_per_sample, 8);

        let bounds = metadata.bounds();
        assert_approx_eq!(bounds.min_x, -HALF_WORLD_M, 1e-6);
        assert_approx_eq!(bounds.max_x, HALF_WORLD_M, 1e-6);
        assert_approx_eq!(bounds.min_y, -HALF_WORLD_M, 1e-6);
        assert_approx_eq!(bounds.max_y, HALF_WORLD_M, 1e-6);

        assert_eq!(metadata.pixel_at(-HALF_WORLD_M + 1.0, HALF_WORLD_M - 1.0), Some((0, 0)));
        assert_eq!(metadata.pixel_at(HALF_WORLD_M + 1.0, 0.0), None);
    }

    #[test]
    fn test_missing_georeference() {
        let bytes = test_utils::encode_plain_tiff(4, 4, &[0u8; 64]);
        let err = RasterMetadata::parse(Bytes::from(bytes)).unwrap_err();
        assert!(matches!(err, CogError::InvalidGeoreference(_)));
    }

    #[test]
    fn test_pyramid_orders_overviews_finest_first() {
        use test_utils::{solid_pixels, RasterPlacement, TiledGeoTiff};

        let bytes = TiledGeoTiff::new(RasterPlacement::world(64), 16, solid_pixels(64, 64, [9; 4]))
            .with_overview(16, 16, solid_pixels(16, 16, [9; 4]))
            .with_overview(32, 32, solid_pixels(32, 32, [9; 4]))
            .encode();
        let pyramid = RasterPyramid::parse(Bytes::from(bytes)).unwrap();

        let widths: Vec<u32> = pyramid.levels().iter().map(|l| l.width).collect();
        assert_eq!(widths, vec![64, 32, 16]);
        let ifds: Vec<usize> = pyramid.levels().iter().map(|l| l.ifd_index).collect();
        assert_eq!(ifds, vec![0, 2, 1]);

        let full = pyramid.full();
        assert_eq!((full.chunk_width, full.chunk_height), (16, 16));
        let coarsest = &pyramid.levels()[2];
        assert_approx_eq!(
            coarsest.transform.resolution(),
            full.transform.resolution() * 4.0,
            1e-6
        );
        assert_eq!(coarsest.bounds(), full.bounds());
    }

    #[test]
    fn test_level_for_picks_coarsest_sufficient() {
        use test_utils::{solid_pixels, RasterPlacement, TiledGeoTiff};

        let bytes = TiledGeoTiff::new(RasterPlacement::world(64), 16, solid_pixels(64, 64, [9; 4]))
            .with_overview(32, 32, solid_pixels(32, 32, [9; 4]))
            .with_overview(16, 16, solid_pixels(16, 16, [9; 4]))
            .encode();
        let pyramid = RasterPyramid::parse(Bytes::from(bytes)).unwrap();
        let world = BoundingBox::new(-HALF_WORLD_M, -HALF_WORLD_M, HALF_WORLD_M, HALF_WORLD_M);
        let west = BoundingBox::new(-HALF_WORLD_M, -HALF_WORLD_M, 0.0, HALF_WORLD_M);

        assert_eq!(pyramid.level_for(&world, 8).width, 16);
        assert_eq!(pyramid.level_for(&world, 16).width, 16);
        assert_eq!(pyramid.level_for(&world, 20).width, 32);
        assert_eq!(pyramid.level_for(&world, 32).width, 32);
        assert_eq!(pyramid.level_for(&west, 32).width, 64);
        assert_eq!(pyramid.level_for(&world, 256).width, 64);
        assert_eq!(pyramid.level_for(&world, 0).width, 64);
    }

    #[test]
    fn test_strip_tiff_is_single_level() {
        let bytes = test_utils::world_quadrant_geotiff(
            32,
            test_utils::Quadrant::NorthWest,
            [1, 2, 3, 255],
        );
        let pyramid = RasterPyramid::parse(Bytes::from(bytes)).unwrap();
        assert_eq!(pyramid.levels().len(), 1);
        assert_eq!(pyramid.full().ifd_index, 0);
    }

    #[test]
    fn test_chunk_index_for_strips() {
        let metadata = RasterMetadata {
            width: 100,
            height: 100,
            bands: 4,
            bits_per_sample: 8,
            chunk_width: 100,
            chunk_height: 8,
            transform: GeoTransform::from_scale_and_tiepoint(&[1.0, 1.0, 0.0], &[0.0; 6]).unwrap(),
            ifd_index: 0,
        };
        assert_eq!(metadata.chunks_across(), 1);
        assert_eq!(metadata.chunk_index(99, 7), 0);
        assert_eq!(metadata.chunk_index(0, 8), 1);
        assert_eq!(metadata.chunk_index(50, 99), 12);
    }

    #[test]
    fn test_chunk_index_for_tiles() {
        let metadata = RasterMetadata {
            width: 600,
            height: 300,
            bands: 4,
            bits_per_sample: 8,
            chunk_width: 256,
            chunk_height: 256,
            transform: GeoTransform::from_scale_and_tiepoint(&[1.0, 1.0, 0.0], &[0.0; 6]).unwrap(),
            ifd_index: 0,
        };
        assert_eq!(metadata.chunks_across(), 3);
        assert_eq!(metadata.chunk_index(0, 0), 0);
        assert_eq!(metadata.chunk_index(599, 0), 2);
        assert_eq!(metadata.chunk_index(300, 299), 4);
    }
}
