use image::imageops::{self, FilterType};
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::GalleryConfig;
use crate::services::storage::write_atomic;

/// Distance between the watermark and the bottom/right edges, in pixels
pub const WATERMARK_MARGIN: u32 = 10;

pub const DEFAULT_TRANSPARENCY: u8 = 128;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Failed to load watermark {path}: {source}")]
    Watermark {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where the watermark landed on the base image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkPlacement {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug)]
pub struct ProcessedImage {
    pub width: u32,
    pub height: u32,
    pub orientation: Option<u32>,
    pub watermark: Option<WatermarkPlacement>,
    pub png: Vec<u8>,
}

/// Orientation fix + watermark stamping for freshly ingested images.
///
/// Output is always an RGBA PNG, whatever the input format was.
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    watermark_path: PathBuf,
    transparency: u8,
}

impl ImageProcessor {
    pub fn new(watermark_path: impl Into<PathBuf>, transparency: u8) -> Self {
        Self {
            watermark_path: watermark_path.into(),
            transparency,
        }
    }

    pub fn from_config(config: &GalleryConfig) -> Self {
        Self::new(&config.watermark_path, config.watermark_transparency)
    }

    /// Processes the image at `path` and atomically replaces it with the result.
    pub fn process_file(&self, path: &Path) -> Result<ProcessedImage, ProcessingError> {
        let data = std::fs::read(path).map_err(|source| ProcessingError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let processed = self.process_bytes(&data)?;

        write_atomic(path, &processed.png).map_err(|source| ProcessingError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(
            path = %path.display(),
            width = processed.width,
            height = processed.height,
            orientation = ?processed.orientation,
            "Image processed in place"
        );

        Ok(processed)
    }

    pub fn process_bytes(&self, data: &[u8]) -> Result<ProcessedImage, ProcessingError> {
        // EXIF has to be read from the original bytes; decoding drops it.
        let orientation = read_exif_orientation(data);

        let decoded = image::load_from_memory(data).map_err(ProcessingError::Decode)?;
        let mut base = apply_orientation(decoded.to_rgba8(), orientation);

        let watermark = self.load_watermark()?;
        let placement = apply_watermark(&mut base, &watermark, self.transparency);

        let png = encode_png(&base)?;

        Ok(ProcessedImage {
            width: base.width(),
            height: base.height(),
            orientation,
            watermark: placement,
            png,
        })
    }

    fn load_watermark(&self) -> Result<RgbaImage, ProcessingError> {
        image::open(&self.watermark_path)
            .map(|img| img.to_rgba8())
            .map_err(|source| ProcessingError::Watermark {
                path: self.watermark_path.clone(),
                source,
            })
    }
}

/// Camera orientation hint from embedded EXIF, if any.
///
/// Missing or corrupt metadata is not an error, it just yields `None`.
pub fn read_exif_orientation(data: &[u8]) -> Option<u32> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(data))
        .ok()?;

    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
}

/// Rotates according to the orientation hint, expanding the canvas.
///
/// Angles are counter-clockwise: 3 turns 180°, 6 turns 270°, 8 turns 90°.
/// Every other value, including the mirrored variants, is left untouched.
pub fn apply_orientation(img: RgbaImage, orientation: Option<u32>) -> RgbaImage {
    match orientation {
        Some(3) => imageops::rotate180(&img),
        // 270° counter-clockwise is a quarter turn clockwise
        Some(6) => imageops::rotate90(&img),
        Some(8) => imageops::rotate270(&img),
        _ => img,
    }
}

/// Watermark size for a base image: a sixth of the width, an eighth of the height.
pub fn watermark_dimensions(width: u32, height: u32) -> (u32, u32) {
    (width / 6, height / 8)
}

/// Top-left corner of the watermark, anchored bottom-right with the margin.
/// Can go negative on tiny images; blending clips whatever falls outside.
pub fn watermark_anchor(width: u32, height: u32, wm_width: u32, wm_height: u32) -> (i64, i64) {
    (
        width as i64 - wm_width as i64 - WATERMARK_MARGIN as i64,
        height as i64 - wm_height as i64 - WATERMARK_MARGIN as i64,
    )
}

fn scale_alpha(alpha: u8, transparency: u8) -> u8 {
    ((alpha as u32 * transparency as u32 + 127) / 255) as u8
}

/// Resizes `watermark` relative to `base` and alpha-blends it into the
/// bottom-right corner. Returns `None` when the base is too small to fit a
/// non-empty watermark.
pub fn apply_watermark(
    base: &mut RgbaImage,
    watermark: &RgbaImage,
    transparency: u8,
) -> Option<WatermarkPlacement> {
    let (width, height) = base.dimensions();
    let (wm_width, wm_height) = watermark_dimensions(width, height);

    if wm_width == 0 || wm_height == 0 {
        tracing::debug!(width, height, "Image too small for a watermark, skipping");
        return None;
    }

    let mut stamp = imageops::resize(watermark, wm_width, wm_height, FilterType::Lanczos3);
    for pixel in stamp.pixels_mut() {
        pixel[3] = scale_alpha(pixel[3], transparency);
    }

    let (x, y) = watermark_anchor(width, height, wm_width, wm_height);
    blend_over(base, &stamp, x, y);

    Some(WatermarkPlacement {
        x,
        y,
        width: wm_width,
        height: wm_height,
    })
}

/// Source-over compositing of `stamp` at `(x, y)`, clipped to `base`.
///
/// An opaque base pixel stays opaque.
fn blend_over(base: &mut RgbaImage, stamp: &RgbaImage, x: i64, y: i64) {
    let (base_width, base_height) = base.dimensions();

    for (sx, sy, src) in stamp.enumerate_pixels() {
        let tx = x + sx as i64;
        let ty = y + sy as i64;
        if tx < 0 || ty < 0 || tx >= base_width as i64 || ty >= base_height as i64 {
            continue;
        }

        let dst = base.get_pixel_mut(tx as u32, ty as u32);
        let alpha = src[3] as u32;
        let inverse = 255 - alpha;
        for c in 0..3 {
            dst[c] = ((src[c] as u32 * alpha + dst[c] as u32 * inverse + 127) / 255) as u8;
        }
        dst[3] = (alpha + (dst[3] as u32 * inverse + 127) / 255) as u8;
    }
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, ProcessingError> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(img.as_raw(), img.width(), img.height(), ColorType::Rgba8)
        .map_err(ProcessingError::Encode)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn red_blue_strip() -> RgbaImage {
        // 2x1: red on the left, blue on the right
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, RED);
        img.put_pixel(1, 0, BLUE);
        img
    }

    fn write_black_watermark(dir: &Path) -> PathBuf {
        let path = dir.join("watermark.png");
        RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255]))
            .save(&path)
            .unwrap();
        path
    }

    fn white_png(width: u32, height: u32) -> Vec<u8> {
        encode_png(&RgbaImage::from_pixel(width, height, WHITE)).unwrap()
    }

    #[test]
    fn test_orientation_3_rotates_180() {
        let out = apply_orientation(red_blue_strip(), Some(3));
        assert_eq!(out.dimensions(), (2, 1));
        assert_eq!(*out.get_pixel(0, 0), BLUE);
        assert_eq!(*out.get_pixel(1, 0), RED);
    }

    #[test]
    fn test_orientation_6_rotates_270_ccw() {
        let out = apply_orientation(red_blue_strip(), Some(6));
        assert_eq!(out.dimensions(), (1, 2));
        assert_eq!(*out.get_pixel(0, 0), RED);
        assert_eq!(*out.get_pixel(0, 1), BLUE);
    }

    #[test]
    fn test_orientation_8_rotates_90_ccw() {
        let out = apply_orientation(red_blue_strip(), Some(8));
        assert_eq!(out.dimensions(), (1, 2));
        assert_eq!(*out.get_pixel(0, 0), BLUE);
        assert_eq!(*out.get_pixel(0, 1), RED);
    }

    #[test]
    fn test_other_orientations_leave_image_alone() {
        for orientation in [None, Some(1), Some(2), Some(4), Some(5), Some(7), Some(42)] {
            let out = apply_orientation(red_blue_strip(), orientation);
            assert_eq!(out, red_blue_strip(), "orientation {:?}", orientation);
        }
    }

    #[test]
    fn test_missing_exif_reads_as_none() {
        assert_eq!(read_exif_orientation(&white_png(8, 8)), None);
        assert_eq!(read_exif_orientation(b"garbage"), None);
        assert_eq!(read_exif_orientation(&[]), None);
    }

    #[test]
    fn test_watermark_geometry() {
        assert_eq!(watermark_dimensions(600, 400), (100, 50));
        assert_eq!(watermark_dimensions(605, 407), (100, 50));
        assert_eq!(watermark_anchor(600, 400, 100, 50), (490, 340));
        assert_eq!(watermark_anchor(12, 16, 2, 2), (0, 4));
        assert_eq!(watermark_anchor(6, 8, 1, 1), (-5, -3));
    }

    #[test]
    fn test_scale_alpha() {
        assert_eq!(scale_alpha(255, 255), 255);
        assert_eq!(scale_alpha(255, 128), 128);
        assert_eq!(scale_alpha(255, 0), 0);
        assert_eq!(scale_alpha(0, 200), 0);
        assert_eq!(scale_alpha(100, 128), 50);
    }

    #[test]
    fn test_apply_watermark_opaque() {
        let mut base = RgbaImage::from_pixel(120, 80, WHITE);
        let watermark = RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255]));

        let placement = apply_watermark(&mut base, &watermark, 255).unwrap();
        assert_eq!(
            placement,
            WatermarkPlacement {
                x: 90,
                y: 60,
                width: 20,
                height: 10
            }
        );

        assert_eq!(*base.get_pixel(95, 65), Rgba([0, 0, 0, 255]));
        // Margin and the rest of the canvas stay untouched
        assert_eq!(*base.get_pixel(115, 75), WHITE);
        assert_eq!(*base.get_pixel(89, 65), WHITE);
        assert_eq!(*base.get_pixel(10, 10), WHITE);
    }

    #[test]
    fn test_apply_watermark_half_transparent() {
        let mut base = RgbaImage::from_pixel(120, 80, WHITE);
        let watermark = RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255]));

        apply_watermark(&mut base, &watermark, DEFAULT_TRANSPARENCY).unwrap();

        let px = base.get_pixel(95, 65);
        assert!((120..=135).contains(&px[0]), "got {:?}", px);
        assert_eq!(px[0], px[1]);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn test_watermarked_region_stays_opaque() {
        let mut base = RgbaImage::from_pixel(120, 80, WHITE);
        let watermark = RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255]));

        for transparency in [1, 64, DEFAULT_TRANSPARENCY, 200, 254] {
            apply_watermark(&mut base, &watermark, transparency).unwrap();
        }

        assert!(base.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn test_watermark_over_translucent_base() {
        let mut base = RgbaImage::from_pixel(120, 80, Rgba([255, 255, 255, 0]));
        let watermark = RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255]));

        apply_watermark(&mut base, &watermark, DEFAULT_TRANSPARENCY).unwrap();

        // Stamp alpha (128) over a fully transparent pixel
        assert_eq!(base.get_pixel(95, 65)[3], 128);
        assert_eq!(base.get_pixel(10, 10)[3], 0);
    }

    #[test]
    fn test_watermark_is_clipped_on_small_images() {
        let mut base = RgbaImage::from_pixel(6, 8, WHITE);
        let watermark = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));

        // 1x1 stamp anchored at (-5, -3) falls entirely outside
        let placement = apply_watermark(&mut base, &watermark, 255).unwrap();
        assert_eq!((placement.x, placement.y), (-5, -3));
        assert_eq!(base, RgbaImage::from_pixel(6, 8, WHITE));
    }

    #[test]
    fn test_apply_watermark_skips_tiny_images() {
        let mut base = RgbaImage::from_pixel(5, 7, WHITE);
        let watermark = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));

        assert!(apply_watermark(&mut base, &watermark, 255).is_none());
        assert_eq!(base, RgbaImage::from_pixel(5, 7, WHITE));
    }

    #[test]
    fn test_process_bytes_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let processor = ImageProcessor::new(write_black_watermark(dir.path()), DEFAULT_TRANSPARENCY);
        let original = white_png(240, 160);

        let first = processor.process_bytes(&original).unwrap();
        let second = processor.process_bytes(&original).unwrap();

        assert_eq!(first.png, second.png);
        assert_eq!((first.width, first.height), (240, 160));
    }

    #[test]
    fn test_reprocessing_output_stamps_twice() {
        let dir = tempfile::tempdir().unwrap();
        let processor = ImageProcessor::new(write_black_watermark(dir.path()), DEFAULT_TRANSPARENCY);

        let once = processor.process_bytes(&white_png(240, 160)).unwrap();
        let twice = processor.process_bytes(&once.png).unwrap();

        // Stamping is not idempotent on its own output: the mark gets darker.
        assert_ne!(once.png, twice.png);
        let once_img = image::load_from_memory(&once.png).unwrap().to_rgba8();
        let twice_img = image::load_from_memory(&twice.png).unwrap().to_rgba8();
        assert!(twice_img.get_pixel(210, 140)[0] < once_img.get_pixel(210, 140)[0]);
    }

    #[test]
    fn test_undecodable_image_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let processor = ImageProcessor::new(write_black_watermark(dir.path()), DEFAULT_TRANSPARENCY);

        let res = processor.process_bytes(b"definitely not a picture");
        assert!(matches!(res, Err(ProcessingError::Decode(_))));
    }

    #[test]
    fn test_missing_watermark_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let processor = ImageProcessor::new(dir.path().join("nope.png"), DEFAULT_TRANSPARENCY);

        let res = processor.process_bytes(&white_png(60, 60));
        assert!(matches!(res, Err(ProcessingError::Watermark { .. })));
    }

    #[test]
    fn test_process_file_overwrites_with_png() {
        let dir = tempfile::tempdir().unwrap();
        let processor = ImageProcessor::new(write_black_watermark(dir.path()), 255);

        // Extension stays .jpg, content becomes PNG
        let target = dir.path().join("1_alice_16-10-2026_14:05.jpg");
        RgbaImage::from_pixel(60, 48, WHITE)
            .save_with_format(&target, ImageFormat::Png)
            .unwrap();

        processor.process_file(&target).unwrap();

        let bytes = std::fs::read(&target).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
        let img = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (60, 48));
        // (60 - 10 - 10, 48 - 6 - 10) is the watermark anchor
        assert_eq!(*img.get_pixel(42, 34), Rgba([0, 0, 0, 255]));
    }
}
