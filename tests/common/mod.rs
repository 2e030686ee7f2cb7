#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use image::{
    ColorType, ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage, codecs::jpeg::JpegEncoder,
    codecs::png::PngEncoder,
};
use media_gallery::AppState;
use media_gallery::config::GalleryConfig;
use media_gallery::infrastructure::database;
use media_gallery::services::storage::LocalStorageService;
use sea_orm::{Database, DatabaseConnection};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestGallery {
    pub dir: TempDir,
    pub config: GalleryConfig,
    pub db: DatabaseConnection,
    pub storage: Arc<LocalStorageService>,
    pub state: AppState,
}

impl TestGallery {
    pub fn media_root(&self) -> PathBuf {
        self.config.media_root.clone()
    }

    pub fn stored_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.media_root())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();
    db
}

/// Fresh gallery in a scratch directory with an opaque black 40x40 watermark
pub async fn setup_gallery() -> TestGallery {
    let dir = tempfile::tempdir().unwrap();
    let media_root = dir.path().join("uploads");
    std::fs::create_dir_all(&media_root).unwrap();

    let watermark_path = dir.path().join("watermark.png");
    RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255]))
        .save(&watermark_path)
        .unwrap();

    let config = GalleryConfig::development(&media_root, &watermark_path);
    let db = setup_test_db().await;
    let storage = Arc::new(LocalStorageService::new(&media_root));
    let state = AppState::new(db.clone(), storage.clone(), config.clone());

    TestGallery {
        dir,
        config,
        db,
        storage,
        state,
    }
}

pub fn upload_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 16)
        .unwrap()
        .and_hms_opt(14, 5, 30)
        .unwrap()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, ColorType::Rgba8)
        .unwrap();
    out
}

/// Red left half, blue right half
pub fn two_tone_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgb([255, 0, 0])
        } else {
            Rgb([0, 0, 255])
        }
    });
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 95)
        .encode(img.as_raw(), width, height, ColorType::Rgb8)
        .unwrap();
    out
}

pub fn is_red(px: &Rgba<u8>) -> bool {
    px[0] > 180 && px[2] < 80
}

pub fn is_blue(px: &Rgba<u8>) -> bool {
    px[2] > 180 && px[0] < 80
}

/// Stored files keep their upload extension but always hold PNG bytes, so
/// they are decoded from content rather than by path.
pub fn read_stored_image(path: &std::path::Path) -> RgbaImage {
    let bytes = std::fs::read(path).unwrap();
    assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Png);
    image::load_from_memory(&bytes).unwrap().to_rgba8()
}

/// Two-tone JPEG carrying an APP1 Exif segment with a single Orientation tag
pub fn jpeg_with_orientation(width: u32, height: u32, orientation: u16) -> Vec<u8> {
    let jpeg = two_tone_jpeg(width, height);
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM\x00\x2A");
    tiff.extend_from_slice(&8u32.to_be_bytes());
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&0x0112u16.to_be_bytes());
    tiff.extend_from_slice(&3u16.to_be_bytes());
    tiff.extend_from_slice(&1u32.to_be_bytes());
    tiff.extend_from_slice(&orientation.to_be_bytes());
    tiff.extend_from_slice(&[0, 0]);
    tiff.extend_from_slice(&0u32.to_be_bytes());

    let mut payload = b"Exif\x00\x00".to_vec();
    payload.extend_from_slice(&tiff);

    let mut out = vec![0xFF, 0xD8, 0xFF, 0xE1];
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&jpeg[2..]);
    out
}
