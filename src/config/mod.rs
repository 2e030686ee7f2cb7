use std::env;
use std::path::PathBuf;

/// Extensions accepted by the upload endpoint.
pub const ALLOWED_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "gif", "mp4", "avi", "mov"];

/// Extensions that go through the image pipeline. Everything else is a video.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// Gallery configuration, built once at startup and handed to every component
#[derive(Debug, Clone)]
pub struct GalleryConfig {
    /// Flat directory holding every stored file (default: "static/uploads")
    pub media_root: PathBuf,

    /// Watermark asset stamped onto every image (default: "static/images/watermark.png")
    pub watermark_path: PathBuf,

    /// Watermark transparency on a 0-255 scale, 255 = opaque (default: 128)
    pub watermark_transparency: u8,

    /// Lowercase extensions accepted for upload
    pub allowed_extensions: Vec<String>,

    /// Lowercase extensions classified as images
    pub image_extensions: Vec<String>,

    /// Maximum request body size for an upload batch in bytes (default: 512 MB)
    pub max_upload_size: usize,

    /// JWT Secret Key
    pub jwt_secret: String,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("static/uploads"),
            watermark_path: PathBuf::from("static/images/watermark.png"),
            watermark_transparency: 128,
            allowed_extensions: ALLOWED_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            image_extensions: IMAGE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            max_upload_size: 512 * 1024 * 1024, // 512 MB
            jwt_secret: "secret".to_string(),
        }
    }
}

impl GalleryConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            media_root: env::var("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(default.media_root),

            watermark_path: env::var("WATERMARK_PATH")
                .map(PathBuf::from)
                .unwrap_or(default.watermark_path),

            watermark_transparency: env::var("WATERMARK_TRANSPARENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.watermark_transparency),

            allowed_extensions: default.allowed_extensions,
            image_extensions: default.image_extensions,

            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),

            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),
        }
    }

    /// Config rooted in a scratch directory, used by tests and local runs
    pub fn development(media_root: impl Into<PathBuf>, watermark_path: impl Into<PathBuf>) -> Self {
        Self {
            media_root: media_root.into(),
            watermark_path: watermark_path.into(),
            jwt_secret: "dev_secret".to_string(),
            ..Self::default()
        }
    }

    pub fn is_allowed_extension(&self, extension: &str) -> bool {
        let ext = extension.to_lowercase();
        self.allowed_extensions.iter().any(|e| *e == ext)
    }

    pub fn is_image_extension(&self, extension: &str) -> bool {
        let ext = extension.to_lowercase();
        self.image_extensions.iter().any(|e| *e == ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GalleryConfig::default();
        assert_eq!(config.media_root, PathBuf::from("static/uploads"));
        assert_eq!(config.watermark_transparency, 128);
        assert_eq!(config.allowed_extensions.len(), 7);
        assert_eq!(config.max_upload_size, 512 * 1024 * 1024);
    }

    #[test]
    fn test_development_config() {
        let config = GalleryConfig::development("/tmp/media", "/tmp/wm.png");
        assert_eq!(config.media_root, PathBuf::from("/tmp/media"));
        assert_eq!(config.watermark_path, PathBuf::from("/tmp/wm.png"));
        assert_eq!(config.jwt_secret, "dev_secret");
    }

    #[test]
    fn test_extension_checks_ignore_case() {
        let config = GalleryConfig::default();
        assert!(config.is_allowed_extension("JPG"));
        assert!(config.is_allowed_extension("mov"));
        assert!(!config.is_allowed_extension("exe"));
        assert!(config.is_image_extension("Gif"));
        assert!(!config.is_image_extension("mp4"));
    }
}
