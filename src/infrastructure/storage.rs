use crate::config::GalleryConfig;
use crate::services::storage::LocalStorageService;
use std::sync::Arc;
use tracing::info;

/// Creates the media root if needed and returns the store rooted there
pub async fn setup_storage(config: &GalleryConfig) -> anyhow::Result<Arc<LocalStorageService>> {
    tokio::fs::create_dir_all(&config.media_root).await?;

    info!("🗂️  Media root: {}", config.media_root.display());

    if !config.watermark_path.exists() {
        tracing::warn!(
            "⚠️ Watermark {} not found, image uploads will fail",
            config.watermark_path.display()
        );
    }

    Ok(Arc::new(LocalStorageService::new(config.media_root.clone())))
}
