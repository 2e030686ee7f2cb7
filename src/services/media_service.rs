use sea_orm::{DatabaseConnection, EntityTrait, ModelTrait, QueryOrder, TransactionTrait};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::error::AppError;
use crate::entities::{media, prelude::*};
use crate::models::{DeletedMedia, MediaRecord};
use crate::services::storage::StorageService;

/// Read and delete side of the gallery
pub struct MediaService {
    db: DatabaseConnection,
    storage: Arc<dyn StorageService>,
}

impl MediaService {
    pub fn new(db: DatabaseConnection, storage: Arc<dyn StorageService>) -> Self {
        Self { db, storage }
    }

    pub async fn list(&self) -> Result<Vec<MediaRecord>, AppError> {
        let records = Media::find()
            .order_by_asc(media::Column::Id)
            .all(&self.db)
            .await?;
        Ok(records.into_iter().map(MediaRecord::from).collect())
    }

    pub async fn get(&self, id: i32) -> Result<MediaRecord, AppError> {
        Media::find_by_id(id)
            .one(&self.db)
            .await?
            .map(MediaRecord::from)
            .ok_or_else(|| AppError::NotFound(format!("Media {} not found", id)))
    }

    /// Files in the media root that no record points at.
    ///
    /// These are left behind by failed batch commits and by row deletions whose
    /// file removal failed.
    pub async fn orphaned_files(&self) -> Result<Vec<String>, AppError> {
        let known: HashSet<String> = Media::find()
            .all(&self.db)
            .await?
            .into_iter()
            .map(|m| m.filename)
            .collect();

        Ok(self
            .storage
            .list_files()
            .await?
            .into_iter()
            .filter(|name| !known.contains(name))
            .collect())
    }

    /// Removes the row, then the file.
    ///
    /// The file is only touched once the row deletion has committed, so a
    /// failure can leave an orphaned file but never a row without a file.
    pub async fn delete(&self, id: i32) -> Result<DeletedMedia, AppError> {
        let txn = self.db.begin().await?;

        let record = Media::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Media {} not found", id)))?;
        let filename = record.filename.clone();

        record.delete(&txn).await?;
        txn.commit().await?;

        let file_removed = match self.storage.delete_file(&filename).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Media {} deleted but its file {} could not be removed: {}",
                    id, filename, e
                );
                false
            }
        };

        info!("🗑️  Deleted media {} ({})", id, filename);
        Ok(DeletedMedia {
            id,
            filename,
            file_removed,
        })
    }
}
