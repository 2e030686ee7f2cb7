use bytes::Bytes;
use chrono::{NaiveDateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, Set, TransactionTrait};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::api::error::AppError;
use crate::config::GalleryConfig;
use crate::entities::media::{self, MediaKind};
use crate::models::MediaRecord;
use crate::services::image_processor::ImageProcessor;
use crate::services::storage::StorageService;
use crate::utils::validation::{file_extension, sanitize_filename, validate_storage_name};

/// Timestamp layout embedded in stored names
pub const NAME_TIMESTAMP_FORMAT: &str = "%d-%m-%Y_%H:%M";

/// One member of an upload batch, in submission order
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub original_name: String,
    pub data: Bytes,
}

impl UploadItem {
    pub fn new(original_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            original_name: original_name.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Missing extension, or one outside the allowed set
    DisallowedExtension,
    /// Sanitizing the name stripped its extension
    UnsafeName,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Stored {
        position: usize,
        original_name: String,
        record: MediaRecord,
    },
    Skipped {
        position: usize,
        original_name: String,
        reason: SkipReason,
    },
    Failed {
        position: usize,
        original_name: String,
        error: String,
    },
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchReport {
    pub stored: usize,
    pub skipped: usize,
    pub failed: usize,
    pub files: Vec<FileOutcome>,
}

impl BatchReport {
    fn from_outcomes(files: Vec<FileOutcome>) -> Self {
        let mut report = Self {
            stored: 0,
            skipped: 0,
            failed: 0,
            files: Vec::new(),
        };
        for outcome in &files {
            match outcome {
                FileOutcome::Stored { .. } => report.stored += 1,
                FileOutcome::Skipped { .. } => report.skipped += 1,
                FileOutcome::Failed { .. } => report.failed += 1,
            }
        }
        report.files = files;
        report
    }

    pub fn records(&self) -> impl Iterator<Item = &MediaRecord> {
        self.files.iter().filter_map(|outcome| match outcome {
            FileOutcome::Stored { record, .. } => Some(record),
            _ => None,
        })
    }
}

/// A file that is on disk and waits for the batch commit
#[derive(Debug)]
struct PendingRecord {
    position: usize,
    original_name: String,
    filename: String,
    kind: MediaKind,
}

/// `{position}_{actor}_{DD-MM-YYYY_HH:MM}.{extension}`
///
/// Same actor, same minute and same position produce the same name, and the
/// later upload overwrites the earlier file.
pub fn stored_name(
    position: usize,
    actor: &str,
    timestamp: NaiveDateTime,
    extension: &str,
) -> String {
    format!(
        "{}_{}_{}.{}",
        position,
        actor,
        timestamp.format(NAME_TIMESTAMP_FORMAT),
        extension
    )
}

pub struct MediaIngestor {
    db: DatabaseConnection,
    storage: Arc<dyn StorageService>,
    processor: ImageProcessor,
    config: GalleryConfig,
}

impl MediaIngestor {
    pub fn new(
        db: DatabaseConnection,
        storage: Arc<dyn StorageService>,
        config: GalleryConfig,
    ) -> Self {
        Self {
            db,
            storage,
            processor: ImageProcessor::from_config(&config),
            config,
        }
    }

    pub fn classify(&self, extension: &str) -> MediaKind {
        if self.config.is_image_extension(extension) {
            MediaKind::Image
        } else {
            MediaKind::Video
        }
    }

    /// Ingests every item in order and commits their records in one
    /// transaction.
    ///
    /// Per-file problems end up in the report. Only a database failure fails
    /// the whole batch, and files already written stay on disk in that case.
    pub async fn ingest_batch(
        &self,
        items: Vec<UploadItem>,
        actor: &str,
        now: NaiveDateTime,
    ) -> Result<BatchReport, AppError> {
        validate_storage_name(actor).map_err(|e| AppError::BadRequest(e.to_string()))?;

        let mut staged = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            staged.push(self.ingest_one(index + 1, item, actor, now).await);
        }

        let pending: Vec<&PendingRecord> = staged.iter().filter_map(|s| s.as_ref().ok()).collect();

        let models = match self.commit(&pending, actor).await {
            Ok(models) => models,
            Err(e) => {
                for p in &pending {
                    warn!(
                        "Orphaned upload {} left in media root after failed commit",
                        p.filename
                    );
                }
                return Err(AppError::Database(e));
            }
        };

        let mut models = models.into_iter();
        let mut outcomes = Vec::with_capacity(staged.len());
        for entry in staged {
            let outcome = match entry {
                Ok(pending) => {
                    let model = models.next().ok_or_else(|| {
                        AppError::Internal("Committed record count mismatch".to_string())
                    })?;
                    FileOutcome::Stored {
                        position: pending.position,
                        original_name: pending.original_name,
                        record: model.into(),
                    }
                }
                Err(outcome) => outcome,
            };
            outcomes.push(outcome);
        }

        let report = BatchReport::from_outcomes(outcomes);
        info!(
            "📦 Batch from {}: {} stored, {} skipped, {} failed",
            actor, report.stored, report.skipped, report.failed
        );
        Ok(report)
    }

    async fn ingest_one(
        &self,
        position: usize,
        item: UploadItem,
        actor: &str,
        now: NaiveDateTime,
    ) -> Result<PendingRecord, FileOutcome> {
        let UploadItem {
            original_name,
            data,
        } = item;

        let allowed = file_extension(&original_name)
            .is_some_and(|ext| self.config.is_allowed_extension(&ext));
        if !allowed {
            warn!("Skipping '{}': extension not allowed", original_name);
            return Err(FileOutcome::Skipped {
                position,
                original_name,
                reason: SkipReason::DisallowedExtension,
            });
        }

        let safe_name = sanitize_filename(&original_name);
        let Some(extension) =
            file_extension(&safe_name).filter(|ext| self.config.is_allowed_extension(ext))
        else {
            warn!("Skipping '{}': nothing usable left after sanitizing", original_name);
            return Err(FileOutcome::Skipped {
                position,
                original_name,
                reason: SkipReason::UnsafeName,
            });
        };

        let filename = stored_name(position, actor, now, &extension);
        let kind = self.classify(&extension);

        let path = match self.storage.write_file(&filename, data).await {
            Ok(path) => path,
            Err(e) => {
                warn!("Failed to store '{}' as {}: {}", original_name, filename, e);
                return Err(FileOutcome::Failed {
                    position,
                    original_name,
                    error: e.to_string(),
                });
            }
        };

        if kind == MediaKind::Image {
            let processor = self.processor.clone();
            let result = tokio::task::spawn_blocking(move || processor.process_file(&path)).await;

            let error = match result {
                Ok(Ok(_)) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(e) => Some(format!("Image processing task failed: {}", e)),
            };

            if let Some(error) = error {
                warn!("Failed to process image {}: {}", filename, error);
                if let Err(e) = self.storage.delete_file(&filename).await {
                    warn!("Could not remove unprocessed upload {}: {}", filename, e);
                }
                return Err(FileOutcome::Failed {
                    position,
                    original_name,
                    error,
                });
            }
        }

        info!("💾 Stored '{}' as {} ({:?})", original_name, filename, kind);
        Ok(PendingRecord {
            position,
            original_name,
            filename,
            kind,
        })
    }

    async fn commit(
        &self,
        pending: &[&PendingRecord],
        actor: &str,
    ) -> Result<Vec<media::Model>, DbErr> {
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let txn = self.db.begin().await?;
        let mut models = Vec::with_capacity(pending.len());
        for p in pending {
            let model = media::ActiveModel {
                filename: Set(p.filename.clone()),
                kind: Set(p.kind),
                uploaded_by: Set(actor.to_string()),
                created_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            models.push(model);
        }
        txn.commit().await?;
        Ok(models)
    }
}
