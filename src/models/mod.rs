use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::media::{self, MediaKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MediaRecord {
    pub id: i32,
    pub filename: String,
    pub kind: MediaKind,
    pub uploaded_by: String,
    pub created_at: DateTime<Utc>,
    pub download_url: String,
}

impl From<media::Model> for MediaRecord {
    fn from(model: media::Model) -> Self {
        Self {
            download_url: format!("/download/{}", model.filename),
            id: model.id,
            filename: model.filename,
            kind: model.kind,
            uploaded_by: model.uploaded_by,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeletedMedia {
    pub id: i32,
    pub filename: String,
    /// false when the row is gone but the file could not be removed
    pub file_removed: bool,
}
