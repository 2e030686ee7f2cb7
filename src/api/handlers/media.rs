use crate::AppState;
use crate::api::error::AppError;
use crate::entities::users;
use crate::models::{DeletedMedia, MediaRecord};
use crate::services::ingest::{BatchReport, UploadItem};
use crate::utils::validation::{file_extension, validate_storage_name};
use axum::{
    Extension, Json,
    body::Body,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::Response,
};
use tokio_util::io::ReaderStream;

const UPLOAD_FIELDS: [&str; 2] = ["files", "file"];

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

// Stored images are always re-encoded as PNG, whatever their extension says
fn content_type_for(filename: &str) -> &'static str {
    match file_extension(filename).as_deref() {
        Some("png") | Some("jpg") | Some("jpeg") | Some("gif") => "image/png",
        Some("mp4") => "video/mp4",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        _ => "application/octet-stream",
    }
}

#[utoipa::path(
    get,
    path = "/media",
    responses(
        (status = 200, description = "Every stored media item", body = [MediaRecord])
    ),
    tag = "media"
)]
pub async fn list_media(State(state): State<AppState>) -> Result<Json<Vec<MediaRecord>>, AppError> {
    Ok(Json(state.media.list().await?))
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = String, description = "One or more files under the 'files' field", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Per-file outcome of the batch", body = BatchReport),
        (status = 400, description = "No files in the request"),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "Batch too large")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "media"
)]
pub async fn upload_media(
    State(state): State<AppState>,
    Extension(user): Extension<users::Model>,
    mut multipart: Multipart,
) -> Result<Json<BatchReport>, AppError> {
    let mut items = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let is_upload = field
            .name()
            .is_some_and(|name| UPLOAD_FIELDS.contains(&name));
        if !is_upload {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(multipart_error)?;

        // Browsers send an empty part when no file was picked
        if original_name.is_empty() && data.is_empty() {
            continue;
        }
        items.push(UploadItem::new(original_name, data));
    }

    if items.is_empty() {
        return Err(AppError::BadRequest("No files in request".to_string()));
    }

    tracing::info!("📤 {} uploading {} file(s)", user.username, items.len());

    let now = chrono::Local::now().naive_local();
    let report = state
        .ingestor
        .ingest_batch(items, &user.username, now)
        .await?;

    Ok(Json(report))
}

#[utoipa::path(
    delete,
    path = "/media/{id}",
    params(
        ("id" = i32, Path, description = "Media ID")
    ),
    responses(
        (status = 200, description = "Media deleted", body = DeletedMedia),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Media not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "media"
)]
pub async fn delete_media(
    State(state): State<AppState>,
    Extension(user): Extension<users::Model>,
    Path(id): Path<i32>,
) -> Result<Json<DeletedMedia>, AppError> {
    let deleted = state.media.delete(id).await?;
    tracing::info!(
        "🗑️ {} deleted media {} ({})",
        user.username,
        deleted.id,
        deleted.filename
    );
    Ok(Json(deleted))
}

#[utoipa::path(
    get,
    path = "/download/{filename}",
    params(
        ("filename" = String, Path, description = "Stored file name")
    ),
    responses(
        (status = 200, description = "File content"),
        (status = 400, description = "Invalid file name"),
        (status = 404, description = "File not found")
    ),
    tag = "media"
)]
pub async fn download_media(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    validate_storage_name(&filename).map_err(|e| AppError::BadRequest(e.message))?;

    let file = state.storage.open_file(&filename).await?;
    let size = file.metadata().await.ok().map(|m| m.len());
    let body = Body::from_stream(ReaderStream::new(file));

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&filename))
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        );
    if let Some(size) = size {
        builder = builder.header(header::CONTENT_LENGTH, size);
    }

    builder
        .body(body)
        .map_err(|e| AppError::Internal(e.to_string()))
}
