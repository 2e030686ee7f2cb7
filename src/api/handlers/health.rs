use crate::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" when both the database and the media root are usable, "degraded" otherwise
    pub status: String,
    pub database: String,
    pub media_root: String,
    pub watermark: String,
    pub version: String,
}

/// Single stat of the media root; the directory is never listed here.
async fn media_root_status(state: &AppState) -> &'static str {
    match tokio::fs::metadata(&state.config.media_root).await {
        Ok(meta) if meta.is_dir() => "available",
        Ok(_) => "not a directory",
        Err(_) => "missing",
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Database and media root are usable", body = HealthResponse),
        (status = 503, description = "Database or media root unavailable", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let db_ok = state.db.ping().await.is_ok();
    let media_root = media_root_status(&state).await;
    let watermark = match tokio::fs::try_exists(&state.config.watermark_path).await {
        Ok(true) => "present",
        _ => "missing",
    };

    let healthy = db_ok && media_root == "available";
    if !healthy {
        tracing::warn!(
            "🩺 Health degraded: database={}, media_root={}",
            db_ok,
            media_root
        );
    }

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "ok" } else { "degraded" }.to_string(),
            database: if db_ok { "connected" } else { "disconnected" }.to_string(),
            media_root: media_root.to_string(),
            watermark: watermark.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
