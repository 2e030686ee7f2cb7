pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::GalleryConfig;
use crate::services::ingest::MediaIngestor;
use crate::services::media_service::MediaService;
use crate::services::storage::StorageService;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::media::list_media,
        api::handlers::media::upload_media,
        api::handlers::media::delete_media,
        api::handlers::media::download_media,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::auth::AuthRequest,
            api::handlers::auth::AuthResponse,
            api::handlers::auth::RegisterResponse,
            api::handlers::health::HealthResponse,
            entities::media::MediaKind,
            models::MediaRecord,
            models::DeletedMedia,
            services::ingest::BatchReport,
            services::ingest::FileOutcome,
            services::ingest::SkipReason,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Authentication endpoints"),
        (name = "media", description = "Gallery upload, listing and deletion"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub storage: Arc<dyn StorageService>,
    pub ingestor: Arc<MediaIngestor>,
    pub media: Arc<MediaService>,
    pub config: GalleryConfig,
}

impl AppState {
    pub fn new(db: DatabaseConnection, storage: Arc<dyn StorageService>, config: GalleryConfig) -> Self {
        let ingestor = Arc::new(MediaIngestor::new(
            db.clone(),
            storage.clone(),
            config.clone(),
        ));
        let media = Arc::new(MediaService::new(db.clone(), storage.clone()));

        Self {
            db,
            storage,
            ingestor,
            media,
            config,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/login", post(api::handlers::auth::login))
        .route("/media", get(api::handlers::media::list_media))
        .route(
            "/download/:filename",
            get(api::handlers::media::download_media),
        )
        .route(
            "/register",
            post(api::handlers::auth::register).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::auth_middleware,
            )),
        )
        .route(
            "/upload",
            post(api::handlers::media::upload_media)
                .layer(DefaultBodyLimit::max(state.config.max_upload_size))
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::auth_middleware,
                )),
        )
        .route(
            "/media/:id",
            axum::routing::delete(api::handlers::media::delete_media).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::auth_middleware,
            )),
        )
        .route(
            "/media/:id/delete",
            post(api::handlers::media::delete_media).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::auth_middleware,
            )),
        )
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors)
        .with_state(state)
}
