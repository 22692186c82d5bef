pub mod api;
pub mod config;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::admission::{AdmissionPolicy, UploadCategory};
use crate::services::storage::StorageService;
use crate::services::upload_service::UploadService;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Headroom for multipart boundaries and part headers on top of file bytes.
const MULTIPART_OVERHEAD: u64 = 10 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::uploads::upload_property_photos,
        api::handlers::uploads::upload_floor_plan,
        api::handlers::uploads::upload_vr_panorama,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::uploads::UploadResponse,
            api::handlers::uploads::UploadedFileResponse,
            api::handlers::health::HealthResponse,
            api::error::ErrorResponse,
            services::admission::UploadCategory,
        )
    ),
    tags(
        (name = "uploads", description = "Listing media uploads"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageService>,
    pub upload_service: Arc<UploadService>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig, storage: Arc<dyn StorageService>) -> Self {
        let policy = Arc::new(AdmissionPolicy::from_config(&config));
        let upload_service = Arc::new(UploadService::new(policy, storage.clone()));

        Self {
            storage,
            upload_service,
            config,
        }
    }

    /// Largest request body a category route accepts.
    pub fn body_limit(&self, category: UploadCategory) -> usize {
        let rule = self.upload_service.policy().rule(category);
        let files = rule.max_file_count.unwrap_or(1) as u64;
        let limit = rule
            .max_file_size
            .saturating_mul(files)
            .saturating_add(MULTIPART_OVERHEAD);
        usize::try_from(limit).unwrap_or(usize::MAX)
    }
}

pub fn create_app(state: AppState) -> Router {
    let photo_limit = state.body_limit(UploadCategory::PropertyPhoto);
    let floor_plan_limit = state.body_limit(UploadCategory::FloorPlan);
    let panorama_limit = state.body_limit(UploadCategory::VrPanorama);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/api/uploads/properties/photos",
            post(api::handlers::uploads::upload_property_photos)
                .layer(DefaultBodyLimit::max(photo_limit)),
        )
        .route(
            "/api/uploads/properties/floor-plan",
            post(api::handlers::uploads::upload_floor_plan)
                .layer(DefaultBodyLimit::max(floor_plan_limit)),
        )
        .route(
            "/api/uploads/vr-panorama",
            post(api::handlers::uploads::upload_vr_panorama)
                .layer(DefaultBodyLimit::max(panorama_limit)),
        )
        .nest_service("/uploads", ServeDir::new(&state.config.upload_root))
        .fallback(api::handlers::not_found)
        .layer(from_fn(api::middleware::security::hide_staged_uploads))
        .layer(from_fn_with_state(
            state.config.runtime_mode,
            api::middleware::error_envelope,
        ))
        .layer(from_fn(api::middleware::security::security_headers))
        .layer(from_fn(api::middleware::metrics::metrics_middleware))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors_layer(&state.config))
        .with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}
