use crate::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub storage: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Upload root is writable", body = HealthResponse),
        (status = 503, description = "Upload root is missing or read-only", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let writable = state.storage.is_writable().await;

    let (code, status, storage) = if writable {
        (StatusCode::OK, "ok", "writable")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded", "unavailable")
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            storage: storage.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
