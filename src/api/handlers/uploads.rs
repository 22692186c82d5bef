use crate::AppState;
use crate::api::error::AppError;
use crate::services::admission::UploadCategory;
use crate::services::upload_service::{StreamFailure, UploadedFile};
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
};
use futures::TryStreamExt;
use serde::Serialize;
use utoipa::ToSchema;

/// Files without a declared type can never pass the image check.
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Serialize, ToSchema)]
pub struct UploadedFileResponse {
    pub stored_name: String,
    /// Public path under which the file is served
    pub path: String,
    pub original_name: String,
    pub content_type: String,
    pub size: u64,
    pub category: UploadCategory,
}

impl From<UploadedFile> for UploadedFileResponse {
    fn from(file: UploadedFile) -> Self {
        Self {
            path: format!("/uploads/{}", file.record.storage_key()),
            stored_name: file.record.stored_name,
            original_name: file.original_name,
            content_type: file.content_type,
            size: file.size,
            category: file.record.category,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    pub files: Vec<UploadedFileResponse>,
}

#[utoipa::path(
    post,
    path = "/api/uploads/properties/photos",
    request_body(content = Multipart, description = "Up to 50 images in the `photos` field"),
    responses(
        (status = 200, description = "All photos stored", body = UploadResponse),
        (status = 400, description = "Invalid file type, too many files or unexpected field", body = crate::api::error::ErrorResponse),
        (status = 413, description = "A photo exceeds the size limit", body = crate::api::error::ErrorResponse)
    ),
    tag = "uploads"
)]
pub async fn upload_property_photos(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    receive_upload(&state, UploadCategory::PropertyPhoto, multipart).await
}

#[utoipa::path(
    post,
    path = "/api/uploads/properties/floor-plan",
    request_body(content = Multipart, description = "One image in the `floorPlan` field"),
    responses(
        (status = 200, description = "Floor plan stored", body = UploadResponse),
        (status = 400, description = "Invalid file type or unexpected field", body = crate::api::error::ErrorResponse),
        (status = 413, description = "File exceeds the size limit", body = crate::api::error::ErrorResponse)
    ),
    tag = "uploads"
)]
pub async fn upload_floor_plan(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    receive_upload(&state, UploadCategory::FloorPlan, multipart).await
}

#[utoipa::path(
    post,
    path = "/api/uploads/vr-panorama",
    request_body(content = Multipart, description = "One image in the `panorama` field"),
    responses(
        (status = 200, description = "Panorama stored", body = UploadResponse),
        (status = 400, description = "Invalid file type or unexpected field", body = crate::api::error::ErrorResponse),
        (status = 413, description = "File exceeds the size limit", body = crate::api::error::ErrorResponse)
    ),
    tag = "uploads"
)]
pub async fn upload_vr_panorama(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    receive_upload(&state, UploadCategory::VrPanorama, multipart).await
}

/// Runs every file of the request through admission. The request succeeds
/// as a whole or not at all: on the first failure, files already stored for
/// it are removed.
async fn receive_upload(
    state: &AppState,
    category: UploadCategory,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let service = &state.upload_service;
    let mut stored: Vec<UploadedFile> = Vec::new();

    let result: Result<(), AppError> = async {
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();

            // Plain form fields (listing id, captions) are not ours to interpret
            let Some(file_name) = field.file_name().map(str::to_string) else {
                continue;
            };

            if name != category.field_name() || (!category.accepts_multiple() && !stored.is_empty())
            {
                return Err(AppError::BadRequest(format!("Unexpected field '{}'", name)));
            }

            service.policy().check_count(category, stored.len() + 1)?;

            let content_type = field
                .content_type()
                .unwrap_or(FALLBACK_CONTENT_TYPE)
                .to_string();
            let body = field.map_err(stream_failure);

            let file = service
                .store_file(category, &file_name, &content_type, body)
                .await?;
            stored.push(file);
        }

        if stored.is_empty() {
            return Err(AppError::BadRequest(format!(
                "No file provided in field '{}'",
                category.field_name()
            )));
        }
        Ok(())
    }
    .await;

    match result {
        Ok(()) => Ok(Json(UploadResponse {
            success: true,
            files: stored.into_iter().map(UploadedFileResponse::from).collect(),
        })),
        Err(e) => {
            tracing::warn!("Upload failed: {}. Consuming remaining stream...", e);
            service.rollback(&stored).await;

            // Drain so the client sees our response instead of a connection reset
            while let Ok(Some(mut field)) = multipart.next_field().await {
                while let Ok(Some(_)) = field.chunk().await {}
            }
            Err(e)
        }
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

fn stream_failure(e: MultipartError) -> StreamFailure {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        StreamFailure::BodyTooLarge
    } else {
        StreamFailure::Client(e.body_text())
    }
}
