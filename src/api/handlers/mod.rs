pub mod health;
pub mod uploads;

use crate::api::error::AppError;

/// Fallback so unknown routes still answer with the error envelope.
pub async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}
