use crate::config::AppConfig;
use crate::services::admission::UploadCategory;
use crate::services::storage::{LocalStorageService, StorageService};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// Builds the filesystem store and creates every category directory.
/// Safe to run on every start; existing directories are left alone.
pub async fn setup_storage(config: &AppConfig) -> Result<Arc<LocalStorageService>> {
    info!("🗂️  Upload root: {}", config.upload_root.display());

    let storage = LocalStorageService::new(config.upload_root.clone());
    for category in UploadCategory::ALL {
        storage.ensure_directory(category.relative_dir()).await?;
        info!("✅ {} directory ready: {}", category, category.relative_dir());
    }

    Ok(Arc::new(storage))
}
