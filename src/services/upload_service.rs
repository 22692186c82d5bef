use crate::services::admission::{
    AdmissionError, AdmissionPolicy, FileDescriptor, StoredFileRecord, UploadCategory,
};
use crate::services::storage::StorageService;
use crate::utils::validation::sanitize_filename;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::io::StreamReader;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Rejected(#[from] AdmissionError),

    #[error("Request body exceeds the maximum allowed limit")]
    BodyTooLarge,

    #[error("Upload stream failed: {0}")]
    Stream(String),

    #[error("Storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Why the body stream of a file stopped before its end.
#[derive(Debug, Error)]
pub enum StreamFailure {
    #[error("Request body exceeds the maximum allowed limit")]
    BodyTooLarge,
    #[error("{0}")]
    Client(String),
}

/// Carried inside the `io::Error` of the byte stream so the reason survives
/// the copy into storage.
#[derive(Debug, Error)]
enum StreamAbort {
    #[error(transparent)]
    Rejected(AdmissionError),
    #[error(transparent)]
    Failed(StreamFailure),
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub record: StoredFileRecord,
    pub original_name: String,
    pub content_type: String,
    pub size: u64,
}

pub struct UploadService {
    policy: Arc<AdmissionPolicy>,
    storage: Arc<dyn StorageService>,
}

impl UploadService {
    pub fn new(policy: Arc<AdmissionPolicy>, storage: Arc<dyn StorageService>) -> Self {
        Self { policy, storage }
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    /// Admits and streams one file. The size ceiling is enforced while bytes
    /// arrive; a rejected or broken stream leaves no file behind.
    pub async fn store_file<S>(
        &self,
        category: UploadCategory,
        file_name: &str,
        content_type: &str,
        stream: S,
    ) -> Result<UploadedFile, UploadError>
    where
        S: Stream<Item = Result<Bytes, StreamFailure>> + Unpin + Send,
    {
        let descriptor = FileDescriptor {
            file_name,
            content_type,
            size: 0,
        };
        let record = self
            .policy
            .evaluate_admission(&descriptor, category)
            .inspect_err(|e| warn!(code = e.code(), "🚫 Rejected {} upload: {}", category, e))?;

        let policy = &self.policy;
        let mut received: u64 = 0;
        let limited = stream.map(move |chunk| -> std::io::Result<Bytes> {
            let chunk = chunk.map_err(|e| std::io::Error::other(StreamAbort::Failed(e)))?;
            received += chunk.len() as u64;
            policy
                .check_size(category, file_name, received)
                .map_err(|e| std::io::Error::other(StreamAbort::Rejected(e)))?;
            Ok(chunk)
        });

        let key = record.storage_key();
        let size = self
            .storage
            .write_stream(&key, Box::new(StreamReader::new(limited)))
            .await
            .map_err(classify_write_error)
            .inspect_err(|e| match e {
                UploadError::Storage(inner) => error!("❌ Failed to store {}: {:?}", key, inner),
                other => warn!("🚫 Aborted {} upload: {}", category, other),
            })?;

        info!(
            category = %category,
            path = %record.path().display(),
            size,
            "📦 Stored upload"
        );

        Ok(UploadedFile {
            record,
            original_name: sanitize_filename(file_name),
            content_type: content_type.to_string(),
            size,
        })
    }

    /// Removes files persisted earlier in a request that ended up failing.
    pub async fn rollback(&self, files: &[UploadedFile]) {
        for file in files {
            let key = file.record.storage_key();
            if let Err(e) = self.storage.delete_file(&key).await {
                error!("❌ Failed to roll back {}: {:?}", key, e);
            }
        }
    }
}

fn classify_write_error(err: anyhow::Error) -> UploadError {
    let aborted = err
        .chain()
        .filter_map(|cause| cause.downcast_ref::<std::io::Error>())
        .filter_map(|io| io.get_ref())
        .find_map(|inner| inner.downcast_ref::<StreamAbort>())
        .map(|abort| match abort {
            StreamAbort::Rejected(e) => UploadError::Rejected(e.clone()),
            StreamAbort::Failed(StreamFailure::BodyTooLarge) => UploadError::BodyTooLarge,
            StreamAbort::Failed(StreamFailure::Client(msg)) => UploadError::Stream(msg.clone()),
        });

    match aborted {
        Some(e) => e,
        None => UploadError::Storage(err),
    }
}
