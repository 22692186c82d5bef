use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};

/// Prefix of staged files; they never match the `<uuid>.<ext>` layout.
pub const STAGING_PREFIX: &str = ".upload-";

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the directory (and parents) if absent. Idempotent.
    async fn ensure_directory(&self, relative: &str) -> Result<()>;

    /// Streams `reader` into `key`. Nothing is visible under `key` unless the
    /// whole stream was consumed without error. Returns the bytes written.
    async fn write_stream<'a>(
        &self,
        key: &str,
        reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> Result<u64>;

    async fn delete_file(&self, key: &str) -> Result<()>;
    async fn file_exists(&self, key: &str) -> Result<bool>;

    /// Cheap probe used by the health endpoint.
    async fn is_writable(&self) -> bool;
}

/// Filesystem storage rooted at the upload directory.
pub struct LocalStorageService {
    root: PathBuf,
}

impl LocalStorageService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a key onto the root, refusing anything that could escape it.
    fn key_to_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let is_plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

        if key.is_empty() || !is_plain {
            return Err(anyhow!("Invalid storage key '{}'", key));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    async fn ensure_directory(&self, relative: &str) -> Result<()> {
        let dir = self.key_to_path(relative)?;
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create directory {}", dir.display()))
    }

    async fn write_stream<'a>(
        &self,
        key: &str,
        mut reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> Result<u64> {
        let target = self.key_to_path(key)?;
        let dir = target
            .parent()
            .ok_or_else(|| anyhow!("Storage key '{}' has no parent directory", key))?;

        // Staged next to the target so the final rename never crosses filesystems
        let staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(".part")
            .tempfile_in(dir)
            .with_context(|| format!("Failed to stage upload in {}", dir.display()))?;
        let (file, temp_path) = staged.into_parts();
        let mut file = fs::File::from_std(file);

        // On error `temp_path` is dropped here, which removes the staged file
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        temp_path
            .persist(&target)
            .with_context(|| format!("Failed to persist {}", target.display()))?;

        Ok(written)
    }

    async fn delete_file(&self, key: &str) -> Result<()> {
        let path = self.key_to_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }

    async fn file_exists(&self, key: &str) -> Result<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn is_writable(&self) -> bool {
        match fs::metadata(&self.root).await {
            Ok(meta) => meta.is_dir() && !meta.permissions().readonly(),
            Err(_) => false,
        }
    }
}
