use async_trait::async_trait;
use bytes::Bytes;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::utils::validation::validate_storage_name;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid storage name: {0}")]
    InvalidName(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("I/O error on {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Flat file store addressed by stored name
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Absolute location of a stored name. Fails for names that would leave the root.
    fn resolve(&self, name: &str) -> StorageResult<PathBuf>;
    /// Writes the whole payload so readers never observe a partial file.
    async fn write_file(&self, name: &str, data: Bytes) -> StorageResult<PathBuf>;
    async fn delete_file(&self, name: &str) -> StorageResult<()>;
    async fn open_file(&self, name: &str) -> StorageResult<tokio::fs::File>;
    async fn list_files(&self) -> StorageResult<Vec<String>>;
}

/// Replaces `path` with `data` via a sibling temp file and a rename.
///
/// The temp file lives in the target's directory so the rename never crosses
/// filesystems.
pub fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut builder = tempfile::Builder::new();
    builder.prefix(".incoming-");
    // tempfile defaults to 0600; request the usual 0666 and let the umask apply
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }

    let mut tmp = builder.tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Media root on the local filesystem
pub struct LocalStorageService {
    root: PathBuf,
}

impl LocalStorageService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn io_error(name: &str, source: std::io::Error) -> StorageError {
        if source.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(name.to_string())
        } else {
            StorageError::Io {
                name: name.to_string(),
                source,
            }
        }
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    fn resolve(&self, name: &str) -> StorageResult<PathBuf> {
        validate_storage_name(name).map_err(|e| StorageError::InvalidName(e.message))?;
        Ok(self.root.join(name))
    }

    async fn write_file(&self, name: &str, data: Bytes) -> StorageResult<PathBuf> {
        let path = self.resolve(name)?;
        let target = path.clone();

        tokio::task::spawn_blocking(move || write_atomic(&target, &data))
            .await
            .map_err(|e| StorageError::Io {
                name: name.to_string(),
                source: std::io::Error::other(e),
            })?
            .map_err(|e| StorageError::Io {
                name: name.to_string(),
                source: e,
            })?;

        tracing::debug!("Stored {} ({})", name, path.display());
        Ok(path)
    }

    async fn delete_file(&self, name: &str) -> StorageResult<()> {
        let path = self.resolve(name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| Self::io_error(name, e))
    }

    async fn open_file(&self, name: &str) -> StorageResult<tokio::fs::File> {
        let path = self.resolve(name)?;
        tokio::fs::File::open(&path)
            .await
            .map_err(|e| Self::io_error(name, e))
    }

    async fn list_files(&self) -> StorageResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| Self::io_error(".", e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Self::io_error(".", e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            let name = entry.file_name().to_string_lossy().to_string();
            if is_file && !name.starts_with(".incoming-") {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}
