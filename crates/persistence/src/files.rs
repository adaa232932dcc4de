//! Filesystem-backed export file store.
//!
//! Export files live flat under one root directory, named `{log_id}.csv`.
//! Writes go through a temp file and an atomic rename so a crashed rewrite
//! never leaves a half-written export behind.

use std::path::{Component, Path, PathBuf};

use shared::hash::sha256_hex;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("export file not found")]
    NotFound,

    /// The stored location escapes the export root.
    #[error("invalid export file location: {0}")]
    InvalidLocation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Store for export CSV files.
#[derive(Debug, Clone)]
pub struct ExportFileStore {
    root: PathBuf,
}

impl ExportFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The relative location under which a job's file is stored.
    pub fn location_for(log_id: &str) -> String {
        format!("{}.csv", log_id)
    }

    /// Resolves a stored location to an absolute path, refusing anything
    /// that would leave the root. Locations come from the database, so
    /// they are re-checked here rather than trusted.
    fn resolve(&self, location: &str) -> Result<PathBuf, FileStoreError> {
        let relative = Path::new(location);
        let plain = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if location.is_empty() || !plain {
            return Err(FileStoreError::InvalidLocation(location.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Reads a stored export file as UTF-8 text.
    pub async fn read(&self, location: &str) -> Result<String, FileStoreError> {
        let path = self.resolve(location)?;
        match fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(FileStoreError::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes (or replaces) an export file atomically. Returns the SHA-256
    /// of the stored bytes.
    pub async fn write(&self, location: &str, bytes: &[u8]) -> Result<String, FileStoreError> {
        let path = self.resolve(location)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self
            .root
            .join(format!(".{}.tmp", Uuid::new_v4()));
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await?;
        if let Err(err) = file.write_all(bytes).await {
            drop(file);
            let _ = fs::remove_file(&temp_path).await;
            return Err(err.into());
        }
        file.flush().await?;
        drop(file);

        if let Err(err) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err.into());
        }
        Ok(sha256_hex(bytes))
    }

    /// Deletes an export file. Deleting a file that is already gone is not
    /// an error.
    pub async fn delete(&self, location: &str) -> Result<(), FileStoreError> {
        let path = self.resolve(location)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
