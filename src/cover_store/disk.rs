/// Disk-based cover storage backend
use crate::{
    cover_store::CoverBackend,
    error::{CatalogError, CatalogResult},
};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Disk storage backend
///
/// Covers are stored flat in one directory so the HTTP layer can serve
/// the directory as-is.
#[derive(Clone)]
pub struct DiskCoverBackend {
    base_path: PathBuf,
}

impl DiskCoverBackend {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Resolve a filename inside the base directory. Names with path components are refused.
    fn cover_path(&self, filename: &str) -> CatalogResult<PathBuf> {
        if filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename.starts_with('.')
        {
            return Err(CatalogError::Storage(format!(
                "Invalid cover filename: {}",
                filename
            )));
        }

        Ok(self.base_path.join(filename))
    }
}

#[async_trait]
impl CoverBackend for DiskCoverBackend {
    async fn put(&self, filename: &str, data: &[u8]) -> CatalogResult<()> {
        let path = self.cover_path(filename)?;

        fs::create_dir_all(&self.base_path).await.map_err(|e| {
            CatalogError::Storage(format!("Failed to create covers directory: {}", e))
        })?;

        fs::write(&path, data).await.map_err(|e| {
            CatalogError::Storage(format!("Failed to write cover {}: {}", filename, e))
        })?;

        Ok(())
    }

    async fn get(&self, filename: &str) -> CatalogResult<Option<Vec<u8>>> {
        let path = self.cover_path(filename)?;

        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CatalogError::Storage(format!(
                "Failed to read cover {}: {}",
                filename, e
            ))),
        }
    }

    async fn delete(&self, filename: &str) -> CatalogResult<()> {
        let path = self.cover_path(filename)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CatalogError::Storage(format!(
                "Failed to delete cover {}: {}",
                filename, e
            ))),
        }
    }
}
