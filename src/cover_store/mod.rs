/// Cover Storage System
///
/// Stores book cover images once per distinct content. Rows live in the
/// `covers` table keyed by a SHA-256 content hash, bytes live in a pluggable
/// backend under `<cover_id>.<ext>`.

pub mod disk;
pub mod store;

pub use disk::DiskCoverBackend;
pub use store::CoverStore;

use crate::error::CatalogResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// File extensions accepted for covers
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Default upper bound on a single cover (5MB)
pub const DEFAULT_MAX_COVER_SIZE: usize = 5 * 1024 * 1024;

/// Cover storage backend trait
///
/// Implementations handle the actual storage and retrieval of cover bytes.
#[async_trait]
pub trait CoverBackend: Send + Sync {
    /// Store bytes under a filename, replacing any previous content
    async fn put(&self, filename: &str, data: &[u8]) -> CatalogResult<()>;

    /// Retrieve bytes by filename
    async fn get(&self, filename: &str) -> CatalogResult<Option<Vec<u8>>>;

    /// Delete a file; deleting a missing file is not an error
    async fn delete(&self, filename: &str) -> CatalogResult<()>;
}

/// Cover row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cover {
    pub id: i64,
    pub filename: String,
    pub mime_type: String,
    pub content_hash: String,
}

/// An uploaded cover as received from the client
#[derive(Debug, Clone)]
pub struct CoverUpload {
    /// Client-side filename, only its extension is used
    pub filename: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl CoverUpload {
    /// Lowercased extension of the client filename
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

/// Result of storing a cover: either a fresh row or an existing one with the same content
#[derive(Debug, Clone)]
pub struct StoredCover {
    pub cover: Cover,
    pub created: bool,
}
