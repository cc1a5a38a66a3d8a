/// Cover Store Manager
///
/// Coordinates the cover backend with the `covers` table. Writes happen
/// inside the caller's book transaction so the row and the book reference
/// commit together.
use crate::{
    cover_store::{
        disk::DiskCoverBackend, Cover, CoverBackend, CoverUpload, StoredCover, ALLOWED_EXTENSIONS,
    },
    error::{CatalogError, CatalogResult},
};
use image::ImageFormat;
use sha2::{Digest, Sha256};
use sqlx::{sqlite::SqliteRow, Row, Sqlite, SqlitePool, Transaction};
use std::path::PathBuf;
use std::sync::Arc;

/// Main cover store manager
#[derive(Clone)]
pub struct CoverStore {
    db: SqlitePool,
    backend: Arc<dyn CoverBackend>,
    max_cover_size: usize,
}

impl CoverStore {
    pub fn new(db: SqlitePool, backend: Arc<dyn CoverBackend>, max_cover_size: usize) -> Self {
        Self {
            db,
            backend,
            max_cover_size,
        }
    }

    /// Cover store backed by a directory on disk
    pub fn on_disk(db: SqlitePool, directory: PathBuf, max_cover_size: usize) -> Self {
        Self::new(db, Arc::new(DiskCoverBackend::new(directory)), max_cover_size)
    }

    /// Store an uploaded cover, reusing an existing row with identical content
    ///
    /// The new file is written before returning, while `tx` is still open.
    /// A failed write surfaces as `Storage` and the caller's transaction
    /// rolls the row back when dropped.
    pub async fn store_cover(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        upload: &CoverUpload,
    ) -> CatalogResult<StoredCover> {
        upload
            .extension()
            .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
            .ok_or_else(|| CatalogError::UnsupportedType(upload.filename.clone()))?;

        if upload.data.is_empty() {
            return Err(CatalogError::Validation("Cover file is empty".to_string()));
        }
        if upload.data.len() > self.max_cover_size {
            return Err(CatalogError::Validation(format!(
                "Cover exceeds maximum size of {} bytes",
                self.max_cover_size
            )));
        }

        // The stored name and MIME type follow the content, not the client filename
        let format = sniff_format(&upload.data)
            .ok_or_else(|| CatalogError::UnsupportedType(upload.mime_type.clone()))?;
        let mime_type = format.to_mime_type();
        let extension = format
            .extensions_str()
            .first()
            .ok_or_else(|| CatalogError::UnsupportedType(upload.mime_type.clone()))?;

        let content_hash = content_hash(&upload.data);

        let existing = sqlx::query(
            "SELECT id, filename, mime_type, content_hash FROM covers WHERE content_hash = ?1",
        )
        .bind(&content_hash)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(row) = existing {
            let cover = cover_from_row(&row)?;
            tracing::debug!(cover_id = cover.id, "Reusing cover with identical content");
            return Ok(StoredCover {
                cover,
                created: false,
            });
        }

        let cover_id = sqlx::query(
            "INSERT INTO covers (filename, mime_type, content_hash) VALUES ('', ?1, ?2)",
        )
        .bind(mime_type)
        .bind(&content_hash)
        .execute(&mut **tx)
        .await
        .map_err(|e| CatalogError::on_unique_violation(e, "Cover with identical content"))?
        .last_insert_rowid();

        let filename = format!("{}.{}", cover_id, extension);

        sqlx::query("UPDATE covers SET filename = ?1 WHERE id = ?2")
            .bind(&filename)
            .bind(cover_id)
            .execute(&mut **tx)
            .await?;

        self.backend.put(&filename, &upload.data).await?;

        tracing::info!(cover_id, filename = %filename, "Stored new cover");

        Ok(StoredCover {
            cover: Cover {
                id: cover_id,
                filename,
                mime_type: mime_type.to_string(),
                content_hash,
            },
            created: true,
        })
    }

    /// Delete the cover row when no book other than `excluding_book_id` references it
    ///
    /// Returns the filename to remove once the transaction has committed.
    /// The caller must already have written in `tx` so the count is taken
    /// under the database write lock.
    pub async fn release_cover_if_orphaned(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        cover_id: i64,
        excluding_book_id: i64,
    ) -> CatalogResult<Option<String>> {
        let references: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE cover_id = ?1 AND id != ?2")
                .bind(cover_id)
                .bind(excluding_book_id)
                .fetch_one(&mut **tx)
                .await?;

        if references > 0 {
            tracing::debug!(cover_id, references, "Cover still shared, keeping it");
            return Ok(None);
        }

        let filename: Option<String> =
            sqlx::query_scalar("DELETE FROM covers WHERE id = ?1 RETURNING filename")
                .bind(cover_id)
                .fetch_optional(&mut **tx)
                .await?;

        if filename.is_some() {
            tracing::info!(cover_id, "Released orphaned cover");
        }

        Ok(filename)
    }

    /// Remove released files after commit. Failures only leave stray files and are logged.
    pub async fn remove_files(&self, filenames: &[String]) {
        for filename in filenames {
            if let Err(e) = self.backend.delete(filename).await {
                tracing::warn!(filename = %filename, "Failed to remove cover file: {}", e);
            }
        }
    }

    /// Get a cover row
    pub async fn get(&self, cover_id: i64) -> CatalogResult<Cover> {
        let row = sqlx::query(
            "SELECT id, filename, mime_type, content_hash FROM covers WHERE id = ?1",
        )
        .bind(cover_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| CatalogError::NotFound(format!("Cover {}", cover_id)))?;

        cover_from_row(&row)
    }

    /// Read a cover's bytes and MIME type
    pub async fn read(&self, cover_id: i64) -> CatalogResult<(Vec<u8>, String)> {
        let cover = self.get(cover_id).await?;

        let data = self.backend.get(&cover.filename).await?.ok_or_else(|| {
            tracing::warn!(cover_id, filename = %cover.filename, "Cover file missing");
            CatalogError::NotFound(format!("Cover file {}", cover.filename))
        })?;

        Ok((data, cover.mime_type))
    }
}

/// Hex SHA-256 of the full byte stream
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Format of a supported image, from its magic bytes
fn sniff_format(data: &[u8]) -> Option<ImageFormat> {
    match image::guess_format(data).ok()? {
        format @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif) => Some(format),
        _ => None,
    }
}

fn cover_from_row(row: &SqliteRow) -> CatalogResult<Cover> {
    Ok(Cover {
        id: row.try_get("id")?,
        filename: row.try_get("filename")?,
        mime_type: row.try_get("mime_type")?,
        content_hash: row.try_get("content_hash")?,
    })
}
