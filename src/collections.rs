/// Personal book collections
///
/// A collection belongs to one user; only the owner sees or changes it.
use crate::{
    access::{require_capability, require_owner, Capability, Identity},
    error::{CatalogError, CatalogResult},
    validation::require_text,
};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: i64,
    pub name: String,
    pub user_id: i64,
}

/// Collection with the number of books in it
#[derive(Debug, Clone, Serialize)]
pub struct CollectionSummary {
    #[serde(flatten)]
    pub collection: Collection,
    pub book_count: i64,
}

/// Book as listed inside a collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectedBook {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub year: i64,
    pub cover_filename: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionDetail {
    #[serde(flatten)]
    pub collection: Collection,
    pub books: Vec<CollectedBook>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveOutcome {
    Removed,
    NotInCollection,
}

#[derive(Clone)]
pub struct CollectionManager {
    db: SqlitePool,
}

impl CollectionManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(&self, identity: &Identity, name: &str) -> CatalogResult<Collection> {
        require_capability(identity, Capability::ManageCollections)?;

        let name = name.trim();
        require_text("collection name", name)?;
        if name.chars().count() > 128 {
            return Err(CatalogError::Validation(
                "collection name must be at most 128 characters".to_string(),
            ));
        }

        let id = sqlx::query("INSERT INTO collections (name, user_id) VALUES (?1, ?2)")
            .bind(name)
            .bind(identity.user_id)
            .execute(&self.db)
            .await?
            .last_insert_rowid();

        tracing::info!(collection_id = id, user_id = identity.user_id, "Created collection");

        Ok(Collection {
            id,
            name: name.to_string(),
            user_id: identity.user_id,
        })
    }

    /// The caller's collections with book counts
    pub async fn list_for_user(&self, identity: &Identity) -> CatalogResult<Vec<CollectionSummary>> {
        require_capability(identity, Capability::ManageCollections)?;

        let rows = sqlx::query(
            r#"
            SELECT c.id, c.name, c.user_id, COUNT(cb.book_id) AS book_count
            FROM collections c
            LEFT JOIN collections_books cb ON cb.collection_id = c.id
            WHERE c.user_id = ?1
            GROUP BY c.id
            ORDER BY c.id
            "#,
        )
        .bind(identity.user_id)
        .fetch_all(&self.db)
        .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            summaries.push(CollectionSummary {
                collection: Collection {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    user_id: row.try_get("user_id")?,
                },
                book_count: row.try_get("book_count")?,
            });
        }

        Ok(summaries)
    }

    /// A collection and its books, for its owner
    pub async fn get(&self, identity: &Identity, collection_id: i64) -> CatalogResult<CollectionDetail> {
        let collection = self.owned(identity, collection_id).await?;

        let rows = sqlx::query(
            r#"
            SELECT b.id, b.title, b.author, b.year, c.filename AS cover_filename
            FROM collections_books cb
            JOIN books b ON b.id = cb.book_id
            LEFT JOIN covers c ON c.id = b.cover_id
            WHERE cb.collection_id = ?1
            ORDER BY b.title, b.id
            "#,
        )
        .bind(collection_id)
        .fetch_all(&self.db)
        .await?;

        let mut books = Vec::with_capacity(rows.len());
        for row in rows {
            books.push(CollectedBook {
                id: row.try_get("id")?,
                title: row.try_get("title")?,
                author: row.try_get("author")?,
                year: row.try_get("year")?,
                cover_filename: row.try_get("cover_filename")?,
            });
        }

        Ok(CollectionDetail { collection, books })
    }

    pub async fn delete(&self, identity: &Identity, collection_id: i64) -> CatalogResult<()> {
        self.owned(identity, collection_id).await?;

        sqlx::query("DELETE FROM collections WHERE id = ?1")
            .bind(collection_id)
            .execute(&self.db)
            .await?;

        tracing::info!(collection_id, user_id = identity.user_id, "Deleted collection");
        Ok(())
    }

    pub async fn add_book(
        &self,
        identity: &Identity,
        collection_id: i64,
        book_id: i64,
    ) -> CatalogResult<AddOutcome> {
        self.owned(identity, collection_id).await?;

        let book_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = ?1)")
            .bind(book_id)
            .fetch_one(&self.db)
            .await?;
        if !book_exists {
            return Err(CatalogError::NotFound(format!("Book {}", book_id)));
        }

        let result = sqlx::query(
            "INSERT OR IGNORE INTO collections_books (collection_id, book_id) VALUES (?1, ?2)",
        )
        .bind(collection_id)
        .bind(book_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(collection_id, book_id, "Book already in collection");
            Ok(AddOutcome::AlreadyPresent)
        } else {
            tracing::info!(collection_id, book_id, "Added book to collection");
            Ok(AddOutcome::Added)
        }
    }

    pub async fn remove_book(
        &self,
        identity: &Identity,
        collection_id: i64,
        book_id: i64,
    ) -> CatalogResult<RemoveOutcome> {
        self.owned(identity, collection_id).await?;

        let result = sqlx::query(
            "DELETE FROM collections_books WHERE collection_id = ?1 AND book_id = ?2",
        )
        .bind(collection_id)
        .bind(book_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            Ok(RemoveOutcome::NotInCollection)
        } else {
            tracing::info!(collection_id, book_id, "Removed book from collection");
            Ok(RemoveOutcome::Removed)
        }
    }

    /// Load a collection, failing unless the caller owns it
    async fn owned(&self, identity: &Identity, collection_id: i64) -> CatalogResult<Collection> {
        require_capability(identity, Capability::ManageCollections)?;

        let row = sqlx::query("SELECT id, name, user_id FROM collections WHERE id = ?1")
            .bind(collection_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("Collection {}", collection_id)))?;

        let collection = Collection {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            user_id: row.try_get("user_id")?,
        };

        require_owner(identity, collection.user_id)?;
        Ok(collection)
    }
}
