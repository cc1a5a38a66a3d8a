/// Genre reference data
use crate::{
    access::{require_capability, Capability, Identity},
    catalog::Genre,
    error::{CatalogError, CatalogResult},
    validation::require_text,
};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashMap;

#[derive(Clone)]
pub struct GenreManager {
    db: SqlitePool,
}

impl GenreManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// All genres by name
    pub async fn list(&self) -> CatalogResult<Vec<Genre>> {
        let rows = sqlx::query("SELECT id, name FROM genres ORDER BY name")
            .fetch_all(&self.db)
            .await?;

        let mut genres = Vec::with_capacity(rows.len());
        for row in rows {
            genres.push(Genre {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
            });
        }

        Ok(genres)
    }

    /// Add a genre
    pub async fn create(&self, identity: &Identity, name: &str) -> CatalogResult<Genre> {
        require_capability(identity, Capability::ManageGenres)?;

        let name = name.trim();
        require_text("genre name", name)?;
        if name.chars().count() > 64 {
            return Err(CatalogError::Validation(
                "genre name must be at most 64 characters".to_string(),
            ));
        }

        let id = sqlx::query("INSERT INTO genres (name) VALUES (?1)")
            .bind(name)
            .execute(&self.db)
            .await
            .map_err(|e| CatalogError::on_unique_violation(e, format!("Genre {}", name)))?
            .last_insert_rowid();

        tracing::info!(genre_id = id, name, "Created genre");

        Ok(Genre {
            id,
            name: name.to_string(),
        })
    }

    /// Genres of each listed book, by name
    pub async fn for_books(&self, book_ids: &[i64]) -> CatalogResult<HashMap<i64, Vec<Genre>>> {
        let mut by_book: HashMap<i64, Vec<Genre>> = HashMap::new();
        if book_ids.is_empty() {
            return Ok(by_book);
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT bg.book_id, g.id, g.name
            FROM books_genres bg
            JOIN genres g ON g.id = bg.genre_id
            WHERE bg.book_id IN (
            "#,
        );
        let mut separated = query.separated(", ");
        for id in book_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY g.name");

        for row in query.build().fetch_all(&self.db).await? {
            let book_id: i64 = row.try_get("book_id")?;
            by_book.entry(book_id).or_default().push(Genre {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
            });
        }

        Ok(by_book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;
    use crate::testing::{insert_user, test_pool};

    #[tokio::test]
    async fn test_seeded_genres_sorted() {
        let (_dir, db) = test_pool().await;
        let manager = GenreManager::new(db);

        let genres = manager.list().await.unwrap();
        assert_eq!(genres.len(), 20);

        let names: Vec<&str> = genres.iter().map(|g| g.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[tokio::test]
    async fn test_create_genre() {
        let (_dir, db) = test_pool().await;
        let admin = insert_user(&db, "admin", Role::Admin).await;
        let moderator = insert_user(&db, "moder", Role::Moderator).await;
        let manager = GenreManager::new(db);

        let genre = manager.create(&admin, "  Cyberpunk ").await.unwrap();
        assert_eq!(genre.name, "Cyberpunk");

        assert!(matches!(
            manager.create(&admin, "Cyberpunk").await,
            Err(CatalogError::Duplicate(_))
        ));
        assert!(matches!(
            manager.create(&admin, "  ").await,
            Err(CatalogError::Validation(_))
        ));
        assert!(matches!(
            manager.create(&moderator, "Solarpunk").await,
            Err(CatalogError::Permission)
        ));
    }
}
