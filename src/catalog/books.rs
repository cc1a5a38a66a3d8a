/// Book manager: create, edit, delete and browse books
///
/// Every mutation is one transaction covering the book row, its genre set
/// and its cover. Cover files released by an edit or delete are removed
/// only after the transaction commits.
use crate::{
    access::{require_capability, Capability, Identity},
    catalog::{Book, BookDetail, BookFilter, BookInput, BookSummary, GenreManager},
    cover_store::{CoverStore, CoverUpload, StoredCover},
    db::{Page, PageRequest},
    error::{CatalogError, CatalogResult},
    reviews::{RatingAggregator, ReviewManager},
    sanitize::render_safe,
    validation::{distinct_ids, require_text, validate_input},
};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool, Transaction};

const BOOK_SELECT: &str = r#"
    SELECT b.id, b.title, b.description, b.year, b.publisher, b.author, b.pages,
           b.cover_id, c.filename AS cover_filename
    FROM books b
    LEFT JOIN covers c ON c.id = b.cover_id
"#;

/// Book manager
#[derive(Clone)]
pub struct BookManager {
    db: SqlitePool,
    covers: CoverStore,
    genres: GenreManager,
    reviews: ReviewManager,
    ratings: RatingAggregator,
    page_size: u32,
}

impl BookManager {
    pub fn new(
        db: SqlitePool,
        covers: CoverStore,
        genres: GenreManager,
        reviews: ReviewManager,
        ratings: RatingAggregator,
        page_size: u32,
    ) -> Self {
        Self {
            db,
            covers,
            genres,
            reviews,
            ratings,
            page_size,
        }
    }

    /// Add a book with its genres and an optional cover
    pub async fn create(
        &self,
        identity: &Identity,
        input: BookInput,
        cover: Option<CoverUpload>,
    ) -> CatalogResult<Book> {
        require_capability(identity, Capability::AddBook)?;
        validate_book(&input)?;
        let genre_ids = distinct_ids(&input.genre_ids);

        let mut tx = self.db.begin().await?;

        let book_id = sqlx::query(
            r#"
            INSERT INTO books (title, description, year, publisher, author, pages)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.year)
        .bind(&input.publisher)
        .bind(&input.author)
        .bind(input.pages)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        replace_genres(&mut tx, book_id, &genre_ids).await?;

        let stored = match cover {
            Some(upload) => {
                let stored = self.covers.store_cover(&mut tx, &upload).await?;
                set_cover(&mut tx, book_id, stored.cover.id).await?;
                Some(stored)
            }
            None => None,
        };

        commit(tx, stored.as_ref()).await?;

        tracing::info!(book_id, user_id = identity.user_id, title = %input.title, "Created book");
        self.get(book_id).await
    }

    /// Edit a book. A new cover replaces the old one, which is released if nothing else uses it.
    pub async fn update(
        &self,
        identity: &Identity,
        book_id: i64,
        input: BookInput,
        cover: Option<CoverUpload>,
    ) -> CatalogResult<Book> {
        require_capability(identity, Capability::EditBook)?;
        validate_book(&input)?;
        let genre_ids = distinct_ids(&input.genre_ids);

        let mut tx = self.db.begin().await?;

        // Writing first takes the database write lock before the cover reference count is read
        let previous_cover: Option<Option<i64>> = sqlx::query_scalar(
            r#"
            UPDATE books
            SET title = ?1, description = ?2, year = ?3, publisher = ?4, author = ?5, pages = ?6
            WHERE id = ?7
            RETURNING cover_id
            "#,
        )
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.year)
        .bind(&input.publisher)
        .bind(&input.author)
        .bind(input.pages)
        .bind(book_id)
        .fetch_optional(&mut *tx)
        .await?;

        let previous_cover =
            previous_cover.ok_or_else(|| CatalogError::NotFound(format!("Book {}", book_id)))?;

        replace_genres(&mut tx, book_id, &genre_ids).await?;

        let mut released = Vec::new();
        let stored = match cover {
            Some(upload) => {
                let stored = self.covers.store_cover(&mut tx, &upload).await?;

                if previous_cover != Some(stored.cover.id) {
                    set_cover(&mut tx, book_id, stored.cover.id).await?;

                    if let Some(old_cover) = previous_cover {
                        if let Some(filename) = self
                            .covers
                            .release_cover_if_orphaned(&mut tx, old_cover, book_id)
                            .await?
                        {
                            released.push(filename);
                        }
                    }
                }

                Some(stored)
            }
            None => None,
        };

        commit(tx, stored.as_ref()).await?;
        self.covers.remove_files(&released).await;

        tracing::info!(book_id, user_id = identity.user_id, "Updated book");
        self.get(book_id).await
    }

    /// Delete a book; reviews, genre links and collection entries go with it
    pub async fn delete(&self, identity: &Identity, book_id: i64) -> CatalogResult<()> {
        require_capability(identity, Capability::DeleteBook)?;

        let mut tx = self.db.begin().await?;

        let cover_id: Option<Option<i64>> =
            sqlx::query_scalar("DELETE FROM books WHERE id = ?1 RETURNING cover_id")
                .bind(book_id)
                .fetch_optional(&mut *tx)
                .await?;

        let cover_id = cover_id.ok_or_else(|| CatalogError::NotFound(format!("Book {}", book_id)))?;

        let mut released = Vec::new();
        if let Some(cover_id) = cover_id {
            if let Some(filename) = self
                .covers
                .release_cover_if_orphaned(&mut tx, cover_id, book_id)
                .await?
            {
                released.push(filename);
            }
        }

        tx.commit().await?;
        self.covers.remove_files(&released).await;

        tracing::info!(book_id, user_id = identity.user_id, "Deleted book");
        Ok(())
    }

    /// Get a book with its genres
    pub async fn get(&self, book_id: i64) -> CatalogResult<Book> {
        let row = sqlx::query(&format!("{} WHERE b.id = ?1", BOOK_SELECT))
            .bind(book_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("Book {}", book_id)))?;

        let mut book = book_from_row(&row)?;
        book.genres = self
            .genres
            .for_books(&[book_id])
            .await?
            .remove(&book_id)
            .unwrap_or_default();

        Ok(book)
    }

    /// Book page: sanitized description, aggregate, approved reviews and the viewer's review eligibility
    pub async fn detail(&self, book_id: i64, viewer: Option<&Identity>) -> CatalogResult<BookDetail> {
        let book = self.get(book_id).await?;
        let rating = self.ratings.aggregate(book_id).await?;
        let reviews = self
            .reviews
            .list_for_book(book_id)
            .await?
            .into_iter()
            .map(|review| review.view())
            .collect();

        let can_review = match viewer {
            Some(identity) if identity.can(Capability::SubmitReview) => {
                !self.reviews.has_reviewed(book_id, identity.user_id).await?
            }
            _ => false,
        };

        Ok(BookDetail {
            description_html: render_safe(&book.description),
            book,
            rating,
            reviews,
            can_review,
        })
    }

    /// Filtered listing, newest first, each book with its aggregate rating
    pub async fn search(&self, filter: &BookFilter, page: u32) -> CatalogResult<Page<BookSummary>> {
        let request = PageRequest::new(page, self.page_size);

        let mut count: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM books b");
        push_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(BOOK_SELECT);
        push_filter(&mut query, filter);
        query.push(" ORDER BY b.id DESC LIMIT ");
        query.push_bind(request.limit());
        query.push(" OFFSET ");
        query.push_bind(request.offset());

        let rows = query.build().fetch_all(&self.db).await?;
        let books = rows.iter().map(book_from_row).collect::<CatalogResult<Vec<_>>>()?;

        let ids: Vec<i64> = books.iter().map(|book| book.id).collect();
        let mut genres = self.genres.for_books(&ids).await?;
        let ratings = self.ratings.aggregate_many(&ids).await?;

        let items = books
            .into_iter()
            .map(|mut book| {
                book.genres = genres.remove(&book.id).unwrap_or_default();
                let rating = ratings.get(&book.id).copied().unwrap_or_default();
                BookSummary { book, rating }
            })
            .collect();

        tracing::debug!(total, page = request.page, "Book search");
        Ok(Page::new(items, request, total))
    }

    /// Publication years present in the catalog, newest first
    pub async fn distinct_years(&self) -> CatalogResult<Vec<i64>> {
        let years = sqlx::query_scalar("SELECT DISTINCT year FROM books ORDER BY year DESC")
            .fetch_all(&self.db)
            .await?;

        Ok(years)
    }
}

fn validate_book(input: &BookInput) -> CatalogResult<()> {
    validate_input(input)?;
    require_text("title", &input.title)?;
    require_text("description", &input.description)?;
    require_text("publisher", &input.publisher)?;
    require_text("author", &input.author)?;
    Ok(())
}

/// Commit, logging the file left behind when a freshly written cover loses its row
async fn commit(tx: Transaction<'_, Sqlite>, stored: Option<&StoredCover>) -> CatalogResult<()> {
    if let Err(e) = tx.commit().await {
        if let Some(stored) = stored.filter(|s| s.created) {
            tracing::warn!(
                filename = %stored.cover.filename,
                "Commit failed after writing cover file, file is orphaned"
            );
        }
        return Err(e.into());
    }
    Ok(())
}

/// Replace the book's genre set, rejecting unknown genre ids
async fn replace_genres(
    tx: &mut Transaction<'_, Sqlite>,
    book_id: i64,
    genre_ids: &[i64],
) -> CatalogResult<()> {
    if !genre_ids.is_empty() {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM genres WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in genre_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let known: i64 = query.build_query_scalar().fetch_one(&mut **tx).await?;
        if known != genre_ids.len() as i64 {
            return Err(CatalogError::Validation("Unknown genre selected".to_string()));
        }
    }

    sqlx::query("DELETE FROM books_genres WHERE book_id = ?1")
        .bind(book_id)
        .execute(&mut **tx)
        .await?;

    for genre_id in genre_ids {
        sqlx::query("INSERT INTO books_genres (book_id, genre_id) VALUES (?1, ?2)")
            .bind(book_id)
            .bind(genre_id)
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

async fn set_cover(
    tx: &mut Transaction<'_, Sqlite>,
    book_id: i64,
    cover_id: i64,
) -> CatalogResult<()> {
    sqlx::query("UPDATE books SET cover_id = ?1 WHERE id = ?2")
        .bind(cover_id)
        .bind(book_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Escape LIKE wildcards so user input matches literally
fn like_pattern(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &BookFilter) {
    query.push(" WHERE 1 = 1");

    if let Some(title) = filter.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        query.push(" AND b.title LIKE ");
        query.push_bind(like_pattern(title));
        query.push(" ESCAPE '\\'");
    }

    if let Some(author) = filter.author.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        query.push(" AND b.author LIKE ");
        query.push_bind(like_pattern(author));
        query.push(" ESCAPE '\\'");
    }

    if !filter.genre_ids.is_empty() {
        query.push(" AND b.id IN (SELECT book_id FROM books_genres WHERE genre_id IN (");
        let mut separated = query.separated(", ");
        for id in &filter.genre_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated("))");
    }

    if !filter.years.is_empty() {
        query.push(" AND b.year IN (");
        let mut separated = query.separated(", ");
        for year in &filter.years {
            separated.push_bind(*year);
        }
        separated.push_unseparated(")");
    }

    if let Some(pages_from) = filter.pages_from {
        query.push(" AND b.pages >= ");
        query.push_bind(pages_from);
    }

    if let Some(pages_to) = filter.pages_to {
        query.push(" AND b.pages <= ");
        query.push_bind(pages_to);
    }
}

fn book_from_row(row: &SqliteRow) -> CatalogResult<Book> {
    Ok(Book {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        year: row.try_get("year")?,
        publisher: row.try_get("publisher")?,
        author: row.try_get("author")?,
        pages: row.try_get("pages")?,
        cover_id: row.try_get("cover_id")?,
        cover_filename: row.try_get("cover_filename")?,
        genres: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;
    use crate::cover_store::DEFAULT_MAX_COVER_SIZE;
    use crate::reviews::NewReview;
    use crate::testing::{image_bytes, insert_user, test_pool};
    use image::ImageFormat;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        db: SqlitePool,
        books: BookManager,
        reviews: ReviewManager,
        admin: Identity,
    }

    impl Fixture {
        fn covers_dir(&self) -> PathBuf {
            self.dir.path().join("covers")
        }
    }

    async fn fixture() -> Fixture {
        let (dir, db) = test_pool().await;
        let admin = insert_user(&db, "admin", Role::Admin).await;
        let covers = CoverStore::on_disk(db.clone(), dir.path().join("covers"), DEFAULT_MAX_COVER_SIZE);
        let reviews = ReviewManager::new(db.clone(), 10);
        let books = BookManager::new(
            db.clone(),
            covers,
            GenreManager::new(db.clone()),
            reviews.clone(),
            RatingAggregator::new(db.clone()),
            10,
        );

        Fixture {
            dir,
            db,
            books,
            reviews,
            admin,
        }
    }

    fn input(title: &str) -> BookInput {
        BookInput {
            title: title.to_string(),
            description: "A story".to_string(),
            year: 1965,
            publisher: "Chilton".to_string(),
            author: "Frank Herbert".to_string(),
            pages: 412,
            genre_ids: vec![1, 7],
        }
    }

    fn cover(shade: u8) -> CoverUpload {
        CoverUpload {
            filename: "cover.png".to_string(),
            mime_type: "image/png".to_string(),
            data: image_bytes(ImageFormat::Png, shade),
        }
    }

    async fn cover_count(db: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM covers")
            .fetch_one(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_with_genres_and_cover() {
        let f = fixture().await;

        let book = f
            .books
            .create(&f.admin, input("Dune"), Some(cover(10)))
            .await
            .unwrap();

        assert_eq!(book.title, "Dune");
        assert_eq!(book.genres.len(), 2);
        let filename = book.cover_filename.clone().unwrap();
        assert!(f.covers_dir().join(&filename).exists());
    }

    #[tokio::test]
    async fn test_identical_covers_shared_between_books() {
        let f = fixture().await;

        let first = f.books.create(&f.admin, input("One"), Some(cover(10))).await.unwrap();
        let second = f.books.create(&f.admin, input("Two"), Some(cover(10))).await.unwrap();

        assert_eq!(first.cover_id, second.cover_id);
        assert_eq!(cover_count(&f.db).await, 1);
        assert_eq!(std::fs::read_dir(f.covers_dir()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_delete_sole_referencer_removes_cover() {
        let f = fixture().await;

        let book = f.books.create(&f.admin, input("Only"), Some(cover(10))).await.unwrap();
        let filename = book.cover_filename.unwrap();

        f.books.delete(&f.admin, book.id).await.unwrap();

        assert_eq!(cover_count(&f.db).await, 0);
        assert!(!f.covers_dir().join(filename).exists());
        assert!(matches!(f.books.get(book.id).await, Err(CatalogError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_keeps_shared_cover() {
        let f = fixture().await;

        let first = f.books.create(&f.admin, input("One"), Some(cover(10))).await.unwrap();
        let second = f.books.create(&f.admin, input("Two"), Some(cover(10))).await.unwrap();
        let filename = first.cover_filename.clone().unwrap();

        f.books.delete(&f.admin, first.id).await.unwrap();

        assert_eq!(cover_count(&f.db).await, 1);
        assert!(f.covers_dir().join(&filename).exists());
        assert_eq!(f.books.get(second.id).await.unwrap().cover_filename, Some(filename));
    }

    #[tokio::test]
    async fn test_replacing_cover_releases_old_one() {
        let f = fixture().await;

        let book = f.books.create(&f.admin, input("Dune"), Some(cover(10))).await.unwrap();
        let old_filename = book.cover_filename.unwrap();

        let updated = f
            .books
            .update(&f.admin, book.id, input("Dune"), Some(cover(200)))
            .await
            .unwrap();

        assert_ne!(updated.cover_filename.as_deref(), Some(old_filename.as_str()));
        assert_eq!(cover_count(&f.db).await, 1);
        assert!(!f.covers_dir().join(old_filename).exists());
    }

    #[tokio::test]
    async fn test_update_replaces_genres_and_keeps_cover() {
        let f = fixture().await;

        let book = f.books.create(&f.admin, input("Dune"), Some(cover(10))).await.unwrap();

        let mut edit = input("Dune Messiah");
        edit.genre_ids = vec![3, 3];
        let updated = f.books.update(&f.admin, book.id, edit, None).await.unwrap();

        assert_eq!(updated.title, "Dune Messiah");
        assert_eq!(updated.genres.iter().map(|g| g.id).collect::<Vec<_>>(), vec![3]);
        assert_eq!(updated.cover_id, book.cover_id);
    }

    #[tokio::test]
    async fn test_failed_create_leaves_nothing() {
        let f = fixture().await;

        let mut bad = input("Ghost");
        bad.genre_ids = vec![9999];
        let result = f.books.create(&f.admin, bad, Some(cover(10))).await;
        assert!(matches!(result, Err(CatalogError::Validation(_))));

        let bad_cover = CoverUpload {
            filename: "cover.exe".to_string(),
            mime_type: "application/octet-stream".to_string(),
            data: vec![1, 2, 3],
        };
        let result = f.books.create(&f.admin, input("Ghost"), Some(bad_cover)).await;
        assert!(matches!(result, Err(CatalogError::UnsupportedType(_))));

        let books: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&f.db)
            .await
            .unwrap();
        assert_eq!(books, 0);
        assert_eq!(cover_count(&f.db).await, 0);
    }

    #[tokio::test]
    async fn test_input_validation() {
        let f = fixture().await;

        let mut bad_year = input("Dune");
        bad_year.year = 999;
        assert!(matches!(
            f.books.create(&f.admin, bad_year, None).await,
            Err(CatalogError::Validation(_))
        ));

        let mut blank = input("   ");
        blank.pages = 10;
        assert!(matches!(
            f.books.create(&f.admin, blank, None).await,
            Err(CatalogError::Validation(_))
        ));

        let mut no_pages = input("Dune");
        no_pages.pages = 0;
        assert!(matches!(
            f.books.create(&f.admin, no_pages, None).await,
            Err(CatalogError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_role_gates() {
        let f = fixture().await;
        let moderator = insert_user(&f.db, "moder", Role::Moderator).await;
        let reader = insert_user(&f.db, "reader", Role::User).await;

        assert!(matches!(
            f.books.create(&moderator, input("Dune"), None).await,
            Err(CatalogError::Permission)
        ));

        let book = f.books.create(&f.admin, input("Dune"), None).await.unwrap();

        // Moderators edit but do not delete
        f.books.update(&moderator, book.id, input("Dune (rev)"), None).await.unwrap();
        assert!(matches!(
            f.books.delete(&moderator, book.id).await,
            Err(CatalogError::Permission)
        ));
        assert!(matches!(
            f.books.update(&reader, book.id, input("Mine"), None).await,
            Err(CatalogError::Permission)
        ));
        assert!(matches!(
            f.books.update(&f.admin, book.id + 1, input("Nope"), None).await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_cascades_reviews_and_collections() {
        let f = fixture().await;
        let reader = insert_user(&f.db, "reader", Role::User).await;

        let book = f.books.create(&f.admin, input("Dune"), None).await.unwrap();
        f.reviews
            .submit_review(&reader, book.id, NewReview { rating: 4, text: "Good".to_string() })
            .await
            .unwrap();
        sqlx::query("INSERT INTO collections (name, user_id) VALUES ('Shelf', ?1)")
            .bind(reader.user_id)
            .execute(&f.db)
            .await
            .unwrap();
        sqlx::query("INSERT INTO collections_books (collection_id, book_id) VALUES (1, ?1)")
            .bind(book.id)
            .execute(&f.db)
            .await
            .unwrap();

        f.books.delete(&f.admin, book.id).await.unwrap();

        for table in ["reviews", "collections_books", "books_genres"] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&f.db)
                .await
                .unwrap();
            assert_eq!(count, 0, "{} not cleaned up", table);
        }

        let genres: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM genres")
            .fetch_one(&f.db)
            .await
            .unwrap();
        assert_eq!(genres, 20);
    }

    #[tokio::test]
    async fn test_search_filters() {
        let f = fixture().await;

        let mut dune = input("Dune");
        dune.genre_ids = vec![1];
        f.books.create(&f.admin, dune, None).await.unwrap();

        let mut emma = input("Emma");
        emma.author = "Jane Austen".to_string();
        emma.year = 1815;
        emma.pages = 300;
        emma.genre_ids = vec![3, 19];
        f.books.create(&f.admin, emma, None).await.unwrap();

        let mut percent = input("100% Cotton");
        percent.genre_ids = vec![];
        f.books.create(&f.admin, percent, None).await.unwrap();

        let titles = |page: Page<BookSummary>| {
            page.items.into_iter().map(|s| s.book.title).collect::<Vec<_>>()
        };

        let all = f.books.search(&BookFilter::default(), 1).await.unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(titles(all), vec!["100% Cotton", "Emma", "Dune"]);

        let by_title = BookFilter { title: Some("dUN".to_string()), ..Default::default() };
        assert_eq!(titles(f.books.search(&by_title, 1).await.unwrap()), vec!["Dune"]);

        let by_author = BookFilter { author: Some("austen".to_string()), ..Default::default() };
        assert_eq!(titles(f.books.search(&by_author, 1).await.unwrap()), vec!["Emma"]);

        let wildcard = BookFilter { title: Some("%".to_string()), ..Default::default() };
        assert_eq!(titles(f.books.search(&wildcard, 1).await.unwrap()), vec!["100% Cotton"]);

        // A book in two matching genres appears once
        let by_genre = BookFilter { genre_ids: vec![3, 19], ..Default::default() };
        let page = f.books.search(&by_genre, 1).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(titles(page), vec!["Emma"]);

        let by_year = BookFilter { years: vec![1815, 1700], ..Default::default() };
        assert_eq!(titles(f.books.search(&by_year, 1).await.unwrap()), vec!["Emma"]);

        let by_pages = BookFilter {
            pages_from: Some(350),
            pages_to: Some(500),
            ..Default::default()
        };
        assert_eq!(
            titles(f.books.search(&by_pages, 1).await.unwrap()),
            vec!["100% Cotton", "Dune"]
        );

        assert_eq!(f.books.distinct_years().await.unwrap(), vec![1965, 1815]);
    }

    #[tokio::test]
    async fn test_search_paginates() {
        let f = fixture().await;

        for i in 0..12 {
            f.books.create(&f.admin, input(&format!("Book {}", i)), None).await.unwrap();
        }

        let first = f.books.search(&BookFilter::default(), 1).await.unwrap();
        let second = f.books.search(&BookFilter::default(), 2).await.unwrap();

        assert_eq!(first.total, 12);
        assert_eq!(first.items.len(), 10);
        assert_eq!(second.items.len(), 2);
        assert_eq!(first.items[0].book.title, "Book 11");
        assert_eq!(second.items[1].book.title, "Book 0");
    }

    #[tokio::test]
    async fn test_detail_for_viewer() {
        let f = fixture().await;
        let reader = insert_user(&f.db, "reader", Role::User).await;

        let mut dune = input("Dune");
        dune.description = "Spice\n\n<script>x()</script>Sand".to_string();
        let book = f.books.create(&f.admin, dune, None).await.unwrap();

        let anonymous = f.books.detail(book.id, None).await.unwrap();
        assert!(!anonymous.can_review);
        assert!(!anonymous.description_html.contains("<script"));
        assert!(anonymous.description_html.starts_with("<p>Spice</p>"));

        assert!(f.books.detail(book.id, Some(&reader)).await.unwrap().can_review);

        f.reviews
            .submit_review(&reader, book.id, NewReview { rating: 5, text: "Classic".to_string() })
            .await
            .unwrap();

        let detail = f.books.detail(book.id, Some(&reader)).await.unwrap();
        assert!(!detail.can_review);
        // Pending review not shown yet
        assert!(detail.reviews.is_empty());
        assert_eq!(detail.rating.approved_count, 0);
    }
}
