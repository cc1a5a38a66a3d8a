/// Review submission and moderation
use crate::{
    access::{require_capability, Capability, Identity},
    db::{format_timestamp, parse_timestamp, Page, PageRequest},
    error::{CatalogError, CatalogResult},
    reviews::{ModerationAction, ModerationOutcome, ModerationReport, NewReview, Review, ReviewStatus},
    validation::{require_text, validate_input},
};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

const REVIEW_SELECT: &str = r#"
    SELECT r.id, r.book_id, r.user_id, r.rating, r.text, r.created_at,
           s.name AS status, u.username, b.title AS book_title
    FROM reviews r
    JOIN review_statuses s ON s.id = r.status_id
    JOIN users u ON u.id = r.user_id
    JOIN books b ON b.id = r.book_id
"#;

/// Review manager
#[derive(Clone)]
pub struct ReviewManager {
    db: SqlitePool,
    page_size: u32,
}

impl ReviewManager {
    pub fn new(db: SqlitePool, page_size: u32) -> Self {
        Self { db, page_size }
    }

    /// Submit a review; it starts out pending
    pub async fn submit_review(
        &self,
        identity: &Identity,
        book_id: i64,
        review: NewReview,
    ) -> CatalogResult<Review> {
        require_capability(identity, Capability::SubmitReview)?;
        validate_input(&review)?;
        require_text("review text", &review.text)?;

        let book_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = ?1)")
            .bind(book_id)
            .fetch_one(&self.db)
            .await?;
        if !book_exists {
            return Err(CatalogError::NotFound(format!("Book {}", book_id)));
        }

        if self.has_reviewed(book_id, identity.user_id).await? {
            tracing::warn!(user_id = identity.user_id, book_id, "Repeated review submission");
            return Err(CatalogError::Duplicate(
                "You have already reviewed this book".to_string(),
            ));
        }

        // The unique index catches a concurrent submission that passed the check above
        let result = sqlx::query(
            r#"
            INSERT INTO reviews (book_id, user_id, rating, text, created_at, status_id)
            VALUES (?1, ?2, ?3, ?4, ?5, (SELECT id FROM review_statuses WHERE name = ?6))
            "#,
        )
        .bind(book_id)
        .bind(identity.user_id)
        .bind(review.rating)
        .bind(&review.text)
        .bind(format_timestamp(Utc::now()))
        .bind(ReviewStatus::Pending.as_str())
        .execute(&self.db)
        .await
        .map_err(|e| {
            CatalogError::on_unique_violation(e, "You have already reviewed this book")
        })?;

        let review_id = result.last_insert_rowid();
        tracing::info!(review_id, book_id, user_id = identity.user_id, "Review submitted for moderation");

        self.get(review_id).await
    }

    /// Approve or reject a pending review
    ///
    /// Repeating the decision a review already carries is a no-op. The
    /// opposite decision on a decided review is a `Conflict`.
    pub async fn moderate(
        &self,
        identity: &Identity,
        review_id: i64,
        action: ModerationAction,
    ) -> CatalogResult<ModerationReport> {
        require_capability(identity, Capability::ModerateReviews)?;

        let target = action.target_status();

        // Only a pending review moves; the status guard makes concurrent decisions race safely
        let result = sqlx::query(
            r#"
            UPDATE reviews
            SET status_id = (SELECT id FROM review_statuses WHERE name = ?1)
            WHERE id = ?2
              AND status_id = (SELECT id FROM review_statuses WHERE name = 'pending')
            "#,
        )
        .bind(target.as_str())
        .bind(review_id)
        .execute(&self.db)
        .await?;

        let review = self.get(review_id).await?;

        if result.rows_affected() == 1 {
            tracing::info!(
                review_id,
                moderator_id = identity.user_id,
                status = target.as_str(),
                "Review moderated"
            );
            return Ok(ModerationReport {
                outcome: ModerationOutcome::Applied,
                review,
            });
        }

        if review.status == target {
            tracing::debug!(review_id, status = target.as_str(), "Review already in requested status");
            Ok(ModerationReport {
                outcome: ModerationOutcome::Unchanged,
                review,
            })
        } else {
            tracing::warn!(
                review_id,
                current = review.status.as_str(),
                requested = target.as_str(),
                "Refused to change a decided review"
            );
            Err(CatalogError::Conflict(format!(
                "review already {}",
                review.status.as_str()
            )))
        }
    }

    /// Moderation queue: pending reviews, oldest first
    pub async fn list_pending(&self, identity: &Identity, page: u32) -> CatalogResult<Page<Review>> {
        require_capability(identity, Capability::ModerateReviews)?;

        let request = PageRequest::new(page, self.page_size);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM reviews r
            JOIN review_statuses s ON s.id = r.status_id
            WHERE s.name = 'pending'
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query(&format!(
            "{} WHERE s.name = 'pending' ORDER BY r.created_at ASC, r.id ASC LIMIT ?1 OFFSET ?2",
            REVIEW_SELECT
        ))
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(&self.db)
        .await?;

        let items = rows.iter().map(review_from_row).collect::<CatalogResult<Vec<_>>>()?;
        Ok(Page::new(items, request, total))
    }

    /// Every review by a user, any status, newest first
    pub async fn list_by_user(&self, user_id: i64) -> CatalogResult<Vec<Review>> {
        let rows = sqlx::query(&format!(
            "{} WHERE r.user_id = ?1 ORDER BY r.created_at DESC, r.id DESC",
            REVIEW_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(review_from_row).collect()
    }

    /// Approved reviews of a book, newest first
    pub async fn list_for_book(&self, book_id: i64) -> CatalogResult<Vec<Review>> {
        let rows = sqlx::query(&format!(
            "{} WHERE r.book_id = ?1 AND s.name = 'approved' ORDER BY r.created_at DESC, r.id DESC",
            REVIEW_SELECT
        ))
        .bind(book_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(review_from_row).collect()
    }

    /// Every review in the system, newest first
    pub async fn list_all(&self, identity: &Identity) -> CatalogResult<Vec<Review>> {
        require_capability(identity, Capability::ViewAllReviews)?;

        let rows = sqlx::query(&format!(
            "{} ORDER BY r.created_at DESC, r.id DESC",
            REVIEW_SELECT
        ))
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(review_from_row).collect()
    }

    pub async fn get(&self, review_id: i64) -> CatalogResult<Review> {
        let row = sqlx::query(&format!("{} WHERE r.id = ?1", REVIEW_SELECT))
            .bind(review_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("Review {}", review_id)))?;

        review_from_row(&row)
    }

    pub async fn has_reviewed(&self, book_id: i64, user_id: i64) -> CatalogResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM reviews WHERE book_id = ?1 AND user_id = ?2)",
        )
        .bind(book_id)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(exists)
    }
}

fn review_from_row(row: &SqliteRow) -> CatalogResult<Review> {
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Review {
        id: row.try_get("id")?,
        book_id: row.try_get("book_id")?,
        user_id: row.try_get("user_id")?,
        rating: row.try_get("rating")?,
        text: row.try_get("text")?,
        created_at: parse_timestamp(&created_at)?,
        status: ReviewStatus::from_str(&status)?,
        username: row.try_get("username")?,
        book_title: row.try_get("book_title")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;
    use crate::reviews::RatingAggregator;
    use crate::testing::{insert_book, insert_user, test_pool};

    fn review(rating: i64, text: &str) -> NewReview {
        NewReview {
            rating,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_submit_starts_pending() {
        let (_dir, db) = test_pool().await;
        let reader = insert_user(&db, "reader", Role::User).await;
        let book = insert_book(&db, "Dune", None).await;
        let manager = ReviewManager::new(db, 10);

        let submitted = manager.submit_review(&reader, book, review(4, "Great")).await.unwrap();

        assert_eq!(submitted.status, ReviewStatus::Pending);
        assert_eq!(submitted.username, "reader");
        assert_eq!(submitted.book_title, "Dune");
        assert!(manager.has_reviewed(book, reader.user_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_review_rejected() {
        let (_dir, db) = test_pool().await;
        let reader = insert_user(&db, "reader", Role::User).await;
        let book = insert_book(&db, "Dune", None).await;
        let manager = ReviewManager::new(db, 10);

        manager.submit_review(&reader, book, review(4, "Great")).await.unwrap();
        let again = manager.submit_review(&reader, book, review(1, "Changed my mind")).await;

        assert!(matches!(again, Err(CatalogError::Duplicate(_))));
        assert_eq!(manager.list_by_user(reader.user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_validation() {
        let (_dir, db) = test_pool().await;
        let reader = insert_user(&db, "reader", Role::User).await;
        let book = insert_book(&db, "Dune", None).await;
        let manager = ReviewManager::new(db, 10);

        assert!(matches!(
            manager.submit_review(&reader, book, review(6, "Too good")).await,
            Err(CatalogError::Validation(_))
        ));
        assert!(matches!(
            manager.submit_review(&reader, book, review(-1, "Too bad")).await,
            Err(CatalogError::Validation(_))
        ));
        assert!(matches!(
            manager.submit_review(&reader, book, review(3, "   ")).await,
            Err(CatalogError::Validation(_))
        ));
        assert!(matches!(
            manager.submit_review(&reader, book + 100, review(3, "Ghost")).await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_boundary_ratings_accepted() {
        let (_dir, db) = test_pool().await;
        let a = insert_user(&db, "a", Role::User).await;
        let b = insert_user(&db, "b", Role::User).await;
        let book = insert_book(&db, "Dune", None).await;
        let manager = ReviewManager::new(db, 10);

        assert_eq!(manager.submit_review(&a, book, review(0, "Awful")).await.unwrap().rating, 0);
        assert_eq!(manager.submit_review(&b, book, review(5, "Superb")).await.unwrap().rating, 5);
    }

    #[tokio::test]
    async fn test_approval_flows_into_aggregate() {
        let (_dir, db) = test_pool().await;
        let reader = insert_user(&db, "reader", Role::User).await;
        let moderator = insert_user(&db, "moder", Role::Moderator).await;
        let book = insert_book(&db, "Dune", None).await;
        let manager = ReviewManager::new(db.clone(), 10);
        let ratings = RatingAggregator::new(db);

        let submitted = manager.submit_review(&reader, book, review(4, "Great")).await.unwrap();

        // Pending reviews are invisible to readers and the aggregate
        assert_eq!(ratings.aggregate(book).await.unwrap().approved_count, 0);
        assert!(manager.list_for_book(book).await.unwrap().is_empty());

        let queue = manager.list_pending(&moderator, 1).await.unwrap();
        assert_eq!(queue.total, 1);
        assert_eq!(queue.items[0].id, submitted.id);

        let report = manager
            .moderate(&moderator, submitted.id, ModerationAction::Approve)
            .await
            .unwrap();
        assert_eq!(report.outcome, ModerationOutcome::Applied);
        assert_eq!(report.review.status, ReviewStatus::Approved);

        let summary = ratings.aggregate(book).await.unwrap();
        assert_eq!(summary.approved_count, 1);
        assert_eq!(summary.average_rating, Some(4.0));
        assert_eq!(manager.list_for_book(book).await.unwrap().len(), 1);
        assert_eq!(manager.list_pending(&moderator, 1).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_decided_reviews_do_not_flip() {
        let (_dir, db) = test_pool().await;
        let reader = insert_user(&db, "reader", Role::User).await;
        let admin = insert_user(&db, "admin", Role::Admin).await;
        let book = insert_book(&db, "Dune", None).await;
        let manager = ReviewManager::new(db, 10);

        let submitted = manager.submit_review(&reader, book, review(2, "Meh")).await.unwrap();
        manager.moderate(&admin, submitted.id, ModerationAction::Reject).await.unwrap();

        let repeat = manager.moderate(&admin, submitted.id, ModerationAction::Reject).await.unwrap();
        assert_eq!(repeat.outcome, ModerationOutcome::Unchanged);

        let flip = manager.moderate(&admin, submitted.id, ModerationAction::Approve).await;
        assert!(matches!(flip, Err(CatalogError::Conflict(_))));
        assert_eq!(manager.get(submitted.id).await.unwrap().status, ReviewStatus::Rejected);
    }

    #[tokio::test]
    async fn test_moderation_requires_capability() {
        let (_dir, db) = test_pool().await;
        let reader = insert_user(&db, "reader", Role::User).await;
        let moderator = insert_user(&db, "moder", Role::Moderator).await;
        let book = insert_book(&db, "Dune", None).await;
        let manager = ReviewManager::new(db, 10);

        let submitted = manager.submit_review(&reader, book, review(5, "Mine")).await.unwrap();

        assert!(matches!(
            manager.moderate(&reader, submitted.id, ModerationAction::Approve).await,
            Err(CatalogError::Permission)
        ));
        assert!(matches!(
            manager.list_pending(&reader, 1).await,
            Err(CatalogError::Permission)
        ));
        assert!(matches!(
            manager.list_all(&moderator).await,
            Err(CatalogError::Permission)
        ));
        assert!(matches!(
            manager.moderate(&moderator, 9999, ModerationAction::Approve).await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_pending_queue_order_and_paging() {
        let (_dir, db) = test_pool().await;
        let moderator = insert_user(&db, "moder", Role::Moderator).await;
        let book = insert_book(&db, "Dune", None).await;
        let manager = ReviewManager::new(db.clone(), 2);

        let mut ids = Vec::new();
        for name in ["r1", "r2", "r3"] {
            let reader = insert_user(&db, name, Role::User).await;
            ids.push(manager.submit_review(&reader, book, review(3, name)).await.unwrap().id);
        }

        let first = manager.list_pending(&moderator, 1).await.unwrap();
        let second = manager.list_pending(&moderator, 2).await.unwrap();

        assert_eq!(first.total, 3);
        assert_eq!(first.total_pages(), 2);
        assert_eq!(first.items.iter().map(|r| r.id).collect::<Vec<_>>(), ids[..2].to_vec());
        assert_eq!(second.items.iter().map(|r| r.id).collect::<Vec<_>>(), ids[2..].to_vec());
    }

    #[tokio::test]
    async fn test_list_by_user_newest_first() {
        let (_dir, db) = test_pool().await;
        let reader = insert_user(&db, "reader", Role::User).await;
        let admin = insert_user(&db, "admin", Role::Admin).await;
        let first_book = insert_book(&db, "First", None).await;
        let second_book = insert_book(&db, "Second", None).await;
        let manager = ReviewManager::new(db, 10);

        let older = manager.submit_review(&reader, first_book, review(3, "a")).await.unwrap();
        let newer = manager.submit_review(&reader, second_book, review(4, "b")).await.unwrap();
        manager.moderate(&admin, older.id, ModerationAction::Reject).await.unwrap();

        let mine = manager.list_by_user(reader.user_id).await.unwrap();
        assert_eq!(mine.iter().map(|r| r.id).collect::<Vec<_>>(), vec![newer.id, older.id]);

        assert_eq!(manager.list_all(&admin).await.unwrap().len(), 2);
    }
}
