/// Average rating over approved reviews, derived on every read
use crate::error::CatalogResult;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashMap;

/// Aggregate rating of one book
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RatingSummary {
    /// None when there is no approved review
    pub average_rating: Option<f64>,
    pub approved_count: i64,
}

#[derive(Clone)]
pub struct RatingAggregator {
    db: SqlitePool,
}

impl RatingAggregator {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Aggregate of a single book
    pub async fn aggregate(&self, book_id: i64) -> CatalogResult<RatingSummary> {
        let row = sqlx::query(
            r#"
            SELECT AVG(r.rating) AS average_rating, COUNT(r.id) AS approved_count
            FROM reviews r
            JOIN review_statuses s ON s.id = r.status_id
            WHERE r.book_id = ?1 AND s.name = 'approved'
            "#,
        )
        .bind(book_id)
        .fetch_one(&self.db)
        .await?;

        let approved_count: i64 = row.try_get("approved_count")?;

        Ok(RatingSummary {
            average_rating: if approved_count > 0 {
                row.try_get("average_rating")?
            } else {
                None
            },
            approved_count,
        })
    }

    /// Aggregates for a page of books in one query. Books without approved reviews get the default.
    pub async fn aggregate_many(&self, book_ids: &[i64]) -> CatalogResult<HashMap<i64, RatingSummary>> {
        let mut summaries: HashMap<i64, RatingSummary> = book_ids
            .iter()
            .map(|id| (*id, RatingSummary::default()))
            .collect();

        if book_ids.is_empty() {
            return Ok(summaries);
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT r.book_id, AVG(r.rating) AS average_rating, COUNT(r.id) AS approved_count
            FROM reviews r
            JOIN review_statuses s ON s.id = r.status_id
            WHERE s.name = 'approved' AND r.book_id IN (
            "#,
        );
        let mut separated = query.separated(", ");
        for id in book_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") GROUP BY r.book_id");

        for row in query.build().fetch_all(&self.db).await? {
            let book_id: i64 = row.try_get("book_id")?;
            summaries.insert(
                book_id,
                RatingSummary {
                    average_rating: row.try_get("average_rating")?,
                    approved_count: row.try_get("approved_count")?,
                },
            );
        }

        Ok(summaries)
    }
}
