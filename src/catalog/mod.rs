/// Book catalog
///
/// Books with their genre sets and shared covers, the filterable listing,
/// and genre reference data.

pub mod books;
pub mod genres;

pub use books::BookManager;
pub use genres::GenreManager;

use crate::reviews::{RatingSummary, ReviewView};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Genre reference row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

/// Book record with its genres and cover file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    /// Raw description as entered
    pub description: String,
    pub year: i64,
    pub publisher: String,
    pub author: String,
    pub pages: i64,
    pub cover_id: Option<i64>,
    pub cover_filename: Option<String>,
    pub genres: Vec<Genre>,
}

/// Fields of a book on create and on edit. The genre set is replaced as a whole.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BookInput {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1))]
    pub description: String,
    #[validate(range(min = 1000, max = 2100))]
    pub year: i64,
    #[validate(length(min = 1, max = 128))]
    pub publisher: String,
    #[validate(length(min = 1, max = 128))]
    pub author: String,
    #[validate(range(min = 1))]
    pub pages: i64,
    #[serde(default)]
    pub genre_ids: Vec<i64>,
}

/// Listing filters; empty fields do not filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookFilter {
    /// Case-insensitive substring of the title
    pub title: Option<String>,
    /// Case-insensitive substring of the author
    pub author: Option<String>,
    /// Books in any of these genres
    pub genre_ids: Vec<i64>,
    /// Books published in any of these years
    pub years: Vec<i64>,
    pub pages_from: Option<i64>,
    pub pages_to: Option<i64>,
}

/// Listing row: book plus its aggregate rating
#[derive(Debug, Clone, Serialize)]
pub struct BookSummary {
    #[serde(flatten)]
    pub book: Book,
    pub rating: RatingSummary,
}

/// Book page
#[derive(Debug, Clone, Serialize)]
pub struct BookDetail {
    #[serde(flatten)]
    pub book: Book,
    pub description_html: String,
    pub rating: RatingSummary,
    /// Approved reviews, newest first
    pub reviews: Vec<ReviewView>,
    /// Viewer may submit a review (signed in, allowed, not yet reviewed)
    pub can_review: bool,
}
