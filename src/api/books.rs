/// Book, genre and rating endpoints
use crate::{
    auth::{AuthContext, OptionalAuthContext},
    catalog::{Book, BookDetail, BookFilter, BookInput, BookSummary, Genre},
    context::AppContext,
    cover_store::CoverUpload,
    db::Page,
    error::{CatalogError, CatalogResult},
    reviews::RatingSummary,
};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;

/// Listing query. List-valued filters are comma separated (`genres=1,4`).
#[derive(Debug, Default, Deserialize)]
pub struct BookQuery {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genres: Option<String>,
    pub years: Option<String>,
    pub pages_from: Option<i64>,
    pub pages_to: Option<i64>,
    pub page: Option<u32>,
}

impl BookQuery {
    fn filter(&self) -> CatalogResult<BookFilter> {
        Ok(BookFilter {
            title: self.title.clone(),
            author: self.author.clone(),
            genre_ids: parse_id_list("genres", self.genres.as_deref())?,
            years: parse_id_list("years", self.years.as_deref())?,
            pages_from: self.pages_from,
            pages_to: self.pages_to,
        })
    }
}

/// Cover sent with a book form
#[derive(Debug, Deserialize)]
pub struct CoverPayload {
    pub filename: String,
    #[serde(default)]
    pub mime_type: String,
    /// Base64 file content
    pub data: String,
}

impl CoverPayload {
    fn into_upload(self) -> CatalogResult<CoverUpload> {
        let data = STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| CatalogError::Validation(format!("Cover is not valid base64: {}", e)))?;

        Ok(CoverUpload {
            filename: self.filename,
            mime_type: self.mime_type,
            data,
        })
    }
}

/// Book create/edit body
#[derive(Debug, Deserialize)]
pub struct BookPayload {
    #[serde(flatten)]
    pub book: BookInput,
    pub cover: Option<CoverPayload>,
}

impl BookPayload {
    fn split(self) -> CatalogResult<(BookInput, Option<CoverUpload>)> {
        let cover = self.cover.map(CoverPayload::into_upload).transpose()?;
        Ok((self.book, cover))
    }
}

#[derive(Debug, Deserialize)]
pub struct NewGenreRequest {
    pub name: String,
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/books", get(list_books).post(create_book))
        .route("/api/books/years", get(list_years))
        .route(
            "/api/books/:id",
            get(get_book).put(update_book).delete(delete_book),
        )
        .route("/api/books/:id/rating", get(get_rating))
        .route("/api/books/:id/cover", get(get_cover))
        .route("/api/genres", get(list_genres).post(create_genre))
}

/// Parse "1,2, 3" into ids; empty input means no filter
fn parse_id_list(field: &str, value: Option<&str>) -> CatalogResult<Vec<i64>> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .map_err(|_| CatalogError::Validation(format!("Invalid {} value: {}", field, part)))
        })
        .collect()
}

async fn list_books(
    State(ctx): State<AppContext>,
    Query(query): Query<BookQuery>,
) -> CatalogResult<Json<Page<BookSummary>>> {
    let filter = query.filter()?;
    let page = ctx.books.search(&filter, query.page.unwrap_or(1)).await?;
    Ok(Json(page))
}

async fn list_years(State(ctx): State<AppContext>) -> CatalogResult<Json<Vec<i64>>> {
    Ok(Json(ctx.books.distinct_years().await?))
}

async fn create_book(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(payload): Json<BookPayload>,
) -> CatalogResult<(StatusCode, Json<Book>)> {
    let (input, cover) = payload.split()?;
    let book = ctx.books.create(&auth.identity, input, cover).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn get_book(
    State(ctx): State<AppContext>,
    Path(id): Path<i64>,
    auth: OptionalAuthContext,
) -> CatalogResult<Json<BookDetail>> {
    Ok(Json(ctx.books.detail(id, auth.identity.as_ref()).await?))
}

async fn update_book(
    State(ctx): State<AppContext>,
    Path(id): Path<i64>,
    auth: AuthContext,
    Json(payload): Json<BookPayload>,
) -> CatalogResult<Json<Book>> {
    let (input, cover) = payload.split()?;
    Ok(Json(ctx.books.update(&auth.identity, id, input, cover).await?))
}

async fn delete_book(
    State(ctx): State<AppContext>,
    Path(id): Path<i64>,
    auth: AuthContext,
) -> CatalogResult<StatusCode> {
    ctx.books.delete(&auth.identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_rating(
    State(ctx): State<AppContext>,
    Path(id): Path<i64>,
) -> CatalogResult<Json<RatingSummary>> {
    ctx.books.get(id).await?;
    Ok(Json(ctx.ratings.aggregate(id).await?))
}

/// Cover bytes with the MIME type recorded when the content was sniffed
async fn get_cover(
    State(ctx): State<AppContext>,
    Path(id): Path<i64>,
) -> CatalogResult<([(header::HeaderName, String); 1], Vec<u8>)> {
    let cover_id = ctx
        .books
        .get(id)
        .await?
        .cover_id
        .ok_or_else(|| CatalogError::NotFound(format!("Cover for book {}", id)))?;

    let (data, mime_type) = ctx.covers.read(cover_id).await?;
    Ok(([(header::CONTENT_TYPE, mime_type)], data))
}

async fn list_genres(State(ctx): State<AppContext>) -> CatalogResult<Json<Vec<Genre>>> {
    Ok(Json(ctx.genres.list().await?))
}

async fn create_genre(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<NewGenreRequest>,
) -> CatalogResult<(StatusCode, Json<Genre>)> {
    let genre = ctx.genres.create(&auth.identity, &req.name).await?;
    Ok((StatusCode::CREATED, Json(genre)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list("genres", None).unwrap(), Vec::<i64>::new());
        assert_eq!(parse_id_list("genres", Some("1, 4,,7")).unwrap(), vec![1, 4, 7]);
        assert!(matches!(
            parse_id_list("years", Some("1999,abc")),
            Err(CatalogError::Validation(_))
        ));
    }

    #[test]
    fn test_cover_payload_decodes_base64() {
        let payload = CoverPayload {
            filename: "c.png".to_string(),
            mime_type: "image/png".to_string(),
            data: STANDARD.encode(b"bytes"),
        };
        assert_eq!(payload.into_upload().unwrap().data, b"bytes".to_vec());

        let broken = CoverPayload {
            filename: "c.png".to_string(),
            mime_type: String::new(),
            data: "***".to_string(),
        };
        assert!(matches!(broken.into_upload(), Err(CatalogError::Validation(_))));
    }
}
