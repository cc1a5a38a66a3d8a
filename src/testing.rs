/// Shared fixtures for unit tests
use crate::{
    access::{Identity, Role},
    db,
};
use chrono::Utc;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// File-backed pool with migrations applied. Keep the TempDir alive for the test.
pub async fn test_pool() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().unwrap();
    let pool = db::create_pool(&dir.path().join("test.sqlite"), db::DatabaseOptions::default())
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    (dir, pool)
}

/// Insert a user directly, skipping password hashing
pub async fn insert_user(db: &SqlitePool, username: &str, role: Role) -> Identity {
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, password_hash, last_name, first_name, middle_name, role_id, created_at)
        VALUES (?1, 'not-a-hash', 'Tester', ?1, NULL, (SELECT id FROM roles WHERE name = ?2), ?3)
        "#,
    )
    .bind(username)
    .bind(role.as_str())
    .bind(db::format_timestamp(Utc::now()))
    .execute(db)
    .await
    .unwrap();

    Identity {
        user_id: result.last_insert_rowid(),
        username: username.to_string(),
        role,
    }
}

/// Insert a book directly, with an optional cover id
pub async fn insert_book(db: &SqlitePool, title: &str, cover_id: Option<i64>) -> i64 {
    sqlx::query(
        r#"
        INSERT INTO books (title, description, year, publisher, author, pages, cover_id)
        VALUES (?1, 'A book', 2001, 'Publisher', 'Author', 100, ?2)
        "#,
    )
    .bind(title)
    .bind(cover_id)
    .execute(db)
    .await
    .unwrap()
    .last_insert_rowid()
}

/// Encode a tiny image in the given format
pub fn image_bytes(format: image::ImageFormat, shade: u8) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(2, 2, image::Rgb([shade, shade, shade]));
    let mut buf = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buf);
    img.write_to(&mut cursor, format).unwrap();
    buf
}
