/// Application context and dependency injection
use crate::{
    account::UserManager,
    catalog::{BookManager, GenreManager},
    collections::CollectionManager,
    config::ServerConfig,
    cover_store::CoverStore,
    db,
    error::CatalogResult,
    reviews::{RatingAggregator, ReviewManager},
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub users: Arc<UserManager>,
    pub books: Arc<BookManager>,
    pub genres: Arc<GenreManager>,
    pub covers: Arc<CoverStore>,
    pub reviews: Arc<ReviewManager>,
    pub ratings: Arc<RatingAggregator>,
    pub collections: Arc<CollectionManager>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> CatalogResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let pool = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        Self::from_pool(config, pool).await
    }

    /// Wire services over an already migrated pool
    pub async fn from_pool(config: ServerConfig, pool: SqlitePool) -> CatalogResult<Self> {
        let page_size = config.catalog.page_size;

        let users = UserManager::new(pool.clone());
        let covers = CoverStore::on_disk(
            pool.clone(),
            config.storage.covers_directory.clone(),
            config.storage.max_cover_size,
        );
        let genres = GenreManager::new(pool.clone());
        let reviews = ReviewManager::new(pool.clone(), page_size);
        let ratings = RatingAggregator::new(pool.clone());
        let books = BookManager::new(
            pool.clone(),
            covers.clone(),
            genres.clone(),
            reviews.clone(),
            ratings.clone(),
            page_size,
        );
        let collections = CollectionManager::new(pool.clone());

        if let Some(admin) = &config.authentication.bootstrap_admin {
            users
                .ensure_bootstrap_admin(&admin.username, &admin.password)
                .await?;
        }

        tracing::info!(
            database = %config.storage.database.display(),
            covers = %config.storage.covers_directory.display(),
            "Application context ready"
        );

        Ok(Self {
            config: Arc::new(config),
            users: Arc::new(users),
            books: Arc::new(books),
            genres: Arc::new(genres),
            covers: Arc::new(covers),
            reviews: Arc::new(reviews),
            ratings: Arc::new(ratings),
            collections: Arc::new(collections),
        })
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> CatalogResult<()> {
        tokio::fs::create_dir_all(&config.storage.data_directory).await?;
        tokio::fs::create_dir_all(&config.storage.covers_directory).await?;
        Ok(())
    }

    /// Service URL for logs
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;

    #[tokio::test]
    async fn test_context_bootstraps_admin() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::with_data_directory(
            dir.path().to_path_buf(),
            "0123456789abcdef0123456789abcdef",
        );
        config.authentication.bootstrap_admin = Some(crate::config::BootstrapAdmin {
            username: "root".to_string(),
            password: "rootpass".to_string(),
        });

        let ctx = AppContext::new(config).await.unwrap();

        let admin = ctx.users.authenticate("root", "rootpass").await.unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(dir.path().join("covers").is_dir());
    }

    #[tokio::test]
    async fn test_context_rejects_weak_secret() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::with_data_directory(dir.path().to_path_buf(), "short");

        assert!(AppContext::new(config).await.is_err());
    }
}
