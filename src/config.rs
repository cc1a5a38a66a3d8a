/// Configuration management for Shelfmark
use crate::error::{CatalogError, CatalogResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    /// Cover files live here as `<cover_id>.<ext>`
    pub covers_directory: PathBuf,
    pub max_cover_size: usize,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_ttl_secs: i64,
    /// First administrator, created at startup when no admin exists yet
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

/// Catalog browsing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Page size for book listings and the moderation queue
    pub page_size: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, e.g. `shelfmark=debug,tower_http=info`
    pub level: String,
}

const DEFAULT_LOG_LEVEL: &str = "shelfmark=debug,tower_http=debug";

impl LoggingConfig {
    /// Subscriber filter built from `level`
    pub fn env_filter(&self) -> CatalogResult<EnvFilter> {
        EnvFilter::try_new(&self.level).map_err(|e| {
            CatalogError::Validation(format!("Invalid log level {:?}: {}", self.level, e))
        })
    }
}

impl ServerConfig {
    /// Configuration with defaults rooted at a data directory
    pub fn with_data_directory(data_directory: PathBuf, jwt_secret: impl Into<String>) -> Self {
        Self {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 8080,
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            storage: StorageConfig {
                database: data_directory.join("catalog.sqlite"),
                covers_directory: data_directory.join("covers"),
                data_directory,
                max_cover_size: 5 * 1024 * 1024,
            },
            authentication: AuthConfig {
                jwt_secret: jwt_secret.into(),
                session_ttl_secs: 60 * 60 * 24,
                bootstrap_admin: None,
            },
            catalog: CatalogConfig { page_size: 10 },
            logging: LoggingConfig {
                level: DEFAULT_LOG_LEVEL.to_string(),
            },
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> CatalogResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("SHELFMARK_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("SHELFMARK_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| CatalogError::Validation("Invalid port number".to_string()))?;
        let version = env::var("SHELFMARK_VERSION")
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        let data_directory: PathBuf = env::var("SHELFMARK_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("SHELFMARK_DATABASE_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("catalog.sqlite"));
        let covers_directory = env::var("SHELFMARK_COVERS_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("covers"));
        let max_cover_size = env::var("SHELFMARK_MAX_COVER_SIZE")
            .unwrap_or_else(|_| "5242880".to_string())
            .parse()
            .unwrap_or(5242880);

        let jwt_secret = env::var("SHELFMARK_JWT_SECRET")
            .map_err(|_| CatalogError::Validation("JWT secret required".to_string()))?;
        let session_ttl_secs = env::var("SHELFMARK_SESSION_TTL_SECS")
            .unwrap_or_else(|_| "86400".to_string())
            .parse()
            .unwrap_or(86400);

        let bootstrap_admin = match (
            env::var("SHELFMARK_BOOTSTRAP_ADMIN_USERNAME"),
            env::var("SHELFMARK_BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) => Some(BootstrapAdmin { username, password }),
            _ => None,
        };

        let page_size = env::var("SHELFMARK_PAGE_SIZE")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig {
                data_directory,
                database,
                covers_directory,
                max_cover_size,
            },
            authentication: AuthConfig {
                jwt_secret,
                session_ttl_secs,
                bootstrap_admin,
            },
            catalog: CatalogConfig { page_size },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> CatalogResult<()> {
        if self.service.hostname.is_empty() {
            return Err(CatalogError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(CatalogError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.session_ttl_secs <= 0 {
            return Err(CatalogError::Validation(
                "Session TTL must be positive".to_string(),
            ));
        }

        if self.catalog.page_size == 0 {
            return Err(CatalogError::Validation("Page size must be positive".to_string()));
        }

        self.logging.env_filter()?;

        if let Some(admin) = &self.authentication.bootstrap_admin {
            if admin.username.trim().is_empty() || admin.password.chars().count() < 4 {
                return Err(CatalogError::Validation(
                    "Bootstrap admin needs a username and a password of at least 4 characters"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }
}
