/// User manager implementation using runtime queries
use crate::{
    access::{require_capability, Capability, Identity, Role},
    account::{NewUser, RoleRecord, User, UserUpdate},
    db::{format_timestamp, parse_timestamp},
    error::{CatalogError, CatalogResult},
    validation::{require_text, validate_input},
};
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use rand::rngs::OsRng;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

const USER_SELECT: &str = r#"
    SELECT u.id, u.username, u.last_name, u.first_name, u.middle_name, r.name AS role, u.created_at
    FROM users u
    JOIN roles r ON r.id = u.role_id
"#;

/// User manager service
#[derive(Clone)]
pub struct UserManager {
    db: SqlitePool,
}

impl UserManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Self-service registration; always creates a plain user
    pub async fn register(&self, new_user: NewUser) -> CatalogResult<User> {
        let user = self.insert_user(new_user, Role::User).await?;
        tracing::info!(user_id = user.id, username = %user.username, "Registered user");
        Ok(user)
    }

    /// Admin creation of a user with any role
    pub async fn create_user(
        &self,
        identity: &Identity,
        new_user: NewUser,
        role: Role,
    ) -> CatalogResult<User> {
        require_capability(identity, Capability::ManageUsers)?;

        let user = self.insert_user(new_user, role).await?;
        tracing::info!(
            admin_id = identity.user_id,
            user_id = user.id,
            role = role.as_str(),
            "Created user"
        );
        Ok(user)
    }

    /// Create the configured first admin unless an admin already exists
    pub async fn ensure_bootstrap_admin(
        &self,
        username: &str,
        password: &str,
    ) -> CatalogResult<Option<User>> {
        let admins: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users u JOIN roles r ON r.id = u.role_id WHERE r.name = 'admin'",
        )
        .fetch_one(&self.db)
        .await?;

        if admins > 0 {
            return Ok(None);
        }

        let user = self
            .insert_user(
                NewUser {
                    username: username.to_string(),
                    password: password.to_string(),
                    last_name: "Administrator".to_string(),
                    first_name: username.to_string(),
                    middle_name: None,
                },
                Role::Admin,
            )
            .await?;

        tracing::info!(user_id = user.id, "Created bootstrap administrator");
        Ok(Some(user))
    }

    async fn insert_user(&self, new_user: NewUser, role: Role) -> CatalogResult<User> {
        validate_input(&new_user)?;
        require_text("username", &new_user.username)?;
        require_text("last name", &new_user.last_name)?;
        require_text("first name", &new_user.first_name)?;

        if self.username_exists(&new_user.username).await? {
            return Err(CatalogError::Duplicate(format!(
                "Username {} already taken",
                new_user.username
            )));
        }

        let password_hash = hash_password(&new_user.password).await?;
        let middle_name = new_user.middle_name.filter(|m| !m.trim().is_empty());

        let result = sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, last_name, first_name, middle_name, role_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, (SELECT id FROM roles WHERE name = ?6), ?7)
            "#,
        )
        .bind(&new_user.username)
        .bind(&password_hash)
        .bind(&new_user.last_name)
        .bind(&new_user.first_name)
        .bind(&middle_name)
        .bind(role.as_str())
        .bind(format_timestamp(Utc::now()))
        .execute(&self.db)
        .await
        .map_err(|e| {
            CatalogError::on_unique_violation(
                e,
                format!("Username {} already taken", new_user.username),
            )
        })?;

        self.get_user(result.last_insert_rowid()).await
    }

    /// Get user by id
    pub async fn get_user(&self, id: i64) -> CatalogResult<User> {
        let row = sqlx::query(&format!("{} WHERE u.id = ?1", USER_SELECT))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("User {}", id)))?;

        user_from_row(&row)
    }

    /// List every user, for administrators
    pub async fn list_users(&self, identity: &Identity) -> CatalogResult<Vec<User>> {
        require_capability(identity, Capability::ManageUsers)?;

        let rows = sqlx::query(&format!("{} ORDER BY u.id", USER_SELECT))
            .fetch_all(&self.db)
            .await?;

        rows.iter().map(user_from_row).collect()
    }

    /// Role reference data
    pub async fn list_roles(&self) -> CatalogResult<Vec<RoleRecord>> {
        let rows = sqlx::query("SELECT id, name, description FROM roles ORDER BY id")
            .fetch_all(&self.db)
            .await?;

        let mut roles = Vec::new();
        for row in rows {
            roles.push(RoleRecord {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                description: row.try_get("description")?,
            });
        }

        Ok(roles)
    }

    /// Verify a username/password pair
    pub async fn authenticate(&self, username: &str, password: &str) -> CatalogResult<User> {
        let row = sqlx::query("SELECT id, password_hash FROM users WHERE username = ?1")
            .bind(username)
            .fetch_optional(&self.db)
            .await?;

        let invalid = || {
            CatalogError::AuthenticationRequired("Invalid username or password".to_string())
        };

        let row = row.ok_or_else(invalid)?;
        let id: i64 = row.try_get("id")?;
        let password_hash: String = row.try_get("password_hash")?;

        if !verify_password(password, &password_hash).await? {
            tracing::warn!(username, "Failed login attempt");
            return Err(invalid());
        }

        self.get_user(id).await
    }

    /// Admin edit of names, role and optionally the password
    pub async fn update_user(
        &self,
        identity: &Identity,
        id: i64,
        update: UserUpdate,
    ) -> CatalogResult<User> {
        require_capability(identity, Capability::ManageUsers)?;
        validate_input(&update)?;
        require_text("last name", &update.last_name)?;
        require_text("first name", &update.first_name)?;

        let password_hash = match update.password.as_deref() {
            Some(password) if !password.is_empty() => {
                check_password_length(password)?;
                Some(hash_password(password).await?)
            }
            _ => None,
        };
        let middle_name = update.middle_name.filter(|m| !m.trim().is_empty());

        let result = sqlx::query(
            r#"
            UPDATE users
            SET last_name = ?1,
                first_name = ?2,
                middle_name = ?3,
                role_id = (SELECT id FROM roles WHERE name = ?4),
                password_hash = COALESCE(?5, password_hash)
            WHERE id = ?6
            "#,
        )
        .bind(&update.last_name)
        .bind(&update.first_name)
        .bind(&middle_name)
        .bind(update.role.as_str())
        .bind(&password_hash)
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(format!("User {}", id)));
        }

        tracing::info!(admin_id = identity.user_id, user_id = id, "Updated user");
        self.get_user(id).await
    }

    /// Hard delete; reviews and collections cascade. Self-deletion is refused.
    pub async fn delete_user(&self, identity: &Identity, id: i64) -> CatalogResult<()> {
        require_capability(identity, Capability::ManageUsers)?;

        if identity.user_id == id {
            tracing::warn!(user_id = id, "Refused self-deletion");
            return Err(CatalogError::Permission);
        }

        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(format!("User {}", id)));
        }

        tracing::info!(admin_id = identity.user_id, user_id = id, "Deleted user");
        Ok(())
    }

    async fn username_exists(&self, username: &str) -> CatalogResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)")
            .bind(username)
            .fetch_one(&self.db)
            .await?;

        Ok(exists)
    }
}

fn user_from_row(row: &SqliteRow) -> CatalogResult<User> {
    let role: String = row.try_get("role")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        last_name: row.try_get("last_name")?,
        first_name: row.try_get("first_name")?,
        middle_name: row.try_get("middle_name")?,
        role: Role::from_str(&role)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

/// Argon2 hash off the async workers
async fn hash_password(password: &str) -> CatalogResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| CatalogError::Internal(format!("Password hashing failed: {}", e)))
    })
    .await
    .map_err(|e| CatalogError::Internal(format!("Password hashing task failed: {}", e)))?
}

async fn verify_password(password: &str, password_hash: &str) -> CatalogResult<bool> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();
    tokio::task::spawn_blocking(move || match PasswordHash::new(&password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    })
    .await
    .map_err(|e| CatalogError::Internal(format!("Password check task failed: {}", e)))
}

/// Minimum password length in characters, matching the `NewUser` rule
fn check_password_length(password: &str) -> CatalogResult<()> {
    if password.chars().count() < 4 {
        return Err(CatalogError::Validation(
            "password must be at least 4 characters".to_string(),
        ));
    }
    Ok(())
}
