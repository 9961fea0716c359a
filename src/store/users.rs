use async_trait::async_trait;
use derive_more::Display;
use sqlx::MySqlPool;

use crate::{
    error::{AppError, is_duplicate_key},
    model::user::{NewUser, UserCredentials, UserSummary},
};

#[derive(Debug, Display)]
pub enum StoreError {
    #[display(fmt = "username already exists")]
    Duplicate,
    #[display(fmt = "{}", _0)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if is_duplicate_key(&e) {
            StoreError::Duplicate
        } else {
            StoreError::Database(e)
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate => AppError::conflict("Username already exists"),
            StoreError::Database(e) => e.into(),
        }
    }
}

/// Credential storage used by login and user administration.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserCredentials>, StoreError>;

    async fn username_exists(&self, username: &str) -> Result<bool, StoreError>;

    /// Returns the new user's id.
    async fn create(&self, user: &NewUser) -> Result<i64, StoreError>;

    async fn list(&self) -> Result<Vec<UserSummary>, StoreError>;

    /// Replaces the stored hash. Returns the username, or `None` when no
    /// such user exists.
    async fn reset_password(&self, user_id: i64, password_hash: &str) -> Result<Option<String>, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;
}

pub struct MySqlUserStore {
    pool: MySqlPool,
}

impl MySqlUserStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for MySqlUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserCredentials>, StoreError> {
        let user = sqlx::query_as::<_, UserCredentials>(
            r#"
            SELECT id, userName AS username, password, role
            FROM users
            WHERE userName = ?
            LIMIT 1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn username_exists(&self, username: &str) -> Result<bool, StoreError> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE userName = ? LIMIT 1)",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;

        Ok(found != 0)
    }

    async fn create(&self, user: &NewUser) -> Result<i64, StoreError> {
        let result = sqlx::query("INSERT INTO users (userName, password, role) VALUES (?, ?, ?)")
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.role.as_ref())
            .execute(&self.pool)
            .await?;

        Ok(result.last_insert_id() as i64)
    }

    async fn list(&self) -> Result<Vec<UserSummary>, StoreError> {
        let users = sqlx::query_as::<_, UserSummary>(
            "SELECT id, userName AS username, role FROM users ORDER BY userName ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn reset_password(&self, user_id: i64, password_hash: &str) -> Result<Option<String>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let username = sqlx::query_scalar::<_, String>("SELECT userName FROM users WHERE id = ? FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(username) = username else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query("UPDATE users SET password = ? WHERE id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(username))
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }
}
