//! User repository: registration, token replacement, notification targets.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use salespulse_core::User;

use super::RepositoryError;

/// Internal row type for user queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    user_id: String,
    email: String,
    user_token: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            user_id: row.user_id,
            email: row.email,
            user_token: row.user_token,
            created_at: row.created_at,
        }
    }
}

/// A user registration about to be persisted.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_id: String,
    pub email: String,
    pub user_token: String,
    pub created_at: DateTime<Utc>,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the `userId` is already taken,
    /// `RepositoryError::Database` for any other failure.
    pub async fn create(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO users (user_id, email, user_token, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&user.user_id)
        .bind(&user.email)
        .bind(&user.user_token)
        .bind(user.created_at)
        .execute(self.pool)
        .await;

        match result {
            Ok(_) => Ok(User {
                user_id: user.user_id.clone(),
                email: user.email.clone(),
                user_token: Some(user.user_token.clone()),
                created_at: user.created_at,
            }),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                RepositoryError::Conflict("A user with this userId already exists".to_string()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace a user's push token. Returns the number of rows updated
    /// (zero when the user is unknown).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_token(
        &self,
        user_id: &str,
        user_token: &str,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query("UPDATE users SET user_token = ?1 WHERE user_id = ?2")
            .bind(user_token)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// All users holding a push token, the fan-out targets for purchase
    /// notifications.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn with_tokens(&self) -> Result<Vec<User>, RepositoryError> {
        let rows: Vec<UserRow> = sqlx::query_as(
            "SELECT user_id, email, user_token, created_at
             FROM users
             WHERE user_token IS NOT NULL AND user_token != ''
             ORDER BY created_at ASC",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
