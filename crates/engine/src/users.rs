//! Read-only user directory.
//!
//! Admin recipient sets are resolved against the users table at dispatch
//! time, never cached, so capability changes take effect immediately.

use sqlx::PgPool;
use uuid::Uuid;

use architex_common::error::AppError;
use architex_common::types::{Role, User};

pub struct UserDirectory;

impl UserDirectory {
    /// Fetch a user by ID.
    pub async fn get(pool: &PgPool, id: Uuid) -> Result<User, AppError> {
        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

        Ok(user)
    }

    /// All users holding the admin capability.
    pub async fn admins(pool: &PgPool) -> Result<Vec<User>, AppError> {
        let admins: Vec<User> =
            sqlx::query_as("SELECT * FROM users WHERE role = $1 ORDER BY created_at ASC")
                .bind(Role::Admin)
                .fetch_all(pool)
                .await?;

        Ok(admins)
    }
}
