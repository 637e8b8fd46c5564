//! Admin comment service — replies posted by admin-capability actors on
//! status updates. Comments are deletable only by their own author.

use sqlx::PgPool;
use uuid::Uuid;

use architex_common::error::AppError;
use architex_common::types::{Actor, AdminComment};

use crate::status_update::StatusUpdateService;

/// Service layer for admin comment operations.
pub struct AdminCommentService;

impl AdminCommentService {
    /// Create a comment on a status update. Admin capability required;
    /// the parent must exist and be active.
    pub async fn create(
        pool: &PgPool,
        status_update_id: Uuid,
        actor: Actor,
        content: &str,
    ) -> Result<AdminComment, AppError> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden(
                "Only administrators can add comments to status updates".to_string(),
            ));
        }

        if content.trim().is_empty() {
            return Err(AppError::validation("content", "content is required"));
        }

        // Parent must be active; comments never attach to deleted updates.
        let parent = StatusUpdateService::get(pool, status_update_id).await?;

        let comment: AdminComment = sqlx::query_as(
            r#"
            INSERT INTO admin_comments (id, status_update_id, admin_id, content, is_read)
            VALUES ($1, $2, $3, $4, false)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(parent.id)
        .bind(actor.id)
        .bind(content)
        .fetch_one(pool)
        .await?;

        tracing::info!(
            admin_comment_id = %comment.id,
            status_update_id = %status_update_id,
            admin_id = %actor.id,
            "Admin comment created"
        );

        Ok(comment)
    }

    /// List active comments on a status update, oldest first (thread view).
    pub async fn list_by_status_update(
        pool: &PgPool,
        status_update_id: Uuid,
    ) -> Result<Vec<AdminComment>, AppError> {
        let comments: Vec<AdminComment> = sqlx::query_as(
            r#"
            SELECT * FROM admin_comments
            WHERE status_update_id = $1 AND deleted_at IS NULL
            ORDER BY created_at ASC
            "#,
        )
        .bind(status_update_id)
        .fetch_all(pool)
        .await?;

        Ok(comments)
    }

    /// Get a single active comment by ID.
    pub async fn get(pool: &PgPool, id: Uuid) -> Result<AdminComment, AppError> {
        let comment: AdminComment =
            sqlx::query_as("SELECT * FROM admin_comments WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .fetch_optional(pool)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Admin comment {} not found", id)))?;

        Ok(comment)
    }

    /// Mark a comment as read. Idempotent.
    pub async fn mark_read(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE admin_comments SET is_read = true, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Admin comment {} not found", id)));
        }

        Ok(())
    }

    /// Soft-delete a comment. Only the admin who wrote it may delete it.
    pub async fn delete(pool: &PgPool, id: Uuid, actor: Actor) -> Result<(), AppError> {
        let comment = Self::get(pool, id).await?;

        if comment.admin_id != actor.id {
            return Err(AppError::Forbidden(
                "You are not authorized to delete this comment".to_string(),
            ));
        }

        sqlx::query(
            "UPDATE admin_comments SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;

        tracing::info!(admin_comment_id = %id, admin_id = %actor.id, "Admin comment deleted");
        Ok(())
    }
}
