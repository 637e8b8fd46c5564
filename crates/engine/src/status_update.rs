//! Status update service — progress reports submitted by the freelancer
//! assigned to a job.
//!
//! Mutations are author/role gated; reads are open to any authenticated
//! actor. Deletion is soft: `deleted_at` is set and the row disappears
//! from standard queries but stays reachable through the audit path.

use sqlx::PgPool;
use uuid::Uuid;

use architex_common::error::AppError;
use architex_common::types::{Actor, StatusUpdate};

use crate::jobs::JobService;

/// Caller-supplied listing order. Feeds show newest first, detail and
/// thread views oldest first; ordering is never a property of the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Optional filters for listing status updates.
#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
pub struct StatusUpdateFilter {
    pub job_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub is_read: Option<bool>,
}

/// Service layer for status update operations.
pub struct StatusUpdateService;

impl StatusUpdateService {
    /// Create a status update on a job.
    ///
    /// Only the job's assigned freelancer or an admin may submit one.
    pub async fn create(
        pool: &PgPool,
        job_id: Uuid,
        actor: Actor,
        content: &str,
    ) -> Result<StatusUpdate, AppError> {
        if content.trim().is_empty() {
            return Err(AppError::validation("content", "content is required"));
        }

        let job = JobService::get(pool, job_id).await?;

        if job.freelancer_id != Some(actor.id) && !actor.is_admin() {
            return Err(AppError::Forbidden(
                "You are not authorized to create status updates for this job".to_string(),
            ));
        }

        let update: StatusUpdate = sqlx::query_as(
            r#"
            INSERT INTO status_updates (id, job_id, user_id, content, is_read)
            VALUES ($1, $2, $3, $4, false)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(job_id)
        .bind(actor.id)
        .bind(content)
        .fetch_one(pool)
        .await?;

        tracing::info!(
            status_update_id = %update.id,
            job_id = %job_id,
            author_id = %actor.id,
            "Status update created"
        );

        Ok(update)
    }

    /// List status updates matching `filter`, in the caller's order.
    pub async fn list(
        pool: &PgPool,
        filter: StatusUpdateFilter,
        order: ListOrder,
    ) -> Result<Vec<StatusUpdate>, AppError> {
        let sql = match order {
            ListOrder::NewestFirst => {
                r#"
                SELECT * FROM status_updates
                WHERE deleted_at IS NULL
                  AND ($1::uuid IS NULL OR job_id = $1)
                  AND ($2::uuid IS NULL OR user_id = $2)
                  AND ($3::boolean IS NULL OR is_read = $3)
                ORDER BY created_at DESC
                "#
            }
            ListOrder::OldestFirst => {
                r#"
                SELECT * FROM status_updates
                WHERE deleted_at IS NULL
                  AND ($1::uuid IS NULL OR job_id = $1)
                  AND ($2::uuid IS NULL OR user_id = $2)
                  AND ($3::boolean IS NULL OR is_read = $3)
                ORDER BY created_at ASC
                "#
            }
        };

        let updates: Vec<StatusUpdate> = sqlx::query_as(sql)
            .bind(filter.job_id)
            .bind(filter.user_id)
            .bind(filter.is_read)
            .fetch_all(pool)
            .await?;

        Ok(updates)
    }

    /// Get a single active status update by ID.
    pub async fn get(pool: &PgPool, id: Uuid) -> Result<StatusUpdate, AppError> {
        let update: StatusUpdate =
            sqlx::query_as("SELECT * FROM status_updates WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .fetch_optional(pool)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Status update {} not found", id)))?;

        Ok(update)
    }

    /// Mark a status update as read. Idempotent: re-marking an
    /// already-read update succeeds without effect.
    pub async fn mark_read(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE status_updates SET is_read = true, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Status update {} not found", id)));
        }

        Ok(())
    }

    /// Soft-delete a status update. Only its author or an admin may
    /// delete it.
    pub async fn delete(pool: &PgPool, id: Uuid, actor: Actor) -> Result<(), AppError> {
        let update = Self::get(pool, id).await?;

        if update.user_id != actor.id && !actor.is_admin() {
            return Err(AppError::Forbidden(
                "You are not authorized to delete this status update".to_string(),
            ));
        }

        sqlx::query(
            "UPDATE status_updates SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;

        tracing::info!(status_update_id = %id, actor_id = %actor.id, "Status update deleted");
        Ok(())
    }

    /// Audit path: soft-deleted status updates, optionally scoped to a job.
    pub async fn list_deleted(
        pool: &PgPool,
        job_id: Option<Uuid>,
    ) -> Result<Vec<StatusUpdate>, AppError> {
        let updates: Vec<StatusUpdate> = sqlx::query_as(
            r#"
            SELECT * FROM status_updates
            WHERE deleted_at IS NOT NULL
              AND ($1::uuid IS NULL OR job_id = $1)
            ORDER BY deleted_at DESC
            "#,
        )
        .bind(job_id)
        .fetch_all(pool)
        .await?;

        Ok(updates)
    }
}
