//! Failure record store — persistence for delivery failure chains.
//!
//! All mutations enforce the record invariants in SQL: retry increments
//! are compare-and-set on the expected attempt count, and the two
//! terminal updates are mutually exclusive (`resolved_at IS NULL AND
//! failed_permanently_at IS NULL` guards). A `false` return means the
//! row had already advanced; callers must treat that as "someone else
//! owns this chain" and stop.

use sqlx::PgPool;
use uuid::Uuid;

use architex_common::error::AppError;
use architex_common::types::{Channel, NotificationFailure, NotificationType};

/// Resolution state filter for the audit listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureState {
    /// Neither terminal timestamp set; the chain may still be retrying.
    Open,
    Resolved,
    Failed,
}

pub struct FailureStore;

impl FailureStore {
    /// Record the first failed delivery of a chain (`attempts = 1`).
    pub async fn record_initial(
        pool: &PgPool,
        recipient_id: Uuid,
        notification_type: NotificationType,
        channel: Channel,
        error: &str,
        notification_data: serde_json::Value,
    ) -> Result<NotificationFailure, AppError> {
        let failure: NotificationFailure = sqlx::query_as(
            r#"
            INSERT INTO notification_failures
                (id, user_id, notification_type, channel, error_message,
                 notification_data, attempts, last_attempt_at)
            VALUES ($1, $2, $3, $4, $5, $6, 1, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(recipient_id)
        .bind(notification_type.to_string())
        .bind(channel.to_string())
        .bind(error)
        .bind(&notification_data)
        .fetch_one(pool)
        .await?;

        tracing::warn!(
            failure_id = %failure.id,
            recipient_id = %recipient_id,
            notification_type = %notification_type,
            channel = %channel,
            error,
            "Notification delivery failure recorded"
        );

        Ok(failure)
    }

    /// Record a failed retry: bump `attempts` and the last-error fields.
    ///
    /// Compare-and-set on `expected_attempts` so concurrent executions
    /// of the same chain cannot lose updates. Returns `false` when the
    /// row did not match (already advanced or terminal).
    pub async fn record_retry_failure(
        pool: &PgPool,
        id: Uuid,
        expected_attempts: i32,
        error: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notification_failures
            SET attempts = attempts + 1, last_error = $3, last_attempt_at = NOW()
            WHERE id = $1
              AND attempts = $2
              AND resolved_at IS NULL
              AND failed_permanently_at IS NULL
            "#,
        )
        .bind(id)
        .bind(expected_attempts)
        .bind(error)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Terminal success: the retry delivered. Also counts the successful
    /// attempt. Returns `false` if the record was already terminal.
    pub async fn mark_resolved(pool: &PgPool, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notification_failures
            SET attempts = attempts + 1,
                resolved_at = NOW(),
                resolution_notes = 'Successfully resent after retry',
                last_attempt_at = NOW()
            WHERE id = $1
              AND resolved_at IS NULL
              AND failed_permanently_at IS NULL
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Terminal failure: retries exhausted. Returns `false` if the
    /// record was already terminal.
    pub async fn mark_permanently_failed(
        pool: &PgPool,
        id: Uuid,
        final_error: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notification_failures
            SET failed_permanently_at = NOW(), final_error = $2
            WHERE id = $1
              AND resolved_at IS NULL
              AND failed_permanently_at IS NULL
            "#,
        )
        .bind(id)
        .bind(final_error)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Fetch a failure record by ID.
    pub async fn get(pool: &PgPool, id: Uuid) -> Result<NotificationFailure, AppError> {
        let failure: NotificationFailure =
            sqlx::query_as("SELECT * FROM notification_failures WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Notification failure {} not found", id)))?;

        Ok(failure)
    }

    /// Audit listing, optionally filtered by resolution state.
    pub async fn list(
        pool: &PgPool,
        state: Option<FailureState>,
    ) -> Result<Vec<NotificationFailure>, AppError> {
        let sql = match state {
            None => {
                "SELECT * FROM notification_failures ORDER BY created_at DESC"
            }
            Some(FailureState::Open) => {
                "SELECT * FROM notification_failures \
                 WHERE resolved_at IS NULL AND failed_permanently_at IS NULL \
                 ORDER BY created_at DESC"
            }
            Some(FailureState::Resolved) => {
                "SELECT * FROM notification_failures \
                 WHERE resolved_at IS NOT NULL ORDER BY created_at DESC"
            }
            Some(FailureState::Failed) => {
                "SELECT * FROM notification_failures \
                 WHERE failed_permanently_at IS NOT NULL ORDER BY created_at DESC"
            }
        };

        let failures: Vec<NotificationFailure> = sqlx::query_as(sql).fetch_all(pool).await?;
        Ok(failures)
    }
}
