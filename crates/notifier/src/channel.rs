//! Delivery channels — the sinks a notification payload is sent to.
//!
//! The pipeline depends only on each channel's success/failure signal;
//! transport internals stay behind the `NotificationChannel` trait.

use async_trait::async_trait;
use serde_json::json;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use architex_common::error::AppError;
use architex_common::types::{Channel, NotificationRecord};

use crate::delivery::Outbound;

/// Errors surfaced by a channel send. The retry coordinator consumes
/// these; they are never returned to the actor who triggered the
/// notification.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Mail provider error: {0}")]
    Mail(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A notification delivery transport.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn kind(&self) -> Channel;

    async fn send(&self, outbound: &Outbound) -> Result<(), DeliveryError>;
}

/// Mail delivery via a Resend-style HTTP API.
pub struct MailChannel {
    http: reqwest::Client,
    api_key: String,
    from: String,
    endpoint: String,
}

impl MailChannel {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            from,
            endpoint: "https://api.resend.com/emails".to_string(),
        }
    }

    /// Override the provider endpoint (test servers, regional hosts).
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }
}

#[async_trait]
impl NotificationChannel for MailChannel {
    fn kind(&self) -> Channel {
        Channel::Mail
    }

    async fn send(&self, outbound: &Outbound) -> Result<(), DeliveryError> {
        let mut body = outbound.mail.lines.join("\n\n");
        body.push_str(&format!("\n\n{}", outbound.mail.action_url));

        let response = self
            .http
            .post(self.endpoint.as_str())
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": [outbound.recipient.email],
                "subject": outbound.mail.subject,
                "text": body,
            }))
            .send()
            .await
            .map_err(|e| DeliveryError::Mail(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DeliveryError::Mail(format!(
                "mail provider returned {}",
                response.status()
            )));
        }

        tracing::debug!(
            recipient = %outbound.recipient.id,
            subject = %outbound.mail.subject,
            "Mail delivered"
        );
        Ok(())
    }
}

/// In-app delivery: persists a notification record row.
pub struct DatabaseChannel {
    pool: PgPool,
}

impl DatabaseChannel {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationChannel for DatabaseChannel {
    fn kind(&self) -> Channel {
        Channel::Database
    }

    async fn send(&self, outbound: &Outbound) -> Result<(), DeliveryError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, notification_type, data)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(outbound.recipient.id)
        .bind(outbound.kind.to_string())
        .bind(&outbound.record)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Read-side helpers over the in-app notification records.
pub struct NotificationRecordStore;

impl NotificationRecordStore {
    /// Unread in-app notifications for a user.
    pub async fn unread_count(pool: &PgPool, user_id: Uuid) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// All in-app notifications for a user, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<NotificationRecord>, AppError> {
        let records: Vec<NotificationRecord> = sqlx::query_as(
            "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(records)
    }
}
