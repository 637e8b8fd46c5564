//! Delivery service — attempts channel sends and owns the retry chain.
//!
//! Each (recipient, channel) delivery runs as one task. The task makes
//! the initial attempt; on failure it records a `NotificationFailure`
//! and loops: back off, re-attempt, update the record. The chain ends in
//! exactly one of the two terminal states, and entering either is
//! guarded against at-least-once re-execution. A chain that finds its
//! record already terminal stops without double-resolving or
//! double-escalating.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;

use architex_common::error::AppError;
use architex_common::types::{
    Channel, MailMessage, NotificationFailure, NotificationType, User,
};
use architex_engine::notification::Notification;
use architex_engine::users::UserDirectory;

use crate::channel::{DeliveryError, NotificationChannel};
use crate::failure::FailureStore;
use crate::retry::RetryPolicy;

/// A notification resolved to one recipient, with both payload
/// representations built from the dispatch-time snapshot.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub kind: NotificationType,
    pub recipient: User,
    pub mail: MailMessage,
    pub record: serde_json::Value,
}

pub struct DeliveryService {
    pool: PgPool,
    channels: HashMap<Channel, Arc<dyn NotificationChannel>>,
    policy: RetryPolicy,
    critical_types: Vec<NotificationType>,
    base_url: String,
}

impl DeliveryService {
    pub fn new(pool: PgPool, policy: RetryPolicy, base_url: impl Into<String>) -> Self {
        Self {
            pool,
            channels: HashMap::new(),
            policy,
            critical_types: NotificationType::CRITICAL.to_vec(),
            base_url: base_url.into(),
        }
    }

    /// Register a channel sink.
    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channels.insert(channel.kind(), channel);
        self
    }

    /// Replace the critical-type allow-list. The set is closed
    /// configuration; criticality is never inferred.
    pub fn with_critical_types(mut self, types: Vec<NotificationType>) -> Self {
        self.critical_types = types;
        self
    }

    /// Attempt a delivery and, on failure, run its retry chain to a
    /// terminal state. Never returns an error to the caller: delivery
    /// problems are recorded and escalated, not surfaced.
    pub async fn deliver(&self, outbound: Outbound, channel: Channel) {
        let Some(sink) = self.channels.get(&channel).cloned() else {
            tracing::warn!(channel = %channel, "No sink registered for channel, dropping delivery");
            return;
        };

        match sink.send(&outbound).await {
            Ok(()) => {
                tracing::debug!(
                    recipient_id = %outbound.recipient.id,
                    notification_type = %outbound.kind,
                    channel = %channel,
                    "Notification delivered"
                );
            }
            Err(error) => {
                if let Err(storage_error) = self
                    .run_retry_chain(&outbound, channel, sink.as_ref(), error)
                    .await
                {
                    tracing::error!(
                        recipient_id = %outbound.recipient.id,
                        error = %storage_error,
                        "Retry chain aborted on storage error"
                    );
                }
            }
        }
    }

    async fn run_retry_chain(
        &self,
        outbound: &Outbound,
        channel: Channel,
        sink: &dyn NotificationChannel,
        first_error: DeliveryError,
    ) -> Result<(), AppError> {
        let snapshot = json!({
            "mail": outbound.mail,
            "record": outbound.record,
        });

        let failure = FailureStore::record_initial(
            &self.pool,
            outbound.recipient.id,
            outbound.kind,
            channel,
            &first_error.to_string(),
            snapshot,
        )
        .await?;

        let first_failed_at = failure.created_at;
        let mut attempts = failure.attempts as u32;
        let mut last_error = first_error.to_string();

        loop {
            if self
                .policy
                .is_exhausted(attempts, first_failed_at, Utc::now())
            {
                return self.finish_permanently(outbound, &failure, &last_error).await;
            }

            tokio::time::sleep(self.policy.backoff(attempts)).await;

            // The window may lapse mid-backoff; re-check before sending.
            if self.policy.window_elapsed(first_failed_at, Utc::now()) {
                return self.finish_permanently(outbound, &failure, &last_error).await;
            }

            match sink.send(outbound).await {
                Ok(()) => {
                    let resolved = FailureStore::mark_resolved(&self.pool, failure.id).await?;
                    if resolved {
                        tracing::info!(
                            failure_id = %failure.id,
                            recipient_id = %outbound.recipient.id,
                            attempts = attempts + 1,
                            "Notification delivery resolved after retry"
                        );
                    }
                    return Ok(());
                }
                Err(error) => {
                    last_error = error.to_string();
                    let updated = FailureStore::record_retry_failure(
                        &self.pool,
                        failure.id,
                        attempts as i32,
                        &last_error,
                    )
                    .await?;

                    if !updated {
                        // The record advanced under someone else; this
                        // execution no longer owns the chain.
                        tracing::warn!(
                            failure_id = %failure.id,
                            "Failure record advanced concurrently, abandoning chain"
                        );
                        return Ok(());
                    }

                    attempts += 1;
                    tracing::warn!(
                        failure_id = %failure.id,
                        attempts,
                        error = %last_error,
                        "Notification retry failed"
                    );
                }
            }
        }
    }

    /// Transition a chain to `PermanentlyFailed` and escalate critical
    /// types. A record that is already terminal is left untouched and
    /// never escalated twice.
    async fn finish_permanently(
        &self,
        outbound: &Outbound,
        failure: &NotificationFailure,
        final_error: &str,
    ) -> Result<(), AppError> {
        let marked =
            FailureStore::mark_permanently_failed(&self.pool, failure.id, final_error).await?;
        if !marked {
            return Ok(());
        }

        tracing::error!(
            failure_id = %failure.id,
            recipient_id = %outbound.recipient.id,
            notification_type = %outbound.kind,
            final_error,
            "Notification delivery permanently failed"
        );

        if self.critical_types.contains(&outbound.kind) {
            self.escalate(outbound, &failure.error_message, final_error)
                .await?;
        }

        Ok(())
    }

    /// Notify every admin that a critical delivery failed for good.
    /// Escalations are sent best-effort and never retried.
    async fn escalate(
        &self,
        outbound: &Outbound,
        original_error: &str,
        final_error: &str,
    ) -> Result<(), AppError> {
        let admins = UserDirectory::admins(&self.pool).await?;

        let notification = Notification::CriticalDeliveryFailed {
            failed_type: outbound.kind,
            recipient: outbound.recipient.clone(),
            original_error: original_error.to_string(),
            final_error: final_error.to_string(),
        };

        for admin in admins {
            if !notification.should_send(&admin) {
                continue;
            }

            let escalation = Outbound {
                kind: notification.kind(),
                mail: notification.to_mail(&admin, &self.base_url),
                record: notification.to_record(),
                recipient: admin.clone(),
            };

            for channel in escalation.recipient.preferred_channels() {
                let Some(sink) = self.channels.get(&channel) else {
                    continue;
                };
                if let Err(error) = sink.send(&escalation).await {
                    tracing::error!(
                        admin_id = %escalation.recipient.id,
                        channel = %channel,
                        error = %error,
                        "Escalation delivery failed"
                    );
                }
            }
        }

        Ok(())
    }
}
