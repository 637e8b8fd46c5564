//! Notification dispatcher.
//!
//! For a domain event, resolves the candidate recipient set, applies the
//! per-notification send rule, filters channels by each recipient's
//! stored preferences, and spawns one delivery task per (recipient,
//! channel). Admin recipient sets are queried at dispatch time so
//! capability changes are never served stale.

use std::sync::Arc;

use sqlx::PgPool;

use architex_common::error::AppError;
use architex_common::types::{AdminComment, Job, MediatedMessage, StatusUpdate, User};
use architex_engine::jobs::JobService;
use architex_engine::notification::{FieldChange, Notification};
use architex_engine::status_update::StatusUpdateService;
use architex_engine::users::UserDirectory;

use crate::delivery::{DeliveryService, Outbound};

#[derive(Clone)]
pub struct Dispatcher {
    pool: PgPool,
    delivery: Arc<DeliveryService>,
    base_url: String,
}

impl Dispatcher {
    pub fn new(pool: PgPool, delivery: Arc<DeliveryService>, base_url: impl Into<String>) -> Self {
        Self {
            pool,
            delivery,
            base_url: base_url.into(),
        }
    }

    /// Dispatch a notification: resolve candidates, gate by send rule,
    /// fan out per preferred channel. Returns how many recipients got a
    /// delivery attempt.
    pub async fn dispatch(&self, notification: Notification) -> Result<u32, AppError> {
        let candidates = self.candidates(&notification).await?;
        let mut dispatched = 0u32;

        for recipient in candidates {
            if !notification.should_send(&recipient) {
                tracing::debug!(
                    notification_type = %notification.kind(),
                    recipient_id = %recipient.id,
                    "Notification suppressed by send rule"
                );
                continue;
            }

            let outbound = Outbound {
                kind: notification.kind(),
                mail: notification.to_mail(&recipient, &self.base_url),
                record: notification.to_record(),
                recipient,
            };

            for channel in outbound.recipient.preferred_channels() {
                let delivery = Arc::clone(&self.delivery);
                let outbound = outbound.clone();
                tokio::spawn(async move {
                    delivery.deliver(outbound, channel).await;
                });
            }

            dispatched += 1;
        }

        tracing::info!(
            notification_type = %notification.kind(),
            recipients = dispatched,
            "Notification dispatched"
        );

        Ok(dispatched)
    }

    /// Resolve the candidate recipient set for a notification class.
    async fn candidates(&self, notification: &Notification) -> Result<Vec<User>, AppError> {
        match notification {
            Notification::NewStatusUpdate { .. }
            | Notification::JobProgressUpdated { .. }
            | Notification::JobDetailsUpdated { .. }
            | Notification::AdminMessageReceived { .. }
            | Notification::CriticalDeliveryFailed { .. } => {
                UserDirectory::admins(&self.pool).await
            }

            Notification::NewAdminComment { status_update, .. } => {
                let author = UserDirectory::get(&self.pool, status_update.user_id).await?;
                Ok(vec![author])
            }

            Notification::JobUpdatedByAdmin { job, .. } => {
                let mut parties = vec![UserDirectory::get(&self.pool, job.client_id).await?];
                if let Some(freelancer_id) = job.freelancer_id {
                    parties.push(UserDirectory::get(&self.pool, freelancer_id).await?);
                }
                Ok(parties)
            }
        }
    }

    /// A freelancer submitted a status update: notify admins.
    pub async fn status_update_created(
        &self,
        status_update: StatusUpdate,
    ) -> Result<u32, AppError> {
        let job = JobService::get(&self.pool, status_update.job_id).await?;
        let author = UserDirectory::get(&self.pool, status_update.user_id).await?;

        self.dispatch(Notification::NewStatusUpdate {
            status_update,
            job,
            author,
        })
        .await
    }

    /// An admin commented on a status update: notify its author.
    pub async fn admin_comment_created(&self, comment: AdminComment) -> Result<u32, AppError> {
        let status_update =
            StatusUpdateService::get(&self.pool, comment.status_update_id).await?;
        let job = JobService::get(&self.pool, status_update.job_id).await?;
        let admin = UserDirectory::get(&self.pool, comment.admin_id).await?;

        self.dispatch(Notification::NewAdminComment {
            comment,
            status_update,
            job,
            admin,
        })
        .await
    }

    /// A freelancer moved a job's completion percentage. `job` is the
    /// post-update snapshot; `previous_completion` the transient prior
    /// value.
    pub async fn job_progress_updated(
        &self,
        job: Job,
        previous_completion: i32,
    ) -> Result<u32, AppError> {
        let Some(freelancer_id) = job.freelancer_id else {
            tracing::warn!(job_id = %job.id, "Progress update on unassigned job, nothing to notify");
            return Ok(0);
        };
        let freelancer = UserDirectory::get(&self.pool, freelancer_id).await?;

        self.dispatch(Notification::JobProgressUpdated {
            job,
            freelancer,
            previous_completion,
        })
        .await
    }

    /// A client edited job details. `changes` is the before/after diff
    /// captured while the prior values were still available.
    pub async fn job_details_updated(
        &self,
        job: Job,
        changes: Vec<FieldChange>,
    ) -> Result<u32, AppError> {
        let client = UserDirectory::get(&self.pool, job.client_id).await?;

        self.dispatch(Notification::JobDetailsUpdated {
            job,
            client,
            changes,
        })
        .await
    }

    /// An admin changed a job: notify the job's parties.
    pub async fn job_updated_by_admin(
        &self,
        job: Job,
        changes: Vec<FieldChange>,
        admin_message: Option<String>,
    ) -> Result<u32, AppError> {
        self.dispatch(Notification::JobUpdatedByAdmin {
            job,
            changes,
            admin_message,
        })
        .await
    }

    /// A message entered admin mediation.
    pub async fn admin_message_received(
        &self,
        message: MediatedMessage,
    ) -> Result<u32, AppError> {
        let job = JobService::get(&self.pool, message.job_id).await?;
        let sender = UserDirectory::get(&self.pool, message.from_id).await?;

        self.dispatch(Notification::AdminMessageReceived {
            message,
            job,
            sender,
        })
        .await
    }
}
