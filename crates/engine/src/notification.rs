//! Notification definitions.
//!
//! Each domain event maps to one `Notification` variant carrying the
//! entity snapshot captured when the event fired. For "changed fields"
//! classes the before/after diff is computed by the caller while the
//! prior values are still in hand and stored on the variant; it cannot
//! be reconstructed later.
//!
//! Every variant derives two parallel representations from the same
//! snapshot: a rich mail message and a flat key-value record payload
//! for in-app delivery. `should_send` is the single rule table gating
//! delivery per candidate recipient.

use serde::{Deserialize, Serialize};
use serde_json::json;

use architex_common::types::{
    AdminComment, Job, JobStatus, MailMessage, MediatedMessage, NotificationType, StatusUpdate,
    User,
};

/// One changed field, captured at dispatch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old: serde_json::Value,
    pub new: serde_json::Value,
}

impl FieldChange {
    pub fn new(field: &str, old: serde_json::Value, new: serde_json::Value) -> Self {
        Self {
            field: field.to_string(),
            old,
            new,
        }
    }
}

/// A dispatchable notification with its snapshot payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Notification {
    NewStatusUpdate {
        status_update: StatusUpdate,
        job: Job,
        author: User,
    },
    NewAdminComment {
        comment: AdminComment,
        status_update: StatusUpdate,
        job: Job,
        admin: User,
    },
    JobProgressUpdated {
        job: Job,
        freelancer: User,
        previous_completion: i32,
    },
    JobDetailsUpdated {
        job: Job,
        client: User,
        changes: Vec<FieldChange>,
    },
    JobUpdatedByAdmin {
        job: Job,
        changes: Vec<FieldChange>,
        admin_message: Option<String>,
    },
    AdminMessageReceived {
        message: MediatedMessage,
        job: Job,
        sender: User,
    },
    /// Escalation raised when a critical notification permanently fails
    /// delivery. Never itself retried.
    CriticalDeliveryFailed {
        failed_type: NotificationType,
        recipient: User,
        original_error: String,
        final_error: String,
    },
}

impl Notification {
    pub fn kind(&self) -> NotificationType {
        match self {
            Notification::NewStatusUpdate { .. } => NotificationType::NewStatusUpdate,
            Notification::NewAdminComment { .. } => NotificationType::NewAdminComment,
            Notification::JobProgressUpdated { .. } => NotificationType::JobProgressUpdated,
            Notification::JobDetailsUpdated { .. } => NotificationType::JobDetailsUpdated,
            Notification::JobUpdatedByAdmin { .. } => NotificationType::JobUpdatedByAdmin,
            Notification::AdminMessageReceived { .. } => NotificationType::AdminMessageReceived,
            Notification::CriticalDeliveryFailed { .. } => NotificationType::CriticalDeliveryFailed,
        }
    }

    /// Per-recipient send rule, one arm per notification class.
    ///
    /// Candidate recipients are resolved by the dispatcher; this
    /// predicate decides whether a given candidate actually receives a
    /// delivery attempt.
    pub fn should_send(&self, recipient: &User) -> bool {
        match self {
            // Every admin hears about new status updates, unconditionally.
            Notification::NewStatusUpdate { .. } => true,

            // The status update's author always hears about replies.
            Notification::NewAdminComment { .. } => true,

            // Suppress minor progress changes to avoid flooding admins.
            Notification::JobProgressUpdated {
                job,
                previous_completion,
                ..
            } => {
                recipient.is_admin()
                    && (job.completion_percentage - previous_completion).abs() >= 5
            }

            // No-op edits produce no notifications.
            Notification::JobDetailsUpdated { changes, .. } => {
                recipient.is_admin() && !changes.is_empty()
            }

            Notification::JobUpdatedByAdmin { job, changes, .. } => {
                !changes.is_empty()
                    && (recipient.id == job.client_id || Some(recipient.id) == job.freelancer_id)
            }

            Notification::AdminMessageReceived { message, .. } => {
                message.needs_admin_review
                    || (recipient.id == message.to_id && recipient.is_admin())
            }

            Notification::CriticalDeliveryFailed { .. } => recipient.is_admin(),
        }
    }

    /// Build the mail representation for a recipient.
    pub fn to_mail(&self, recipient: &User, base_url: &str) -> MailMessage {
        match self {
            Notification::NewStatusUpdate {
                status_update,
                job,
                author,
            } => MailMessage {
                subject: format!("New Status Update for Job: {}", job.title),
                lines: vec![
                    format!("Hello {},", recipient.name),
                    format!(
                        "A new status update has been submitted for job: {}",
                        job.title
                    ),
                    format!("From: {}", author.name),
                    format!("Update: {}", status_update.content),
                    "Thank you for using Architex!".to_string(),
                ],
                action_url: format!("{}/jobs/{}", base_url, job.id),
            },

            Notification::NewAdminComment {
                comment,
                job,
                admin,
                ..
            } => MailMessage {
                subject: "Admin Response to Your Status Update".to_string(),
                lines: vec![
                    format!("Hello {},", recipient.name),
                    format!(
                        "An admin has responded to your status update for job: {}",
                        job.title
                    ),
                    format!("From: {}", admin.name),
                    format!("Comment: {}", comment.content),
                    "Thank you for using Architex!".to_string(),
                ],
                action_url: format!("{}/jobs/{}", base_url, job.id),
            },

            Notification::JobProgressUpdated { job, .. } => MailMessage {
                subject: format!("Job Progress Update: {}", job.title),
                lines: vec![
                    format!("The freelancer has updated progress on job: {}", job.title),
                    format!("Current completion: {}%", job.completion_percentage),
                    "Progress Notes:".to_string(),
                    job.progress_notes.clone().unwrap_or_default(),
                    "Please review and contact the freelancer if you need any clarification."
                        .to_string(),
                ],
                action_url: format!("{}/admin/jobs/{}", base_url, job.id),
            },

            Notification::JobDetailsUpdated { job, changes, .. } => {
                let mut lines = vec![format!(
                    "The client has updated details for job: {}",
                    job.title
                )];
                for change in changes {
                    lines.push(format!("Changed {}:", change.field));
                    lines.push(format!("From: {}", display_value(&change.old)));
                    lines.push(format!("To: {}", display_value(&change.new)));
                }
                lines.push(
                    "Please review the changes and take appropriate action if needed.".to_string(),
                );

                MailMessage {
                    subject: format!("Job Details Updated: {}", job.title),
                    lines,
                    action_url: format!("{}/admin/jobs/{}", base_url, job.id),
                }
            }

            Notification::JobUpdatedByAdmin {
                job,
                changes,
                admin_message,
            } => {
                let mut lines = vec![format!(
                    "An administrator has made changes to the job: {}",
                    job.title
                )];

                if let Some(message) = admin_message {
                    lines.push("Admin Message:".to_string());
                    lines.push(message.clone());
                }

                for change in changes {
                    if change.field == "status" {
                        lines.push(format!(
                            "Job status has been changed from {} to {}",
                            display_value(&change.old),
                            display_value(&change.new)
                        ));
                        match change.new.as_str() {
                            Some("completed") => lines.push(
                                "Please review the completion and submit any feedback."
                                    .to_string(),
                            ),
                            Some("in_progress") => {
                                lines.push("Work can now begin on this job.".to_string())
                            }
                            _ => {}
                        }
                        continue;
                    }

                    lines.push(format!("Updated {}:", change.field));
                    lines.push(format!("From: {}", display_value(&change.old)));
                    lines.push(format!("To: {}", display_value(&change.new)));
                }

                lines.push(
                    "Please review these changes and contact support if you have any questions."
                        .to_string(),
                );

                MailMessage {
                    subject: format!("Job Update from Admin: {}", job.title),
                    lines,
                    action_url: format!("{}/jobs/{}", base_url, job.id),
                }
            }

            Notification::AdminMessageReceived {
                message,
                job,
                sender,
            } => MailMessage {
                subject: format!("New Message Received: {}", job.title),
                lines: vec![
                    format!(
                        "You have received a new message from {} ({})",
                        sender.name, sender.role
                    ),
                    format!("Job: {}", job.title),
                    "Message:".to_string(),
                    message.body.clone(),
                    "Please review and take appropriate action.".to_string(),
                ],
                action_url: format!("{}/admin/messages/{}", base_url, message.id),
            },

            Notification::CriticalDeliveryFailed {
                failed_type,
                recipient: failed_recipient,
                original_error,
                final_error,
            } => MailMessage {
                subject: "Critical Notification Delivery Failure".to_string(),
                lines: vec![
                    format!(
                        "Delivery of a {} notification to {} has permanently failed.",
                        failed_type, failed_recipient.name
                    ),
                    format!("Original error: {}", original_error),
                    format!("Final error: {}", final_error),
                    "Manual follow-up is required.".to_string(),
                ],
                action_url: format!("{}/admin/notification-failures", base_url),
            },
        }
    }

    /// Build the flat key-value record payload for in-app delivery.
    pub fn to_record(&self) -> serde_json::Value {
        match self {
            Notification::NewStatusUpdate {
                status_update,
                job,
                author,
            } => json!({
                "status_update_id": status_update.id,
                "job_id": job.id,
                "job_title": job.title,
                "architect_id": author.id,
                "architect_name": author.name,
                "content": status_update.content,
                "created_at": status_update.created_at,
            }),

            Notification::NewAdminComment {
                comment,
                status_update,
                job,
                admin,
            } => json!({
                "admin_comment_id": comment.id,
                "status_update_id": status_update.id,
                "job_id": job.id,
                "job_title": job.title,
                "admin_id": admin.id,
                "admin_name": admin.name,
                "content": comment.content,
                "created_at": comment.created_at,
            }),

            Notification::JobProgressUpdated {
                job,
                freelancer,
                previous_completion,
            } => json!({
                "job_id": job.id,
                "job_title": job.title,
                "freelancer_id": freelancer.id,
                "freelancer_name": freelancer.name,
                "completion_percentage": job.completion_percentage,
                "progress_notes": job.progress_notes,
                "previous_completion": previous_completion,
                "updated_at": job.updated_at,
            }),

            Notification::JobDetailsUpdated {
                job,
                client,
                changes,
            } => json!({
                "job_id": job.id,
                "job_title": job.title,
                "client_id": client.id,
                "client_name": client.name,
                "changes": changes_map(changes),
                "updated_at": job.updated_at,
                "needs_review": true,
            }),

            Notification::JobUpdatedByAdmin {
                job,
                changes,
                admin_message,
            } => json!({
                "job_id": job.id,
                "job_title": job.title,
                "admin_message": admin_message,
                "changes": changes_map(changes),
                "updated_at": job.updated_at,
                "status": job.status,
                "requires_action": matches!(job.status, JobStatus::Completed | JobStatus::Cancelled),
                "can_start_work": job.status == JobStatus::InProgress,
            }),

            Notification::AdminMessageReceived {
                message,
                job,
                sender,
            } => json!({
                "message_id": message.id,
                "job_id": message.job_id,
                "sender_id": message.from_id,
                "sender_name": sender.name,
                "sender_role": sender.role,
                "job_title": job.title,
                "message_preview": preview(&message.body),
                "needs_admin_review": message.needs_admin_review,
            }),

            Notification::CriticalDeliveryFailed {
                failed_type,
                recipient,
                original_error,
                final_error,
            } => json!({
                "notification_type": failed_type,
                "recipient_id": recipient.id,
                "recipient_name": recipient.name,
                "original_error": original_error,
                "final_error": final_error,
            }),
        }
    }
}

/// Render a JSON value for a mail body line. Strings are shown bare,
/// everything else in its JSON form.
fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Collapse a change list into a `{field: {old, new}}` map.
fn changes_map(changes: &[FieldChange]) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for change in changes {
        map.insert(
            change.field.clone(),
            json!({ "old": change.old, "new": change.new }),
        );
    }
    serde_json::Value::Object(map)
}

/// First 100 characters of a message body.
fn preview(body: &str) -> String {
    body.chars().take(100).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use architex_common::types::Role;
    use chrono::Utc;
    use uuid::Uuid;

    fn make_user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test User".to_string(),
            email: "user@example.com".to_string(),
            role,
            notification_preferences: json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn make_job(status: JobStatus, completion: i32) -> Job {
        Job {
            id: Uuid::new_v4(),
            title: "Office renovation".to_string(),
            client_id: Uuid::new_v4(),
            freelancer_id: Some(Uuid::new_v4()),
            status,
            completion_percentage: completion,
            progress_notes: Some("on track".to_string()),
            admin_notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn make_status_update(job: &Job, author: &User) -> StatusUpdate {
        StatusUpdate {
            id: Uuid::new_v4(),
            job_id: job.id,
            user_id: author.id,
            content: "Framing complete, starting drywall".to_string(),
            is_read: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_progress_change_below_threshold_suppressed() {
        let admin = make_user(Role::Admin);
        let job = make_job(JobStatus::InProgress, 52);
        let notification = Notification::JobProgressUpdated {
            job,
            freelancer: make_user(Role::Freelancer),
            previous_completion: 50,
        };
        assert!(!notification.should_send(&admin));
    }

    #[test]
    fn test_progress_change_at_threshold_sent() {
        let admin = make_user(Role::Admin);
        let job = make_job(JobStatus::InProgress, 56);
        let notification = Notification::JobProgressUpdated {
            job,
            freelancer: make_user(Role::Freelancer),
            previous_completion: 50,
        };
        assert!(notification.should_send(&admin));
    }

    #[test]
    fn test_progress_regression_counts_as_absolute_change() {
        let admin = make_user(Role::Admin);
        let job = make_job(JobStatus::InProgress, 40);
        let notification = Notification::JobProgressUpdated {
            job,
            freelancer: make_user(Role::Freelancer),
            previous_completion: 50,
        };
        assert!(notification.should_send(&admin));
    }

    #[test]
    fn test_progress_update_not_sent_to_non_admin() {
        let client = make_user(Role::Client);
        let job = make_job(JobStatus::InProgress, 60);
        let notification = Notification::JobProgressUpdated {
            job,
            freelancer: make_user(Role::Freelancer),
            previous_completion: 50,
        };
        assert!(!notification.should_send(&client));
    }

    #[test]
    fn test_details_update_with_empty_diff_suppressed() {
        let admin = make_user(Role::Admin);
        let notification = Notification::JobDetailsUpdated {
            job: make_job(JobStatus::Open, 0),
            client: make_user(Role::Client),
            changes: vec![],
        };
        assert!(!notification.should_send(&admin));
    }

    #[test]
    fn test_details_update_with_changes_sent_to_admin() {
        let admin = make_user(Role::Admin);
        let notification = Notification::JobDetailsUpdated {
            job: make_job(JobStatus::Open, 0),
            client: make_user(Role::Client),
            changes: vec![FieldChange::new(
                "title",
                json!("Office renovation"),
                json!("Office and lobby renovation"),
            )],
        };
        assert!(notification.should_send(&admin));
    }

    #[test]
    fn test_admin_update_sent_only_to_job_parties() {
        let job = make_job(JobStatus::InProgress, 10);
        let mut client = make_user(Role::Client);
        client.id = job.client_id;
        let mut freelancer = make_user(Role::Freelancer);
        freelancer.id = job.freelancer_id.unwrap();
        let stranger = make_user(Role::Client);

        let notification = Notification::JobUpdatedByAdmin {
            job,
            changes: vec![FieldChange::new(
                "status",
                json!("assigned"),
                json!("in_progress"),
            )],
            admin_message: None,
        };

        assert!(notification.should_send(&client));
        assert!(notification.should_send(&freelancer));
        assert!(!notification.should_send(&stranger));
    }

    #[test]
    fn test_admin_update_with_empty_diff_suppressed() {
        let job = make_job(JobStatus::InProgress, 10);
        let mut client = make_user(Role::Client);
        client.id = job.client_id;

        let notification = Notification::JobUpdatedByAdmin {
            job,
            changes: vec![],
            admin_message: Some("nothing actually changed".to_string()),
        };
        assert!(!notification.should_send(&client));
    }

    #[test]
    fn test_admin_update_record_flags_completed() {
        let notification = Notification::JobUpdatedByAdmin {
            job: make_job(JobStatus::Completed, 100),
            changes: vec![FieldChange::new(
                "status",
                json!("in_review"),
                json!("completed"),
            )],
            admin_message: None,
        };
        let record = notification.to_record();
        assert_eq!(record["requires_action"], true);
        assert_eq!(record["can_start_work"], false);
    }

    #[test]
    fn test_admin_update_record_flags_in_progress() {
        let notification = Notification::JobUpdatedByAdmin {
            job: make_job(JobStatus::InProgress, 0),
            changes: vec![FieldChange::new(
                "status",
                json!("assigned"),
                json!("in_progress"),
            )],
            admin_message: None,
        };
        let record = notification.to_record();
        assert_eq!(record["requires_action"], false);
        assert_eq!(record["can_start_work"], true);
    }

    #[test]
    fn test_mediated_message_requires_review_or_direct_admin_target() {
        let job = make_job(JobStatus::InProgress, 10);
        let admin = make_user(Role::Admin);
        let other_admin = make_user(Role::Admin);
        let sender = make_user(Role::Client);

        let flagged = Notification::AdminMessageReceived {
            message: MediatedMessage {
                id: Uuid::new_v4(),
                job_id: job.id,
                from_id: sender.id,
                to_id: admin.id,
                body: "Deliverables do not match requirements".to_string(),
                needs_admin_review: true,
            },
            job: job.clone(),
            sender: sender.clone(),
        };
        // Flagged for review: any admin candidate qualifies.
        assert!(flagged.should_send(&admin));
        assert!(flagged.should_send(&other_admin));

        let direct = Notification::AdminMessageReceived {
            message: MediatedMessage {
                id: Uuid::new_v4(),
                job_id: job.id,
                from_id: sender.id,
                to_id: admin.id,
                body: "Quick question".to_string(),
                needs_admin_review: false,
            },
            job,
            sender,
        };
        // Unflagged: only the addressed admin qualifies.
        assert!(direct.should_send(&admin));
        assert!(!direct.should_send(&other_admin));
    }

    #[test]
    fn test_new_status_update_mail_payload() {
        let admin = make_user(Role::Admin);
        let author = make_user(Role::Freelancer);
        let job = make_job(JobStatus::InProgress, 30);
        let status_update = make_status_update(&job, &author);

        let notification = Notification::NewStatusUpdate {
            status_update: status_update.clone(),
            job: job.clone(),
            author: author.clone(),
        };
        let mail = notification.to_mail(&admin, "https://architex.test");

        assert!(mail.subject.contains(&job.title));
        assert!(mail.lines.iter().any(|l| l.contains(&status_update.content)));
        assert!(mail.lines.iter().any(|l| l.contains(&author.name)));
        assert_eq!(
            mail.action_url,
            format!("https://architex.test/jobs/{}", job.id)
        );
    }

    #[test]
    fn test_new_status_update_record_payload() {
        let author = make_user(Role::Freelancer);
        let job = make_job(JobStatus::InProgress, 30);
        let status_update = make_status_update(&job, &author);

        let notification = Notification::NewStatusUpdate {
            status_update: status_update.clone(),
            job: job.clone(),
            author,
        };
        let record = notification.to_record();

        assert_eq!(record["job_id"], json!(job.id));
        assert_eq!(record["content"], json!(status_update.content));
        assert_eq!(record["status_update_id"], json!(status_update.id));
    }

    #[test]
    fn test_status_change_mail_gets_transition_line() {
        let job = make_job(JobStatus::Completed, 100);
        let mut client = make_user(Role::Client);
        client.id = job.client_id;

        let notification = Notification::JobUpdatedByAdmin {
            job,
            changes: vec![FieldChange::new(
                "status",
                json!("in_review"),
                json!("completed"),
            )],
            admin_message: None,
        };
        let mail = notification.to_mail(&client, "https://architex.test");

        assert!(mail.lines.iter().any(|l| l
            .contains("Job status has been changed from in_review to completed")));
        assert!(mail
            .lines
            .iter()
            .any(|l| l.contains("Please review the completion")));
    }

    #[test]
    fn test_message_preview_truncated_to_100_chars() {
        let body = "x".repeat(250);
        assert_eq!(preview(&body).chars().count(), 100);
    }
}
