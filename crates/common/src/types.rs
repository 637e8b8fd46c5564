use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Platform roles. `Freelancer` is surfaced as "architect" in user-facing copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Client,
    Freelancer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Client => write!(f, "client"),
            Role::Freelancer => write!(f, "freelancer"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "client" => Ok(Role::Client),
            "freelancer" => Ok(Role::Freelancer),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Job lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Open,
    Assigned,
    InProgress,
    InReview,
    Completed,
    Cancelled,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Open => write!(f, "open"),
            JobStatus::Assigned => write!(f, "assigned"),
            JobStatus::InProgress => write!(f, "in_progress"),
            JobStatus::InReview => write!(f, "in_review"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Notification delivery transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Mail,
    Database,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Mail, Channel::Database];
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Mail => write!(f, "mail"),
            Channel::Database => write!(f, "database"),
        }
    }
}

/// Notification classes. Stored as text tags on in-app records and
/// failure rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    NewStatusUpdate,
    NewAdminComment,
    JobProgressUpdated,
    JobDetailsUpdated,
    JobUpdatedByAdmin,
    AdminMessageReceived,
    CriticalDeliveryFailed,
    PaymentFailed,
    SecurityAlert,
}

impl NotificationType {
    /// Classes whose permanent delivery failure is escalated to admins.
    /// A closed set; the retry pipeline never infers criticality.
    pub const CRITICAL: [NotificationType; 3] = [
        NotificationType::JobUpdatedByAdmin,
        NotificationType::PaymentFailed,
        NotificationType::SecurityAlert,
    ];
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationType::NewStatusUpdate => write!(f, "new_status_update"),
            NotificationType::NewAdminComment => write!(f, "new_admin_comment"),
            NotificationType::JobProgressUpdated => write!(f, "job_progress_updated"),
            NotificationType::JobDetailsUpdated => write!(f, "job_details_updated"),
            NotificationType::JobUpdatedByAdmin => write!(f, "job_updated_by_admin"),
            NotificationType::AdminMessageReceived => write!(f, "admin_message_received"),
            NotificationType::CriticalDeliveryFailed => write!(f, "critical_delivery_failed"),
            NotificationType::PaymentFailed => write!(f, "payment_failed"),
            NotificationType::SecurityAlert => write!(f, "security_alert"),
        }
    }
}

/// A user in the system.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Per-user channel opt-outs, e.g. `{"mail": false}`.
    pub notification_preferences: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Channels this user accepts deliveries on. A channel is enabled
    /// unless the preferences object maps its name to `false`.
    pub fn preferred_channels(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|channel| {
                self.notification_preferences
                    .get(channel.to_string())
                    .and_then(|v| v.as_bool())
                    .unwrap_or(true)
            })
            .collect()
    }
}

/// The acting identity behind a request, reduced to what mutation
/// gating needs.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A job posting. CRUD lives outside this core; notification paths
/// consume snapshots of it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub title: String,
    pub client_id: Uuid,
    pub freelancer_id: Option<Uuid>,
    pub status: JobStatus,
    pub completion_percentage: i32,
    pub progress_notes: Option<String>,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A progress report submitted by the freelancer assigned to a job.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StatusUpdate {
    pub id: Uuid,
    pub job_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker. Standard queries exclude rows where this is
    /// set; audit queries surface them.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// An admin reply on a status update.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AdminComment {
    pub id: Uuid,
    pub status_update_id: Uuid,
    pub admin_id: Uuid,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A message routed through admin mediation. The messaging subsystem is
/// external; this is the snapshot its events hand to the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediatedMessage {
    pub id: Uuid,
    pub job_id: Uuid,
    pub from_id: Uuid,
    pub to_id: Uuid,
    pub body: String,
    pub needs_admin_review: bool,
}

/// An in-app notification row (the `database` channel sink).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub data: serde_json::Value,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Audit/state row tracking one delivery failure chain and its retries.
///
/// `attempts` counts every delivery attempt in the chain, including a
/// final successful one. Once either `resolved_at` or
/// `failed_permanently_at` is set the row is terminal and immutable.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationFailure {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub channel: Channel,
    pub error_message: String,
    pub notification_data: serde_json::Value,
    pub attempts: i32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
    pub failed_permanently_at: Option<DateTime<Utc>>,
    pub final_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NotificationFailure {
    pub fn is_terminal(&self) -> bool {
        self.resolved_at.is_some() || self.failed_permanently_at.is_some()
    }
}

/// Rich mail representation of a notification: a subject, ordered body
/// lines and a call-to-action URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailMessage {
    pub subject: String,
    pub lines: Vec<String>,
    pub action_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_user(preferences: serde_json::Value) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            role: Role::Client,
            notification_preferences: preferences,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_default_preferences_enable_all_channels() {
        let user = make_user(serde_json::json!({}));
        assert_eq!(
            user.preferred_channels(),
            vec![Channel::Mail, Channel::Database]
        );
    }

    #[test]
    fn test_mail_opt_out_leaves_database_only() {
        let user = make_user(serde_json::json!({"mail": false}));
        assert_eq!(user.preferred_channels(), vec![Channel::Database]);
    }

    #[test]
    fn test_explicit_true_preference_is_enabled() {
        let user = make_user(serde_json::json!({"mail": true, "database": false}));
        assert_eq!(user.preferred_channels(), vec![Channel::Mail]);
    }

    #[test]
    fn test_critical_set_membership() {
        assert!(NotificationType::CRITICAL.contains(&NotificationType::JobUpdatedByAdmin));
        assert!(!NotificationType::CRITICAL.contains(&NotificationType::NewStatusUpdate));
        assert!(!NotificationType::CRITICAL.contains(&NotificationType::CriticalDeliveryFailed));
    }
}
