use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Registration,
    ConsultationComplete,
    AppointmentReminder,
    Custom,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationKind::Registration => "registration",
            NotificationKind::ConsultationComplete => "consultation_complete",
            NotificationKind::AppointmentReminder => "appointment_reminder",
            NotificationKind::Custom => "custom",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registration" => Ok(NotificationKind::Registration),
            "consultation_complete" => Ok(NotificationKind::ConsultationComplete),
            "appointment_reminder" => Ok(NotificationKind::AppointmentReminder),
            "custom" => Ok(NotificationKind::Custom),
            _ => Err(anyhow::anyhow!("Unknown notification kind: {s}")),
        }
    }
}

/// Log entry status. Every entry starts PENDING and moves exactly once to
/// SENT, FAILED or SKIPPED; terminal entries are never mutated again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
    Skipped,
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
            NotificationStatus::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for NotificationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(NotificationStatus::Pending),
            "sent" => Ok(NotificationStatus::Sent),
            "failed" => Ok(NotificationStatus::Failed),
            "skipped" => Ok(NotificationStatus::Skipped),
            _ => Err(anyhow::anyhow!("Unknown notification status: {s}")),
        }
    }
}

/// Append-only audit record of one delivery attempt.
/// Kind and status are stored and fetched as TEXT.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationLogEntry {
    pub id: Uuid,
    pub camp_id: Uuid,
    pub visitor_id: Uuid,
    pub kind: String,
    pub body: String,
    pub status: String,
    pub detail: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub camp_id: Uuid,
    pub visitor_id: Uuid,
    pub kind: NotificationKind,
    pub body: String,
}

/// Filters for the operational triage query over the log.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogFilter {
    pub visitor_id: Option<Uuid>,
    pub kind: Option<NotificationKind>,
    pub status: Option<NotificationStatus>,
}

/// Outcome of one dispatch attempt. Skipped and Failed never propagate to
/// the operation that triggered the dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    Sent,
    Skipped(String),
    Failed(String),
}

/// Request body for the manual notify endpoint (custom / reminder kinds).
#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    pub kind: NotificationKind,
    pub text: Option<String>,
    pub appointment_at: Option<DateTime<Utc>>,
}
