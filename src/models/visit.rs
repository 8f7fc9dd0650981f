use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Visit states. IN_PROGRESS and CANCELLED are declared for forward
/// compatibility; no transition currently drives them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    Registered,
    InProgress,
    Completed,
    Cancelled,
}

impl std::fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VisitStatus::Registered => "registered",
            VisitStatus::InProgress => "in_progress",
            VisitStatus::Completed => "completed",
            VisitStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for VisitStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registered" => Ok(VisitStatus::Registered),
            "in_progress" => Ok(VisitStatus::InProgress),
            "completed" => Ok(VisitStatus::Completed),
            "cancelled" => Ok(VisitStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Unknown visit status: {s}")),
        }
    }
}

/// One examination episode for a visitor within a camp.
/// Status is stored and fetched as TEXT.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Visit {
    pub id: Uuid,
    pub camp_id: Uuid,
    pub visitor_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub status: String,
    pub consultation_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Visit {
    /// An unreadable stored status falls back to REGISTERED, with a warning
    /// so corrupt rows are visible in the logs rather than silently coerced.
    pub fn status(&self) -> VisitStatus {
        self.status.parse().unwrap_or_else(|e| {
            tracing::warn!("visit {} has unreadable status {:?}: {e}", self.id, self.status);
            VisitStatus::Registered
        })
    }

    /// A visit still awaiting its consultation.
    pub fn is_open(&self) -> bool {
        matches!(self.status(), VisitStatus::Registered | VisitStatus::InProgress)
    }
}

#[derive(Debug, Clone)]
pub struct NewVisit {
    pub camp_id: Uuid,
    pub visitor_id: Uuid,
}

/// Which visitor column a search query matches against.
/// Closed set: an unknown value is a validation error, never a silent no-op.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    Name,
    Phone,
    PatientId,
}

impl std::str::FromStr for SearchField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(SearchField::Name),
            "phone" => Ok(SearchField::Phone),
            "patient_id" => Ok(SearchField::PatientId),
            _ => Err(anyhow::anyhow!("Unknown search field: {s}")),
        }
    }
}

/// A visit joined with the visitor it belongs to, as returned by the
/// listing and search surfaces.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VisitSummary {
    pub visit_id: Uuid,
    pub visitor_id: Uuid,
    pub patient_id: String,
    pub full_name: String,
    pub phone: String,
    pub status: String,
    pub doctor_id: Option<Uuid>,
    pub consultation_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
