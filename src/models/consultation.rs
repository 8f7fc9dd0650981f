use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prescription {
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub duration: String,
}

/// The clinical record for a visit. At most one row per visit: created on
/// the first save, updated in place thereafter.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Consultation {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub symptoms: String,
    pub diagnosis: String,
    pub notes: Option<String>,
    pub prescriptions: Json<Vec<Prescription>>,
    pub follow_up: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsultationInput {
    pub symptoms: String,
    pub diagnosis: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub prescriptions: Vec<Prescription>,
    pub follow_up: Option<String>,
}
