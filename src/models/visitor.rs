use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A visitor registration within one camp. The same person registering in
/// two camps gets two independent rows; (camp_id, patient_id) is unique.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Visitor {
    pub id: Uuid,
    pub camp_id: Uuid,
    /// Human-readable per-camp identifier, e.g. "WINTER-CLINIC-0001".
    pub patient_id: String,
    pub full_name: String,
    pub phone: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub address: Option<String>,
    /// Linked messaging channel id, set via the inbound webhook protocol.
    pub chat_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewVisitor {
    pub camp_id: Uuid,
    pub patient_id: String,
    pub full_name: String,
    pub phone: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub address: Option<String>,
}

/// Demographics supplied by the public registration form.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterVisitorRequest {
    pub full_name: String,
    pub phone: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub address: Option<String>,
}
