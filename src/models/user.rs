use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    CampHead,
    Doctor,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UserRole::Admin => "admin",
            UserRole::CampHead => "camp_head",
            UserRole::Doctor => "doctor",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "camp_head" => Ok(UserRole::CampHead),
            "doctor" => Ok(UserRole::Doctor),
            _ => Err(anyhow::anyhow!("Unknown role: {s}")),
        }
    }
}

/// DB row struct — role is stored and fetched as TEXT.
/// Invariant enforced at the schema level: camp_id IS NULL exactly when
/// role = 'admin'; camp heads and doctors belong to exactly one camp.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub camp_id: Option<Uuid>,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a staff row (password already hashed by the caller).
#[derive(Debug, Clone)]
pub struct NewUser {
    pub camp_id: Option<Uuid>,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct CreateStaffRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: UserRole,
}

#[derive(Debug, Serialize)]
pub struct StaffProfile {
    pub id: Uuid,
    pub camp_id: Option<Uuid>,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
}

impl From<User> for StaffProfile {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            camp_id: u.camp_id,
            email: u.email,
            full_name: u.full_name,
            role: u.role.parse().unwrap_or(UserRole::Doctor),
        }
    }
}
