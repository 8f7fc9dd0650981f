use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserRole;

/// Claims embedded in the JWT access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    /// Home camp UUID; absent for admins.
    pub camp: Option<String>,
    pub role: UserRole,
    pub exp: usize,
    pub iat: usize,
}

/// The authenticated principal, extracted once per request from a
/// validated token. Everything downstream authorizes against this,
/// never against raw request data.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: UserRole,
    pub home_camp_id: Option<Uuid>,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Omitted for administrator login.
    pub camp_slug: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: super::user::StaffProfile,
    pub camp_name: Option<String>,
}
