//! Staff login and access-token issuance. Admins authenticate globally;
//! camp heads and doctors authenticate into their own camp by slug.

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};

use crate::error::AppError;
use crate::models::auth::{Claims, LoginRequest, LoginResponse};
use crate::models::user::UserRole;
use crate::store::Store;

pub struct AuthService;

impl AuthService {
    /// Authenticate a staff member. Every failure mode before the password
    /// check collapses into the same response, so the endpoint does not
    /// reveal which emails exist.
    pub async fn login(
        store: &dyn Store,
        jwt_secret: &str,
        expiry_seconds: u64,
        req: &LoginRequest,
    ) -> Result<LoginResponse, AppError> {
        let user = store
            .find_user_by_email(req.email.trim())
            .await?
            .ok_or(AppError::AuthenticationFailed)?;

        let verified = bcrypt::verify(&req.password, &user.password_hash)
            .map_err(|_| AppError::AuthenticationFailed)?;
        if !verified {
            return Err(AppError::AuthenticationFailed);
        }

        let role: UserRole = user.role.parse().map_err(|_| AppError::AuthenticationFailed)?;

        let camp_name = match (&req.camp_slug, role) {
            (None, UserRole::Admin) => None,
            (None, _) => return Err(AppError::AuthenticationFailed),
            (Some(slug), _) => {
                let camp = store
                    .find_camp_by_slug(slug.trim())
                    .await?
                    .ok_or(AppError::NotFound("camp"))?;
                if user.camp_id != Some(camp.id) {
                    return Err(AppError::AuthenticationFailed);
                }
                Some(camp.name)
            }
        };

        let access_token = generate_access_token(
            jwt_secret,
            expiry_seconds,
            &user.id.to_string(),
            user.camp_id.map(|id| id.to_string()),
            role,
        )?;

        Ok(LoginResponse {
            access_token,
            user: user.into(),
            camp_name,
        })
    }
}

pub fn generate_access_token(
    secret: &str,
    expiry_seconds: u64,
    user_id: &str,
    camp_id: Option<String>,
    role: UserRole,
) -> Result<String, AppError> {
    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        camp: camp_id,
        role,
        exp: now + expiry_seconds as usize,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.into()))
}
