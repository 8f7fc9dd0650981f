use axum::{extract::State, Json};

use crate::error::AppError;
use crate::models::auth::{LoginRequest, LoginResponse};
use crate::services::auth::AuthService;
use crate::AppState;

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let response = AuthService::login(
        state.store.as_ref(),
        &state.config.jwt_secret,
        state.config.jwt_expiry_seconds,
        &body,
    )
    .await?;
    Ok(Json(response))
}
