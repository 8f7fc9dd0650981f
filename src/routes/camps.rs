use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::tenant::{authorize, Deny};
use crate::models::{
    auth::Identity,
    camp::{is_valid_slug, Camp, CreateCampRequest, UpdateCampRequest},
    user::{CreateStaffRequest, NewUser, StaffProfile, UserRole},
};
use crate::AppState;

fn require_admin(identity: &Identity) -> Result<(), AppError> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(Deny::TenantMismatch.into())
    }
}

/// Admins see every camp; staff see only their own.
pub async fn list_camps(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<Camp>>, AppError> {
    if identity.is_admin() {
        return Ok(Json(state.store.list_camps().await?));
    }
    let home = identity.home_camp_id.ok_or(Deny::MissingTenant)?;
    let camp = state.store.find_camp(home).await?.ok_or(AppError::NotFound("camp"))?;
    Ok(Json(vec![camp]))
}

pub async fn create_camp(
    State(state): State<AppState>,
    identity: Identity,
    Json(body): Json<CreateCampRequest>,
) -> Result<(StatusCode, Json<Camp>), AppError> {
    require_admin(&identity)?;
    if !is_valid_slug(&body.slug) {
        return Err(AppError::ValidationFailed(format!(
            "invalid slug: {}",
            body.slug
        )));
    }
    if body.name.trim().is_empty() {
        return Err(AppError::ValidationFailed("name is required".into()));
    }
    if body.ends_at < body.starts_at {
        return Err(AppError::ValidationFailed("camp ends before it starts".into()));
    }
    let camp = state.store.create_camp(&body).await?;
    Ok((StatusCode::CREATED, Json(camp)))
}

pub async fn get_camp(
    State(state): State<AppState>,
    identity: Identity,
    Path(camp_id): Path<Uuid>,
) -> Result<Json<Camp>, AppError> {
    authorize(&identity, Some(camp_id))?;
    let camp = state
        .store
        .find_camp(camp_id)
        .await?
        .ok_or(AppError::NotFound("camp"))?;
    Ok(Json(camp))
}

pub async fn update_camp(
    State(state): State<AppState>,
    identity: Identity,
    Path(camp_id): Path<Uuid>,
    Json(body): Json<UpdateCampRequest>,
) -> Result<Json<Camp>, AppError> {
    require_admin(&identity)?;
    let camp = state
        .store
        .update_camp(camp_id, &body)
        .await?
        .ok_or(AppError::NotFound("camp"))?;
    Ok(Json(camp))
}

/// Removes the camp and everything scoped to it in one transaction.
pub async fn delete_camp(
    State(state): State<AppState>,
    identity: Identity,
    Path(camp_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_admin(&identity)?;
    if !state.store.delete_camp_cascade(camp_id).await? {
        return Err(AppError::NotFound("camp"));
    }
    Ok(Json(json!({ "deleted": camp_id })))
}

pub async fn list_staff(
    State(state): State<AppState>,
    identity: Identity,
    Path(camp_id): Path<Uuid>,
) -> Result<Json<Vec<StaffProfile>>, AppError> {
    authorize(&identity, Some(camp_id))?;
    let staff = state.store.list_staff(camp_id).await?;
    Ok(Json(staff.into_iter().map(StaffProfile::from).collect()))
}

/// Admins can staff any camp; camp heads only their own. Doctors cannot
/// create staff.
pub async fn create_staff(
    State(state): State<AppState>,
    identity: Identity,
    Path(camp_id): Path<Uuid>,
    Json(body): Json<CreateStaffRequest>,
) -> Result<(StatusCode, Json<StaffProfile>), AppError> {
    authorize(&identity, Some(camp_id))?;
    if !identity.is_admin() && identity.role != UserRole::CampHead {
        return Err(Deny::TenantMismatch.into());
    }
    if body.role == UserRole::Admin {
        return Err(AppError::ValidationFailed(
            "admins are not camp staff".into(),
        ));
    }
    if body.password.len() < 8 {
        return Err(AppError::ValidationFailed(
            "password must be at least 8 characters".into(),
        ));
    }
    state
        .store
        .find_camp(camp_id)
        .await?
        .ok_or(AppError::NotFound("camp"))?;

    let password_hash = bcrypt::hash(&body.password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(e.into()))?;
    let user = state
        .store
        .create_user(&NewUser {
            camp_id: Some(camp_id),
            email: body.email.trim().to_lowercase(),
            password_hash,
            full_name: body.full_name,
            role: body.role,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}
