use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::tenant::authorize_scoped;
use crate::models::{
    attachment::{Attachment, CreateAttachmentRequest},
    auth::Identity,
};
use crate::AppState;

/// Record file metadata against a visit. The bytes themselves live in
/// external storage; this only tracks where they are.
pub async fn create_attachment(
    State(state): State<AppState>,
    identity: Identity,
    Path(camp_id): Path<Uuid>,
    Json(body): Json<CreateAttachmentRequest>,
) -> Result<(StatusCode, Json<Attachment>), AppError> {
    let scope = authorize_scoped(&identity, &[Some(camp_id)])?;
    if body.file_url.trim().is_empty() {
        return Err(AppError::ValidationFailed("file_url is required".into()));
    }
    state
        .store
        .find_visit(body.visit_id)
        .await?
        .filter(|v| v.camp_id == scope)
        .ok_or(AppError::NotFound("visit"))?;

    let attachment = state.store.create_attachment(scope, &body).await?;
    Ok((StatusCode::CREATED, Json(attachment)))
}

pub async fn list_attachments(
    State(state): State<AppState>,
    identity: Identity,
    Path((camp_id, visit_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<Attachment>>, AppError> {
    let scope = authorize_scoped(&identity, &[Some(camp_id)])?;
    Ok(Json(state.store.list_attachments(scope, visit_id).await?))
}

pub async fn delete_attachment(
    State(state): State<AppState>,
    identity: Identity,
    Path((camp_id, attachment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    let scope = authorize_scoped(&identity, &[Some(camp_id)])?;
    if !state.store.delete_attachment(scope, attachment_id).await? {
        return Err(AppError::NotFound("attachment"));
    }
    Ok(Json(json!({ "deleted": attachment_id })))
}
