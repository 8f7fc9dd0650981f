use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::tenant::authorize_scoped;
use crate::models::{
    auth::Identity,
    consultation::{Consultation, ConsultationInput},
    visit::{SearchField, Visit, VisitStatus, VisitSummary},
    visitor::{RegisterVisitorRequest, Visitor},
};
use crate::services::notify::{dispatch_detached, MessagePayload, ScanPayload};
use crate::services::visits::{ScanResolution, VisitService};
use crate::AppState;

#[derive(Serialize)]
pub struct RegistrationResponse {
    pub visitor: Visitor,
    pub visit: Visit,
}

/// Public registration form: no authentication, camp addressed by slug.
/// The registration code goes out in the background; a provider outage
/// never fails the registration itself.
pub async fn register_visitor(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(body): Json<RegisterVisitorRequest>,
) -> Result<(StatusCode, Json<RegistrationResponse>), AppError> {
    let camp = state
        .store
        .find_camp_by_slug(&slug)
        .await?
        .ok_or(AppError::NotFound("camp"))?;

    let (visitor, visit) =
        VisitService::register(state.store.as_ref(), &camp, &body, Utc::now()).await?;

    dispatch_detached(
        state.dispatcher.clone(),
        state.store.clone(),
        camp,
        visitor.clone(),
        MessagePayload::Registration,
    );

    Ok((StatusCode::CREATED, Json(RegistrationResponse { visitor, visit })))
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

pub async fn list_visits(
    State(state): State<AppState>,
    identity: Identity,
    Path(camp_id): Path<Uuid>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<VisitSummary>>, AppError> {
    let scope = authorize_scoped(&identity, &[Some(camp_id)])?;
    let status = params
        .status
        .as_deref()
        .map(str::parse::<VisitStatus>)
        .transpose()
        .map_err(|e| AppError::ValidationFailed(e.to_string()))?;
    Ok(Json(state.store.list_visits(scope, status).await?))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub field: Option<String>,
}

pub async fn search_visits(
    State(state): State<AppState>,
    identity: Identity,
    Path(camp_id): Path<Uuid>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Vec<VisitSummary>>, AppError> {
    let scope = authorize_scoped(&identity, &[Some(camp_id)])?;
    if params.q.trim().is_empty() {
        return Err(AppError::ValidationFailed("search query is required".into()));
    }
    let field = params
        .field
        .as_deref()
        .map(str::parse::<SearchField>)
        .transpose()
        .map_err(|e| AppError::ValidationFailed(e.to_string()))?;
    Ok(Json(state.store.search_visits(scope, &params.q, field).await?))
}

#[derive(Deserialize)]
pub struct ScanRequest {
    pub payload: String,
}

/// Desk check-in: decode a scanned registration code and pull up the
/// visitor with their open visit.
pub async fn scan(
    State(state): State<AppState>,
    identity: Identity,
    Path(camp_id): Path<Uuid>,
    Json(body): Json<ScanRequest>,
) -> Result<Json<ScanResolution>, AppError> {
    let scope = authorize_scoped(&identity, &[Some(camp_id)])?;
    let payload: ScanPayload = body
        .payload
        .parse()
        .map_err(|e: anyhow::Error| AppError::ValidationFailed(e.to_string()))?;
    let resolution =
        VisitService::resolve_by_scan(state.store.as_ref(), scope, &payload, Utc::now()).await?;
    Ok(Json(resolution))
}

#[derive(Serialize)]
pub struct ConsultationResponse {
    pub consultation: Consultation,
    pub visit: Visit,
}

/// Save the clinical record and complete the visit. The completion
/// notification goes out in the background.
pub async fn save_consultation(
    State(state): State<AppState>,
    identity: Identity,
    Path((camp_id, visit_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ConsultationInput>,
) -> Result<Json<ConsultationResponse>, AppError> {
    let scope = authorize_scoped(&identity, &[Some(camp_id)])?;

    let (consultation, visit) = VisitService::save_consultation(
        state.store.as_ref(),
        scope,
        visit_id,
        identity.user_id,
        &body,
        Utc::now(),
    )
    .await?;

    match (
        state.store.find_camp(scope).await,
        state.store.find_visitor(visit.visitor_id).await,
    ) {
        (Ok(Some(camp)), Ok(Some(visitor))) => dispatch_detached(
            state.dispatcher.clone(),
            state.store.clone(),
            camp,
            visitor,
            MessagePayload::ConsultationComplete {
                diagnosis: consultation.diagnosis.clone(),
                follow_up: consultation.follow_up.clone(),
            },
        ),
        // Delivery is best-effort, but a dropped dispatch must leave a trace.
        _ => tracing::warn!(
            "completion notification for visit {} skipped: camp or visitor lookup failed",
            visit.id
        ),
    }

    Ok(Json(ConsultationResponse { consultation, visit }))
}

pub async fn get_consultation(
    State(state): State<AppState>,
    identity: Identity,
    Path((camp_id, visit_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Consultation>, AppError> {
    let scope = authorize_scoped(&identity, &[Some(camp_id)])?;
    let visit = state
        .store
        .find_visit(visit_id)
        .await?
        .filter(|v| v.camp_id == scope)
        .ok_or(AppError::NotFound("visit"))?;
    let consultation = state
        .store
        .find_consultation(visit.id)
        .await?
        .ok_or(AppError::NotFound("consultation"))?;
    Ok(Json(consultation))
}
