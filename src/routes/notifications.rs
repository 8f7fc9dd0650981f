use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::tenant::authorize_scoped;
use crate::models::{
    auth::Identity,
    notification::{
        DispatchResult, LogFilter, NotificationKind, NotificationLogEntry, NotificationStatus,
        NotifyRequest,
    },
};
use crate::services::notify::MessagePayload;
use crate::AppState;

#[derive(Deserialize)]
pub struct TriageQuery {
    pub visitor_id: Option<Uuid>,
    pub kind: Option<String>,
    pub status: Option<String>,
}

/// Operational triage over the delivery log: which messages went out,
/// which were skipped, which failed and why.
pub async fn query_log(
    State(state): State<AppState>,
    identity: Identity,
    Path(camp_id): Path<Uuid>,
    Query(params): Query<TriageQuery>,
) -> Result<Json<Vec<NotificationLogEntry>>, AppError> {
    let scope = authorize_scoped(&identity, &[Some(camp_id)])?;
    let filter = LogFilter {
        visitor_id: params.visitor_id,
        kind: params
            .kind
            .as_deref()
            .map(str::parse::<NotificationKind>)
            .transpose()
            .map_err(|e| AppError::ValidationFailed(e.to_string()))?,
        status: params
            .status
            .as_deref()
            .map(str::parse::<NotificationStatus>)
            .transpose()
            .map_err(|e| AppError::ValidationFailed(e.to_string()))?,
    };
    Ok(Json(state.store.query_notifications(scope, &filter).await?))
}

/// Manual send to one visitor. Awaited rather than detached so the
/// operator sees the outcome in the response.
pub async fn notify_visitor(
    State(state): State<AppState>,
    identity: Identity,
    Path((camp_id, visitor_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<NotifyRequest>,
) -> Result<Json<Value>, AppError> {
    let scope = authorize_scoped(&identity, &[Some(camp_id)])?;

    let visitor = state
        .store
        .find_visitor(visitor_id)
        .await?
        .filter(|v| v.camp_id == scope)
        .ok_or(AppError::NotFound("visitor"))?;
    let camp = state
        .store
        .find_camp(scope)
        .await?
        .ok_or(AppError::NotFound("camp"))?;

    let payload = match body.kind {
        NotificationKind::Custom => {
            let text = body
                .text
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| AppError::ValidationFailed("text is required".into()))?;
            MessagePayload::Custom { text }
        }
        NotificationKind::AppointmentReminder => {
            let at = body.appointment_at.ok_or_else(|| {
                AppError::ValidationFailed("appointment_at is required".into())
            })?;
            MessagePayload::AppointmentReminder { at }
        }
        // Re-sends the registration code, e.g. after a late chat link.
        NotificationKind::Registration => MessagePayload::Registration,
        NotificationKind::ConsultationComplete => {
            return Err(AppError::ValidationFailed(
                "consultation notifications are sent automatically".into(),
            ))
        }
    };

    let result = state
        .dispatcher
        .dispatch(state.store.as_ref(), &camp, &visitor, &payload)
        .await;

    let body = match result {
        DispatchResult::Sent => json!({ "result": "sent" }),
        DispatchResult::Skipped(reason) => json!({ "result": "skipped", "detail": reason }),
        DispatchResult::Failed(reason) => json!({ "result": "failed", "detail": reason }),
    };
    Ok(Json(body))
}
