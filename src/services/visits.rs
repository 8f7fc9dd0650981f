//! Visitor and visit lifecycle: registration with per-camp patient id
//! assignment, desk check-in by scanned code, and consultation capture.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::tenant::Deny;
use crate::models::{
    camp::Camp,
    consultation::{Consultation, ConsultationInput},
    visit::{NewVisit, Visit},
    visitor::{NewVisitor, RegisterVisitorRequest, Visitor},
};
use crate::services::notify::ScanPayload;
use crate::store::{Store, StoreError};

/// Attempts before giving up when patient id assignment keeps colliding.
const REGISTER_RETRY_BUDGET: u32 = 3;

/// Patient ids read as `<SLUG>-NNNN`, assigned in registration order per camp.
pub fn format_patient_id(slug: &str, seq: i64) -> String {
    format!("{}-{:04}", slug.to_uppercase(), seq)
}

/// What a desk scan resolves to: the visitor and the visit the scan
/// checked them into.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScanResolution {
    pub visitor: Visitor,
    pub visit: Visit,
}

pub struct VisitService;

impl VisitService {
    /// Register a visitor and open their first visit. The counter advance
    /// and the unique (camp_id, patient_id) constraint together guarantee
    /// distinct ids under concurrent registration; a collision only means
    /// another writer won the seq, so take the next one and try again.
    /// The caller supplies the clock.
    pub async fn register(
        store: &dyn Store,
        camp: &Camp,
        req: &RegisterVisitorRequest,
        now: DateTime<Utc>,
    ) -> Result<(Visitor, Visit), AppError> {
        let full_name = req.full_name.trim();
        let phone = req.phone.trim();
        if full_name.is_empty() {
            return Err(AppError::ValidationFailed("full_name is required".into()));
        }
        if phone.is_empty() {
            return Err(AppError::ValidationFailed("phone is required".into()));
        }

        let mut last_conflict = None;
        for _ in 0..REGISTER_RETRY_BUDGET {
            let seq = store.next_patient_seq(camp.id).await?;
            let new = NewVisitor {
                camp_id: camp.id,
                patient_id: format_patient_id(&camp.slug, seq),
                full_name: full_name.to_string(),
                phone: phone.to_string(),
                age: req.age,
                gender: req.gender.clone(),
                address: req.address.clone(),
            };
            match store.create_visitor(&new, now).await {
                Ok(visitor) => {
                    let visit = store
                        .create_visit(
                            &NewVisit {
                                camp_id: camp.id,
                                visitor_id: visitor.id,
                            },
                            now,
                        )
                        .await?;
                    return Ok((visitor, visit));
                }
                Err(StoreError::Conflict(msg)) => last_conflict = Some(msg),
                Err(e) => return Err(e.into()),
            }
        }
        Err(AppError::ConflictingState(
            last_conflict.unwrap_or_else(|| "patient id assignment kept colliding".into()),
        ))
    }

    /// Resolve a scanned code inside an authorized camp scope. Reuses the
    /// visitor's open visit, or opens a fresh one if the last was completed;
    /// scanning the same code twice resolves to the same visit.
    pub async fn resolve_by_scan(
        store: &dyn Store,
        scope: Uuid,
        payload: &ScanPayload,
        now: DateTime<Utc>,
    ) -> Result<ScanResolution, AppError> {
        if payload.camp_id != scope {
            return Err(Deny::TenantMismatch.into());
        }
        let visitor = store
            .find_visitor_by_contact(&payload.patient_id)
            .await?
            .ok_or(AppError::NotFound("visitor"))?;
        // A code that names this camp but a visitor registered elsewhere is
        // a cross-tenant access attempt, not a missing record.
        if visitor.camp_id != scope {
            return Err(Deny::TenantMismatch.into());
        }
        let visit = match store.find_open_visit(scope, visitor.id).await? {
            Some(open) => open,
            None => {
                store
                    .create_visit(
                        &NewVisit {
                            camp_id: scope,
                            visitor_id: visitor.id,
                        },
                        now,
                    )
                    .await?
            }
        };
        Ok(ScanResolution { visitor, visit })
    }

    /// Save the clinical record for a visit and mark it completed. Saving
    /// again replaces the record in place; the visit stays completed.
    /// `now` stamps both the record and the completion time.
    pub async fn save_consultation(
        store: &dyn Store,
        scope: Uuid,
        visit_id: Uuid,
        doctor_id: Uuid,
        input: &ConsultationInput,
        now: DateTime<Utc>,
    ) -> Result<(Consultation, Visit), AppError> {
        let visit = store
            .find_visit(visit_id)
            .await?
            .filter(|v| v.camp_id == scope)
            .ok_or(AppError::NotFound("visit"))?;

        if input.symptoms.trim().is_empty() {
            return Err(AppError::ValidationFailed("symptoms are required".into()));
        }
        if input.diagnosis.trim().is_empty() {
            return Err(AppError::ValidationFailed("diagnosis is required".into()));
        }
        let mut cleaned = input.clone();
        cleaned.prescriptions.retain(|p| !p.name.trim().is_empty());

        let consultation = store.upsert_consultation(visit.id, &cleaned, now).await?;
        store.complete_visit(visit.id, doctor_id, now).await?;
        let visit = store
            .find_visit(visit.id)
            .await?
            .ok_or(AppError::NotFound("visit"))?;
        Ok((consultation, visit))
    }
}
