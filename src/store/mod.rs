//! Persistence seam. The core services talk to this trait only; the
//! Postgres implementation lives in `pg`, and the tests run against the
//! in-memory implementation in `memory`.

pub mod pg;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    attachment::{Attachment, CreateAttachmentRequest},
    camp::{Camp, CreateCampRequest, UpdateCampRequest},
    consultation::{Consultation, ConsultationInput},
    notification::{LogFilter, NewLogEntry, NotificationLogEntry, NotificationStatus},
    user::{NewUser, User},
    visit::{NewVisit, SearchField, Visit, VisitStatus, VisitSummary},
    visitor::{NewVisitor, Visitor},
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness or state conflict the caller may want to retry.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            // 23505 = unique_violation
            if db.code().as_deref() == Some("23505") {
                return StoreError::Conflict(db.message().to_string());
            }
        }
        StoreError::Other(e.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    // ─── Camps ────────────────────────────────────────────────────────────
    async fn create_camp(&self, req: &CreateCampRequest) -> StoreResult<Camp>;
    async fn find_camp(&self, id: Uuid) -> StoreResult<Option<Camp>>;
    async fn find_camp_by_slug(&self, slug: &str) -> StoreResult<Option<Camp>>;
    async fn list_camps(&self) -> StoreResult<Vec<Camp>>;
    async fn update_camp(&self, id: Uuid, req: &UpdateCampRequest) -> StoreResult<Option<Camp>>;
    /// Remove the camp and every row scoped to it in one atomic unit.
    /// Returns false when the camp does not exist.
    async fn delete_camp_cascade(&self, id: Uuid) -> StoreResult<bool>;

    // ─── Staff ────────────────────────────────────────────────────────────
    async fn create_user(&self, new: &NewUser) -> StoreResult<User>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn list_staff(&self, camp_id: Uuid) -> StoreResult<Vec<User>>;

    // ─── Visitors ─────────────────────────────────────────────────────────
    /// Atomically advance and return the per-camp registration counter.
    async fn next_patient_seq(&self, camp_id: Uuid) -> StoreResult<i64>;
    async fn create_visitor(&self, new: &NewVisitor, now: DateTime<Utc>) -> StoreResult<Visitor>;
    async fn find_visitor(&self, id: Uuid) -> StoreResult<Option<Visitor>>;
    /// Exact match on phone or patient id, across all camps — the chat link
    /// is a property of the person, not of one camp membership.
    async fn find_visitor_by_contact(&self, needle: &str) -> StoreResult<Option<Visitor>>;
    /// Atomically claim the chat link for a visitor. Returns false when a
    /// different channel already holds it; claiming the same channel again
    /// succeeds. The guard lives in the store so concurrent webhook
    /// deliveries cannot both win.
    async fn set_chat_link(&self, visitor_id: Uuid, chat_id: &str) -> StoreResult<bool>;

    // ─── Visits ───────────────────────────────────────────────────────────
    async fn create_visit(&self, new: &NewVisit, now: DateTime<Utc>) -> StoreResult<Visit>;
    async fn find_visit(&self, id: Uuid) -> StoreResult<Option<Visit>>;
    async fn find_open_visit(&self, camp_id: Uuid, visitor_id: Uuid) -> StoreResult<Option<Visit>>;
    async fn list_visits(
        &self,
        camp_id: Uuid,
        status: Option<VisitStatus>,
    ) -> StoreResult<Vec<VisitSummary>>;
    async fn search_visits(
        &self,
        camp_id: Uuid,
        query: &str,
        field: Option<SearchField>,
    ) -> StoreResult<Vec<VisitSummary>>;
    async fn complete_visit(
        &self,
        visit_id: Uuid,
        doctor_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    // ─── Consultations ────────────────────────────────────────────────────
    /// Atomic create-or-update keyed by visit_id.
    async fn upsert_consultation(
        &self,
        visit_id: Uuid,
        input: &ConsultationInput,
        now: DateTime<Utc>,
    ) -> StoreResult<Consultation>;
    async fn find_consultation(&self, visit_id: Uuid) -> StoreResult<Option<Consultation>>;

    // ─── Attachments ──────────────────────────────────────────────────────
    async fn create_attachment(
        &self,
        camp_id: Uuid,
        req: &CreateAttachmentRequest,
    ) -> StoreResult<Attachment>;
    async fn list_attachments(&self, camp_id: Uuid, visit_id: Uuid) -> StoreResult<Vec<Attachment>>;
    async fn delete_attachment(&self, camp_id: Uuid, id: Uuid) -> StoreResult<bool>;

    // ─── Notification log ─────────────────────────────────────────────────
    async fn insert_notification(&self, new: &NewLogEntry) -> StoreResult<Uuid>;
    /// The single allowed mutation: PENDING → terminal status.
    async fn finish_notification(
        &self,
        id: Uuid,
        status: NotificationStatus,
        detail: Option<&str>,
        sent_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;
    async fn query_notifications(
        &self,
        camp_id: Uuid,
        filter: &LogFilter,
    ) -> StoreResult<Vec<NotificationLogEntry>>;
}
