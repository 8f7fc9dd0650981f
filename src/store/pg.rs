use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::models::{
    attachment::{Attachment, CreateAttachmentRequest},
    camp::{Camp, CreateCampRequest, UpdateCampRequest},
    consultation::{Consultation, ConsultationInput},
    notification::{LogFilter, NewLogEntry, NotificationLogEntry, NotificationStatus},
    user::{NewUser, User},
    visit::{NewVisit, SearchField, Visit, VisitStatus, VisitSummary},
    visitor::{NewVisitor, Visitor},
};

const VISIT_SUMMARY_COLUMNS: &str =
    "v.id AS visit_id, v.visitor_id, p.patient_id, p.full_name, p.phone,
     v.status, v.doctor_id, v.consultation_at, v.created_at";

/// Escape LIKE metacharacters so a search term is always a literal
/// substring — "%" must match a percent sign, not every row.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_camp(&self, req: &CreateCampRequest) -> StoreResult<Camp> {
        let camp = sqlx::query_as::<_, Camp>(
            "INSERT INTO camps (slug, name, starts_at, ends_at, venue, contact_phone, hospital_name)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(&req.slug)
        .bind(&req.name)
        .bind(req.starts_at)
        .bind(req.ends_at)
        .bind(&req.venue)
        .bind(&req.contact_phone)
        .bind(&req.hospital_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(camp)
    }

    async fn find_camp(&self, id: Uuid) -> StoreResult<Option<Camp>> {
        let camp = sqlx::query_as::<_, Camp>("SELECT * FROM camps WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(camp)
    }

    async fn find_camp_by_slug(&self, slug: &str) -> StoreResult<Option<Camp>> {
        let camp = sqlx::query_as::<_, Camp>("SELECT * FROM camps WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(camp)
    }

    async fn list_camps(&self) -> StoreResult<Vec<Camp>> {
        let camps = sqlx::query_as::<_, Camp>("SELECT * FROM camps ORDER BY starts_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(camps)
    }

    async fn update_camp(&self, id: Uuid, req: &UpdateCampRequest) -> StoreResult<Option<Camp>> {
        let camp = sqlx::query_as::<_, Camp>(
            "UPDATE camps SET
               name          = COALESCE($2, name),
               starts_at     = COALESCE($3, starts_at),
               ends_at       = COALESCE($4, ends_at),
               venue         = COALESCE($5, venue),
               contact_phone = COALESCE($6, contact_phone),
               hospital_name = COALESCE($7, hospital_name),
               updated_at    = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&req.name)
        .bind(req.starts_at)
        .bind(req.ends_at)
        .bind(&req.venue)
        .bind(&req.contact_phone)
        .bind(&req.hospital_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(camp)
    }

    async fn delete_camp_cascade(&self, id: Uuid) -> StoreResult<bool> {
        // Single transaction: either every dependent row and the camp go,
        // or none do. Dropping the transaction rolls back on any failure.
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        sqlx::query("DELETE FROM notification_log WHERE camp_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM attachments WHERE camp_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "DELETE FROM consultations WHERE visit_id IN (SELECT id FROM visits WHERE camp_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM visits WHERE camp_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM visitors WHERE camp_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM camp_counters WHERE camp_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM users WHERE camp_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM camps WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await.map_err(StoreError::from)?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn create_user(&self, new: &NewUser) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (camp_id, email, password_hash, full_name, role)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(new.camp_id)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.full_name)
        .bind(new.role.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE email = $1 AND is_active = TRUE",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_staff(&self, camp_id: Uuid) -> StoreResult<Vec<User>> {
        let staff = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE camp_id = $1 AND is_active = TRUE ORDER BY full_name",
        )
        .bind(camp_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(staff)
    }

    async fn next_patient_seq(&self, camp_id: Uuid) -> StoreResult<i64> {
        // Upsert-increment is atomic per row: concurrent registrations each
        // observe a distinct sequence number.
        let seq: i64 = sqlx::query_scalar(
            "INSERT INTO camp_counters (camp_id, last_seq) VALUES ($1, 1)
             ON CONFLICT (camp_id) DO UPDATE SET last_seq = camp_counters.last_seq + 1
             RETURNING last_seq",
        )
        .bind(camp_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(seq)
    }

    async fn create_visitor(&self, new: &NewVisitor, now: DateTime<Utc>) -> StoreResult<Visitor> {
        let visitor = sqlx::query_as::<_, Visitor>(
            "INSERT INTO visitors
                (camp_id, patient_id, full_name, phone, age, gender, address, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING *",
        )
        .bind(new.camp_id)
        .bind(&new.patient_id)
        .bind(&new.full_name)
        .bind(&new.phone)
        .bind(new.age)
        .bind(&new.gender)
        .bind(&new.address)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(visitor)
    }

    async fn find_visitor(&self, id: Uuid) -> StoreResult<Option<Visitor>> {
        let visitor = sqlx::query_as::<_, Visitor>("SELECT * FROM visitors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(visitor)
    }

    async fn find_visitor_by_contact(&self, needle: &str) -> StoreResult<Option<Visitor>> {
        let visitor = sqlx::query_as::<_, Visitor>(
            "SELECT * FROM visitors WHERE phone = $1 OR patient_id = $1
             ORDER BY created_at LIMIT 1",
        )
        .bind(needle)
        .fetch_optional(&self.pool)
        .await?;
        Ok(visitor)
    }

    async fn set_chat_link(&self, visitor_id: Uuid, chat_id: &str) -> StoreResult<bool> {
        // The predicate makes the claim atomic: two handlers that both saw
        // an unlinked visitor cannot both update the row.
        let claimed = sqlx::query(
            "UPDATE visitors SET chat_id = $2
             WHERE id = $1 AND (chat_id IS NULL OR chat_id = $2)",
        )
        .bind(visitor_id)
        .bind(chat_id)
        .execute(&self.pool)
        .await?;
        Ok(claimed.rows_affected() > 0)
    }

    async fn create_visit(&self, new: &NewVisit, now: DateTime<Utc>) -> StoreResult<Visit> {
        let visit = sqlx::query_as::<_, Visit>(
            "INSERT INTO visits (camp_id, visitor_id, created_at) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(new.camp_id)
        .bind(new.visitor_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(visit)
    }

    async fn find_visit(&self, id: Uuid) -> StoreResult<Option<Visit>> {
        let visit = sqlx::query_as::<_, Visit>("SELECT * FROM visits WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(visit)
    }

    async fn find_open_visit(&self, camp_id: Uuid, visitor_id: Uuid) -> StoreResult<Option<Visit>> {
        let visit = sqlx::query_as::<_, Visit>(
            "SELECT * FROM visits
             WHERE camp_id = $1 AND visitor_id = $2 AND status IN ('registered', 'in_progress')
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(camp_id)
        .bind(visitor_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(visit)
    }

    async fn list_visits(
        &self,
        camp_id: Uuid,
        status: Option<VisitStatus>,
    ) -> StoreResult<Vec<VisitSummary>> {
        let visits = sqlx::query_as::<_, VisitSummary>(&format!(
            "SELECT {VISIT_SUMMARY_COLUMNS}
             FROM visits v JOIN visitors p ON p.id = v.visitor_id
             WHERE v.camp_id = $1 AND ($2::TEXT IS NULL OR v.status = $2)
             ORDER BY v.created_at DESC",
        ))
        .bind(camp_id)
        .bind(status.map(|s| s.to_string()))
        .fetch_all(&self.pool)
        .await?;
        Ok(visits)
    }

    async fn search_visits(
        &self,
        camp_id: Uuid,
        query: &str,
        field: Option<SearchField>,
    ) -> StoreResult<Vec<VisitSummary>> {
        let predicate = match field {
            Some(SearchField::Name) => "p.full_name ILIKE $2",
            Some(SearchField::Phone) => "p.phone ILIKE $2",
            Some(SearchField::PatientId) => "p.patient_id ILIKE $2",
            None => "(p.full_name ILIKE $2 OR p.phone ILIKE $2 OR p.patient_id ILIKE $2)",
        };
        let pattern = format!("%{}%", escape_like(query.trim()));
        let visits = sqlx::query_as::<_, VisitSummary>(&format!(
            "SELECT {VISIT_SUMMARY_COLUMNS}
             FROM visits v JOIN visitors p ON p.id = v.visitor_id
             WHERE v.camp_id = $1 AND {predicate}
             ORDER BY v.created_at DESC",
        ))
        .bind(camp_id)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(visits)
    }

    async fn complete_visit(
        &self,
        visit_id: Uuid,
        doctor_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE visits SET status = 'completed', doctor_id = $2, consultation_at = $3
             WHERE id = $1",
        )
        .bind(visit_id)
        .bind(doctor_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_consultation(
        &self,
        visit_id: Uuid,
        input: &ConsultationInput,
        now: DateTime<Utc>,
    ) -> StoreResult<Consultation> {
        let consultation = sqlx::query_as::<_, Consultation>(
            "INSERT INTO consultations
                (visit_id, symptoms, diagnosis, notes, prescriptions, follow_up, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             ON CONFLICT (visit_id) DO UPDATE SET
                symptoms      = EXCLUDED.symptoms,
                diagnosis     = EXCLUDED.diagnosis,
                notes         = EXCLUDED.notes,
                prescriptions = EXCLUDED.prescriptions,
                follow_up     = EXCLUDED.follow_up,
                updated_at    = EXCLUDED.updated_at
             RETURNING *",
        )
        .bind(visit_id)
        .bind(&input.symptoms)
        .bind(&input.diagnosis)
        .bind(&input.notes)
        .bind(Json(&input.prescriptions))
        .bind(&input.follow_up)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(consultation)
    }

    async fn find_consultation(&self, visit_id: Uuid) -> StoreResult<Option<Consultation>> {
        let consultation = sqlx::query_as::<_, Consultation>(
            "SELECT * FROM consultations WHERE visit_id = $1",
        )
        .bind(visit_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(consultation)
    }

    async fn create_attachment(
        &self,
        camp_id: Uuid,
        req: &CreateAttachmentRequest,
    ) -> StoreResult<Attachment> {
        let attachment = sqlx::query_as::<_, Attachment>(
            "INSERT INTO attachments
                (camp_id, visit_id, consultation_id, kind, file_url, file_name, mime_type, size_bytes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING *",
        )
        .bind(camp_id)
        .bind(req.visit_id)
        .bind(req.consultation_id)
        .bind(req.kind.to_string())
        .bind(&req.file_url)
        .bind(&req.file_name)
        .bind(&req.mime_type)
        .bind(req.size_bytes)
        .fetch_one(&self.pool)
        .await?;
        Ok(attachment)
    }

    async fn list_attachments(&self, camp_id: Uuid, visit_id: Uuid) -> StoreResult<Vec<Attachment>> {
        let attachments = sqlx::query_as::<_, Attachment>(
            "SELECT * FROM attachments WHERE camp_id = $1 AND visit_id = $2 ORDER BY created_at",
        )
        .bind(camp_id)
        .bind(visit_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attachments)
    }

    async fn delete_attachment(&self, camp_id: Uuid, id: Uuid) -> StoreResult<bool> {
        let deleted = sqlx::query("DELETE FROM attachments WHERE id = $1 AND camp_id = $2")
            .bind(id)
            .bind(camp_id)
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn insert_notification(&self, new: &NewLogEntry) -> StoreResult<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO notification_log (camp_id, visitor_id, kind, body)
             VALUES ($1, $2, $3, $4)
             RETURNING id",
        )
        .bind(new.camp_id)
        .bind(new.visitor_id)
        .bind(new.kind.to_string())
        .bind(&new.body)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn finish_notification(
        &self,
        id: Uuid,
        status: NotificationStatus,
        detail: Option<&str>,
        sent_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        // Guarded on 'pending' so a terminal entry can never be rewritten.
        sqlx::query(
            "UPDATE notification_log SET status = $2, detail = $3, sent_at = $4
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .bind(status.to_string())
        .bind(detail)
        .bind(sent_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn query_notifications(
        &self,
        camp_id: Uuid,
        filter: &LogFilter,
    ) -> StoreResult<Vec<NotificationLogEntry>> {
        let entries = sqlx::query_as::<_, NotificationLogEntry>(
            "SELECT * FROM notification_log
             WHERE camp_id = $1
               AND ($2::UUID IS NULL OR visitor_id = $2)
               AND ($3::TEXT IS NULL OR kind = $3)
               AND ($4::TEXT IS NULL OR status = $4)
             ORDER BY created_at DESC",
        )
        .bind(camp_id)
        .bind(filter.visitor_id)
        .bind(filter.kind.map(|k| k.to_string()))
        .bind(filter.status.map(|s| s.to_string()))
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}
