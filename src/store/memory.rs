//! In-memory store backing the unit tests. Mirrors the Postgres
//! implementation's semantics, including the uniqueness conflicts and the
//! atomic per-camp counter.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
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

#[derive(Default)]
struct Inner {
    camps: Vec<Camp>,
    users: Vec<User>,
    counters: HashMap<Uuid, i64>,
    visitors: Vec<Visitor>,
    visits: Vec<Visit>,
    consultations: Vec<Consultation>,
    attachments: Vec<Attachment>,
    log: Vec<NotificationLogEntry>,
}

#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test fixture: a camp with the given slug.
    pub async fn seed_camp(&self, slug: &str, name: &str) -> Camp {
        let now = Utc::now();
        self.create_camp(&CreateCampRequest {
            slug: slug.to_string(),
            name: name.to_string(),
            starts_at: now,
            ends_at: now + chrono::Duration::days(3),
            venue: None,
            contact_phone: None,
            hospital_name: None,
        })
        .await
        .unwrap()
    }
}

fn summary(v: &Visit, p: &Visitor) -> VisitSummary {
    VisitSummary {
        visit_id: v.id,
        visitor_id: p.id,
        patient_id: p.patient_id.clone(),
        full_name: p.full_name.clone(),
        phone: p.phone.clone(),
        status: v.status.clone(),
        doctor_id: v.doctor_id,
        consultation_at: v.consultation_at,
        created_at: v.created_at,
    }
}

#[async_trait]
impl Store for MemStore {
    async fn create_camp(&self, req: &CreateCampRequest) -> StoreResult<Camp> {
        let mut inner = self.inner.lock().unwrap();
        if inner.camps.iter().any(|c| c.slug == req.slug) {
            return Err(StoreError::Conflict(format!("duplicate slug {}", req.slug)));
        }
        let now = Utc::now();
        let camp = Camp {
            id: Uuid::new_v4(),
            slug: req.slug.clone(),
            name: req.name.clone(),
            starts_at: req.starts_at,
            ends_at: req.ends_at,
            venue: req.venue.clone(),
            contact_phone: req.contact_phone.clone(),
            hospital_name: req.hospital_name.clone(),
            created_at: now,
            updated_at: now,
        };
        inner.camps.push(camp.clone());
        Ok(camp)
    }

    async fn find_camp(&self, id: Uuid) -> StoreResult<Option<Camp>> {
        Ok(self.inner.lock().unwrap().camps.iter().find(|c| c.id == id).cloned())
    }

    async fn find_camp_by_slug(&self, slug: &str) -> StoreResult<Option<Camp>> {
        Ok(self.inner.lock().unwrap().camps.iter().find(|c| c.slug == slug).cloned())
    }

    async fn list_camps(&self) -> StoreResult<Vec<Camp>> {
        Ok(self.inner.lock().unwrap().camps.clone())
    }

    async fn update_camp(&self, id: Uuid, req: &UpdateCampRequest) -> StoreResult<Option<Camp>> {
        let mut inner = self.inner.lock().unwrap();
        let Some(camp) = inner.camps.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        if let Some(name) = &req.name {
            camp.name = name.clone();
        }
        if let Some(starts_at) = req.starts_at {
            camp.starts_at = starts_at;
        }
        if let Some(ends_at) = req.ends_at {
            camp.ends_at = ends_at;
        }
        if let Some(venue) = &req.venue {
            camp.venue = Some(venue.clone());
        }
        if let Some(phone) = &req.contact_phone {
            camp.contact_phone = Some(phone.clone());
        }
        if let Some(hospital) = &req.hospital_name {
            camp.hospital_name = Some(hospital.clone());
        }
        camp.updated_at = Utc::now();
        Ok(Some(camp.clone()))
    }

    async fn delete_camp_cascade(&self, id: Uuid) -> StoreResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.camps.iter().any(|c| c.id == id) {
            return Ok(false);
        }
        let visit_ids: Vec<Uuid> = inner
            .visits
            .iter()
            .filter(|v| v.camp_id == id)
            .map(|v| v.id)
            .collect();
        inner.log.retain(|e| e.camp_id != id);
        inner.attachments.retain(|a| a.camp_id != id);
        inner.consultations.retain(|c| !visit_ids.contains(&c.visit_id));
        inner.visits.retain(|v| v.camp_id != id);
        inner.visitors.retain(|p| p.camp_id != id);
        inner.counters.remove(&id);
        inner.users.retain(|u| u.camp_id != Some(id));
        inner.camps.retain(|c| c.id != id);
        Ok(true)
    }

    async fn create_user(&self, new: &NewUser) -> StoreResult<User> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.iter().any(|u| u.email == new.email) {
            return Err(StoreError::Conflict(format!("duplicate email {}", new.email)));
        }
        let user = User {
            id: Uuid::new_v4(),
            camp_id: new.camp_id,
            email: new.email.clone(),
            password_hash: new.password_hash.clone(),
            full_name: new.full_name.clone(),
            role: new.role.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.email == email && u.is_active)
            .cloned())
    }

    async fn list_staff(&self, camp_id: Uuid) -> StoreResult<Vec<User>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .users
            .iter()
            .filter(|u| u.camp_id == Some(camp_id) && u.is_active)
            .cloned()
            .collect())
    }

    async fn next_patient_seq(&self, camp_id: Uuid) -> StoreResult<i64> {
        let mut inner = self.inner.lock().unwrap();
        let seq = inner.counters.entry(camp_id).or_insert(0);
        *seq += 1;
        Ok(*seq)
    }

    async fn create_visitor(&self, new: &NewVisitor, now: DateTime<Utc>) -> StoreResult<Visitor> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .visitors
            .iter()
            .any(|p| p.camp_id == new.camp_id && p.patient_id == new.patient_id)
        {
            return Err(StoreError::Conflict(format!(
                "duplicate patient id {}",
                new.patient_id
            )));
        }
        let visitor = Visitor {
            id: Uuid::new_v4(),
            camp_id: new.camp_id,
            patient_id: new.patient_id.clone(),
            full_name: new.full_name.clone(),
            phone: new.phone.clone(),
            age: new.age,
            gender: new.gender.clone(),
            address: new.address.clone(),
            chat_id: None,
            created_at: now,
        };
        inner.visitors.push(visitor.clone());
        Ok(visitor)
    }

    async fn find_visitor(&self, id: Uuid) -> StoreResult<Option<Visitor>> {
        Ok(self.inner.lock().unwrap().visitors.iter().find(|p| p.id == id).cloned())
    }

    async fn find_visitor_by_contact(&self, needle: &str) -> StoreResult<Option<Visitor>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .visitors
            .iter()
            .find(|p| p.phone == needle || p.patient_id == needle)
            .cloned())
    }

    async fn set_chat_link(&self, visitor_id: Uuid, chat_id: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        let Some(visitor) = inner.visitors.iter_mut().find(|p| p.id == visitor_id) else {
            return Ok(false);
        };
        match &visitor.chat_id {
            Some(existing) if existing != chat_id => Ok(false),
            _ => {
                visitor.chat_id = Some(chat_id.to_string());
                Ok(true)
            }
        }
    }

    async fn create_visit(&self, new: &NewVisit, now: DateTime<Utc>) -> StoreResult<Visit> {
        let mut inner = self.inner.lock().unwrap();
        let visit = Visit {
            id: Uuid::new_v4(),
            camp_id: new.camp_id,
            visitor_id: new.visitor_id,
            doctor_id: None,
            status: VisitStatus::Registered.to_string(),
            consultation_at: None,
            created_at: now,
        };
        inner.visits.push(visit.clone());
        Ok(visit)
    }

    async fn find_visit(&self, id: Uuid) -> StoreResult<Option<Visit>> {
        Ok(self.inner.lock().unwrap().visits.iter().find(|v| v.id == id).cloned())
    }

    async fn find_open_visit(&self, camp_id: Uuid, visitor_id: Uuid) -> StoreResult<Option<Visit>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .visits
            .iter()
            .rev()
            .find(|v| v.camp_id == camp_id && v.visitor_id == visitor_id && v.is_open())
            .cloned())
    }

    async fn list_visits(
        &self,
        camp_id: Uuid,
        status: Option<VisitStatus>,
    ) -> StoreResult<Vec<VisitSummary>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .visits
            .iter()
            .filter(|v| v.camp_id == camp_id)
            .filter(|v| status.is_none_or(|s| v.status() == s))
            .filter_map(|v| {
                inner
                    .visitors
                    .iter()
                    .find(|p| p.id == v.visitor_id)
                    .map(|p| summary(v, p))
            })
            .collect())
    }

    async fn search_visits(
        &self,
        camp_id: Uuid,
        query: &str,
        field: Option<SearchField>,
    ) -> StoreResult<Vec<VisitSummary>> {
        let needle = query.trim().to_lowercase();
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .visits
            .iter()
            .filter(|v| v.camp_id == camp_id)
            .filter_map(|v| {
                inner
                    .visitors
                    .iter()
                    .find(|p| p.id == v.visitor_id)
                    .map(|p| (v, p))
            })
            .filter(|(_, p)| {
                let name = p.full_name.to_lowercase().contains(&needle);
                let phone = p.phone.to_lowercase().contains(&needle);
                let pid = p.patient_id.to_lowercase().contains(&needle);
                match field {
                    Some(SearchField::Name) => name,
                    Some(SearchField::Phone) => phone,
                    Some(SearchField::PatientId) => pid,
                    None => name || phone || pid,
                }
            })
            .map(|(v, p)| summary(v, p))
            .collect())
    }

    async fn complete_visit(
        &self,
        visit_id: Uuid,
        doctor_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(visit) = inner.visits.iter_mut().find(|v| v.id == visit_id) {
            visit.status = VisitStatus::Completed.to_string();
            visit.doctor_id = Some(doctor_id);
            visit.consultation_at = Some(at);
        }
        Ok(())
    }

    async fn upsert_consultation(
        &self,
        visit_id: Uuid,
        input: &ConsultationInput,
        now: DateTime<Utc>,
    ) -> StoreResult<Consultation> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.consultations.iter_mut().find(|c| c.visit_id == visit_id) {
            existing.symptoms = input.symptoms.clone();
            existing.diagnosis = input.diagnosis.clone();
            existing.notes = input.notes.clone();
            existing.prescriptions = Json(input.prescriptions.clone());
            existing.follow_up = input.follow_up.clone();
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        let consultation = Consultation {
            id: Uuid::new_v4(),
            visit_id,
            symptoms: input.symptoms.clone(),
            diagnosis: input.diagnosis.clone(),
            notes: input.notes.clone(),
            prescriptions: Json(input.prescriptions.clone()),
            follow_up: input.follow_up.clone(),
            created_at: now,
            updated_at: now,
        };
        inner.consultations.push(consultation.clone());
        Ok(consultation)
    }

    async fn find_consultation(&self, visit_id: Uuid) -> StoreResult<Option<Consultation>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .consultations
            .iter()
            .find(|c| c.visit_id == visit_id)
            .cloned())
    }

    async fn create_attachment(
        &self,
        camp_id: Uuid,
        req: &CreateAttachmentRequest,
    ) -> StoreResult<Attachment> {
        let mut inner = self.inner.lock().unwrap();
        let attachment = Attachment {
            id: Uuid::new_v4(),
            camp_id,
            visit_id: req.visit_id,
            consultation_id: req.consultation_id,
            kind: req.kind.to_string(),
            file_url: req.file_url.clone(),
            file_name: req.file_name.clone(),
            mime_type: req.mime_type.clone(),
            size_bytes: req.size_bytes,
            created_at: Utc::now(),
        };
        inner.attachments.push(attachment.clone());
        Ok(attachment)
    }

    async fn list_attachments(&self, camp_id: Uuid, visit_id: Uuid) -> StoreResult<Vec<Attachment>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .attachments
            .iter()
            .filter(|a| a.camp_id == camp_id && a.visit_id == visit_id)
            .cloned()
            .collect())
    }

    async fn delete_attachment(&self, camp_id: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.attachments.len();
        inner.attachments.retain(|a| !(a.id == id && a.camp_id == camp_id));
        Ok(inner.attachments.len() < before)
    }

    async fn insert_notification(&self, new: &NewLogEntry) -> StoreResult<Uuid> {
        let mut inner = self.inner.lock().unwrap();
        let entry = NotificationLogEntry {
            id: Uuid::new_v4(),
            camp_id: new.camp_id,
            visitor_id: new.visitor_id,
            kind: new.kind.to_string(),
            body: new.body.clone(),
            status: NotificationStatus::Pending.to_string(),
            detail: None,
            sent_at: None,
            created_at: Utc::now(),
        };
        let id = entry.id;
        inner.log.push(entry);
        Ok(id)
    }

    async fn finish_notification(
        &self,
        id: Uuid,
        status: NotificationStatus,
        detail: Option<&str>,
        sent_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(entry) = inner
            .log
            .iter_mut()
            .find(|e| e.id == id && e.status == NotificationStatus::Pending.to_string())
        {
            entry.status = status.to_string();
            entry.detail = detail.map(str::to_string);
            entry.sent_at = sent_at;
        }
        Ok(())
    }

    async fn query_notifications(
        &self,
        camp_id: Uuid,
        filter: &LogFilter,
    ) -> StoreResult<Vec<NotificationLogEntry>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .log
            .iter()
            .filter(|e| e.camp_id == camp_id)
            .filter(|e| filter.visitor_id.is_none_or(|v| e.visitor_id == v))
            .filter(|e| filter.kind.is_none_or(|k| e.kind == k.to_string()))
            .filter(|e| filter.status.is_none_or(|s| e.status == s.to_string()))
            .cloned()
            .collect())
    }
}
