//! Notification dispatcher: renders and delivers transactional messages,
//! recording every attempt in the notification log. Delivery is best-effort;
//! nothing in here may fail the operation that triggered the dispatch.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    camp::Camp,
    notification::{DispatchResult, NewLogEntry, NotificationKind, NotificationStatus},
    visitor::Visitor,
};
use crate::services::telegram::{ChatProvider, CodeGenerator, MARKUP_HTML};
use crate::store::Store;

/// The content a scannable registration code carries: enough to check a
/// visitor in at the camp desk. Encoding is textual and reversible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPayload {
    pub camp_id: Uuid,
    pub patient_id: String,
}

impl std::fmt::Display for ScanPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "medcamp://scan?camp={}&patient={}", self.camp_id, self.patient_id)
    }
}

impl FromStr for ScanPayload {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix("medcamp://scan?")
            .ok_or_else(|| anyhow::anyhow!("not a scan payload: {s}"))?;
        let mut camp_id = None;
        let mut patient_id = None;
        for pair in rest.split('&') {
            match pair.split_once('=') {
                Some(("camp", v)) => camp_id = Some(v.parse()?),
                Some(("patient", v)) => patient_id = Some(v.to_string()),
                _ => anyhow::bail!("unexpected scan payload field: {pair}"),
            }
        }
        Ok(Self {
            camp_id: camp_id.ok_or_else(|| anyhow::anyhow!("scan payload missing camp"))?,
            patient_id: patient_id.ok_or_else(|| anyhow::anyhow!("scan payload missing patient"))?,
        })
    }
}

/// Escape user-supplied text for the HTML markup dialect, character for
/// character — an unescaped '<' in a visitor name would fail the send.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

/// Format check only (not validation): something we could plausibly have
/// reached over a phone network, used to gate the test-mode fallback.
pub fn looks_like_phone(s: &str) -> bool {
    let trimmed = s.trim();
    let rest = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let digits = rest.chars().filter(|c| c.is_ascii_digit()).count();
    digits >= 7 && rest.chars().all(|c| c.is_ascii_digit() || c == ' ' || c == '-')
}

/// What to say, per message kind.
#[derive(Debug, Clone)]
pub enum MessagePayload {
    Registration,
    ConsultationComplete {
        diagnosis: String,
        follow_up: Option<String>,
    },
    AppointmentReminder {
        at: DateTime<Utc>,
    },
    Custom {
        text: String,
    },
}

impl MessagePayload {
    pub fn kind(&self) -> NotificationKind {
        match self {
            MessagePayload::Registration => NotificationKind::Registration,
            MessagePayload::ConsultationComplete { .. } => NotificationKind::ConsultationComplete,
            MessagePayload::AppointmentReminder { .. } => NotificationKind::AppointmentReminder,
            MessagePayload::Custom { .. } => NotificationKind::Custom,
        }
    }
}

enum Address {
    Linked(String),
    TestFallback(String),
}

pub struct NotificationDispatcher {
    provider: Arc<dyn ChatProvider>,
    codes: Arc<dyn CodeGenerator>,
    /// Configured at construction, never read from the environment at call
    /// time; tests inject their own value.
    fallback_chat_id: Option<String>,
    timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        codes: Arc<dyn CodeGenerator>,
        fallback_chat_id: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            codes,
            fallback_chat_id,
            timeout,
        }
    }

    /// Deliver one message and record exactly one log entry for the attempt.
    /// Never returns an error: Skipped and Failed are ordinary outcomes.
    pub async fn dispatch(
        &self,
        store: &dyn Store,
        camp: &Camp,
        visitor: &Visitor,
        payload: &MessagePayload,
    ) -> DispatchResult {
        let body = self.render(camp, visitor, payload);
        let address = self.resolve_address(visitor);

        let log_body = match &address {
            Some(Address::TestFallback(_)) => format!("[test-mode] {body}"),
            _ => body.clone(),
        };
        let entry_id = match store
            .insert_notification(&NewLogEntry {
                camp_id: camp.id,
                visitor_id: visitor.id,
                kind: payload.kind(),
                body: log_body,
            })
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!("notification log insert failed: {e}");
                None
            }
        };

        let address = match address {
            Some(Address::Linked(a)) | Some(Address::TestFallback(a)) => a,
            None => {
                let reason = "no deliverable address";
                self.finish(store, entry_id, NotificationStatus::Skipped, Some(reason), None)
                    .await;
                return DispatchResult::Skipped(reason.to_string());
            }
        };

        let send = async {
            match payload {
                MessagePayload::Registration => {
                    let code = self
                        .codes
                        .encode(&ScanPayload {
                            camp_id: camp.id,
                            patient_id: visitor.patient_id.clone(),
                        })
                        .await?;
                    self.provider.send_image(&address, code, &body, MARKUP_HTML).await
                }
                _ => self.provider.send_text(&address, &body, MARKUP_HTML).await,
            }
        };

        match tokio::time::timeout(self.timeout, send).await {
            Ok(Ok(())) => {
                self.finish(store, entry_id, NotificationStatus::Sent, None, Some(Utc::now()))
                    .await;
                DispatchResult::Sent
            }
            Ok(Err(e)) => {
                let detail = format!("{e:#}");
                tracing::warn!("dispatch to visitor {} failed: {detail}", visitor.id);
                self.finish(store, entry_id, NotificationStatus::Failed, Some(&detail), None)
                    .await;
                DispatchResult::Failed(detail)
            }
            Err(_) => {
                let detail = "provider timed out".to_string();
                tracing::warn!("dispatch to visitor {} timed out", visitor.id);
                self.finish(store, entry_id, NotificationStatus::Failed, Some(&detail), None)
                    .await;
                DispatchResult::Failed(detail)
            }
        }
    }

    /// Conversational reply on the webhook path: no visitor to log against,
    /// so failures are only warned about.
    pub async fn reply(&self, address: &str, body: &str) {
        let send = self.provider.send_text(address, body, MARKUP_HTML);
        match tokio::time::timeout(self.timeout, send).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("webhook reply to {address} failed: {e:#}"),
            Err(_) => tracing::warn!("webhook reply to {address} timed out"),
        }
    }

    fn resolve_address(&self, visitor: &Visitor) -> Option<Address> {
        if let Some(chat_id) = &visitor.chat_id {
            return Some(Address::Linked(chat_id.clone()));
        }
        match &self.fallback_chat_id {
            Some(fallback) if looks_like_phone(&visitor.phone) => {
                Some(Address::TestFallback(fallback.clone()))
            }
            _ => None,
        }
    }

    fn render(&self, camp: &Camp, visitor: &Visitor, payload: &MessagePayload) -> String {
        let name = escape_html(&visitor.full_name);
        let camp_name = escape_html(&camp.name);
        let patient_id = escape_html(&visitor.patient_id);
        match payload {
            MessagePayload::Registration => format!(
                "<b>{name}</b>, you are registered for <b>{camp_name}</b>.\n\
                 Patient ID: <b>{patient_id}</b>\n\
                 Show this code at the camp desk.",
            ),
            MessagePayload::ConsultationComplete { diagnosis, follow_up } => {
                let mut text = format!(
                    "Hello <b>{name}</b>, your consultation at <b>{camp_name}</b> is complete.\n\
                     Diagnosis: {}",
                    escape_html(diagnosis),
                );
                if let Some(advice) = follow_up {
                    text.push_str(&format!("\nFollow-up: {}", escape_html(advice)));
                }
                text
            }
            MessagePayload::AppointmentReminder { at } => format!(
                "Reminder for <b>{name}</b>: appointment at <b>{camp_name}</b> on {}.",
                at.format("%Y-%m-%d %H:%M UTC"),
            ),
            MessagePayload::Custom { text } => escape_html(text),
        }
    }

    async fn finish(
        &self,
        store: &dyn Store,
        entry_id: Option<Uuid>,
        status: NotificationStatus,
        detail: Option<&str>,
        sent_at: Option<DateTime<Utc>>,
    ) {
        let Some(id) = entry_id else { return };
        if let Err(e) = store.finish_notification(id, status, detail, sent_at).await {
            tracing::warn!("notification log update failed for {id}: {e}");
        }
    }
}

/// Fire-and-forget dispatch: spawns a background task, never blocks the
/// triggering operation and never propagates a failure into it.
pub fn dispatch_detached(
    dispatcher: Arc<NotificationDispatcher>,
    store: Arc<dyn Store>,
    camp: Camp,
    visitor: Visitor,
    payload: MessagePayload,
) {
    tokio::spawn(async move {
        if let DispatchResult::Failed(reason) =
            dispatcher.dispatch(store.as_ref(), &camp, &visitor, &payload).await
        {
            tracing::warn!(
                "background dispatch ({}) for visitor {} failed: {reason}",
                payload.kind(),
                visitor.id
            );
        }
    });
}
