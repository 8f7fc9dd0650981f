//! Inbound chat webhook handling: links a chat channel to a visitor record
//! by exact phone or patient id. Once linked, the channel receives the
//! visitor's notifications directly.

use std::sync::Arc;

use crate::models::visitor::Visitor;
use crate::services::notify::{escape_html, MessagePayload, NotificationDispatcher};
use crate::store::Store;

/// One message as delivered by the provider webhook, reduced to what the
/// linking flow needs.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub channel_id: String,
    pub text: String,
    pub sender_name: Option<String>,
}

/// Outcome of handling one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkResult {
    /// Greeting or command; replied with usage instructions.
    Help,
    /// The channel is linked to a visitor (first link or idempotent replay).
    Linked,
    /// The visitor is already linked to a different channel; first link wins.
    Conflict,
    /// No visitor matched the supplied phone or patient id.
    NotFound,
}

pub struct ChatLinkService {
    dispatcher: Arc<NotificationDispatcher>,
}

impl ChatLinkService {
    pub fn new(dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Handle one inbound message. Infallible by design: the webhook must
    /// always acknowledge, so lookup errors degrade to a NotFound reply.
    pub async fn handle(&self, store: &dyn Store, msg: &InboundMessage) -> LinkResult {
        let text = msg.text.trim();

        if text.is_empty() || text.starts_with('/') {
            self.dispatcher.reply(&msg.channel_id, &help_text(msg)).await;
            return LinkResult::Help;
        }

        let visitor = match store.find_visitor_by_contact(text).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("chat link lookup for {:?} failed: {e}", text);
                None
            }
        };
        let Some(visitor) = visitor else {
            self.dispatcher
                .reply(
                    &msg.channel_id,
                    &format!(
                        "No registration found for \"{}\". Send the phone number \
                         or patient ID you registered with.",
                        escape_html(text)
                    ),
                )
                .await;
            return LinkResult::NotFound;
        };

        match &visitor.chat_id {
            Some(existing) if *existing == msg.channel_id => {
                self.dispatcher
                    .reply(&msg.channel_id, "You are already receiving updates here.")
                    .await;
                LinkResult::Linked
            }
            Some(existing) => self.refuse(&visitor, existing, &msg.channel_id).await,
            // The store claim is atomic; a concurrent delivery that won the
            // link between our read and this write surfaces as a refusal.
            None => match store.set_chat_link(visitor.id, &msg.channel_id).await {
                Ok(true) => {
                    self.confirm(store, &visitor, &msg.channel_id).await;
                    LinkResult::Linked
                }
                Ok(false) => self.refuse(&visitor, "another channel", &msg.channel_id).await,
                Err(e) => {
                    tracing::warn!("chat link persist for visitor {} failed: {e}", visitor.id);
                    LinkResult::NotFound
                }
            },
        }
    }

    /// First link wins: the attempt is logged and the newcomer is told the
    /// registration is already claimed.
    async fn refuse(&self, visitor: &Visitor, existing: &str, refused: &str) -> LinkResult {
        tracing::warn!(
            "refused re-link for visitor {}: linked to channel {existing}, attempt from {refused}",
            visitor.id
        );
        self.dispatcher
            .reply(
                refused,
                "That registration is already receiving updates on another chat.",
            )
            .await;
        LinkResult::Conflict
    }

    /// Confirmation goes through the dispatcher so it lands in the
    /// notification log like every other outbound message.
    async fn confirm(&self, store: &dyn Store, visitor: &Visitor, channel_id: &str) {
        let camp = match store.find_camp(visitor.camp_id).await {
            Ok(Some(camp)) => camp,
            Ok(None) => {
                tracing::warn!("visitor {} references missing camp", visitor.id);
                return;
            }
            Err(e) => {
                tracing::warn!("camp lookup for confirmation failed: {e}");
                return;
            }
        };
        let mut linked = visitor.clone();
        linked.chat_id = Some(channel_id.to_string());
        let payload = MessagePayload::Custom {
            text: format!(
                "{}, you are now linked to {}. Updates about your visits will arrive here.",
                visitor.full_name, camp.name
            ),
        };
        self.dispatcher.dispatch(store, &camp, &linked, &payload).await;
    }
}

fn help_text(msg: &InboundMessage) -> String {
    let greeting = match &msg.sender_name {
        Some(name) => format!("Hello {name}!"),
        None => "Hello!".to_string(),
    };
    format!(
        "{greeting} Send the phone number or patient ID you registered with \
         to receive camp updates here."
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;
    use crate::models::notification::LogFilter;
    use crate::models::visitor::NewVisitor;
    use crate::services::telegram::fakes::{FakeProvider, InlineCodes, SentMessage};
    use crate::store::memory::MemStore;

    fn service(provider: Arc<FakeProvider>) -> ChatLinkService {
        ChatLinkService::new(Arc::new(NotificationDispatcher::new(
            provider,
            Arc::new(InlineCodes),
            None,
            Duration::from_secs(5),
        )))
    }

    async fn seed_visitor(store: &MemStore, camp_id: Uuid, phone: &str) -> Visitor {
        store
            .create_visitor(
                &NewVisitor {
                    camp_id,
                    patient_id: "WINTER-CLINIC-0001".into(),
                    full_name: "Asha".into(),
                    phone: phone.into(),
                    age: None,
                    gender: None,
                    address: None,
                },
                chrono::Utc::now(),
            )
            .await
            .unwrap()
    }

    fn inbound(channel: &str, text: &str) -> InboundMessage {
        InboundMessage {
            channel_id: channel.into(),
            text: text.into(),
            sender_name: Some("Asha".into()),
        }
    }

    #[tokio::test]
    async fn start_command_gets_help() {
        let store = MemStore::new();
        let provider = Arc::new(FakeProvider::default());
        let svc = service(provider.clone());

        let result = svc.handle(&store, &inbound("999", "/start")).await;

        assert_eq!(result, LinkResult::Help);
        match &provider.sent()[0] {
            SentMessage::Text { address, body } => {
                assert_eq!(address, "999");
                assert!(body.contains("Hello Asha!"));
                assert!(body.contains("phone number or patient ID"));
            }
            other => panic!("expected text reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn phone_match_links_and_confirms_through_log() {
        let store = MemStore::new();
        let camp = store.seed_camp("winter-clinic", "Winter Clinic").await;
        let visitor = seed_visitor(&store, camp.id, "+1555000111").await;
        let provider = Arc::new(FakeProvider::default());
        let svc = service(provider.clone());

        let result = svc.handle(&store, &inbound("999", "+1555000111")).await;

        assert_eq!(result, LinkResult::Linked);
        let stored = store.find_visitor(visitor.id).await.unwrap().unwrap();
        assert_eq!(stored.chat_id.as_deref(), Some("999"));
        match &provider.sent()[0] {
            SentMessage::Text { address, body } => {
                assert_eq!(address, "999");
                assert!(body.contains("Winter Clinic"));
            }
            other => panic!("expected confirmation text, got {other:?}"),
        }
        // Confirmation is a logged dispatch, unlike conversational replies.
        let log = store.query_notifications(camp.id, &LogFilter::default()).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].status, "sent");
    }

    #[tokio::test]
    async fn patient_id_match_links_too() {
        let store = MemStore::new();
        let camp = store.seed_camp("winter-clinic", "Winter Clinic").await;
        let visitor = seed_visitor(&store, camp.id, "+1555000111").await;
        let svc = service(Arc::new(FakeProvider::default()));

        let result = svc.handle(&store, &inbound("999", "WINTER-CLINIC-0001")).await;

        assert_eq!(result, LinkResult::Linked);
        let stored = store.find_visitor(visitor.id).await.unwrap().unwrap();
        assert_eq!(stored.chat_id.as_deref(), Some("999"));
    }

    #[tokio::test]
    async fn replay_from_same_channel_is_idempotent() {
        let store = MemStore::new();
        let camp = store.seed_camp("winter-clinic", "Winter Clinic").await;
        let visitor = seed_visitor(&store, camp.id, "+1555000111").await;
        let svc = service(Arc::new(FakeProvider::default()));

        svc.handle(&store, &inbound("999", "+1555000111")).await;
        let result = svc.handle(&store, &inbound("999", "+1555000111")).await;

        assert_eq!(result, LinkResult::Linked);
        let stored = store.find_visitor(visitor.id).await.unwrap().unwrap();
        assert_eq!(stored.chat_id.as_deref(), Some("999"));
        // The replay adds no second log entry.
        let log = store.query_notifications(camp.id, &LogFilter::default()).await.unwrap();
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn first_link_wins_over_later_channel() {
        let store = MemStore::new();
        let camp = store.seed_camp("winter-clinic", "Winter Clinic").await;
        let visitor = seed_visitor(&store, camp.id, "+1555000111").await;
        let provider = Arc::new(FakeProvider::default());
        let svc = service(provider.clone());

        svc.handle(&store, &inbound("999", "+1555000111")).await;
        let result = svc.handle(&store, &inbound("888", "+1555000111")).await;

        assert_eq!(result, LinkResult::Conflict);
        let stored = store.find_visitor(visitor.id).await.unwrap().unwrap();
        assert_eq!(stored.chat_id.as_deref(), Some("999"));
        match provider.sent().last().unwrap() {
            SentMessage::Text { address, body } => {
                assert_eq!(address, "888");
                assert!(body.contains("another chat"));
            }
            other => panic!("expected conflict reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unmatched_contact_gets_not_found_reply_without_log_entry() {
        let store = MemStore::new();
        let camp = store.seed_camp("winter-clinic", "Winter Clinic").await;
        let provider = Arc::new(FakeProvider::default());
        let svc = service(provider.clone());

        let result = svc.handle(&store, &inbound("999", "+1999999999")).await;

        assert_eq!(result, LinkResult::NotFound);
        match &provider.sent()[0] {
            SentMessage::Text { body, .. } => {
                assert!(body.contains("No registration found"));
                // The reply names what the sender actually typed.
                assert!(body.contains("+1999999999"));
            }
            other => panic!("expected text reply, got {other:?}"),
        }
        let log = store.query_notifications(camp.id, &LogFilter::default()).await.unwrap();
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn not_found_echo_escapes_markup() {
        let store = MemStore::new();
        store.seed_camp("winter-clinic", "Winter Clinic").await;
        let provider = Arc::new(FakeProvider::default());
        let svc = service(provider.clone());

        svc.handle(&store, &inbound("999", "<b>nope</b>")).await;

        match &provider.sent()[0] {
            SentMessage::Text { body, .. } => {
                assert!(body.contains("&lt;b&gt;nope&lt;/b&gt;"));
                assert!(!body.contains("<b>nope"));
            }
            other => panic!("expected text reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn chat_link_claim_is_first_writer_wins() {
        let store = MemStore::new();
        let camp = store.seed_camp("winter-clinic", "Winter Clinic").await;
        let visitor = seed_visitor(&store, camp.id, "+1555000111").await;

        // Two webhook handlers racing to claim the link: only the first
        // write succeeds, and re-claiming the same channel stays true.
        assert!(store.set_chat_link(visitor.id, "999").await.unwrap());
        assert!(!store.set_chat_link(visitor.id, "888").await.unwrap());
        assert!(store.set_chat_link(visitor.id, "999").await.unwrap());

        let stored = store.find_visitor(visitor.id).await.unwrap().unwrap();
        assert_eq!(stored.chat_id.as_deref(), Some("999"));
    }
}
