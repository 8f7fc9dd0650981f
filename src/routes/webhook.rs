use axum::{extract::State, http::StatusCode, Json};
use serde_json::Value;

use crate::services::chat_link::InboundMessage;
use crate::AppState;

/// Inbound webhook from the chat provider. Always acknowledges with 200:
/// a non-2xx response makes the provider redeliver the same update, which
/// would just replay a failure we already logged.
pub async fn telegram_update(State(state): State<AppState>, Json(update): Json<Value>) -> StatusCode {
    let Some(message) = parse_update(&update) else {
        return StatusCode::OK;
    };

    state.chat_link.handle(state.store.as_ref(), &message).await;
    StatusCode::OK
}

/// Reduce a Bot API update to the fields the linking flow needs. Edited
/// messages, channel posts and non-text payloads are ignored.
fn parse_update(update: &Value) -> Option<InboundMessage> {
    let message = update.get("message")?;
    let chat_id = message.get("chat")?.get("id")?.as_i64()?;
    let text = message.get("text")?.as_str()?;
    let sender_name = message
        .get("from")
        .and_then(|f| f.get("first_name"))
        .and_then(|n| n.as_str())
        .map(str::to_string);
    Some(InboundMessage {
        channel_id: chat_id.to_string(),
        text: text.to_string(),
        sender_name,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_a_plain_text_update() {
        let update = json!({
            "update_id": 10,
            "message": {
                "message_id": 5,
                "chat": { "id": 999, "type": "private" },
                "from": { "id": 7, "first_name": "Asha" },
                "text": "+1555000111"
            }
        });
        let msg = parse_update(&update).unwrap();
        assert_eq!(msg.channel_id, "999");
        assert_eq!(msg.text, "+1555000111");
        assert_eq!(msg.sender_name.as_deref(), Some("Asha"));
    }

    #[test]
    fn ignores_updates_without_text() {
        let update = json!({
            "update_id": 11,
            "message": {
                "message_id": 6,
                "chat": { "id": 999, "type": "private" },
                "photo": [{ "file_id": "abc" }]
            }
        });
        assert!(parse_update(&update).is_none());
    }

    #[test]
    fn ignores_non_message_updates() {
        let update = json!({ "update_id": 12, "edited_message": { "text": "x" } });
        assert!(parse_update(&update).is_none());
    }
}
