//! Wire types for the Bot API long-poll endpoint and the message type the
//! update stream emits.

use serde::{Deserialize, Serialize};

/// Envelope returned by `getUpdates`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatesResponse {
    pub ok: bool,
    #[serde(default)]
    pub result: Vec<Update>,
    pub description: Option<String>,
}

/// One update. Non-message update kinds arrive with `message: None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<WireMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub message_id: i64,
    pub chat: WireChat,
    pub text: Option<String>,
    pub from: Option<WireUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireChat {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireUser {
    pub first_name: Option<String>,
}

/// An inbound text message, handed to the application once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub chat_id: String,
    pub message_id: i64,
    pub text: String,
    pub sender_display_name: Option<String>,
}

impl RawMessage {
    /// Extract the text message carried by `update`, if any.
    ///
    /// Updates without a message or with empty text yield `None`.
    pub fn from_update(update: Update) -> Option<Self> {
        let message = update.message?;
        let text = message.text.filter(|t| !t.is_empty())?;
        Some(Self {
            chat_id: message.chat.id.to_string(),
            message_id: message.message_id,
            text,
            sender_display_name: message.from.and_then(|f| f.first_name),
        })
    }

    /// Dedup key: a message is identified by its chat and message id.
    pub fn key(&self) -> (String, i64) {
        (self.chat_id.clone(), self.message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_message_update() {
        let json = r#"{
            "ok": true,
            "result": [
                {"update_id": 10, "message": {"message_id": 7, "chat": {"id": -42},
                 "text": "500 groceries", "from": {"first_name": "Nami", "id": 1}, "date": 0}},
                {"update_id": 11, "edited_message": {"message_id": 7}}
            ]
        }"#;
        let resp: UpdatesResponse = serde_json::from_str(json).unwrap();
        assert!(resp.ok);
        assert_eq!(resp.result.len(), 2);
        assert!(resp.result[1].message.is_none());

        let msg = RawMessage::from_update(resp.result[0].clone()).unwrap();
        assert_eq!(msg.chat_id, "-42");
        assert_eq!(msg.message_id, 7);
        assert_eq!(msg.text, "500 groceries");
        assert_eq!(msg.sender_display_name.as_deref(), Some("Nami"));
        assert_eq!(msg.key(), ("-42".to_string(), 7));
    }

    #[test]
    fn missing_result_defaults_to_empty() {
        let resp: UpdatesResponse =
            serde_json::from_str(r#"{"ok": false, "description": "Unauthorized"}"#).unwrap();
        assert!(!resp.ok);
        assert!(resp.result.is_empty());
        assert_eq!(resp.description.as_deref(), Some("Unauthorized"));
    }

    #[test]
    fn textless_messages_are_not_emitted() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 1,
            "message": {"message_id": 2, "chat": {"id": 3}, "photo": []}
        }))
        .unwrap();
        assert!(RawMessage::from_update(update).is_none());

        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 1,
            "message": {"message_id": 2, "chat": {"id": 3}, "text": ""}
        }))
        .unwrap();
        assert!(RawMessage::from_update(update).is_none());
    }
}
