//! Wire types for the food-chat assistant and the meal it can hand back.
//!
//! The assistant replies with free text and, once the user has confirmed a
//! meal, a `logging_data` block. That block is turned into catalog components
//! and a meal entry by `VitalService::record_chat_log`.

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::models::Macros;

/// Tag put on every component created from a chat reply.
pub const CHAT_TAG: &str = "ai-generated";
/// Notes stored on meals logged from a chat reply.
pub const CHAT_NOTES: &str = "Logged via AI Chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Body of `POST {endpoint}/api/chat/food`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging_data: Option<ChatLog>,
}

/// A confirmed meal as described by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatLog {
    #[serde(default)]
    pub components: Vec<ChatComponent>,
    /// The assistant's own sum. Informational; the stored snapshot is recomputed.
    #[serde(default)]
    pub totals: Option<Macros>,
}

/// One item of a chat meal. `macros` already reflect the eaten quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatComponent {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portion: Option<String>,
    pub macros: Macros,
}

impl ChatLog {
    pub fn validate(&self) -> Result<()> {
        if self.components.is_empty() {
            return Err(LedgerError::validation("Chat log has no components"));
        }
        for c in &self.components {
            if c.name.trim().is_empty() {
                return Err(LedgerError::validation("Chat component name cannot be empty"));
            }
            c.macros.validate(&c.name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = r#"{
        "content": "Great! Meal logged.",
        "logging_data": {
            "components": [
                { "name": "Fried Egg", "portion": "2 large",
                  "macros": { "protein": 12, "netCarbs": 1, "fat": 14, "calories": 180 } },
                { "name": "Keto Toast",
                  "macros": { "protein": 6, "netCarbs": 3, "fat": 4, "calories": 90 } }
            ],
            "totals": { "protein": 18, "netCarbs": 4, "fat": 18, "calories": 270 }
        }
    }"#;

    #[test]
    fn test_parse_reply_with_logging_data() {
        let reply: ChatReply = serde_json::from_str(REPLY).unwrap();
        assert_eq!(reply.content, "Great! Meal logged.");
        let log = reply.logging_data.unwrap();
        assert_eq!(log.components.len(), 2);
        assert_eq!(log.components[0].portion.as_deref(), Some("2 large"));
        assert_eq!(log.components[1].portion, None);
        assert_eq!(log.components[0].macros.net_carbs, 1.0);
        assert_eq!(log.totals.unwrap().calories, 270.0);
        log.validate().unwrap();
    }

    #[test]
    fn test_parse_plain_reply() {
        let reply: ChatReply =
            serde_json::from_str(r#"{"content":"How many eggs?","logging_data":null}"#).unwrap();
        assert!(reply.logging_data.is_none());

        let reply: ChatReply = serde_json::from_str(r#"{"content":"How big?"}"#).unwrap();
        assert!(reply.logging_data.is_none());
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            history: vec![
                ChatMessage::user("two eggs"),
                ChatMessage::assistant("Fried or boiled?"),
            ],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["history"][0]["role"], "user");
        assert_eq!(json["history"][1]["role"], "assistant");
        assert_eq!(json["history"][1]["content"], "Fried or boiled?");
    }

    #[test]
    fn test_validate_rejects_empty_and_negative() {
        let empty = ChatLog {
            components: vec![],
            totals: None,
        };
        assert!(empty.validate().is_err());

        let negative = ChatLog {
            components: vec![ChatComponent {
                name: "Mystery".to_string(),
                portion: None,
                macros: Macros::new(-1.0, 0.0, 0.0, 0.0),
            }],
            totals: None,
        };
        assert!(matches!(
            negative.validate().unwrap_err(),
            LedgerError::Validation(_)
        ));
    }
}
