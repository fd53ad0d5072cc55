use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// A single chat message. Created once and never mutated; the assistant
/// message is only written after its full content is known.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied by a caller when appending a message.
#[derive(Clone, Debug)]
pub struct NewMessage {
    pub conversation_id: i64,
    pub role: String,
    pub content: String,
    pub image_url: Option<String>,
}

impl NewMessage {
    pub fn user(conversation_id: i64, content: String, image_url: Option<String>) -> Self {
        Self {
            conversation_id,
            role: ROLE_USER.to_string(),
            content,
            image_url,
        }
    }

    pub fn assistant(conversation_id: i64, content: String) -> Self {
        Self {
            conversation_id,
            role: ROLE_ASSISTANT.to_string(),
            content,
            image_url: None,
        }
    }
}
