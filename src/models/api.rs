use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::chat::{Conversation, Message};

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageRequest {
    pub content: String,
    pub image_url: Option<String>,
}

/// A conversation together with its ordered message history, as returned
/// by `GET /api/conversations/{id}`.
#[derive(Debug, Serialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct RagSearchRequest {
    pub query: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RagSearchResponse {
    pub results: Vec<Value>,
    pub query: String,
}

/// One frame of the outbound chat stream. Zero or more `Content` frames
/// are followed by exactly one terminal `Done` or `Error` frame.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StreamFrame {
    Content { content: String },
    Done { done: bool },
    Error { error: String },
}

impl StreamFrame {
    pub fn content(content: String) -> Self {
        StreamFrame::Content { content }
    }

    pub fn done() -> Self {
        StreamFrame::Done { done: true }
    }

    pub fn error(error: String) -> Self {
        StreamFrame::Error { error }
    }
}
