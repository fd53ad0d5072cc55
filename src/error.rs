use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// App-wide error type. Fallible operations across the store, relay and
/// retrieval layers all converge on this enum so handlers can map every
/// failure to one HTTP or in-band representation.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{0}")]
    Validation(String),

    #[error("Conversation not found")]
    NotFound,

    #[error("{0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Provider rejected the API key ({0})")]
    UpstreamAuth(String),

    #[error("Provider account is out of credits ({0})")]
    UpstreamQuota(String),

    #[error("Provider rate limit exceeded ({0})")]
    UpstreamRateLimit(String),

    #[error("Provider error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl AgentError {
    /// Classify a non-success upstream status into its error kind.
    pub fn from_upstream(status: u16, message: String) -> Self {
        match status {
            401 => AgentError::UpstreamAuth(message),
            402 => AgentError::UpstreamQuota(message),
            429 => AgentError::UpstreamRateLimit(message),
            _ => AgentError::Upstream { status, message },
        }
    }

    /// Text shown to the client, in-band or as a JSON body. Upstream
    /// failures get a curated description instead of the raw provider
    /// payload.
    pub fn user_message(&self) -> String {
        match self {
            AgentError::UpstreamAuth(_) => {
                "The configured provider API key was rejected. Check the credentials and try again."
                    .to_string()
            }
            AgentError::UpstreamQuota(_) => {
                "The provider account has run out of credits, so a reply could not be generated."
                    .to_string()
            }
            AgentError::UpstreamRateLimit(_) => {
                "The model is receiving too many requests right now, so this reply could not be \
                 generated. Please wait a moment and try again."
                    .to_string()
            }
            AgentError::Upstream { status, .. } => {
                format!("The completion provider returned an error (status {}).", status)
            }
            other => other.to_string(),
        }
    }
}

impl From<redis::RedisError> for AgentError {
    fn from(err: redis::RedisError) -> Self {
        AgentError::Storage(err.to_string())
    }
}

impl IntoResponse for AgentError {
    fn into_response(self) -> Response {
        let status = match &self {
            AgentError::Validation(_) => StatusCode::BAD_REQUEST,
            AgentError::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "message": self.user_message() }))).into_response()
    }
}
