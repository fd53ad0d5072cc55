pub mod relay;
pub mod shaping;
pub mod sse;

use serde::Serialize;
use std::sync::Arc;

use crate::cli::Args;
use crate::error::AgentError;

pub use relay::{CompletionRelay, OpenRouterRelay, ProviderByteStream};

/// One entry of the provider `messages` array. Plain text for ordinary
/// messages, a multi-part unit when a user message carries an image.
#[derive(Clone, Debug, Serialize)]
pub struct ProviderMessage {
    pub role: String,
    pub content: ProviderContent,
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum ProviderContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageRef },
}

#[derive(Clone, Debug, Serialize)]
pub struct ImageRef {
    pub url: String,
}

impl ProviderMessage {
    pub fn text(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content: ProviderContent::Text(content),
        }
    }
}

/// Builds the relay from CLI arguments. `None` when no API key is
/// configured; callers surface that as a per-request error, matching the
/// original deployment which booted without credentials.
pub fn new_relay(args: &Args) -> Result<Option<Arc<dyn CompletionRelay>>, AgentError> {
    if args.provider_api_key.is_empty() {
        return Ok(None);
    }
    let relay = OpenRouterRelay::from_args(args)?;
    Ok(Some(Arc::new(relay)))
}
