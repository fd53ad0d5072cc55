use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures::{Stream, StreamExt};
use log::debug;
use once_cell::sync::Lazy;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use crate::cli::Args;
use crate::error::AgentError;
use crate::llm::shaping::shaper_for_model;
use crate::llm::{ContentPart, ImageRef, ProviderContent, ProviderMessage};
use crate::models::chat::{Message, ROLE_USER};

pub type ProviderByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, AgentError>> + Send>>;

/// Issues one streamed completion request per user message, carrying the
/// full prior conversation. Implementations return the provider's raw
/// byte stream; decoding happens downstream.
#[async_trait]
pub trait CompletionRelay: Send + Sync {
    async fn open_stream(
        &self,
        instruction: &str,
        history: &[Message],
    ) -> Result<ProviderByteStream, AgentError>;
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ProviderMessage>,
    stream: bool,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    error: Option<ProviderErrorDetail>,
}

#[derive(Deserialize)]
struct ProviderErrorDetail {
    message: Option<String>,
}

static IMAGE_MIME_TYPES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("png", "image/png"),
        ("gif", "image/gif"),
        ("webp", "image/webp"),
        ("jpg", "image/jpeg"),
        ("jpeg", "image/jpeg"),
    ])
});

pub struct OpenRouterRelay {
    http: HttpClient,
    api_key: String,
    model: String,
    base_url: String,
    referer: Option<String>,
    title: Option<String>,
    uploads_dir: PathBuf,
}

impl OpenRouterRelay {
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        referer: Option<String>,
        title: Option<String>,
        uploads_dir: PathBuf,
    ) -> Result<Self, AgentError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| AgentError::Config(format!("Invalid API key format: {}", e)))?,
        );

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(AgentError::Network)?;

        Ok(Self {
            http,
            api_key,
            model,
            base_url,
            referer,
            title,
            uploads_dir,
        })
    }

    pub fn from_args(args: &Args) -> Result<Self, AgentError> {
        Self::new(
            args.provider_api_key.clone(),
            args.provider_model.clone(),
            args.provider_base_url.clone(),
            args.provider_referer.clone(),
            args.provider_title.clone(),
            PathBuf::from(&args.uploads_dir),
        )
    }

    fn build_messages(
        &self,
        instruction: &str,
        history: &[Message],
    ) -> Result<Vec<ProviderMessage>, AgentError> {
        let mut messages = Vec::with_capacity(history.len());
        for msg in history {
            messages.push(self.encode_message(msg)?);
        }
        Ok(shaper_for_model(&self.model).shape(instruction, messages))
    }

    fn encode_message(&self, msg: &Message) -> Result<ProviderMessage, AgentError> {
        let image_url = match (&msg.role, &msg.image_url) {
            (role, Some(url)) if role == ROLE_USER => url,
            _ => return Ok(ProviderMessage::text(&msg.role, msg.content.clone())),
        };

        let url = if image_url.starts_with("http") {
            image_url.clone()
        } else {
            self.encode_local_image(image_url)?
        };

        Ok(ProviderMessage {
            role: msg.role.clone(),
            content: ProviderContent::Parts(vec![
                ContentPart::Text {
                    text: msg.content.clone(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageRef { url },
                },
            ]),
        })
    }

    /// Locally uploaded images are referenced as `/uploads/<name>`; read
    /// the file back and re-encode it as a base64 data URI.
    fn encode_local_image(&self, image_url: &str) -> Result<String, AgentError> {
        let name = Path::new(image_url)
            .file_name()
            .ok_or_else(|| AgentError::Validation(format!("Invalid image path: {}", image_url)))?;
        let path = self.uploads_dir.join(name);
        let bytes = std::fs::read(&path)?;

        let mime = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| IMAGE_MIME_TYPES.get(ext.to_lowercase().as_str()).copied())
            .unwrap_or("image/jpeg");

        Ok(format!("data:{};base64,{}", mime, BASE64.encode(bytes)))
    }
}

#[async_trait]
impl CompletionRelay for OpenRouterRelay {
    async fn open_stream(
        &self,
        instruction: &str,
        history: &[Message],
    ) -> Result<ProviderByteStream, AgentError> {
        let req = ChatRequest {
            model: self.model.clone(),
            messages: self.build_messages(instruction, history)?,
            stream: true,
        };

        let mut request = self
            .http
            .post(&self.base_url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&req);
        if let Some(referer) = &self.referer {
            request = request.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.title {
            request = request.header("X-Title", title);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ProviderErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or(body);
            debug!("Provider returned {}: {}", status, message);
            return Err(AgentError::from_upstream(status.as_u16(), message));
        }

        let stream = resp
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(AgentError::Network));
        Ok(Box::pin(stream))
    }
}
