use futures::StreamExt;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::cli::Args;
use crate::config::prompt::{self, PromptConfig};
use crate::error::AgentError;
use crate::llm::sse::DeltaDecoder;
use crate::llm::{new_relay, CompletionRelay};
use crate::models::api::StreamFrame;
use crate::models::chat::{Message, NewMessage};
use crate::rag::{self, RetrievalClient};
use crate::store::{initialize_message_store, MessageStore};

/// Orchestrates one chat request end to end: persist the user message,
/// relay the conversation upstream, forward decoded deltas to the client
/// channel, and persist the assembled assistant message once the upstream
/// stream ends.
#[derive(Clone)]
pub struct ChatAgent {
    store: Arc<dyn MessageStore>,
    relay: Option<Arc<dyn CompletionRelay>>,
    retrieval: Option<Arc<RetrievalClient>>,
    prompt_config: Arc<PromptConfig>,
}

impl ChatAgent {
    pub fn new(args: &Args) -> Result<Self, AgentError> {
        let store = initialize_message_store(args)?;
        let relay = new_relay(args)?;
        if relay.is_none() {
            warn!("No provider API key configured; chat requests will be rejected");
        }
        let retrieval = RetrievalClient::from_args(args);
        let prompt_config = prompt::load_prompts(&args.prompts_path)?;
        Ok(Self::from_parts(store, relay, retrieval, prompt_config))
    }

    pub fn from_parts(
        store: Arc<dyn MessageStore>,
        relay: Option<Arc<dyn CompletionRelay>>,
        retrieval: Option<Arc<RetrievalClient>>,
        prompt_config: Arc<PromptConfig>,
    ) -> Self {
        Self {
            store,
            relay,
            retrieval,
            prompt_config,
        }
    }

    pub fn store(&self) -> Arc<dyn MessageStore> {
        self.store.clone()
    }

    pub fn retrieval(&self) -> Option<Arc<RetrievalClient>> {
        self.retrieval.clone()
    }

    /// Pre-flight and kick-off for one chat request. Everything up to and
    /// including the user-message write happens here, before the caller
    /// commits to an event-stream response; failures surface as ordinary
    /// error responses. The returned channel carries the outbound frames.
    pub async fn begin_chat(
        &self,
        conversation_id: i64,
        content: String,
        image_url: Option<String>,
    ) -> Result<mpsc::Receiver<StreamFrame>, AgentError> {
        let relay = self
            .relay
            .clone()
            .ok_or_else(|| AgentError::Config("PROVIDER_API_KEY is not configured".to_string()))?;

        self.store
            .get_conversation(conversation_id)
            .await?
            .ok_or(AgentError::NotFound)?;

        self.store
            .create_message(NewMessage::user(conversation_id, content.clone(), image_url))
            .await?;
        let history = self.store.get_messages(conversation_id).await?;

        let (tx, rx) = mpsc::channel(32);
        let store = self.store.clone();
        let retrieval = self.retrieval.clone();
        let prompt_config = self.prompt_config.clone();

        tokio::spawn(async move {
            run_stream(
                store,
                relay,
                retrieval,
                prompt_config,
                conversation_id,
                content,
                history,
                tx,
            )
            .await;
        });

        Ok(rx)
    }
}

async fn run_stream(
    store: Arc<dyn MessageStore>,
    relay: Arc<dyn CompletionRelay>,
    retrieval: Option<Arc<RetrievalClient>>,
    prompt_config: Arc<PromptConfig>,
    conversation_id: i64,
    query: String,
    history: Vec<Message>,
    tx: mpsc::Sender<StreamFrame>,
) {
    let context = match &retrieval {
        Some(client) => match client.search(&query, client.default_limit).await {
            Ok(results) if !results.is_empty() => Some(rag::format_snippets(&results)),
            Ok(_) => None,
            Err(e) => {
                warn!("Retrieval failed, continuing without context: {}", e);
                None
            }
        },
        None => None,
    };
    let instruction = prompt::compose_instruction(&prompt_config, context.as_deref());

    let mut upstream = match relay.open_stream(&instruction, &history).await {
        Ok(stream) => stream,
        Err(e) => {
            fail(store.as_ref(), conversation_id, e, &tx).await;
            return;
        }
    };

    let mut decoder = DeltaDecoder::new();
    while let Some(chunk) = upstream.next().await {
        match chunk {
            Ok(bytes) => {
                for delta in decoder.push(&bytes) {
                    if tx.send(StreamFrame::content(delta)).await.is_err() {
                        info!(
                            "Client disconnected, dropping stream for conversation {}",
                            conversation_id
                        );
                        return;
                    }
                }
            }
            Err(e) => {
                fail(store.as_ref(), conversation_id, e, &tx).await;
                return;
            }
        }
    }

    let (tail, content) = decoder.finish();
    if let Some(delta) = tail {
        if tx.send(StreamFrame::content(delta)).await.is_err() {
            return;
        }
    }

    if let Err(e) = store
        .create_message(NewMessage::assistant(conversation_id, content))
        .await
    {
        error!("Failed to persist assistant message: {}", e);
        let _ = tx.send(StreamFrame::error(e.user_message())).await;
        return;
    }
    let _ = tx.send(StreamFrame::done()).await;
}

/// Terminal failure after the response stream has started: emit one
/// in-band error frame and close. Rate limits additionally leave a
/// synthetic assistant message so the conversation explains itself on the
/// next load.
async fn fail(
    store: &dyn MessageStore,
    conversation_id: i64,
    err: AgentError,
    tx: &mpsc::Sender<StreamFrame>,
) {
    let message = err.user_message();
    if matches!(err, AgentError::UpstreamRateLimit(_)) {
        if let Err(e) = store
            .create_message(NewMessage::assistant(conversation_id, message.clone()))
            .await
        {
            error!("Failed to record rate-limit notice: {}", e);
        }
    }
    error!(
        "Chat stream failed for conversation {}: {}",
        conversation_id, err
    );
    let _ = tx.send(StreamFrame::error(message)).await;
}
