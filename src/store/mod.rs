mod memory;
mod redis;

use async_trait::async_trait;
use log::info;
use std::sync::Arc;

use crate::cli::Args;
use crate::error::AgentError;
use crate::models::chat::{Conversation, Message, NewMessage};

/// Durable mapping from conversation id to its ordered message list.
///
/// The store is injected as a trait object so tests run against the
/// in-memory backend while deployments can point at Redis. Appends are
/// last-write-wins; nothing serializes concurrent writers on the same
/// conversation id.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create_conversation(&self, title: &str) -> Result<Conversation, AgentError>;

    async fn get_conversations(&self) -> Result<Vec<Conversation>, AgentError>;

    async fn get_conversation(&self, id: i64) -> Result<Option<Conversation>, AgentError>;

    /// Removes the conversation and all of its messages. Idempotent.
    async fn delete_conversation(&self, id: i64) -> Result<(), AgentError>;

    /// Appends to the conversation's message list. Fails with `NotFound`
    /// when the conversation id is unknown.
    async fn create_message(&self, new: NewMessage) -> Result<Message, AgentError>;

    async fn get_messages(&self, conversation_id: i64) -> Result<Vec<Message>, AgentError>;
}

pub use memory::MemoryMessageStore;
pub use redis::RedisMessageStore;

pub fn create_message_store(args: &Args) -> Result<Arc<dyn MessageStore>, AgentError> {
    match args.store_type.to_lowercase().as_str() {
        "memory" => Ok(Arc::new(MemoryMessageStore::new())),
        "redis" => {
            let store = RedisMessageStore::new(&args.store_redis_url, &args.store_redis_prefix)?;
            Ok(Arc::new(store))
        }
        other => Err(AgentError::Config(format!(
            "Unsupported store type: {}",
            other
        ))),
    }
}

pub fn initialize_message_store(args: &Args) -> Result<Arc<dyn MessageStore>, AgentError> {
    info!("Conversations will be stored in: {}", args.store_type);
    create_message_store(args)
}
