use async_trait::async_trait;
use chrono::Utc;
use log::error;
use redis::{AsyncCommands, Client};

use crate::error::AgentError;
use crate::models::chat::{Conversation, Message, NewMessage};
use crate::store::MessageStore;

/// Redis layout: one hash of conversations keyed by id, one list of
/// messages per conversation, and INCR counters for id allocation.
pub struct RedisMessageStore {
    client: Client,
    key_prefix: String,
}

impl RedisMessageStore {
    pub fn new(url: &str, key_prefix: &str) -> Result<Self, AgentError> {
        Ok(Self {
            client: Client::open(url)?,
            key_prefix: key_prefix.to_string(),
        })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    fn conversations_key(&self) -> String {
        format!("{}conversations", self.key_prefix)
    }

    fn messages_key(&self, conversation_id: i64) -> String {
        format!("{}messages:{}", self.key_prefix, conversation_id)
    }

    fn counter_key(&self, name: &str) -> String {
        format!("{}next_{}_id", self.key_prefix, name)
    }
}

#[async_trait]
impl MessageStore for RedisMessageStore {
    async fn create_conversation(&self, title: &str) -> Result<Conversation, AgentError> {
        let mut conn = self.get_connection().await?;
        let id: i64 = conn.incr(self.counter_key("conversation"), 1).await?;

        let conversation = Conversation {
            id,
            title: title.to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&conversation)?;
        let _: () = conn.hset(self.conversations_key(), id, json).await?;
        Ok(conversation)
    }

    async fn get_conversations(&self) -> Result<Vec<Conversation>, AgentError> {
        let mut conn = self.get_connection().await?;
        let entries: Vec<String> = conn.hvals(self.conversations_key()).await?;

        let mut conversations = Vec::new();
        for entry in &entries {
            match serde_json::from_str::<Conversation>(entry) {
                Ok(conversation) => conversations.push(conversation),
                Err(e) => error!("Error parsing stored conversation: {}", e),
            }
        }
        conversations.sort_by_key(|c| c.id);
        Ok(conversations)
    }

    async fn get_conversation(&self, id: i64) -> Result<Option<Conversation>, AgentError> {
        let mut conn = self.get_connection().await?;
        let entry: Option<String> = conn.hget(self.conversations_key(), id).await?;
        match entry {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn delete_conversation(&self, id: i64) -> Result<(), AgentError> {
        let mut conn = self.get_connection().await?;
        let _: i64 = conn.hdel(self.conversations_key(), id).await?;
        let _: i64 = conn.del(self.messages_key(id)).await?;
        Ok(())
    }

    async fn create_message(&self, new: NewMessage) -> Result<Message, AgentError> {
        let mut conn = self.get_connection().await?;
        let exists: bool = conn.hexists(self.conversations_key(), new.conversation_id).await?;
        if !exists {
            return Err(AgentError::NotFound);
        }

        let id: i64 = conn.incr(self.counter_key("message"), 1).await?;
        let message = Message {
            id,
            conversation_id: new.conversation_id,
            role: new.role,
            content: new.content,
            image_url: new.image_url,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&message)?;
        let _: i64 = conn.rpush(self.messages_key(message.conversation_id), json).await?;
        Ok(message)
    }

    async fn get_messages(&self, conversation_id: i64) -> Result<Vec<Message>, AgentError> {
        let mut conn = self.get_connection().await?;
        let entries: Vec<String> = conn.lrange(self.messages_key(conversation_id), 0, -1).await?;

        let mut messages = Vec::new();
        for entry in &entries {
            match serde_json::from_str::<Message>(entry) {
                Ok(message) => messages.push(message),
                Err(e) => error!("Error parsing stored message: {}", e),
            }
        }
        Ok(messages)
    }
}
