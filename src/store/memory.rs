use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::AgentError;
use crate::models::chat::{Conversation, Message, NewMessage};
use crate::store::MessageStore;

#[derive(Default)]
struct Inner {
    conversations: HashMap<i64, Conversation>,
    messages: HashMap<i64, Vec<Message>>,
    next_conversation_id: i64,
    next_message_id: i64,
}

/// Process-local backend. The default for local runs and the backend every
/// test uses.
pub struct MemoryMessageStore {
    inner: RwLock<Inner>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for MemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn create_conversation(&self, title: &str) -> Result<Conversation, AgentError> {
        let mut inner = self.inner.write().await;
        inner.next_conversation_id += 1;
        let conversation = Conversation {
            id: inner.next_conversation_id,
            title: title.to_string(),
            created_at: Utc::now(),
        };
        inner.conversations.insert(conversation.id, conversation.clone());
        inner.messages.insert(conversation.id, Vec::new());
        Ok(conversation)
    }

    async fn get_conversations(&self) -> Result<Vec<Conversation>, AgentError> {
        let inner = self.inner.read().await;
        let mut all: Vec<Conversation> = inner.conversations.values().cloned().collect();
        all.sort_by_key(|c| c.id);
        Ok(all)
    }

    async fn get_conversation(&self, id: i64) -> Result<Option<Conversation>, AgentError> {
        let inner = self.inner.read().await;
        Ok(inner.conversations.get(&id).cloned())
    }

    async fn delete_conversation(&self, id: i64) -> Result<(), AgentError> {
        let mut inner = self.inner.write().await;
        inner.conversations.remove(&id);
        inner.messages.remove(&id);
        Ok(())
    }

    async fn create_message(&self, new: NewMessage) -> Result<Message, AgentError> {
        let mut inner = self.inner.write().await;
        if !inner.conversations.contains_key(&new.conversation_id) {
            return Err(AgentError::NotFound);
        }
        inner.next_message_id += 1;
        let message = Message {
            id: inner.next_message_id,
            conversation_id: new.conversation_id,
            role: new.role,
            content: new.content,
            image_url: new.image_url,
            created_at: Utc::now(),
        };
        inner
            .messages
            .entry(new.conversation_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn get_messages(&self, conversation_id: i64) -> Result<Vec<Message>, AgentError> {
        let inner = self.inner.read().await;
        Ok(inner.messages.get(&conversation_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::{ROLE_ASSISTANT, ROLE_USER};

    #[tokio::test]
    async fn messages_come_back_in_creation_order() {
        let store = MemoryMessageStore::new();
        let conv = store.create_conversation("Demo").await.unwrap();

        store
            .create_message(NewMessage::user(conv.id, "first".into(), None))
            .await
            .unwrap();
        store
            .create_message(NewMessage::assistant(conv.id, "second".into()))
            .await
            .unwrap();
        store
            .create_message(NewMessage::user(conv.id, "third".into(), None))
            .await
            .unwrap();

        let messages = store.get_messages(conv.id).await.unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(messages[0].role, ROLE_USER);
        assert_eq!(messages[1].role, ROLE_ASSISTANT);
    }

    #[tokio::test]
    async fn create_message_requires_existing_conversation() {
        let store = MemoryMessageStore::new();
        let err = store
            .create_message(NewMessage::user(42, "hi".into(), None))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::NotFound));
    }

    #[tokio::test]
    async fn delete_cascades_and_is_idempotent() {
        let store = MemoryMessageStore::new();
        let conv = store.create_conversation("Demo").await.unwrap();
        store
            .create_message(NewMessage::user(conv.id, "hi".into(), None))
            .await
            .unwrap();

        store.delete_conversation(conv.id).await.unwrap();
        assert!(store.get_conversation(conv.id).await.unwrap().is_none());
        assert!(store.get_messages(conv.id).await.unwrap().is_empty());

        // second delete is a no-op
        store.delete_conversation(conv.id).await.unwrap();
    }

    #[tokio::test]
    async fn conversations_list_is_stable_by_id() {
        let store = MemoryMessageStore::new();
        let a = store.create_conversation("a").await.unwrap();
        let b = store.create_conversation("b").await.unwrap();
        let c = store.create_conversation("c").await.unwrap();

        let ids: Vec<i64> = store
            .get_conversations()
            .await
            .unwrap()
            .iter()
            .map(|conv| conv.id)
            .collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }
}
