//! services/api/src/adapters/history_memory.rs
//!
//! An in-process `ConversationStore`, used when no database is configured.
//! Histories are lost on restart.

use async_trait::async_trait;
use shelf_core::domain::Conversation;
use shelf_core::ports::{ConversationStore, PortResult};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn load(&self, user_id: &str) -> PortResult<Option<Conversation>> {
        Ok(self.conversations.read().await.get(user_id).cloned())
    }

    async fn save(&self, conversation: &Conversation) -> PortResult<()> {
        self.conversations
            .write()
            .await
            .insert(conversation.user_id.clone(), conversation.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_core::domain::ChatMessage;

    #[tokio::test]
    async fn saves_replace_the_whole_document() {
        let store = InMemoryConversationStore::new();
        assert_eq!(store.load("u1").await.unwrap(), None);

        let mut first = Conversation::new("u1");
        first.messages.push(ChatMessage::user_text("one"));
        store.save(&first).await.unwrap();

        let mut second = Conversation::new("u1");
        second.messages.push(ChatMessage::user_text("two"));
        store.save(&second).await.unwrap();

        let loaded = store.load("u1").await.unwrap().unwrap();
        assert_eq!(loaded.messages, vec![ChatMessage::user_text("two")]);
    }
}
