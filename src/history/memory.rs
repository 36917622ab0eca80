use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{ HistoryError, HistoryStore };
use crate::models::chat::Conversation;

/// Process-local store; contents are lost on restart.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_empty(&self) -> bool {
        self.conversations.read().await.is_empty()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn get_conversation(
        &self,
        chat_id: &str
    ) -> Result<Option<Conversation>, HistoryError> {
        Ok(self.conversations.read().await.get(chat_id).cloned())
    }

    async fn save_conversation(&self, conversation: &Conversation) -> Result<(), HistoryError> {
        self.conversations
            .write().await
            .insert(conversation.chat_id.clone(), conversation.clone());
        Ok(())
    }

    async fn list_user_conversations(
        &self,
        user_id: &str
    ) -> Result<Vec<Conversation>, HistoryError> {
        let mut chats: Vec<Conversation> = self.conversations
            .read().await
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(chats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::ChatMessage;
    use chrono::{ Duration, Utc };

    #[tokio::test]
    async fn save_then_get_round_trips_the_record() {
        let store = InMemoryHistoryStore::new();
        let mut conversation = Conversation::new("c1", "u1", "gpt-3.5-turbo");
        conversation.append(ChatMessage::user("hi", None));
        store.save_conversation(&conversation).await.unwrap();

        let loaded = store.get_conversation("c1").await.unwrap().unwrap();
        assert_eq!(loaded, conversation);
        assert!(store.get_conversation("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn listing_is_scoped_to_user_and_newest_first() {
        let store = InMemoryHistoryStore::new();
        let mut older = Conversation::new("old", "u1", "m");
        older.created_at = Utc::now() - Duration::hours(1);
        let newer = Conversation::new("new", "u1", "m");
        let foreign = Conversation::new("other", "u2", "m");
        for c in [&older, &newer, &foreign] {
            store.save_conversation(c).await.unwrap();
        }

        let ids: Vec<String> = store
            .list_user_conversations("u1").await
            .unwrap()
            .into_iter()
            .map(|c| c.chat_id)
            .collect();
        assert_eq!(ids, vec!["new".to_string(), "old".to_string()]);
    }
}
