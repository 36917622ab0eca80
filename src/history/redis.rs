use async_trait::async_trait;
use crate::models::chat::Conversation;
use crate::history::{ HistoryError, HistoryStore };
use log::warn;
use redis::{ Client, AsyncCommands };

/// One JSON document per conversation under `{prefix}chat:{id}`, plus a
/// per-user sorted set scored by creation time for the drawer listing.
pub struct RedisHistoryStore {
    client: Client,
    key_prefix: String,
}

impl RedisHistoryStore {
    pub fn new(url: &str, key_prefix: &str) -> Result<Self, HistoryError> {
        Ok(Self {
            client: Client::open(url)?,
            key_prefix: key_prefix.to_string(),
        })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    fn chat_key(&self, chat_id: &str) -> String {
        format!("{}chat:{}", self.key_prefix, chat_id)
    }

    fn user_key(&self, user_id: &str) -> String {
        format!("{}user:{}", self.key_prefix, user_id)
    }
}

#[async_trait]
impl HistoryStore for RedisHistoryStore {
    async fn get_conversation(
        &self,
        chat_id: &str
    ) -> Result<Option<Conversation>, HistoryError> {
        let mut conn = self.get_connection().await?;
        let raw: Option<String> = conn.get(self.chat_key(chat_id)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save_conversation(&self, conversation: &Conversation) -> Result<(), HistoryError> {
        let mut conn = self.get_connection().await?;
        let json = serde_json::to_string(conversation)?;
        let score = conversation.created_at.timestamp_millis();

        redis
            ::pipe()
            .atomic()
            .set(self.chat_key(&conversation.chat_id), json)
            .ignore()
            .zadd(self.user_key(&conversation.user_id), &conversation.chat_id, score)
            .ignore()
            .query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn list_user_conversations(
        &self,
        user_id: &str
    ) -> Result<Vec<Conversation>, HistoryError> {
        let mut conn = self.get_connection().await?;
        let ids: Vec<String> = conn.zrevrange(self.user_key(user_id), 0, -1).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids
            .iter()
            .map(|id| self.chat_key(id))
            .collect();
        let docs: Vec<Option<String>> = redis::cmd("MGET").arg(&keys).query_async(&mut conn).await?;

        let mut chats = Vec::with_capacity(docs.len());
        for (id, doc) in ids.iter().zip(docs) {
            let Some(json) = doc else {
                warn!("Conversation {} is indexed for user {} but missing", id, user_id);
                continue;
            };
            match serde_json::from_str::<Conversation>(&json) {
                Ok(chat) if chat.user_id == user_id => chats.push(chat),
                Ok(_) => {}
                Err(e) => warn!("Skipping undecodable conversation {}: {}", id, e),
            }
        }
        Ok(chats)
    }
}
