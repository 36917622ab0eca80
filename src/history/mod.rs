mod memory;
mod redis;
use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use thiserror::Error;
use crate::cli::Args;
use crate::models::chat::Conversation;

pub use self::memory::InMemoryHistoryStore;
pub use self::redis::RedisHistoryStore;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history store unavailable: {0}")]
    Backend(String),
    #[error("stored conversation could not be decoded: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("unsupported history store type: {0}")]
    Unsupported(String),
}

impl From<::redis::RedisError> for HistoryError {
    fn from(err: ::redis::RedisError) -> Self {
        HistoryError::Backend(err.to_string())
    }
}

/// Document-style turn store. Each conversation is read and written whole.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn get_conversation(
        &self,
        chat_id: &str
    ) -> Result<Option<Conversation>, HistoryError>;

    /// Upserts the full record keyed by `chat_id`.
    async fn save_conversation(&self, conversation: &Conversation) -> Result<(), HistoryError>;

    /// The user's conversations, newest `created_at` first.
    async fn list_user_conversations(
        &self,
        user_id: &str
    ) -> Result<Vec<Conversation>, HistoryError>;
}

pub fn create_history_store(args: &Args) -> Result<Arc<dyn HistoryStore>, HistoryError> {
    match args.history_type.to_lowercase().as_str() {
        "redis" => {
            let host = args.history_host
                .as_deref()
                .ok_or_else(|| HistoryError::Backend("HISTORY_HOST is not set".to_string()))?;
            let store = RedisHistoryStore::new(host, &args.history_redis_prefix)?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(InMemoryHistoryStore::new())),
        other => Err(HistoryError::Unsupported(other.to_string())),
    }
}

pub fn initialize_history_store(args: &Args) -> Result<Arc<dyn HistoryStore>, HistoryError> {
    info!(
        "Chat history will be stored in: {} at {}",
        args.history_type,
        args.history_host.as_deref().unwrap_or("process memory")
    );
    create_history_store(args)
}
