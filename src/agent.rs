use crate::cli::Args;
use crate::config::models::{ DefaultModel, ModelDefaults };
use crate::conversation::accumulator::{ self, IncomingTurn };
use crate::conversation::encoding::inline_images;
use crate::conversation::fallback::synthetic_reply;
use crate::conversation::locks::ConversationLocks;
use crate::conversation::projection::{ project, select_mode, ProjectionMode };
use crate::conversation::selection::{ self, ModelPolicy };
use crate::history::{ initialize_history_store, HistoryError, HistoryStore };
use crate::llm::catalog::chat_catalog;
use crate::llm::chat::{ ChatClient, CompletionRequest, GatewayError, new_client as new_chat_client };
use crate::llm::LlmConfig;
use crate::media::fetch::HttpMediaFetcher;
use crate::media::{ is_allowed_image, new_media_host, HostedMedia, MediaError, MediaFetcher, MediaHost, MediaSource };
use crate::models::api::{ ModelEntry, SendMessageRequest };
use crate::models::chat::{ ChatSummary, Conversation };

use log::{ debug, error, info, warn };
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("image exceeds the {limit} byte upload limit ({size} bytes)")]
    PayloadTooLarge {
        size: usize,
        limit: usize,
    },
    #[error("unsupported image type: {0}")]
    UnsupportedMedia(String),
    #[error("model '{0}' is not available")]
    UnknownModel(String),
    #[error("could not list models: {0}")]
    ModelListing(GatewayError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    History(#[from] HistoryError),
}

/// Result of one send-message exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct SendOutcome {
    pub chat_id: String,
    pub user_message: String,
    pub ai_message: String,
    pub image_url: Option<String>,
    pub model: String,
}

/// The external services the agent orchestrates.
#[derive(Clone)]
pub struct Collaborators {
    pub chat_client: Arc<dyn ChatClient>,
    pub history_store: Arc<dyn HistoryStore>,
    pub media_host: Arc<dyn MediaHost>,
    pub media_fetcher: Arc<dyn MediaFetcher>,
}

#[derive(Clone)]
pub struct ChatAgent {
    chat_client: Arc<dyn ChatClient>,
    history_store: Arc<dyn HistoryStore>,
    media_host: Arc<dyn MediaHost>,
    media_fetcher: Arc<dyn MediaFetcher>,
    model_defaults: Arc<ModelDefaults>,
    policy: ModelPolicy,
    locks: Arc<ConversationLocks>,
    upload_max_bytes: usize,
}

impl ChatAgent {
    fn initialize_chat_client(args: &Args) -> Result<Arc<dyn ChatClient>, Box<dyn Error + Send + Sync>> {
        let chat_config = LlmConfig {
            llm_type: args.chat_llm_type.parse()?,
            base_url: args.chat_base_url.clone(),
            api_key: Some(args.chat_api_key.clone()).filter(|k| !k.is_empty()),
        };
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, BaseURL={}",
            chat_config.llm_type,
            chat_client.get_base_url()
        );
        Ok(chat_client)
    }

    pub async fn new(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let chat_client = Self::initialize_chat_client(args)?;
        let history_store = initialize_history_store(args)?;
        let media_host = new_media_host(args)?;
        let media_fetcher: Arc<dyn MediaFetcher> = Arc::new(
            HttpMediaFetcher::new(Duration::from_secs(args.image_fetch_timeout_secs), args.upload_max_bytes)?
        );

        let collaborators = Collaborators {
            chat_client,
            history_store,
            media_host,
            media_fetcher,
        };
        let defaults = Arc::new(ModelDefaults::new(args.effective_default_model()));

        Ok(Self::with_collaborators(collaborators, ModelPolicy::from_args(args), defaults, args.upload_max_bytes))
    }

    pub fn with_collaborators(
        collaborators: Collaborators,
        policy: ModelPolicy,
        model_defaults: Arc<ModelDefaults>,
        upload_max_bytes: usize
    ) -> Self {
        Self {
            chat_client: collaborators.chat_client,
            history_store: collaborators.history_store,
            media_host: collaborators.media_host,
            media_fetcher: collaborators.media_fetcher,
            model_defaults,
            policy,
            locks: Arc::new(ConversationLocks::new()),
            upload_max_bytes,
        }
    }

    pub fn upload_max_bytes(&self) -> usize {
        self.upload_max_bytes
    }

    pub fn default_model(&self) -> Arc<DefaultModel> {
        self.model_defaults.current()
    }

    /// Runs the completion for `conversation`, whose last turn is the new user
    /// turn. Gateway failures come back as a synthetic reply, never as errors.
    async fn execute_llm_interaction(
        &self,
        conversation: &Conversation,
        requested_model: Option<&str>
    ) -> (String, String) {
        let mode = select_mode(&conversation.messages, self.policy.vision_enabled);
        let default_model = self.model_defaults.current();

        let choice = selection::choose(
            &self.policy,
            requested_model,
            &default_model.model,
            mode == ProjectionMode::Multimodal
        );
        let choice = selection::validate(&self.policy, choice, self.chat_client.as_ref()).await;
        if choice.substituted {
            warn!("Conversation {} answered by baseline model {}", conversation.chat_id, choice.model);
        }

        // A substituted vision model cannot take image parts.
        let mode = if choice.vision { mode } else { ProjectionMode::Text };
        let mut messages = project(&conversation.messages, mode);
        if mode == ProjectionMode::Multimodal {
            let dropped = inline_images(&mut messages, self.media_fetcher.as_ref()).await;
            if dropped > 0 {
                warn!("{} image(s) dropped from conversation {}", dropped, conversation.chat_id);
            }
        }

        let request = CompletionRequest {
            model: choice.model.clone(),
            messages,
            max_tokens: Some(choice.max_tokens),
        };
        debug!(
            "Completion for {}: model={}, messages={}, vision={}",
            conversation.chat_id,
            request.model,
            request.messages.len(),
            choice.vision
        );

        let reply = match self.chat_client.complete(&request).await {
            Ok(resp) => resp.response,
            Err(e) => {
                error!("Inference gateway error (replying with fallback): {}", e);
                synthetic_reply(&e)
            }
        };
        (reply, choice.model)
    }

    pub async fn process_message(
        &self,
        request: SendMessageRequest
    ) -> Result<SendOutcome, RelayError> {
        let user_id = request.user_id
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| RelayError::Validation("Message and userId are required".into()))?
            .to_string();
        let turn = IncomingTurn::new(request.message.as_deref(), request.image.as_deref()).ok_or_else(||
            RelayError::Validation("Message and userId are required".into())
        )?;

        let chat_id = request.conversation_id
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let _guard = self.locks.acquire(&chat_id).await;

        let mut conversation = match self.history_store.get_conversation(&chat_id).await? {
            Some(existing) => {
                if existing.user_id != user_id {
                    warn!(
                        "User {} wrote to conversation {} owned by {}",
                        user_id,
                        chat_id,
                        existing.user_id
                    );
                }
                existing
            }
            None => {
                info!("Starting conversation {} for user {}", chat_id, user_id);
                Conversation::new(&chat_id, &user_id, self.model_defaults.current().model.clone())
            }
        };

        let image_url = accumulator::resolve_image(turn.image, self.media_host.as_ref()).await?;
        accumulator::append_user_turn(&mut conversation, &turn.text, image_url.clone());

        let (reply, model) = self.execute_llm_interaction(&conversation, request.model.as_deref()).await;

        accumulator::append_assistant_turn(&mut conversation, &reply);
        conversation.model = model.clone();
        self.history_store.save_conversation(&conversation).await.map_err(|e| {
            error!("Failed to persist conversation {}: {}", chat_id, e);
            e
        })?;

        Ok(SendOutcome {
            chat_id,
            user_message: turn.text,
            ai_message: reply,
            image_url,
            model,
        })
    }

    /// Enforces the size ceiling and image allow-list, then hosts the image.
    pub async fn upload_image(
        &self,
        source: MediaSource,
        declared_size: Option<usize>
    ) -> Result<HostedMedia, RelayError> {
        let size = match &source {
            MediaSource::Bytes { data, .. } => Some(data.len()),
            MediaSource::DataUri(uri) => Some(estimated_data_uri_size(uri)),
            MediaSource::RemoteUrl(_) => None,
        };
        if let Some(size) = declared_size.into_iter().chain(size).max() {
            if size > self.upload_max_bytes {
                return Err(RelayError::PayloadTooLarge { size, limit: self.upload_max_bytes });
            }
        }

        match &source {
            MediaSource::Bytes { filename, content_type, .. } => {
                if !is_allowed_image(content_type.as_deref(), Some(filename)) {
                    return Err(
                        RelayError::UnsupportedMedia(
                            content_type.clone().unwrap_or_else(|| filename.clone())
                        )
                    );
                }
            }
            MediaSource::DataUri(uri) => {
                let declared = data_uri_media_type(uri);
                if !is_allowed_image(Some(declared), None) {
                    return Err(RelayError::UnsupportedMedia(declared.to_string()));
                }
            }
            MediaSource::RemoteUrl(_) => {}
        }

        let hosted = self.media_host.upload(source).await.map_err(|e| {
            error!("Image upload failed: {}", e);
            e
        })?;
        Ok(hosted)
    }

    pub async fn chat_history(&self, user_id: &str) -> Result<Vec<ChatSummary>, RelayError> {
        let chats = self.history_store.list_user_conversations(user_id).await?;
        Ok(
            chats
                .iter()
                .map(Conversation::summary)
                .collect()
        )
    }

    pub async fn get_chat(&self, chat_id: &str) -> Result<Conversation, RelayError> {
        self.history_store
            .get_conversation(chat_id).await?
            .ok_or_else(|| RelayError::NotFound(format!("Chat {}", chat_id)))
    }

    pub async fn list_models(&self) -> Result<Vec<ModelEntry>, RelayError> {
        let ids = self.chat_client.list_models().await.map_err(RelayError::ModelListing)?;
        Ok(chat_catalog(&ids))
    }

    /// Validates against the live listing, then swaps the process default.
    pub async fn set_default_model(
        &self,
        model: &str
    ) -> Result<(Arc<DefaultModel>, Arc<DefaultModel>), RelayError> {
        let model = model.trim();
        if model.is_empty() {
            return Err(RelayError::Validation("model is required".into()));
        }
        let ids = self.chat_client.list_models().await.map_err(RelayError::ModelListing)?;
        if !ids.iter().any(|id| id == model) {
            return Err(RelayError::UnknownModel(model.to_string()));
        }
        Ok(self.model_defaults.set(model))
    }
}

/// `image/png` from `data:image/png;base64,...`; empty when malformed.
fn data_uri_media_type(uri: &str) -> &str {
    uri.strip_prefix("data:")
        .and_then(|rest| rest.split([';', ',']).next())
        .unwrap_or("")
}

/// Decoded size of a base64 `data:` payload, without decoding it.
fn estimated_data_uri_size(uri: &str) -> usize {
    match uri.split_once(',') {
        Some((header, payload)) if header.ends_with(";base64") => {
            let padding = payload.bytes().rev().take_while(|b| *b == b'=').count();
            ((payload.len() / 4) * 3 + ((payload.len() % 4) * 3) / 4).saturating_sub(padding.min(2))
        }
        Some((_, payload)) => payload.len(),
        None => uri.len(),
    }
}
