#![allow(dead_code)]

use async_trait::async_trait;
use axum::{ body::{ to_bytes, Body }, http::{ Request, StatusCode }, Router };
use serde_json::Value;
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::{ Arc, Mutex };
use tower::ServiceExt;

use chat_relay::agent::{ ChatAgent, Collaborators };
use chat_relay::config::models::ModelDefaults;
use chat_relay::conversation::selection::ModelPolicy;
use chat_relay::history::{ HistoryError, HistoryStore, InMemoryHistoryStore };
use chat_relay::models::chat::Conversation;
use chat_relay::llm::chat::{ ChatClient, CompletionRequest, CompletionResponse, GatewayError };
use chat_relay::media::{ HostedMedia, MediaError, MediaFetcher, MediaHost, MediaSource };
use chat_relay::server::api::router;

pub const UPLOAD_LIMIT: usize = 1024;
pub const JSON_LIMIT: usize = 1024 * 1024;

/// How the scripted gateway answers completion calls.
#[derive(Clone)]
pub enum Reply {
    Text(String),
    RateLimited,
    Quota,
}

/// Records every completion request and answers from a script.
pub struct RecordingChatClient {
    pub requests: Mutex<Vec<CompletionRequest>>,
    pub reply: Reply,
    pub models: Option<Vec<String>>,
}

impl RecordingChatClient {
    pub fn new(reply: Reply, models: Option<&[&str]>) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            reply,
            models: models.map(|m| m.iter().map(|s| s.to_string()).collect()),
        }
    }

    pub fn recorded(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for RecordingChatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.reply {
            Reply::Text(text) => Ok(CompletionResponse { response: text.clone() }),
            Reply::RateLimited =>
                Err(GatewayError::Transport("upstream said: rate exceeded for this key".into())),
            Reply::Quota =>
                Err(GatewayError::Api {
                    status: 429,
                    kind: Some("insufficient_quota".into()),
                    code: Some("insufficient_quota".into()),
                    message: "You exceeded your current quota".into(),
                }),
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, GatewayError> {
        match &self.models {
            Some(models) => Ok(models.clone()),
            None => Err(GatewayError::Transport("connection refused".into())),
        }
    }

    fn get_base_url(&self) -> String {
        "http://gateway.test".into()
    }
}

/// In-memory store whose writes can be switched to fail.
#[derive(Default)]
pub struct SwitchableHistoryStore {
    inner: InMemoryHistoryStore,
    pub fail_saves: AtomicBool,
}

impl SwitchableHistoryStore {
    pub async fn is_empty(&self) -> bool {
        self.inner.is_empty().await
    }
}

#[async_trait]
impl HistoryStore for SwitchableHistoryStore {
    async fn get_conversation(&self, chat_id: &str) -> Result<Option<Conversation>, HistoryError> {
        self.inner.get_conversation(chat_id).await
    }

    async fn save_conversation(&self, conversation: &Conversation) -> Result<(), HistoryError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(HistoryError::Backend("connection reset by peer".into()));
        }
        self.inner.save_conversation(conversation).await
    }

    async fn list_user_conversations(&self, user_id: &str) -> Result<Vec<Conversation>, HistoryError> {
        self.inner.list_user_conversations(user_id).await
    }
}

/// Counts uploads and hands back a fixed CDN address, or fails when told to.
#[derive(Default)]
pub struct CountingMediaHost {
    pub uploads: Mutex<usize>,
    pub fail: AtomicBool,
}

impl CountingMediaHost {
    pub fn count(&self) -> usize {
        *self.uploads.lock().unwrap()
    }
}

#[async_trait]
impl MediaHost for CountingMediaHost {
    async fn upload(&self, _source: MediaSource) -> Result<HostedMedia, MediaError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MediaError::Upload("cloud storage unavailable".into()));
        }
        let mut uploads = self.uploads.lock().unwrap();
        *uploads += 1;
        Ok(HostedMedia {
            url: format!("https://cdn.test/chat_images/{}.png", *uploads),
            public_id: format!("chat_images/{}", *uploads),
        })
    }
}

/// Serves the same bytes for every URL.
pub struct StaticFetcher(pub Vec<u8>);

#[async_trait]
impl MediaFetcher for StaticFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, MediaError> {
        Ok(self.0.clone())
    }
}

pub struct TestApp {
    pub router: Router,
    pub client: Arc<RecordingChatClient>,
    pub store: Arc<SwitchableHistoryStore>,
    pub host: Arc<CountingMediaHost>,
}

impl TestApp {
    pub fn new(reply: Reply, models: Option<&[&str]>) -> Self {
        let client = Arc::new(RecordingChatClient::new(reply, models));
        let store = Arc::new(SwitchableHistoryStore::default());
        let host = Arc::new(CountingMediaHost::default());
        let collaborators = Collaborators {
            chat_client: client.clone(),
            history_store: store.clone(),
            media_host: host.clone(),
            media_fetcher: Arc::new(StaticFetcher(b"GIF89a".to_vec())),
        };
        let agent = ChatAgent::with_collaborators(
            collaborators,
            ModelPolicy::default(),
            Arc::new(ModelDefaults::new("gpt-4o-mini")),
            UPLOAD_LIMIT
        );
        Self {
            router: router(Arc::new(agent), JSON_LIMIT),
            client,
            store,
            host,
        }
    }

    /// A gateway that answers "hello back" and lists the usual models.
    pub fn standard() -> Self {
        Self::new(
            Reply::Text("hello back".into()),
            Some(&["gpt-4o", "gpt-4o-mini", "gpt-3.5-turbo", "text-embedding-3-small", "whisper-1"])
        )
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, body)
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }
}

/// Builds a single-file multipart body.
pub fn multipart_body(boundary: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            filename,
            content_type
        ).as_bytes()
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}
