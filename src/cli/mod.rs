use clap::Parser;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Port for the HTTP API to listen on. Required.
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Interface the HTTP API binds to.
    #[arg(long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub server_host: String,

    /// Maximum accepted JSON body size in bytes (inline base64 images travel in the body).
    #[arg(long, env = "MAX_JSON_BODY_BYTES", default_value = "52428800")]
    pub max_json_body_bytes: usize,

    /// Maximum accepted image upload size in bytes.
    #[arg(long, env = "UPLOAD_MAX_BYTES", default_value = "10485760")]
    pub upload_max_bytes: usize,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,

    // --- History Store Args ---
    /// History chat store type (redis, memory)
    #[arg(long, env = "HISTORY_TYPE", default_value = "redis")]
    pub history_type: String,

    /// History chat store connection string (e.g., redis://127.0.0.1:6379). Required for redis.
    #[arg(long, env = "HISTORY_HOST")]
    pub history_host: Option<String>,

    /// Prefix for Redis history keys.
    #[arg(long, env = "HISTORY_REDIS_PREFIX", default_value = "chats:")]
    pub history_redis_prefix: String,

    // --- Chat LLM Provider Args ---
    /// Type of OpenAI-compatible provider (openai, groq, xai, deepseek, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "openai")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API. Defaults per provider.
    #[arg(long, env = "CHAT_BASE_URL")]
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Default model used when a request names none. Can be changed at runtime.
    #[arg(long, env = "DEFAULT_MODEL")]
    pub default_model: Option<String>,

    /// Model substituted when the requested one is not available to the credential.
    #[arg(long, env = "BASELINE_MODEL", default_value = "gpt-3.5-turbo")]
    pub baseline_model: String,

    /// Model forced for requests that carry images.
    #[arg(long, env = "VISION_MODEL", default_value = "gpt-4o")]
    pub vision_model: String,

    /// Route image-bearing conversations to the vision model.
    #[arg(long, env = "VISION_ENABLED", default_value = "true", action = clap::ArgAction::Set)]
    pub vision_enabled: bool,

    /// Output token bound for text-only completions.
    #[arg(long, env = "MAX_TOKENS", default_value = "2048")]
    pub max_tokens: u32,

    /// Output token bound for vision completions.
    #[arg(long, env = "VISION_MAX_TOKENS", default_value = "1000")]
    pub vision_max_tokens: u32,

    /// Timeout in seconds for downloading an image to inline it into a vision request.
    #[arg(long, env = "IMAGE_FETCH_TIMEOUT_SECS", default_value = "10")]
    pub image_fetch_timeout_secs: u64,

    // --- Media Hosting Args ---
    #[arg(long, env = "CLOUDINARY_CLOUD_NAME")]
    pub cloudinary_cloud_name: Option<String>,

    #[arg(long, env = "CLOUDINARY_API_KEY")]
    pub cloudinary_api_key: Option<String>,

    #[arg(long, env = "CLOUDINARY_API_SECRET")]
    pub cloudinary_api_secret: Option<String>,

    /// Folder uploaded images are placed in.
    #[arg(long, env = "CLOUDINARY_FOLDER", default_value = "chat_images")]
    pub cloudinary_folder: String,

    /// Override for the Cloudinary API origin.
    #[arg(long, env = "CLOUDINARY_BASE_URL")]
    pub cloudinary_base_url: Option<String>,
}

impl Args {
    /// Startup checks that must hold before any collaborator is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port.is_none() {
            return Err(ConfigError::Missing("PORT"));
        }
        let history_host_missing = self.history_host
            .as_deref()
            .map(|h| h.trim().is_empty())
            .unwrap_or(true);
        if self.history_type.eq_ignore_ascii_case("redis") && history_host_missing {
            return Err(ConfigError::Missing("HISTORY_HOST"));
        }
        if self.enable_tls && (self.tls_cert_path.is_none() || self.tls_key_path.is_none()) {
            return Err(
                ConfigError::Invalid(
                    "Both --tls-cert-path and --tls-key-path must be provided to enable TLS.".into()
                )
            );
        }
        if self.upload_max_bytes == 0 {
            return Err(ConfigError::Invalid("UPLOAD_MAX_BYTES must be positive".into()));
        }
        Ok(())
    }

    pub fn effective_default_model(&self) -> String {
        self.default_model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.baseline_model.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["chat-relay"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn missing_port_fails_fast() {
        let mut args = parse(&["--history-host", "redis://localhost"]);
        args.port = None;
        assert_eq!(args.validate(), Err(ConfigError::Missing("PORT")));
    }

    #[test]
    fn redis_store_requires_connection_string() {
        let mut args = parse(&["--port", "5000", "--history-type", "redis"]);
        args.history_host = None;
        assert_eq!(args.validate(), Err(ConfigError::Missing("HISTORY_HOST")));
    }

    #[test]
    fn memory_store_needs_no_connection_string() {
        let args = parse(&["--port", "5000", "--history-type", "memory"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn default_model_falls_back_to_baseline() {
        let mut args = parse(&["--port", "5000"]);
        args.default_model = None;
        assert_eq!(args.effective_default_model(), "gpt-3.5-turbo");
        let args = parse(&["--port", "5000", "--default-model", "gpt-4o-mini"]);
        assert_eq!(args.effective_default_model(), "gpt-4o-mini");
    }

    #[test]
    fn vision_routing_can_be_disabled() {
        let args = parse(&["--port", "5000", "--vision-enabled", "false"]);
        assert!(!args.vision_enabled);
    }
}
