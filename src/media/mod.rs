pub mod cloudinary;
pub mod fetch;

use async_trait::async_trait;
use base64::{ engine::general_purpose::STANDARD, Engine as _ };
use std::sync::Arc;
use thiserror::Error;

use crate::cli::Args;
use self::cloudinary::{ CloudinaryCredentials, CloudinaryMediaHost };

pub const DATA_URI_PREFIX: &str = "data:";
pub const DEFAULT_MEDIA_TYPE: &str = "image/jpeg";

pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/bmp",
    "image/webp",
];

pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media upload failed: {0}")]
    Upload(String),
    #[error("media fetch failed: {0}")]
    Fetch(String),
    #[error("media fetch timed out")]
    Timeout,
    #[error("media hosting is not configured: {0}")]
    Config(String),
}

/// What the media host is asked to store.
#[derive(Debug, Clone)]
pub enum MediaSource {
    DataUri(String),
    RemoteUrl(String),
    Bytes {
        data: Vec<u8>,
        filename: String,
        content_type: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostedMedia {
    pub url: String,
    pub public_id: String,
}

#[async_trait]
pub trait MediaHost: Send + Sync {
    async fn upload(&self, source: MediaSource) -> Result<HostedMedia, MediaError>;
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, MediaError>;
}

/// Stand-in used when no hosting credentials are configured.
pub struct UnconfiguredMediaHost;

#[async_trait]
impl MediaHost for UnconfiguredMediaHost {
    async fn upload(&self, _source: MediaSource) -> Result<HostedMedia, MediaError> {
        Err(MediaError::Config("set CLOUDINARY_CLOUD_NAME, CLOUDINARY_API_KEY and CLOUDINARY_API_SECRET".into()))
    }
}

pub fn new_media_host(args: &Args) -> Result<Arc<dyn MediaHost>, MediaError> {
    match CloudinaryCredentials::from_args(args) {
        Some(credentials) => {
            let host = CloudinaryMediaHost::new(
                credentials,
                args.cloudinary_folder.clone(),
                args.cloudinary_base_url.clone()
            )?;
            Ok(Arc::new(host))
        }
        None => Ok(Arc::new(UnconfiguredMediaHost)),
    }
}

pub fn is_data_uri(reference: &str) -> bool {
    reference.starts_with(DATA_URI_PREFIX)
}

pub fn is_remote_url(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

fn extension_of(path: &str) -> Option<String> {
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

/// Media type from the URL path suffix; query strings and fragments are ignored.
pub fn infer_media_type(reference: &str) -> &'static str {
    let ext = match url::Url::parse(reference) {
        Ok(parsed) => extension_of(parsed.path()),
        Err(_) => extension_of(reference.split(['?', '#']).next().unwrap_or(reference)),
    };
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => DEFAULT_MEDIA_TYPE,
    }
}

pub fn encode_data_uri(bytes: &[u8], media_type: &str) -> String {
    format!("data:{};base64,{}", media_type, STANDARD.encode(bytes))
}

/// Declared MIME type first, then the filename extension.
pub fn is_allowed_image(content_type: Option<&str>, filename: Option<&str>) -> bool {
    if let Some(ct) = content_type {
        let essence = ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase();
        if ALLOWED_MIME_TYPES.contains(&essence.as_str()) {
            return true;
        }
    }
    filename
        .and_then(extension_of)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}
