use log::warn;

use crate::media::{ is_data_uri, is_remote_url, MediaError, MediaHost, MediaSource };
use crate::models::chat::{ ChatMessage, Conversation };

/// How an incoming image reference has to be treated before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
    /// `data:` payload that must be hosted first.
    Embedded(String),
    /// Already externally addressable; stored as-is.
    Remote(String),
}

impl ImageInput {
    /// `None` for blank or unrecognized references.
    pub fn classify(reference: &str) -> Option<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            None
        } else if is_data_uri(reference) {
            Some(ImageInput::Embedded(reference.to_string()))
        } else if is_remote_url(reference) {
            Some(ImageInput::Remote(reference.to_string()))
        } else {
            warn!("Ignoring image reference that is neither a data URI nor a URL");
            None
        }
    }
}

/// A validated user turn that has not been appended yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingTurn {
    pub text: String,
    pub image: Option<ImageInput>,
}

impl IncomingTurn {
    /// A turn needs text or an image; `None` when it has neither.
    pub fn new(text: Option<&str>, image: Option<&str>) -> Option<Self> {
        let text = text.unwrap_or_default().to_string();
        let image = image.and_then(ImageInput::classify);
        if text.trim().is_empty() && image.is_none() {
            return None;
        }
        Some(Self { text, image })
    }
}

/// Hosts embedded images and returns the reference to store.
pub async fn resolve_image(
    image: Option<ImageInput>,
    host: &dyn MediaHost
) -> Result<Option<String>, MediaError> {
    match image {
        None => Ok(None),
        Some(ImageInput::Remote(url)) => Ok(Some(url)),
        Some(ImageInput::Embedded(data)) => {
            let hosted = host.upload(MediaSource::DataUri(data)).await?;
            Ok(Some(hosted.url))
        }
    }
}

pub fn append_user_turn(conversation: &mut Conversation, text: &str, image_url: Option<String>) {
    conversation.append(ChatMessage::user(text, image_url));
}

pub fn append_assistant_turn(conversation: &mut Conversation, reply: &str) {
    conversation.append(ChatMessage::assistant(reply));
}
