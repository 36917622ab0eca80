use crate::llm::chat::{ ContentPart, MessageContent, PromptMessage };
use crate::models::chat::{ ChatMessage, Role };

/// Text sent alongside an image when the user supplied none.
pub const DEFAULT_IMAGE_PROMPT: &str = "Analyze this image";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionMode {
    /// Flat strings only; image references are ignored.
    Text,
    /// Image-bearing user turns become `[text, image]` part lists.
    Multimodal,
}

/// Chosen once per request from the whole sequence, never per turn.
pub fn select_mode(messages: &[ChatMessage], vision_enabled: bool) -> ProjectionMode {
    if vision_enabled && messages.iter().any(|m| m.image_url.is_some()) {
        ProjectionMode::Multimodal
    } else {
        ProjectionMode::Text
    }
}

fn project_one(message: &ChatMessage, mode: ProjectionMode) -> Option<PromptMessage> {
    let image = match (mode, message.role, message.image_url.as_deref()) {
        (ProjectionMode::Multimodal, Role::User, Some(url)) if !url.trim().is_empty() => Some(url),
        _ => None,
    };

    let content = match image {
        Some(url) => {
            let text = if message.has_text() {
                message.content.clone()
            } else {
                DEFAULT_IMAGE_PROMPT.to_string()
            };
            MessageContent::Multipart(vec![ContentPart::text(text), ContentPart::image(url)])
        }
        None if message.has_text() => MessageContent::Text(message.content.clone()),
        None => {
            return None;
        }
    };

    Some(PromptMessage { role: message.role, content })
}

/// Maps stored turns to the gateway payload, preserving order.
pub fn project(messages: &[ChatMessage], mode: ProjectionMode) -> Vec<PromptMessage> {
    messages
        .iter()
        .filter_map(|m| project_one(m, mode))
        .collect()
}
