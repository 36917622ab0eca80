use serde::{ Deserialize, Serialize };

use super::chat::{ ChatSummary, Conversation };

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "chatId")]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub success: bool,
    pub chat_id: String,
    pub user_message: String,
    pub ai_message: String,
    pub image_url: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct UploadImageRequest {
    pub image: Option<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UploadImageResponse {
    pub success: bool,
    pub image_url: String,
    pub public_id: String,
}

#[derive(Serialize, Debug)]
pub struct ChatHistoryResponse {
    pub success: bool,
    pub chats: Vec<ChatSummary>,
}

#[derive(Serialize, Debug)]
pub struct ChatResponse {
    pub success: bool,
    pub chat: Conversation,
}

#[derive(Serialize, Debug)]
pub struct ModelEntry {
    pub id: String,
    pub category: String,
    pub description: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ModelListResponse {
    pub success: bool,
    pub default_model: String,
    pub models: Vec<ModelEntry>,
}

#[derive(Deserialize, Debug)]
pub struct SetDefaultModelRequest {
    pub model: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct DefaultModelResponse {
    pub success: bool,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    pub version: u64,
}

#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self { success: false, error: error.into() }
    }
}
