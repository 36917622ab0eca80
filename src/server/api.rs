use crate::agent::{ ChatAgent, RelayError };
use crate::media::{ is_data_uri, is_remote_url, MediaSource };
use crate::models::api::{
    ChatHistoryResponse,
    ChatResponse,
    DefaultModelResponse,
    ErrorResponse,
    ModelListResponse,
    SendMessageRequest,
    SendMessageResponse,
    SetDefaultModelRequest,
    UploadImageRequest,
    UploadImageResponse,
};
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::{ DefaultBodyLimit, FromRequest, Multipart, Path, Request, State, rejection::JsonRejection },
    response::{ IntoResponse, Response },
    http::{ header, HeaderMap, StatusCode },
};
use serde_json::json;
use tower_http::cors::{ Any, CorsLayer };
use log::{ error, warn };

/// Slack for multipart framing and form fields around the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    agent: Arc<ChatAgent>,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let code = match &self {
            RelayError::Validation(_) | RelayError::UnsupportedMedia(_) | RelayError::UnknownModel(_) =>
                StatusCode::BAD_REQUEST,
            RelayError::NotFound(_) => StatusCode::NOT_FOUND,
            RelayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RelayError::ModelListing(_) => StatusCode::BAD_GATEWAY,
            RelayError::Media(_) | RelayError::History(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if code.is_server_error() {
            error!("Request failed: {}", self);
        }
        (code, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
}

/// Extractor rejections are client errors; an over-limit body stays a 413.
fn rejected(status: StatusCode, message: String) -> Response {
    let status = if status == StatusCode::PAYLOAD_TOO_LARGE { status } else { StatusCode::BAD_REQUEST };
    (status, Json(ErrorResponse::new(message))).into_response()
}

pub fn router(agent: Arc<ChatAgent>, max_json_body_bytes: usize) -> Router {
    let upload_limit = (agent.upload_max_bytes() / 3) * 4 + MULTIPART_OVERHEAD;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/conversations/messages", post(send_message_handler))
        .route(
            "/conversations/images",
            post(upload_image_handler).layer(DefaultBodyLimit::max(upload_limit))
        )
        .route("/conversations/users/{user_id}", get(chat_history_handler))
        .route("/conversations/{chat_id}", get(get_chat_handler))
        .route("/models", get(list_models_handler))
        .route("/models/default", get(get_default_model_handler).post(set_default_model_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(max_json_body_bytes))
        .layer(cors)
        .with_state(AppState { agent })
}

async fn send_message_handler(
    State(state): State<AppState>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>
) -> Response {
    let Json(req) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            warn!("Rejected send-message body: {}", rejection);
            return rejected(rejection.status(), rejection.body_text());
        }
    };

    match state.agent.process_message(req).await {
        Ok(outcome) =>
            Json(SendMessageResponse {
                success: true,
                chat_id: outcome.chat_id,
                user_message: outcome.user_message,
                ai_message: outcome.ai_message,
                image_url: outcome.image_url,
            }).into_response(),
        Err(e) => e.into_response(),
    }
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

async fn read_multipart_image(mut multipart: Multipart) -> Result<Option<MediaSource>, Response> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                return Ok(None);
            }
            Err(e) => {
                return Err(rejected(e.status(), e.body_text()));
            }
        };

        let is_file = field.file_name().is_some() || matches!(field.name(), Some("image") | Some("file"));
        if !is_file {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes().await
            .map_err(|e| rejected(e.status(), e.body_text()))?;
        if data.is_empty() {
            return Ok(None);
        }
        return Ok(
            Some(MediaSource::Bytes {
                data: data.to_vec(),
                filename,
                content_type,
            })
        );
    }
}

async fn upload_image_handler(State(state): State<AppState>, headers: HeaderMap, request: Request) -> Response {
    let is_multipart = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false);

    let source = if is_multipart {
        let limit = state.agent.upload_max_bytes();
        if let Some(size) = declared_length(&headers) {
            if size > limit + MULTIPART_OVERHEAD {
                return (RelayError::PayloadTooLarge { size, limit }).into_response();
            }
        }
        let multipart = match Multipart::from_request(request, &state).await {
            Ok(m) => m,
            Err(rejection) => {
                return rejected(rejection.status(), rejection.body_text());
            }
        };
        match read_multipart_image(multipart).await {
            Ok(Some(source)) => source,
            Ok(None) => {
                return bad_request("No image provided");
            }
            Err(resp) => {
                return resp;
            }
        }
    } else {
        let Json(body) = match Json::<UploadImageRequest>::from_request(request, &state).await {
            Ok(body) => body,
            Err(rejection) => {
                return rejected(rejection.status(), rejection.body_text());
            }
        };
        match body.image.as_deref().map(str::trim) {
            None | Some("") => {
                return bad_request("No image provided");
            }
            Some(image) if is_data_uri(image) => MediaSource::DataUri(image.to_string()),
            Some(image) if is_remote_url(image) => MediaSource::RemoteUrl(image.to_string()),
            Some(_) => {
                return bad_request("image must be a data URI or an http(s) URL");
            }
        }
    };

    match state.agent.upload_image(source, None).await {
        Ok(hosted) =>
            Json(UploadImageResponse {
                success: true,
                image_url: hosted.url,
                public_id: hosted.public_id,
            }).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn chat_history_handler(State(state): State<AppState>, Path(user_id): Path<String>) -> Response {
    match state.agent.chat_history(&user_id).await {
        Ok(chats) => Json(ChatHistoryResponse { success: true, chats }).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn get_chat_handler(State(state): State<AppState>, Path(chat_id): Path<String>) -> Response {
    match state.agent.get_chat(&chat_id).await {
        Ok(chat) => Json(ChatResponse { success: true, chat }).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn list_models_handler(State(state): State<AppState>) -> Response {
    match state.agent.list_models().await {
        Ok(models) =>
            Json(ModelListResponse {
                success: true,
                default_model: state.agent.default_model().model.clone(),
                models,
            }).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn get_default_model_handler(State(state): State<AppState>) -> Response {
    let current = state.agent.default_model();
    Json(DefaultModelResponse {
        success: true,
        model: current.model.clone(),
        previous: None,
        version: current.version,
    }).into_response()
}

async fn set_default_model_handler(
    State(state): State<AppState>,
    payload: Result<Json<SetDefaultModelRequest>, JsonRejection>
) -> Response {
    let model = match payload {
        Ok(Json(SetDefaultModelRequest { model: Some(model) })) => model,
        Ok(_) => {
            return bad_request("model is required");
        }
        Err(rejection) => {
            return rejected(rejection.status(), rejection.body_text());
        }
    };

    match state.agent.set_default_model(&model).await {
        Ok((previous, current)) =>
            Json(DefaultModelResponse {
                success: true,
                model: current.model.clone(),
                previous: Some(previous.model.clone()),
                version: current.version,
            }).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "success": true, "status": "ok" }))
}
