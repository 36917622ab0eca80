use async_trait::async_trait;
use log::debug;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };

use super::{ ChatClient, CompletionRequest, CompletionResponse, GatewayError, PromptMessage };
use crate::llm::LlmConfig;

pub struct OpenAIChatClient {
    http: HttpClient,
    base_url: String,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIModelList {
    data: Vec<OpenAIModel>,
}

#[derive(Deserialize)]
struct OpenAIModel {
    id: String,
}

#[derive(Deserialize)]
struct OpenAIErrorEnvelope {
    error: OpenAIErrorBody,
}

#[derive(Deserialize)]
struct OpenAIErrorBody {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<serde_json::Value>,
}

impl OpenAIChatClient {
    pub fn new(api_key: Option<String>, base_url: String) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", key)).map_err(|e|
                    GatewayError::Config(format!("Invalid API key format: {}", e))
                )?
            );
        }

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        Ok(Self { http, base_url })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, GatewayError> {
        let api_key = config.api_key.clone().filter(|k| !k.is_empty());
        if api_key.is_none() && config.llm_type.requires_api_key() {
            return Err(GatewayError::Config(format!("{} API key is required", config.llm_type)));
        }
        Self::new(api_key, config.resolved_base_url())
    }

    fn endpoint(&self, route: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{}/{}", base, route)
        } else {
            format!("{}/v1/{}", base, route)
        }
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(api_error(status.as_u16(), &body))
    }
}

/// Decodes the `{ "error": { ... } }` envelope, falling back to the raw body.
fn api_error(status: u16, body: &str) -> GatewayError {
    match serde_json::from_str::<OpenAIErrorEnvelope>(body) {
        Ok(envelope) =>
            GatewayError::Api {
                status,
                kind: envelope.error.kind,
                code: envelope.error.code.and_then(|c| {
                    match c {
                        serde_json::Value::String(s) => Some(s),
                        serde_json::Value::Null => None,
                        other => Some(other.to_string()),
                    }
                }),
                message: envelope.error.message.unwrap_or_else(|| body.to_string()),
            },
        Err(_) =>
            GatewayError::Api {
                status,
                kind: None,
                code: None,
                message: body.trim().to_string(),
            },
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(
        &self,
        request: &CompletionRequest
    ) -> Result<CompletionResponse, GatewayError> {
        let url = self.endpoint("chat/completions");
        let req = OpenAIChatRequest {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
        };
        debug!("Dispatching {} message(s) to {} with model {}", request.messages.len(), url, request.model);

        let resp = self.http.post(&url).json(&req).send().await?;
        let resp = Self::check_status(resp).await?.json::<OpenAIResponse>().await?;

        let content = resp.choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::InvalidResponse("No choices in completion".to_string()))?
            .message.content.unwrap_or_default();

        Ok(CompletionResponse { response: content })
    }

    async fn list_models(&self) -> Result<Vec<String>, GatewayError> {
        let url = self.endpoint("models");
        let resp = self.http.get(&url).send().await?;
        let list = Self::check_status(resp).await?.json::<OpenAIModelList>().await?;
        Ok(
            list.data
                .into_iter()
                .map(|m| m.id)
                .collect()
        )
    }

    fn get_base_url(&self) -> String {
        self.base_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::chat::MessageContent;
    use crate::models::chat::Role;
    use serde_json::json;
    use wiremock::matchers::{ body_partial_json, header, method, path };
    use wiremock::{ Mock, MockServer, ResponseTemplate };

    fn request(model: &str) -> CompletionRequest {
        CompletionRequest {
            model: model.to_string(),
            messages: vec![PromptMessage {
                role: Role::User,
                content: MessageContent::Text("hello".into()),
            }],
            max_tokens: Some(256),
        }
    }

    #[tokio::test]
    async fn complete_returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({ "model": "gpt-4o", "max_tokens": 256 })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(
                    json!({ "choices": [{ "message": { "role": "assistant", "content": "hi there" } }] })
                )
            )
            .mount(&server).await;

        let client = OpenAIChatClient::new(Some("sk-test".into()), server.uri()).unwrap();
        let resp = client.complete(&request("gpt-4o")).await.unwrap();
        assert_eq!(resp.response, "hi there");
    }

    #[tokio::test]
    async fn error_envelope_is_decoded_into_structured_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(429).set_body_json(
                    json!({
                        "error": {
                            "message": "You exceeded your current quota",
                            "type": "insufficient_quota",
                            "code": "insufficient_quota"
                        }
                    })
                )
            )
            .mount(&server).await;

        let client = OpenAIChatClient::new(Some("sk-test".into()), server.uri()).unwrap();
        match client.complete(&request("gpt-4o")).await {
            Err(GatewayError::Api { status, code, message, .. }) => {
                assert_eq!(status, 429);
                assert_eq!(code.as_deref(), Some("insufficient_quota"));
                assert!(message.contains("quota"));
            }
            other => panic!("unexpected result: {:?}", other.map(|r| r.response)),
        }
    }

    #[tokio::test]
    async fn list_models_collects_identifiers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(
                    json!({ "object": "list", "data": [{ "id": "gpt-4o" }, { "id": "gpt-3.5-turbo" }] })
                )
            )
            .mount(&server).await;

        let base = format!("{}/v1/", server.uri());
        let client = OpenAIChatClient::new(None, base).unwrap();
        let models = client.list_models().await.unwrap();
        assert_eq!(models, vec!["gpt-4o".to_string(), "gpt-3.5-turbo".to_string()]);
    }

    #[test]
    fn non_json_error_body_keeps_raw_text() {
        match api_error(502, "Bad Gateway\n") {
            GatewayError::Api { status, message, code, .. } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
                assert!(code.is_none());
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn hosted_provider_without_key_is_rejected() {
        let config = LlmConfig::default();
        assert!(matches!(OpenAIChatClient::from_config(&config), Err(GatewayError::Config(_))));
    }
}
