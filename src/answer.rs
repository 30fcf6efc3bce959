use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info};

use crate::error::{AppError, AppResult};
use crate::prompt::Prompt;

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

const TEMPERATURE: f32 = 0.3;
const MAX_COMPLETION_TOKENS: u32 = 1024;

/// The only part of the model reply that is consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredAnswer {
    pub summary: String,
    pub answer: String,
    pub tone: String,
}

impl StructuredAnswer {
    fn json_schema() -> serde_json::Value {
        json!({
            "type": "json_schema",
            "json_schema": {
                "name": "structured_answer",
                "strict": true,
                "schema": {
                    "type": "object",
                    "properties": {
                        "summary": { "type": "string", "description": "Brief summary of the content" },
                        "answer": { "type": "string", "description": "Answer to the user's question" },
                        "tone": { "type": "string", "description": "Overall tone of the content" }
                    },
                    "required": ["summary", "answer", "tone"],
                    "additionalProperties": false
                }
            }
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub response_format: serde_json::Value,
}

impl ChatRequest {
    pub fn structured(model: &str, prompt: &Prompt) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: prompt.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.user.clone(),
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_COMPLETION_TOKENS,
            response_format: StructuredAnswer::json_schema(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub message: String,
}

/// One round trip to a chat completion endpoint.
pub trait CompletionTransport {
    fn complete(
        &self,
        api_key: &str,
        request: &ChatRequest,
    ) -> impl Future<Output = AppResult<ChatResponse>>;
}

pub struct OpenAiTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl OpenAiTransport {
    pub fn new(api_base: &str, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::UpstreamService(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
        })
    }
}

impl CompletionTransport for OpenAiTransport {
    async fn complete(&self, api_key: &str, request: &ChatRequest) -> AppResult<ChatResponse> {
        debug!(endpoint = %self.endpoint, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::UpstreamService(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, %body, "Completion API error");
            let message = serde_json::from_str::<ChatResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(AppError::UpstreamService(format!("{status}: {message}")));
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| AppError::UpstreamService(format!("malformed response: {e}")))
    }
}

pub struct AnswerRequestor<T> {
    transport: T,
    api_key: Option<String>,
    model: String,
}

impl<T: CompletionTransport> AnswerRequestor<T> {
    pub fn new(transport: T, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            transport,
            api_key,
            model: model.into(),
        }
    }

    pub async fn ask(&self, prompt: &Prompt) -> AppResult<StructuredAnswer> {
        let api_key = require_credential(self.api_key.as_deref())?;

        let request = ChatRequest::structured(&self.model, prompt);
        info!(model = %self.model, prompt_chars = prompt.user.chars().count(), "Requesting answer");

        let response = self.transport.complete(api_key, &request).await?;
        parse_answer(response)
    }
}

/// A blank key counts as missing.
pub fn require_credential(api_key: Option<&str>) -> AppResult<&str> {
    api_key
        .filter(|key| !key.trim().is_empty())
        .ok_or(AppError::MissingCredential {
            variable: API_KEY_VAR,
        })
}

/// Validates the reply against the three-field contract.
pub fn parse_answer(response: ChatResponse) -> AppResult<StructuredAnswer> {
    if let Some(error) = response.error {
        return Err(AppError::UpstreamService(error.message));
    }

    let message = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| AppError::UpstreamService("response contained no choices".to_string()))?;

    if let Some(refusal) = message.refusal {
        return Err(AppError::UpstreamService(format!("model refused: {refusal}")));
    }

    let content = message
        .content
        .ok_or_else(|| AppError::UpstreamService("response message had no content".to_string()))?;

    serde_json::from_str::<StructuredAnswer>(&content).map_err(|e| {
        AppError::UpstreamService(format!("response does not match answer schema: {e}"))
    })
}
