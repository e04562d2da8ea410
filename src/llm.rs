use crate::openai_types::{
    OpenAIBatchResponse, OpenAIErrorResponse, OpenAIMessage, OpenAIPayload, OpenAIResponseFormat,
};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request to text generation service failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("text generation service returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("text generation service returned no content")]
    EmptyContent,
}

/// One completion request: an optional system message, one user message and sampling knobs.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: &'static str,
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask the service to constrain output to a single JSON object.
    pub json_mode: bool,
    /// Whole-request deadline, response body included.
    pub timeout: Duration,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError>;
}

pub struct OpenAiClient {
    http_client: reqwest::Client,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            http_client,
            api_key,
        })
    }
}

fn build_payload(request: GenerationRequest) -> OpenAIPayload {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = request.system {
        messages.push(OpenAIMessage::system(system));
    }
    messages.push(OpenAIMessage::user(request.prompt));
    OpenAIPayload {
        model: request.model.to_string(),
        messages,
        max_tokens: Some(request.max_tokens),
        temperature: Some(request.temperature),
        response_format: request.json_mode.then_some(OpenAIResponseFormat::JSON_OBJECT),
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError> {
        let timeout = request.timeout;
        let payload = build_payload(request);
        let key = self.api_key.as_str();
        let resp = self
            .http_client
            .post(OPENAI_CHAT_URL)
            .timeout(timeout)
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {key}"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(error=%e, "failed to send request to OpenAI");
                e
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OpenAIErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let resp = resp.json::<OpenAIBatchResponse>().await.map_err(|e| {
            error!(error=%e, "failed to deserialize openai response");
            e
        })?;
        debug!(id=%resp.id, model=%resp.model, usage=?resp.usage, "openai completion");

        let choice = resp.choices.into_iter().next().ok_or(LlmError::EmptyContent)?;
        if choice.finish_reason.as_deref() == Some("length") {
            debug!(index = choice.index, role=%choice.message.role, "completion hit max_tokens");
        }
        choice
            .message
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(LlmError::EmptyContent)
    }
}
