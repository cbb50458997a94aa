use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// The three models the assistant can be pointed at.
pub const MODEL_FULL: &str = "gpt-4o";
pub const MODEL_DEFAULT: &str = "gpt-4o-mini";
pub const MODEL_LEGACY: &str = "gpt-3.5-turbo";

pub const AVAILABLE_MODELS: [&str; 3] = [MODEL_FULL, MODEL_DEFAULT, MODEL_LEGACY];

pub fn is_known_model(name: &str) -> bool {
    AVAILABLE_MODELS.contains(&name)
}

// Structs for the chat-completions endpoint (non-streaming)
#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// The single outbound call the assistant makes: a composed prompt goes
/// out, a raw completion comes back. Behind a trait so tests can script
/// completions without a network.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, prompt: &str, model: &str) -> Result<String, ModelError>;
}

pub struct OpenAiClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    // No request timeout is set here: long generations are normal, and the
    // network client's own defaults cover dead connections.
    pub fn new(endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn complete(&self, prompt: &str, model: &str) -> Result<String, ModelError> {
        let api_key = match &self.api_key {
            Some(key) if !key.is_empty() => key,
            _ => return Err(ModelError::InvalidCredential),
        };

        let request_payload = ChatRequest {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request_payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ModelError::ModelUnavailable("could not reach the model API".to_string())
                } else {
                    ModelError::Failed(format!("failed to send request: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_status(status, &error_text));
        }

        let parsed = response
            .json::<ChatResponse>()
            .await
            .map_err(|e| ModelError::Failed(format!("failed to parse the model response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ModelError::Failed("the model returned no choices".to_string()))
    }
}

fn classify_status(status: u16, error_text: &str) -> ModelError {
    match status {
        401 | 403 => ModelError::InvalidCredential,
        404 => ModelError::ModelUnavailable(format!(
            "model not found, status {status}: {error_text}"
        )),
        429 => ModelError::ModelUnavailable(format!(
            "rate limited, status {status}: {error_text}"
        )),
        500..=599 => ModelError::ModelUnavailable(format!(
            "server error, status {status}: {error_text}"
        )),
        _ => ModelError::Failed(format!("status {status}: {error_text}")),
    }
}
