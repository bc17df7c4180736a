//! Chat-completions transport for the vision-language model.

use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::config::AzureConfig;
use crate::error::ServiceError;

/// One piece of a user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    /// `data:<mime>;base64,<payload>` URL.
    ImageDataUrl(String),
}

impl ContentPart {
    fn to_json(&self) -> Value {
        match self {
            ContentPart::Text(text) => json!({ "type": "text", "text": text }),
            ContentPart::ImageDataUrl(url) => json!({
                "type": "image_url",
                "image_url": { "url": url }
            }),
        }
    }
}

/// Anything that can answer a single-turn user message with free text.
pub trait ChatModel {
    fn complete(&self, content: Vec<ContentPart>) -> Result<String, ServiceError>;
}

impl<M: ChatModel + ?Sized> ChatModel for &M {
    fn complete(&self, content: Vec<ContentPart>) -> Result<String, ServiceError> {
        (**self).complete(content)
    }
}

/// OpenAI-compatible chat completions endpoint on Azure.
pub struct AzureChatClient {
    http: Client,
    url: String,
    api_key: String,
    model: String,
}

impl AzureChatClient {
    pub fn new(config: &AzureConfig) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;
        Ok(Self {
            http,
            url: format!("{}/chat/completions", config.endpoint),
            api_key: config.api_key.clone(),
            model: config.deployment.clone(),
        })
    }
}

/// Text-only messages go out as a plain string, anything with an image as a part list.
pub fn message_content(parts: &[ContentPart]) -> Value {
    match parts {
        [ContentPart::Text(text)] => Value::String(text.clone()),
        _ => Value::Array(parts.iter().map(ContentPart::to_json).collect()),
    }
}

pub fn request_body(model: &str, parts: &[ContentPart]) -> Value {
    json!({
        "model": model,
        "messages": [
            { "role": "user", "content": message_content(parts) }
        ]
    })
}

/// Pull `error.message` out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "Invalid key or endpoint?".to_string()
            } else {
                body.trim().to_string()
            }
        })
}

pub fn classify_status(status: StatusCode, body: &str) -> ServiceError {
    match status.as_u16() {
        429 => ServiceError::RateLimited,
        code @ (401 | 403) => ServiceError::Unauthorized(code),
        code => ServiceError::Status {
            status: code,
            message: error_message(body),
        },
    }
}

/// Reply text from a chat-completion response body.
pub fn reply_text(body: &Value) -> Result<String, ServiceError> {
    let message = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .ok_or_else(|| ServiceError::InvalidResponse("No choices in response".to_string()))?;

    let text = match message.get("content") {
        Some(Value::String(s)) => s.clone(),
        // Some deployments answer with a part list even for text.
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    };

    if text.trim().is_empty() {
        return Err(ServiceError::EmptyReply);
    }
    Ok(text)
}

impl ChatModel for AzureChatClient {
    fn complete(&self, content: Vec<ContentPart>) -> Result<String, ServiceError> {
        let started = Instant::now();
        let body = request_body(&self.model, &content);

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        let elapsed: Duration = started.elapsed();
        tracing::debug!(
            model = %self.model,
            parts = content.len(),
            status = status.as_u16(),
            elapsed_ms = elapsed.as_millis() as u64,
            "chat completion"
        );

        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            let err = classify_status(status, &text);
            tracing::warn!("Model request failed: {}", err);
            return Err(err);
        }

        let json: Value = response
            .json()
            .map_err(|e| ServiceError::InvalidResponse(format!("Invalid JSON: {}", e)))?;
        reply_text(&json)
    }
}
