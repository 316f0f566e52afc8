use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// Everything that can go wrong talking to the model endpoint. Callers treat
/// all variants as a single "inference failed" outcome; there is no retry at
/// this level.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("inference request failed: {0}")]
    Http(reqwest::Error),

    #[error("inference request timed out")]
    Timeout,

    #[error("inference endpoint returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("inference endpoint returned an empty response")]
    EmptyResponse,

    #[error("inference output was not valid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Http(err)
        }
    }
}

/// A single (text, optional images) prompt for the external model.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub model: String,
    pub prompt: String,
    pub image_urls: Vec<String>,
    pub temperature: f32,
    pub timeout: Duration,
}

#[async_trait]
pub trait InferenceGateway: Send + Sync {
    /// Submits the prompt and returns the model's structured-output JSON.
    async fn invoke(&self, request: InferenceRequest) -> Result<Value, GatewayError>;
}

/// OpenAI-chat-completions-shaped client over HTTPS with bearer auth.
pub struct ChatGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ChatGateway {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> ChatGateway {
        ChatGateway {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn message_content(request: &InferenceRequest) -> Value {
        if request.image_urls.is_empty() {
            return Value::String(request.prompt.clone());
        }
        let mut parts = vec![json!({ "type": "text", "text": request.prompt })];
        for url in &request.image_urls {
            parts.push(json!({ "type": "image_url", "image_url": { "url": url } }));
        }
        Value::Array(parts)
    }
}

#[async_trait]
impl InferenceGateway for ChatGateway {
    async fn invoke(&self, request: InferenceRequest) -> Result<Value, GatewayError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": request.model,
            "messages": [{ "role": "user", "content": Self::message_content(&request) }],
            "response_format": { "type": "json_object" },
            "temperature": request.temperature,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body: Value = response.json().await.unwrap_or_default();
            let message = error_body["error"]["message"]
                .as_str()
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("inference API error: {}", status.as_u16()));
            return Err(GatewayError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let data: Value = response.json().await?;
        let content = data["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(GatewayError::EmptyResponse);
        }

        let parsed: Value = serde_json::from_str(strip_code_fences(content).as_str())?;
        Ok(parsed)
    }
}

/// Models occasionally wrap structured output in markdown code fences even when
/// asked for plain JSON.
pub fn strip_code_fences(content: &str) -> String {
    content.replace("```json", "").replace("```", "").trim().to_string()
}
