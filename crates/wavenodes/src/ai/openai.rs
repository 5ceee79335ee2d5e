use super::{GenerationError, GenerationRequest, TextGenerator};
use async_trait::async_trait;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
}

impl OpenAiConfig {
    /// Read `OPENAI_API_KEY` and the optional `OPENAI_BASE_URL`. Returns
    /// `None` when no key is set.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok()?;
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Some(Self { api_key, base_url })
    }
}

/// Text generator backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiGenerator {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiGenerator {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Option<Self> {
        OpenAiConfig::from_env().map(Self::new)
    }

    fn build_payload(request: &GenerationRequest) -> serde_json::Value {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": request.prompt }));

        let mut payload = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
        });
        if let Some(max_tokens) = request.max_tokens {
            payload["max_tokens"] = serde_json::Value::from(max_tokens);
        }
        payload
    }

    /// Send the request and read the reply. Body reads count as part of the
    /// exchange, so cancellation interrupts them as well.
    async fn exchange(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| GenerationError::Provider(format!("request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(GenerationError::MissingCredentials(format!(
                "provider rejected credentials ({})",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            let body = response.text().await.map_err(|e| {
                GenerationError::Provider(format!(
                    "API error ({}), body unreadable: {}",
                    status.as_u16(),
                    e
                ))
            })?;
            return Err(GenerationError::Provider(format!(
                "API error ({}): {}",
                status.as_u16(),
                body
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::Provider(format!("invalid response body: {}", e)))?;

        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GenerationError::Provider("response has no message content".to_string()))
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<String, GenerationError> {
        if self.config.api_key.trim().is_empty() {
            return Err(GenerationError::MissingCredentials(
                "OPENAI_API_KEY is empty".to_string(),
            ));
        }

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        tracing::debug!(model = %request.model, %url, "Sending completion request");

        let payload = Self::build_payload(&request);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GenerationError::Cancelled),
            result = self.exchange(&url, &payload) => result,
        }
    }
}
