//! OpenAI-compatible HTTP client implementation

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::base::{LLMProvider, LLMResponse, Message, ProviderError, ProviderResult};
use crate::registry::{ProviderRegistry, ProviderSpec};

/// Fallback endpoint when neither the config nor the registry names one
const DEFAULT_API_BASE: &str = "http://localhost:4000";

/// Upper bound on one request, connect through last body byte
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Chat completion request format
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f64,
}

/// Chat completion response format
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: i64,
    #[serde(default)]
    completion_tokens: i64,
    #[serde(default)]
    total_tokens: i64,
}

/// Client for any provider exposing `POST {api_base}/chat/completions`
pub struct OpenAICompatClient {
    client: Client,
    timeout: Duration,
    api_base: String,
    api_key: Option<String>,
    default_model: String,
    extra_headers: HashMap<String, String>,
    spec: Option<ProviderSpec>,
}

impl OpenAICompatClient {
    /// Create a new client
    ///
    /// The provider is resolved from `provider_name`, then from gateway
    /// detection on the key and base, then from the default model.
    pub fn new(
        api_key: Option<String>,
        api_base: Option<String>,
        default_model: String,
        extra_headers: Option<HashMap<String, String>>,
        provider_name: Option<String>,
    ) -> Self {
        let registry = ProviderRegistry::new();
        let spec = registry
            .find_gateway(
                provider_name.as_deref(),
                api_key.as_deref(),
                api_base.as_deref(),
            )
            .or_else(|| {
                provider_name
                    .as_deref()
                    .and_then(|name| registry.find_by_name(name))
            })
            .or_else(|| registry.find_for_model(&default_model))
            .cloned();

        let api_base = api_base
            .filter(|base| !base.trim().is_empty())
            .or_else(|| {
                spec.as_ref()
                    .map(|spec| spec.default_api_base.clone())
                    .filter(|base| !base.is_empty())
            })
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Self {
            client: build_client(DEFAULT_TIMEOUT),
            timeout: DEFAULT_TIMEOUT,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            default_model,
            extra_headers: extra_headers.unwrap_or_default(),
            spec,
        }
    }

    /// Fail requests that take longer than `timeout` with an HTTP error
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self.timeout = timeout;
        self
    }

    /// Per-request timeout, covering connect through the full response body
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Base URL requests are sent to
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Name of the resolved provider, if any
    pub fn provider_name(&self) -> Option<&str> {
        self.spec.as_ref().map(|spec| spec.name.as_str())
    }

    /// Strip a leading `provider/` segment that only the registry understands
    fn resolve_model(&self, model: &str) -> String {
        if let Some(spec) = &self.spec {
            if let Some(stripped) = model.strip_prefix(&format!("{}/", spec.name)) {
                debug!("Resolved model: {} -> {}", model, stripped);
                return stripped.to_string();
            }
        }
        model.to_string()
    }

    /// Apply model-specific temperature overrides from the registry
    fn effective_temperature(&self, model: &str, temperature: f64) -> f64 {
        self.spec
            .as_ref()
            .and_then(|spec| spec.overrides_for(model))
            .and_then(|overrides| overrides.get("temperature"))
            .and_then(|value| value.as_f64())
            .map(|forced| {
                debug!("Applied temperature override for {}: {}", model, forced);
                forced
            })
            .unwrap_or(temperature)
    }

    /// Parse the response into our standard format
    fn parse_response(&self, response: ChatCompletionResponse) -> ProviderResult<LLMResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))?;

        let mut usage = HashMap::new();
        usage.insert("prompt_tokens".to_string(), response.usage.prompt_tokens);
        usage.insert(
            "completion_tokens".to_string(),
            response.usage.completion_tokens,
        );
        usage.insert("total_tokens".to_string(), response.usage.total_tokens);

        Ok(LLMResponse {
            content: choice.message.content,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage,
        })
    }

    fn apply_headers(&self, mut req_builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(api_key) = &self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        for (key, value) in &self.extra_headers {
            req_builder = req_builder.header(key, value);
        }

        req_builder
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatClient {
    async fn chat(
        &self,
        messages: Vec<Message>,
        model: Option<String>,
        max_tokens: u32,
        temperature: f64,
    ) -> ProviderResult<LLMResponse> {
        let model = model.unwrap_or_else(|| self.default_model.clone());
        let resolved_model = self.resolve_model(&model);

        let request = ChatCompletionRequest {
            model: resolved_model.clone(),
            messages,
            max_tokens,
            temperature: self.effective_temperature(&model, temperature),
        };

        debug!(
            "Sending chat request to {} with model {} ({} messages)",
            self.api_base,
            resolved_model,
            request.messages.len()
        );

        let url = format!("{}/chat/completions", self.api_base);
        let req_builder = self.apply_headers(self.client.post(&url).json(&request));

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::ApiError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let body = response.text().await?;
        let response_data: ChatCompletionResponse = serde_json::from_str(&body)?;
        self.parse_response(response_data)
    }

}

fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .http1_only() // Force HTTP/1.1 to avoid issues with some local servers
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}
