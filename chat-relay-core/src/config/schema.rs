//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for chat-relay
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Relay behaviour
    #[serde(default)]
    pub relay: RelayConfig,
    /// Provider configuration
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
        }
    }
}

/// What the relay does with a connection whose model call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorPolicy {
    /// Close the connection with an internal-error close frame
    #[default]
    Close,
    /// Send an `[error] ...` text frame and keep the connection open
    Reply,
}

/// Relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Fixed system instruction placed before every transcript
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,
    /// Provider name; inferred from the model when unset
    #[serde(default)]
    pub provider: Option<String>,
    /// Maximum output tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature
    #[serde(default)]
    pub temperature: f64,
    /// Seconds to wait for one model response before failing the turn
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Trailing turns sent as context; unset sends the whole transcript
    #[serde(default)]
    pub max_history_turns: Option<usize>,
    #[serde(default)]
    pub on_provider_error: ProviderErrorPolicy,
}

fn default_system_prompt() -> String {
    "You are a helpful AI assistant.".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            model: default_model(),
            provider: None,
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            request_timeout_secs: default_request_timeout_secs(),
            max_history_turns: None,
            on_provider_error: ProviderErrorPolicy::default(),
        }
    }
}

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub gemini: ProviderConfig,
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub anthropic: ProviderConfig,
    #[serde(default)]
    pub openrouter: ProviderConfig,
    #[serde(default)]
    pub deepseek: ProviderConfig,
    #[serde(default)]
    pub groq: ProviderConfig,
    #[serde(default)]
    pub vllm: ProviderConfig,
    #[serde(default)]
    pub custom: ProviderConfig,
}

impl ProvidersConfig {
    /// Look up a provider section by its registry name
    pub fn by_name(&self, name: &str) -> Option<&ProviderConfig> {
        match name {
            "gemini" => Some(&self.gemini),
            "openai" => Some(&self.openai),
            "anthropic" => Some(&self.anthropic),
            "openrouter" => Some(&self.openrouter),
            "deepseek" => Some(&self.deepseek),
            "groq" => Some(&self.groq),
            "vllm" => Some(&self.vllm),
            "custom" => Some(&self.custom),
            _ => None,
        }
    }

    /// Name and section of every provider, in display order
    pub fn entries(&self) -> [(&'static str, &ProviderConfig); 8] {
        [
            ("gemini", &self.gemini),
            ("openai", &self.openai),
            ("anthropic", &self.anthropic),
            ("openrouter", &self.openrouter),
            ("deepseek", &self.deepseek),
            ("groq", &self.groq),
            ("vllm", &self.vllm),
            ("custom", &self.custom),
        ]
    }
}

/// Individual provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub extra_headers: Option<HashMap<String, String>>,
}

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}
