//! Provider registry - single source of truth for LLM provider metadata

use serde::Deserialize;
use std::collections::HashMap;

/// One LLM provider's metadata
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSpec {
    // Identity
    pub name: String,
    pub keywords: Vec<String>,
    pub env_key: String,
    pub display_name: String,

    // Gateway / local detection
    pub is_gateway: bool,
    pub is_local: bool,
    pub detect_by_key_prefix: String,
    pub detect_by_base_keyword: String,
    pub default_api_base: String,

    // Per-model param overrides
    #[serde(default)]
    pub model_overrides: Vec<(String, HashMap<String, serde_json::Value>)>,
}

impl ProviderSpec {
    pub fn label(&self) -> String {
        if !self.display_name.is_empty() {
            self.display_name.clone()
        } else {
            let mut name = self.name.clone();
            if let Some(first_char) = name.chars().next() {
                name = first_char.to_uppercase().to_string() + &name[first_char.len_utf8()..];
            }
            name
        }
    }

    /// Parameter overrides for the first pattern contained in `model`
    pub fn overrides_for(&self, model: &str) -> Option<&HashMap<String, serde_json::Value>> {
        let model_lower = model.to_lowercase();
        self.model_overrides
            .iter()
            .find(|(pattern, _)| model_lower.contains(pattern.as_str()))
            .map(|(_, overrides)| overrides)
    }
}

/// Registry of available LLM providers
pub struct ProviderRegistry {
    providers: Vec<ProviderSpec>,
}

impl ProviderRegistry {
    /// Create a new provider registry with default providers
    pub fn new() -> Self {
        Self {
            providers: Self::default_providers(),
        }
    }

    /// Find a provider by model name (case-insensitive keyword matching)
    pub fn find_by_model(&self, model: &str) -> Option<&ProviderSpec> {
        let model_lower = model.to_lowercase();
        self.providers
            .iter()
            .filter(|spec| !spec.is_gateway && !spec.is_local)
            .find(|spec| spec.keywords.iter().any(|kw| model_lower.contains(kw.as_str())))
    }

    /// Find the provider serving `model`, honouring a `provider/model` prefix first
    pub fn find_for_model(&self, model: &str) -> Option<&ProviderSpec> {
        model
            .split_once('/')
            .and_then(|(prefix, _)| self.find_by_name(prefix))
            .or_else(|| self.find_by_model(model))
    }

    /// Find a gateway/local provider
    pub fn find_gateway(
        &self,
        provider_name: Option<&str>,
        api_key: Option<&str>,
        api_base: Option<&str>,
    ) -> Option<&ProviderSpec> {
        // 1. Direct match by config key
        if let Some(name) = provider_name {
            if let Some(spec) = self.find_by_name(name) {
                if spec.is_gateway || spec.is_local {
                    return Some(spec);
                }
            }
        }

        // 2. Auto-detect by api_key prefix / api_base keyword
        for spec in self.providers.iter().filter(|spec| spec.is_gateway) {
            if !spec.detect_by_key_prefix.is_empty() {
                if let Some(key) = api_key {
                    if key.starts_with(&spec.detect_by_key_prefix) {
                        return Some(spec);
                    }
                }
            }
            if !spec.detect_by_base_keyword.is_empty() {
                if let Some(base) = api_base {
                    if base.contains(&spec.detect_by_base_keyword) {
                        return Some(spec);
                    }
                }
            }
        }

        None
    }

    /// Find a provider by config field name
    pub fn find_by_name(&self, name: &str) -> Option<&ProviderSpec> {
        self.providers.iter().find(|spec| spec.name == name)
    }

    fn default_providers() -> Vec<ProviderSpec> {
        let yaml = include_str!("providers.yaml");
        serde_yaml::from_str(yaml).expect("Failed to parse default providers configuration")
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
