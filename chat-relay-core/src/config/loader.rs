//! Configuration loading and management

use super::schema::Config;
use super::validate::validate_config;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Prefix of path-style environment overrides, e.g. `CHAT_RELAY__RELAY__MODEL`
const ENV_PREFIX: &str = "CHAT_RELAY__";

/// Configuration loader
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// Create a new config loader with the default config directory
    pub fn new() -> Self {
        let config_dir = dirs::home_dir()
            .map(|h| h.join(".chat-relay"))
            .unwrap_or_else(|| PathBuf::from(".chat-relay"));

        Self { config_dir }
    }

    /// Create a new config loader with a custom config directory
    pub fn with_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            config_dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Load configuration from file and environment
    pub fn load(&self) -> crate::Result<Config> {
        let config_path = self.config_path();
        let mut merged = serde_json::to_value(Config::default())?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let file_value: Value = serde_json::from_str(&content)?;
            merge_values(&mut merged, file_value);
        }

        apply_alias_overrides(&mut merged);
        apply_path_overrides(&mut merged);

        let config: Config = serde_json::from_value(merged)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path of the JSON config file
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                if let Some(existing) = base_map.get_mut(&key) {
                    merge_values(existing, value);
                } else {
                    base_map.insert(key, value);
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value;
        }
    }
}

fn parse_env_value(raw: &str) -> Value {
    if let Ok(v) = serde_json::from_str::<Value>(raw) {
        return v;
    }
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    Value::String(raw.to_string())
}

fn get_path_value<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter()
        .try_fold(root, |current, segment| current.get(segment.as_str()))
}

/// Typed value for one path override.
///
/// String fields always take the raw text. Unset fields take the parsed JSON
/// only if the config still deserializes with it, so JSON-looking text
/// meant for an optional string field stays a string.
fn override_value(config: &Value, path: &[String], raw: &str) -> Value {
    let parsed = parse_env_value(raw);
    match get_path_value(config, path) {
        Some(Value::String(_)) => Value::String(raw.to_string()),
        None | Some(Value::Null) if !parsed.is_string() => {
            let mut candidate = config.clone();
            set_path_value(&mut candidate, path, parsed.clone());
            if serde_json::from_value::<Config>(candidate).is_ok() {
                parsed
            } else {
                Value::String(raw.to_string())
            }
        }
        _ => parsed,
    }
}

fn set_path_value(root: &mut Value, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return;
    };

    let mut current = root;
    for segment in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Some(map) = current.as_object_mut() else {
            return;
        };
        current = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Some(map) = current.as_object_mut() {
        map.insert(last.clone(), value);
    }
}

fn apply_alias_overrides(config: &mut Value) {
    // later entries win when several aliases target the same path
    let aliases = [
        ("GOOGLE_API_KEY", "providers.gemini.api_key"),
        ("GEMINI_API_KEY", "providers.gemini.api_key"),
        ("OPENAI_API_KEY", "providers.openai.api_key"),
        ("ANTHROPIC_API_KEY", "providers.anthropic.api_key"),
        ("OPENROUTER_API_KEY", "providers.openrouter.api_key"),
        ("DEEPSEEK_API_KEY", "providers.deepseek.api_key"),
        ("GROQ_API_KEY", "providers.groq.api_key"),
        ("HOSTED_VLLM_API_KEY", "providers.vllm.api_key"),
    ];

    for (env_key, target_path) in aliases {
        if let Ok(value) = std::env::var(env_key) {
            let path: Vec<String> = target_path.split('.').map(ToString::to_string).collect();
            set_path_value(config, &path, Value::String(value));
        }
    }
}

fn apply_path_overrides(config: &mut Value) {
    for (key, value) in std::env::vars() {
        let Some(suffix) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let segments: Vec<String> = suffix
            .split("__")
            .filter(|s| !s.is_empty())
            .map(|s| s.to_ascii_lowercase())
            .collect();
        if segments.is_empty() {
            continue;
        }
        let value = override_value(config, &segments, &value);
        set_path_value(config, &segments, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderErrorPolicy;
    use once_cell::sync::Lazy;
    use std::sync::{Mutex, MutexGuard};
    use tempfile::TempDir;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    struct EnvVarGuard {
        key: String,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &str, value: &str) -> Self {
            let original = std::env::var(key).ok();
            std::env::set_var(key, value);
            Self {
                key: key.to_string(),
                original,
            }
        }

        fn unset(key: &str) -> Self {
            let original = std::env::var(key).ok();
            std::env::remove_var(key);
            Self {
                key: key.to_string(),
                original,
            }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match &self.original {
                Some(value) => std::env::set_var(&self.key, value),
                None => std::env::remove_var(&self.key),
            }
        }
    }

    fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[test]
    fn test_load_default_config() {
        let _lock = lock_env();
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        let config = loader.load().unwrap();

        assert_eq!(config.relay.model, "gemini-2.5-flash");
        assert_eq!(config.relay.max_tokens, 1000);
        assert_eq!(config.gateway.host, "127.0.0.1");
    }

    #[test]
    fn test_serialized_config_round_trips_through_load() {
        let _lock = lock_env();
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());

        let mut config = Config::default();
        config.relay.model = "test-model".to_string();
        config.relay.max_history_turns = Some(8);
        std::fs::write(
            loader.config_path(),
            serde_json::to_string_pretty(&config).unwrap(),
        )
        .unwrap();

        let loaded = loader.load().unwrap();
        assert_eq!(loaded.relay.model, "test-model");
        assert_eq!(loaded.relay.max_history_turns, Some(8));
    }

    #[test]
    fn test_file_merges_over_defaults() {
        let _lock = lock_env();
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        std::fs::write(
            loader.config_path(),
            r#"{"relay":{"system_prompt":"Answer in Vietnamese."},"gateway":{"port":9000}}"#,
        )
        .unwrap();

        let config = loader.load().unwrap();
        assert_eq!(config.relay.system_prompt, "Answer in Vietnamese.");
        assert_eq!(config.relay.model, "gemini-2.5-flash");
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.host, "127.0.0.1");
    }

    #[test]
    fn test_load_applies_alias_env_overrides() {
        let _lock = lock_env();
        let _google_guard = EnvVarGuard::unset("GOOGLE_API_KEY");
        let _gemini_guard = EnvVarGuard::set("GEMINI_API_KEY", "gemini-from-env");
        let _openai_guard = EnvVarGuard::set("OPENAI_API_KEY", "sk-openai-from-env");

        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        let config = loader.load().unwrap();

        assert_eq!(config.providers.gemini.api_key, "gemini-from-env");
        assert_eq!(config.providers.openai.api_key, "sk-openai-from-env");
    }

    #[test]
    fn test_google_api_key_alias() {
        let _lock = lock_env();
        let _gemini_guard = EnvVarGuard::unset("GEMINI_API_KEY");
        let _google_guard = EnvVarGuard::set("GOOGLE_API_KEY", "google-key");

        let temp_dir = TempDir::new().unwrap();
        let config = ConfigLoader::with_dir(temp_dir.path()).load().unwrap();
        assert_eq!(config.providers.gemini.api_key, "google-key");
    }

    #[test]
    fn test_load_applies_path_env_overrides() {
        let _lock = lock_env();
        let _model_guard = EnvVarGuard::set("CHAT_RELAY__RELAY__MODEL", "openai/gpt-4o");
        let _temp_guard = EnvVarGuard::set("CHAT_RELAY__RELAY__TEMPERATURE", "0.9");
        let _window_guard = EnvVarGuard::set("CHAT_RELAY__RELAY__MAX_HISTORY_TURNS", "4");
        let _policy_guard = EnvVarGuard::set("CHAT_RELAY__RELAY__ON_PROVIDER_ERROR", "reply");
        let _port_guard = EnvVarGuard::set("CHAT_RELAY__GATEWAY__PORT", "9001");

        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        let config = loader.load().unwrap();

        assert_eq!(config.relay.model, "openai/gpt-4o");
        assert_eq!(config.relay.temperature, 0.9);
        assert_eq!(config.relay.max_history_turns, Some(4));
        assert_eq!(config.relay.on_provider_error, ProviderErrorPolicy::Reply);
        assert_eq!(config.gateway.port, 9001);
    }

    #[test]
    fn test_path_env_overrides_alias_and_file() {
        let _lock = lock_env();
        let _alias_guard = EnvVarGuard::set("OPENAI_API_KEY", "sk-openai-alias");
        let _path_guard = EnvVarGuard::set(
            "CHAT_RELAY__PROVIDERS__OPENAI__API_KEY",
            "sk-openai-path-override",
        );

        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        std::fs::write(
            loader.config_path(),
            r#"{"providers":{"openai":{"api_key":"sk-openai-file"}}}"#,
        )
        .unwrap();

        let config = loader.load().unwrap();
        assert_eq!(config.providers.openai.api_key, "sk-openai-path-override");
    }

    #[test]
    fn test_json_looking_text_stays_a_string() {
        let _lock = lock_env();
        let _key_guard = EnvVarGuard::set("CHAT_RELAY__PROVIDERS__OPENAI__API_KEY", "123456789");
        let _model_guard = EnvVarGuard::set("CHAT_RELAY__RELAY__MODEL", "42");
        let _prompt_guard = EnvVarGuard::set("CHAT_RELAY__RELAY__SYSTEM_PROMPT", "true");
        let _base_guard = EnvVarGuard::set("CHAT_RELAY__PROVIDERS__VLLM__API_BASE", "8080");
        let _window_guard = EnvVarGuard::set("CHAT_RELAY__RELAY__MAX_HISTORY_TURNS", "3");

        let temp_dir = TempDir::new().unwrap();
        let config = ConfigLoader::with_dir(temp_dir.path()).load().unwrap();

        assert_eq!(config.providers.openai.api_key, "123456789");
        assert_eq!(config.relay.model, "42");
        assert_eq!(config.relay.system_prompt, "true");
        assert_eq!(config.providers.vllm.api_base.as_deref(), Some("8080"));
        // numeric fields still parse
        assert_eq!(config.relay.max_history_turns, Some(3));
    }

    #[test]
    fn test_validation_rejects_invalid_temperature() {
        let _lock = lock_env();
        let _temp_guard = EnvVarGuard::set("CHAT_RELAY__RELAY__TEMPERATURE", "2.5");

        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        let err = loader.load().unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let _lock = lock_env();
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        std::fs::write(loader.config_path(), "{ not json").unwrap();

        let err = loader.load().unwrap_err();
        assert!(matches!(err, crate::Error::Serialization(_)));
    }
}
