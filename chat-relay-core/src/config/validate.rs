//! Configuration validation rules.

use super::schema::Config;

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    if config.relay.system_prompt.trim().is_empty() {
        errors.push("relay.system_prompt must not be empty".to_string());
    }
    if config.relay.model.trim().is_empty() {
        errors.push("relay.model must not be empty".to_string());
    }
    if config.relay.max_tokens == 0 {
        errors.push("relay.max_tokens must be > 0".to_string());
    }
    if !(0.0..=2.0).contains(&config.relay.temperature) {
        errors.push("relay.temperature must be in [0.0, 2.0]".to_string());
    }
    if config.relay.request_timeout_secs == 0 {
        errors.push("relay.request_timeout_secs must be > 0".to_string());
    }
    if config.relay.max_history_turns == Some(0) {
        errors.push("relay.max_history_turns must be > 0 when set".to_string());
    }
    if let Some(provider) = &config.relay.provider {
        if config.providers.by_name(provider).is_none() {
            errors.push(format!("relay.provider '{}' is not a known provider", provider));
        }
    }

    if config.gateway.host.trim().is_empty() {
        errors.push("gateway.host must not be empty".to_string());
    }
    if config.gateway.port == 0 {
        errors.push("gateway.port must be > 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_defaults() {
        let config = Config::default();
        validate_config(&config).unwrap();
    }

    #[test]
    fn test_validate_aggregates_errors() {
        let mut config = Config::default();
        config.relay.max_tokens = 0;
        config.relay.request_timeout_secs = 0;
        config.gateway.port = 0;

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("relay.max_tokens"));
        assert!(err.contains("relay.request_timeout_secs"));
        assert!(err.contains("gateway.port"));
    }

    #[test]
    fn test_validate_rejects_zero_history_window() {
        let mut config = Config::default();
        config.relay.max_history_turns = Some(0);

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("relay.max_history_turns"));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = Config::default();
        config.relay.provider = Some("nope".to_string());

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("relay.provider"));
    }
}
