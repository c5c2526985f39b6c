use super::{normalize_base_url, AppConfig, ConfigError};

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_agent_config(config)?;
    validate_http_config(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_agent_config(config: &AppConfig) -> Result<(), ConfigError> {
    let agent = &config.agent;
    let base_url = normalize_base_url(&agent.base_url);
    if base_url.is_empty() {
        return Err(validation_err("agent.base_url cannot be empty"));
    }
    let parsed = url::Url::parse(base_url)
        .map_err(|e| validation_err(format!("agent.base_url is not a valid URL: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(validation_err(format!(
            "agent.base_url must use http or https, got '{}'",
            parsed.scheme()
        )));
    }

    let app_name = agent.app_name.trim();
    if app_name.is_empty() {
        return Err(validation_err("agent.app_name cannot be empty"));
    }
    if app_name.contains('/') {
        return Err(validation_err("agent.app_name cannot contain '/'"));
    }
    if let Some(user_id) = agent.user_id.as_deref() {
        if user_id.trim().is_empty() {
            return Err(validation_err("agent.user_id cannot be blank when set"));
        }
    }
    if agent.model_id.trim().is_empty() {
        return Err(validation_err("agent.model_id cannot be empty"));
    }
    Ok(())
}

fn validate_http_config(config: &AppConfig) -> Result<(), ConfigError> {
    let http = &config.http;
    if http.timeout_secs == 0 {
        return Err(validation_err("http.timeout_secs must be greater than 0"));
    }
    if http.connect_timeout_secs == 0 {
        return Err(validation_err(
            "http.connect_timeout_secs must be greater than 0",
        ));
    }
    if http.stream_timeout_secs == Some(0) {
        return Err(validation_err(
            "http.stream_timeout_secs must be greater than 0 when set",
        ));
    }
    if http.pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "http.pool_max_idle_per_host must be greater than 0",
        ));
    }
    if let Some(proxy) = http.proxy.as_deref() {
        url::Url::parse(proxy)
            .map_err(|e| validation_err(format!("http.proxy is not a valid URL: {e}")))?;
    }
    Ok(())
}

const VALID_LOG_LEVELS: &[&str] = &[
    "DEBUG", "INFO", "WARNING", "WARN", "ERROR", "CRITICAL", "DISABLED", "TRACE",
];

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let level = config.features.log_level.to_uppercase();
    if !VALID_LOG_LEVELS.contains(&level.as_str()) {
        return Err(validation_err(format!(
            "features.log_level '{}' is not one of {}",
            config.features.log_level,
            VALID_LOG_LEVELS.join(", ")
        )));
    }
    Ok(())
}
