pub mod validation;

use serde::{Deserialize, Serialize};
use std::fmt;

use self::validation::validate_config;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Key casing of the `/run_sse` request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BodyCasing {
    #[default]
    Camel,
    Snake,
}

impl fmt::Display for BodyCasing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyCasing::Camel => write!(f, "camel"),
            BodyCasing::Snake => write!(f, "snake"),
        }
    }
}

/// Remote agent service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub base_url: String,
    pub app_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub body_casing: BodyCasing,
    #[serde(default = "default_true")]
    pub streaming: bool,
    #[serde(default = "default_model_id")]
    pub model_id: String,
}

impl AgentConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, app_name: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            app_name: app_name.into(),
            api_key: None,
            user_id: None,
            body_casing: BodyCasing::default(),
            streaming: true,
            model_id: default_model_id(),
        }
    }

    /// Base URL for session management, with any `/run...` suffix and
    /// trailing slash removed.
    #[must_use]
    pub fn session_base_url(&self) -> &str {
        normalize_base_url(&self.base_url)
    }

    /// Settings echoed back to callers in `raw_call`. The API key is redacted.
    #[must_use]
    pub fn redacted_settings(&self) -> serde_json::Value {
        serde_json::json!({
            "baseUrl": self.session_base_url(),
            "appName": self.app_name,
            "apiKey": self.api_key.as_ref().map(|_| "***"),
            "userId": self.user_id,
            "bodyCasing": self.body_casing.to_string(),
            "streaming": self.streaming,
        })
    }
}

/// Strip a trailing `/run`, `/run_sse` (or any `/run...` last segment) and
/// trailing slashes from a configured URL.
#[must_use]
pub fn normalize_base_url(url: &str) -> &str {
    let trimmed = url.trim().trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) if trimmed[idx + 1..].starts_with("run") && !trimmed[..idx].ends_with('/') => {
            trimmed[..idx].trim_end_matches('/')
        }
        _ => trimmed,
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_timeout_secs: Option<u64>,
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,
    #[serde(default = "default_pool_idle_timeout_secs")]
    pub pool_idle_timeout_secs: u64,
    #[serde(default)]
    pub use_env_proxy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_connect_timeout_secs() -> u64 {
    5
}
fn default_pool_max_idle_per_host() -> usize {
    8
}
fn default_pool_idle_timeout_secs() -> u64 {
    15
}
fn default_model_id() -> String {
    "adk-agent".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            stream_timeout_secs: None,
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
            pool_idle_timeout_secs: default_pool_idle_timeout_secs(),
            use_env_proxy: false,
            proxy: None,
        }
    }
}

/// Feature flags and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit one JSON object per log line instead of human-readable text.
    #[serde(default)]
    pub log_json: bool,
}

fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub agent: AgentConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

/// Overlay `ADK_*` environment values onto a loaded config.
///
/// `lookup` is injected so tests do not have to mutate process env.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
    if let Some(base_url) = non_empty("ADK_BASE_URL") {
        config.agent.base_url = base_url;
    }
    if let Some(app_name) = non_empty("ADK_APP_NAME") {
        config.agent.app_name = app_name;
    }
    if let Some(api_key) = non_empty("ADK_API_KEY") {
        config.agent.api_key = Some(api_key);
    }
    if let Some(user_id) = non_empty("ADK_USER_ID") {
        config.agent.user_id = Some(user_id);
    }
}

/// Load configuration from a YAML file, apply environment overrides and
/// validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// [`load_config`] with an explicit override source.
///
/// # Errors
///
/// Same as [`load_config`].
pub fn load_config_with<F>(path: &str, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let contents = std::fs::read_to_string(path)?;
    let mut config: AppConfig = serde_yaml::from_str(&contents)?;
    apply_env_overrides(&mut config, lookup);
    validate_config(&config)?;
    Ok(config)
}
