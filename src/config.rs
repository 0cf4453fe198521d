use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the document-store server
    pub server_url: String,
    /// API key sent as a bearer token
    pub api_key: String,
    /// Endpoint for grocery detail suggestions
    pub suggest_url: String,
    /// User id for this session (owner of created families)
    pub user_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".to_string(),
            api_key: String::new(),
            suggest_url: "http://localhost:8080/suggest".to_string(),
            user_id: "default".to_string(),
        }
    }
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::load_with_env(config_path, |key| std::env::var(key).ok())
    }

    /// Inner loader with the environment lookup injected, so tests can
    /// exercise overrides without touching process-global state.
    fn load_with_env(
        config_path: Option<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut config = Self::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::Read(path.clone(), e))?;
            config = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::Parse(path.clone(), e))?;
        }

        // Apply environment variable overrides
        if let Some(server_url) = env("FAMCART_SERVER_URL") {
            config.server_url = server_url;
        }
        if let Some(api_key) = env("FAMCART_API_KEY") {
            config.api_key = api_key;
        }
        if let Some(suggest_url) = env("FAMCART_SUGGEST_URL") {
            config.suggest_url = suggest_url;
        }
        if let Some(user_id) = env("FAMCART_USER_ID") {
            config.user_id = user_id;
        }

        Ok(config)
    }

    /// Default config file path: ~/.config/famcart/config.yaml
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("famcart")
            .join("config.yaml")
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {1}", .0.display())]
    Read(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{}': {1}", .0.display())]
    Parse(PathBuf, #[source] serde_yaml::Error),
}
