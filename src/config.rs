use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

/// Overrides `postgres_url` when set.
pub const ENV_POSTGRES_URL: &str = "META_BANK_POSTGRES_URL";
/// Overrides `token.symmetric_key` when set.
pub const ENV_TOKEN_KEY: &str = "META_BANK_TOKEN_KEY";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL. Without one the in-memory store is used.
    #[serde(default)]
    pub postgres_url: Option<String>,
    pub token: TokenConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub mail: MailConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenConfig {
    /// HS256 secret, at least 32 characters
    pub symmetric_key: String,
    pub access_token_duration_secs: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkerConfig {
    pub queue_size: usize,
    pub max_retry: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_size: 1024,
            max_retry: 3,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MailConfig {
    /// Public base URL used in verification links
    pub base_url: String,
    pub from: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            from: "Meta Bank <noreply@metabank.local>".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config yaml: {}", config_path))?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_POSTGRES_URL) {
            self.postgres_url = Some(url);
        }
        if let Ok(key) = std::env::var(ENV_TOKEN_KEY) {
            self.token.symmetric_key = key;
        }
    }
}
