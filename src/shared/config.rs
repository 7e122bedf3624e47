//! Application configuration. Server address, storage path, AI provider, admins.

use config::ConfigBuilder;
use config::builder::DefaultState;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_AI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_AI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 30;
/// Change events buffered per realtime subscriber before it lags.
pub const DEFAULT_FEED_CAPACITY: usize = 256;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Bind address. Read from LEARN_ASSIST_HOST.
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    /// Directory holding the SQLite database. Read from LEARN_ASSIST_DATA_DIR.
    #[serde(default)]
    pub data_dir: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // AI provider
    // ─────────────────────────────────────────────────────────────────────────
    /// Chat-completion API key. Read from LEARN_ASSIST_AI_API_KEY, else OPENAI_API_KEY.
    #[serde(default)]
    pub ai_api_key: Option<String>,

    #[serde(default)]
    pub ai_api_url: Option<String>,

    #[serde(default)]
    pub ai_model: Option<String>,

    /// Upper bound on one provider call, in seconds.
    #[serde(default)]
    pub ai_timeout_secs: Option<u64>,

    // ─────────────────────────────────────────────────────────────────────────
    // Platform
    // ─────────────────────────────────────────────────────────────────────────
    /// Comma-separated user ids granted the admin role at startup.
    #[serde(default)]
    pub admin_ids: Option<String>,

    #[serde(default)]
    pub feed_capacity: Option<usize>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        c = c.add_source(config::Environment::with_prefix("LEARN_ASSIST"));
        if let Ok(path) = std::env::var("LEARN_ASSIST_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        Self::from_builder(c)
    }

    fn from_builder(c: ConfigBuilder<DefaultState>) -> Result<Self, config::ConfigError> {
        c.build()?.try_deserialize()
    }

    pub fn host_or_default(&self) -> String {
        self.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string())
    }

    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host_or_default(), self.port_or_default())
    }

    pub fn data_dir_or_default(&self) -> String {
        self.data_dir.clone().unwrap_or_else(|| "./data".to_string())
    }

    /// Returns the AI API key if configured. Falls back to OPENAI_API_KEY; blank counts as unset.
    pub fn ai_api_key(&self) -> Option<String> {
        self.ai_api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn is_ai_configured(&self) -> bool {
        self.ai_api_key().is_some()
    }

    pub fn ai_api_url_or_default(&self) -> String {
        self.ai_api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_AI_API_URL.to_string())
    }

    pub fn ai_model_or_default(&self) -> String {
        self.ai_model
            .clone()
            .unwrap_or_else(|| DEFAULT_AI_MODEL.to_string())
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(
            self.ai_timeout_secs
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_AI_TIMEOUT_SECS),
        )
    }

    pub fn admin_ids_list(&self) -> Vec<String> {
        self.admin_ids
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn feed_capacity_or_default(&self) -> usize {
        self.feed_capacity
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_FEED_CAPACITY)
    }
}
