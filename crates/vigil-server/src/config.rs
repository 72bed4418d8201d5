use serde::{Deserialize, Serialize};
use vigil_alert::SeverityTiers;
use vigil_common::types::AlertDefinition;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub severity: SeverityTiers,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Email is only registered when this section is present.
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_engine_enabled")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: default_engine_enabled(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Metric points older than this are purged by the hourly cleanup task.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
            retention_days: default_retention_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_webhook_timeout_secs(),
        }
    }
}

// ---- Seed file types (used by the `seed-alerts` CLI subcommand) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsSeedFile {
    #[serde(default)]
    pub alerts: Vec<AlertDefinition>,
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedUser {
    pub user_id: String,
    pub email: String,
}

impl AlertsSeedFile {
    /// Parses a seed document. Condition fields are not validated here: an
    /// incomplete condition is stored as-is and skipped at evaluation time.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

fn default_http_port() -> u16 {
    8080
}

fn default_engine_enabled() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_retention_days() -> u32 {
    7
}

fn default_smtp_port() -> u16 {
    587
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            engine: EngineConfig::default(),
            severity: SeverityTiers::default(),
            storage: StorageConfig::default(),
            smtp: None,
            webhook: WebhookConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path, e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.engine.poll_interval_secs == 0 {
            anyhow::bail!("engine.poll_interval_secs must be greater than zero");
        }
        if self.webhook.timeout_secs == 0 {
            anyhow::bail!("webhook.timeout_secs must be greater than zero");
        }
        self.severity
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid [severity] section: {e}"))?;
        Ok(())
    }
}

