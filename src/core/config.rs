use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::core::forms::Catalog;

pub const DEFAULT_CONFIG_FILE: &str = "qed.toml";

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub bulk: BulkConfig,

    #[serde(default)]
    pub catalog: Catalog,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub base_url: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Seconds for single lookups (task, variables, metadata).
    #[serde(default = "default_light_timeout")]
    pub light_timeout_secs: u64,

    /// Seconds for form models and submissions.
    #[serde(default = "default_standard_timeout")]
    pub standard_timeout_secs: u64,

    /// Seconds for content transfer, deletes and paged queries.
    #[serde(default = "default_heavy_timeout")]
    pub heavy_timeout_secs: u64,

    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HistoryConfig {
    #[serde(default = "default_history_path")]
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BulkConfig {
    #[serde(default = "default_process_key")]
    pub process_key: String,

    #[serde(default)]
    pub form_definition_id: Option<String>,

    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    #[serde(default = "default_delete_delay_ms")]
    pub delete_delay_ms: u64,
}

fn default_light_timeout() -> u64 {
    10
}
fn default_standard_timeout() -> u64 {
    30
}
fn default_heavy_timeout() -> u64 {
    60
}
fn default_page_size() -> usize {
    200
}
fn default_history_path() -> PathBuf {
    PathBuf::from("history.db")
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("logs/qed.log"))
}
fn default_process_key() -> String {
    "multilevelapproval".to_string()
}
fn default_max_rows() -> usize {
    200
}
fn default_max_parallel() -> usize {
    5
}
fn default_delete_delay_ms() -> u64 {
    300
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            light_timeout_secs: default_light_timeout(),
            standard_timeout_secs: default_standard_timeout(),
            heavy_timeout_secs: default_heavy_timeout(),
            page_size: default_page_size(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_history_path(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            process_key: default_process_key(),
            form_definition_id: None,
            max_rows: default_max_rows(),
            max_parallel: default_max_parallel(),
            delete_delay_ms: default_delete_delay_ms(),
        }
    }
}

impl EngineConfig {
    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty()
    }

    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn light_timeout(&self) -> Duration {
        Duration::from_secs(self.light_timeout_secs)
    }

    pub fn standard_timeout(&self) -> Duration {
        Duration::from_secs(self.standard_timeout_secs)
    }

    pub fn heavy_timeout(&self) -> Duration {
        Duration::from_secs(self.heavy_timeout_secs)
    }
}

impl AppConfig {
    /// Reads `path` (or `qed.toml` when present) and applies environment
    /// overrides. An explicit path that does not exist is an error.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                if !p.exists() {
                    bail!("Config file not found: {}", p.display());
                }
                Self::from_file(p).await?
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path).await?
                } else {
                    info!("No {} found, using defaults and environment.", DEFAULT_CONFIG_FILE);
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());

        if !config.engine.is_configured() {
            warn!("BPM_BASE_URL is not set; engine calls will fail.");
        }
        info!(
            "Loaded config: engine={}, history={}, listen={}:{}",
            config.engine.base(),
            config.history.db_path.display(),
            config.server.host,
            config.server.port
        );
        Ok(config)
    }

    async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Environment values win over the file. Unparseable numbers are ignored.
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("BPM_BASE_URL") {
            self.engine.base_url = v;
        }
        if let Some(v) = get("BPM_USER") {
            self.engine.username = v;
        }
        if let Some(v) = get("BPM_PASS") {
            self.engine.password = v;
        }
        if let Some(v) = get("HISTORY_DB_PATH") {
            self.history.db_path = PathBuf::from(v);
        }
        if let Some(v) = get("QED_API_HOST") {
            self.server.host = v;
        }
        if let Some(port) = get("QED_API_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(v) = get("QED_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = get("QED_LOG_FILE") {
            self.logging.file = match v.as_str() {
                "-" | "none" => None,
                _ => Some(PathBuf::from(v)),
            };
        }
        if let Some(v) = get("BULK_FORM_DEFINITION_ID") {
            self.bulk.form_definition_id = Some(v);
        }
    }
}
