use crate::core::freshness::UpdatePolicy;
use anyhow::{Context, Result, anyhow, bail};
use chrono::{FixedOffset, NaiveTime};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_FEED_URL: &str = "https://www.cbr.ru/scripts/XML_daily.asp";

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStrategy {
    /// Refresh once the stored data is older than `interval_secs`.
    Interval,
    /// Refresh once per day after the source publishes.
    Daily,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct UpdateConfig {
    pub strategy: UpdateStrategy,
    pub interval_secs: u64,
    pub publish_time: String,
    pub utc_offset: String,
    pub retry_interval_secs: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        UpdateConfig {
            strategy: UpdateStrategy::Daily,
            interval_secs: 24 * 60 * 60,
            publish_time: "15:30:00".to_string(),
            utc_offset: "+03:00".to_string(),
            retry_interval_secs: 60,
        }
    }
}

impl UpdateConfig {
    pub fn policy(&self) -> Result<UpdatePolicy> {
        match self.strategy {
            UpdateStrategy::Interval => {
                if self.interval_secs == 0 {
                    bail!("update.interval_secs must be greater than zero");
                }
                let secs = i64::try_from(self.interval_secs)
                    .context("update.interval_secs is too large")?;
                Ok(UpdatePolicy::Interval(chrono::Duration::seconds(secs)))
            }
            UpdateStrategy::Daily => {
                let publish_time = NaiveTime::parse_from_str(&self.publish_time, "%H:%M:%S")
                    .or_else(|_| NaiveTime::parse_from_str(&self.publish_time, "%H:%M"))
                    .with_context(|| {
                        format!("Invalid update.publish_time: '{}'", self.publish_time)
                    })?;
                let offset: FixedOffset = self
                    .utc_offset
                    .parse()
                    .map_err(|e| anyhow!("Invalid update.utc_offset '{}': {e}", self.utc_offset))?;
                Ok(UpdatePolicy::Daily {
                    publish_time,
                    offset,
                })
            }
        }
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    File,
    Web,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub url: String,
    pub file_path: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            kind: SourceKind::Web,
            url: DEFAULT_FEED_URL.to_string(),
            file_path: Some("currency_data.xml".to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_ip: String,
    pub listen_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_ip: "127.0.0.1".to_string(),
            listen_port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.listen_ip, self.listen_port)
            .parse()
            .with_context(|| {
                format!(
                    "Invalid server address: {}:{}",
                    self.listen_ip, self.listen_port
                )
            })
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Disk,
    /// Keeps everything in memory; nothing survives a restart.
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub kind: StorageKind,
    pub data_path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub source_secs: u64,
    pub storage_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        TimeoutsConfig {
            source_secs: 30,
            storage_secs: 10,
        }
    }
}

impl TimeoutsConfig {
    pub fn source(&self) -> Duration {
        Duration::from_secs(self.source_secs)
    }

    pub fn storage(&self) -> Duration {
        Duration::from_secs(self.storage_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub update: UpdateConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "ratekeeper", "ratekeeper")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.storage.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("org", "ratekeeper", "ratekeeper")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.update.policy()?;
        if self.update.retry_interval_secs == 0 {
            bail!("update.retry_interval_secs must be greater than zero");
        }
        if self.timeouts.source_secs == 0 || self.timeouts.storage_secs == 0 {
            bail!("timeouts must be greater than zero");
        }
        self.server.socket_addr()?;
        if self.source.kind == SourceKind::File && self.source.file_path.is_none() {
            bail!("source.file_path is required when source.kind is 'file'");
        }
        Ok(())
    }
}
