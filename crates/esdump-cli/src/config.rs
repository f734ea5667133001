//! Configuration loading from TOML files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_SERVER: &str = "https://search.fatcat.wiki";

/// File-level configuration for esdump; every value can be overridden by a flag.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub scroll: ScrollConfig,
    pub query: QueryConfig,
    pub ids: IdsConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    #[serde(deserialize_with = "deserialize_env_var")]
    pub url: Option<String>,
    pub index: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: Some(DEFAULT_SERVER.to_string()),
            index: "fatcat_release".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Scroll context TTL
    pub ttl: String,
    pub size: usize,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            ttl: "10m".to_string(),
            size: 1000,
            max_retries: 5,
            retry_delay_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub workers: usize,
    pub default_operator: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            workers: cpus.min(8),
            default_operator: "AND".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct IdsConfig {
    pub batch_size: usize,
}

impl Default for IdsConfig {
    fn default() -> Self {
        Self { batch_size: 100 }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub read_timeout: u64,
    pub connect_timeout: u64,
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            read_timeout: 60,
            connect_timeout: 30,
            max_retries: 3,
        }
    }
}

impl From<HttpConfig> for esdump_core::HttpConfig {
    fn from(c: HttpConfig) -> Self {
        Self {
            read_timeout: std::time::Duration::from_secs(c.read_timeout),
            connect_timeout: std::time::Duration::from_secs(c.connect_timeout),
            max_retries: c.max_retries,
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./esdump.toml (current directory)
    /// 2. ~/.config/esdump/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("esdump.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "esdump") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
