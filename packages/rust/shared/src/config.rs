//! Application configuration for feedwire.
//!
//! User config lives at `~/.feedwire/feedwire.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FeedwireError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "feedwire.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".feedwire";

// ---------------------------------------------------------------------------
// Config structs (matching feedwire.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP client settings shared by both stages.
    #[serde(default)]
    pub http: HttpSection,

    /// Source auditor settings.
    #[serde(default)]
    pub audit: AuditSection,

    /// Article store settings.
    #[serde(default)]
    pub storage: StorageSection,

    /// Default table locations.
    #[serde(default)]
    pub paths: PathsSection,
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSection {
    /// User-Agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Bodies larger than this are rejected.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into()
}
fn default_timeout_secs() -> u64 {
    5
}
fn default_max_response_bytes() -> u64 {
    10 * 1024 * 1024
}

/// `[audit]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSection {
    /// Width of the audit worker pool.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Suffixes appended to a source's base URL when probing for a feed.
    #[serde(default = "default_feed_paths")]
    pub feed_paths: Vec<String>,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            feed_paths: default_feed_paths(),
        }
    }
}

fn default_concurrency() -> usize {
    10
}
fn default_feed_paths() -> Vec<String> {
    ["/feed", "/rss", "/rss.xml", "/feed.xml", "/index.xml"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    /// Path of the article database.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "news_data.db".into()
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsSection {
    /// Input source list.
    #[serde(default = "default_sources_csv")]
    pub sources_csv: String,

    /// Audit output table (and ingestion input).
    #[serde(default = "default_audit_csv")]
    pub audit_csv: String,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            sources_csv: default_sources_csv(),
            audit_csv: default_audit_csv(),
        }
    }
}

fn default_sources_csv() -> String {
    "sources.csv".into()
}
fn default_audit_csv() -> String {
    "audit_results.csv".into()
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime HTTP configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub max_response_bytes: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for HttpConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.http.user_agent.clone(),
            timeout: Duration::from_secs(config.http.timeout_secs),
            max_response_bytes: config.http.max_response_bytes,
        }
    }
}

/// Runtime audit configuration.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Maximum number of sources audited at once.
    pub concurrency: usize,
    /// Feed suffixes, probed in order after the base URL.
    pub feed_paths: Vec<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for AuditConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.audit.concurrency.max(1),
            feed_paths: config.audit.feed_paths.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.feedwire/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| FeedwireError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.feedwire/feedwire.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| FeedwireError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        FeedwireError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate(&config)?;
    Ok(config)
}

/// Reject values that would make a run meaningless.
fn validate(config: &AppConfig) -> Result<()> {
    if config.http.timeout_secs == 0 {
        return Err(FeedwireError::config("http.timeout_secs must be at least 1"));
    }
    if config.audit.concurrency == 0 {
        return Err(FeedwireError::config("audit.concurrency must be at least 1"));
    }
    if let Some(bad) = config.audit.feed_paths.iter().find(|p| !p.starts_with('/')) {
        return Err(FeedwireError::config(format!(
            "audit.feed_paths entry '{bad}' must start with '/'"
        )));
    }
    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| FeedwireError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| FeedwireError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| FeedwireError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
