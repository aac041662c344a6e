use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::github::fetch::FetcherConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration loaded from .issue-harvester.toml.
/// All fields are optional — the tool works with zero config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// GitHub-specific settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Pipeline limits
    #[serde(default)]
    pub harvest: HarvestConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN, then GITHUB_PAT.
    pub token: Option<String>,
    /// User-Agent sent with every request
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Number of closed issues to collect
    pub target: usize,
    /// Simultaneous issue enrichments
    pub concurrency: usize,
    /// Simultaneous outstanding HTTP requests across all tasks
    pub max_connections: usize,
    /// Rate-limit retries per request before giving up
    pub max_retries: u32,
    /// Lower bound on a rate-limit wait, in seconds
    pub min_backoff_secs: u64,
    /// Upper bound on a rate-limit wait, in seconds
    pub max_backoff_secs: u64,
    /// Patch text kept per changed file
    pub max_patch_bytes: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            target: 150,
            concurrency: 20,
            max_connections: 30,
            max_retries: 3,
            min_backoff_secs: 2,
            max_backoff_secs: 3600,
            max_patch_bytes: 20_000,
        }
    }
}

impl Config {
    /// Load configuration from .issue-harvester.toml in the current directory.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(".issue-harvester.toml");
        let mut config = if path.exists() {
            Self::load_from(path)?
        } else {
            Config::default()
        };

        if config.github.token.is_none() {
            config.github.token = std::env::var("GITHUB_TOKEN")
                .or_else(|_| std::env::var("GITHUB_PAT"))
                .ok()
                .filter(|token| !token.trim().is_empty());
        }

        Ok(config)
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Build the explicit fetcher configuration from the loaded values.
    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            token: self.github.token.clone(),
            user_agent: self
                .github
                .user_agent
                .clone()
                .unwrap_or_else(|| "issue-harvester".to_string()),
            max_connections: self.harvest.max_connections.max(1),
            max_retries: self.harvest.max_retries,
            min_backoff: Duration::from_secs(self.harvest.min_backoff_secs),
            max_backoff: Duration::from_secs(self.harvest.max_backoff_secs),
        }
    }
}
