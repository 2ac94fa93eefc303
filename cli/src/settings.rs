//! Layered configuration.
//!
//! Sources are applied in order, later ones winning:
//! 1. Built-in defaults
//! 2. TOML config file (`--config`)
//! 3. Environment variables (`GEMINI_API_KEY`, `REDIS_URL`, `SEMSEARCH_STORE`)
//! 4. CLI flags
//!
//! Clap resolves 3 and 4 together, so [`Settings::apply_cli`] only has to
//! layer its values over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use semsearch_retrieval::ServiceConfig;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// Collection file used when none is configured.
pub const DEFAULT_STORE_PATH: &str = "semsearch.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Gemini API key.
    pub api_key: Option<String>,

    /// Redis URL for the shared embedding cache.
    pub redis_url: Option<String>,

    /// JSON file holding the collection.
    pub store_path: PathBuf,

    /// Log filter directive.
    pub log_level: Option<String>,

    /// End-to-end deadline for one command.
    pub request_timeout_secs: u64,

    /// Search service settings.
    pub service: ServiceConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            redis_url: None,
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            log_level: None,
            request_timeout_secs: 5,
            service: ServiceConfig::default(),
        }
    }
}

impl Settings {
    /// Load defaults, then the config file if one is given.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let Some(path) = config_path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Layer environment and flag values over the loaded settings.
    pub fn apply_cli(mut self, cli: &Cli) -> Self {
        if let Some(api_key) = &cli.api_key {
            self.api_key = Some(api_key.clone());
        }
        if let Some(redis) = &cli.redis {
            self.redis_url = Some(redis.clone());
        }
        if let Some(store) = &cli.store {
            self.store_path = store.clone();
        }
        if let Some(level) = &cli.log_level {
            self.log_level = Some(level.clone());
        }
        if let Some(secs) = cli.request_timeout_secs {
            self.request_timeout_secs = secs;
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
