//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::global::GlobalConfig;
use crate::registry::{RegistryConfig, DEFAULT_INDEX_URL, DEFAULT_TIMEOUT};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Built-in defaults - lowest priority
/// 2. Global config (~/.quarry/config.toml) - overrides defaults
/// 3. Environment variables (QUARRY_*) - highest priority
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Create a loader that reads the global config from a specific path
    pub fn with_global_config_path(path: PathBuf) -> Self {
        Self {
            global_config_path: Some(path),
        }
    }

    /// Load the merged registry configuration
    pub fn load(&mut self) -> ConfigResult<RegistryConfig> {
        let global = self.load_global_config()?;
        self.resolve(&global)
    }

    /// Load global configuration from ~/.quarry/config.toml
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => {
                let path = GlobalConfig::global_config_path()?;
                self.global_config_path = Some(path.clone());
                path
            }
        };

        // Global config is optional - if it doesn't exist, return default
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no global config, using defaults");
            return Ok(GlobalConfig::default());
        }

        GlobalConfig::load_from_file(&path)
    }

    /// Merge defaults, global config and environment overrides
    ///
    /// Environment variables:
    /// - QUARRY_HOME: home directory (default ~/.quarry)
    /// - QUARRY_REGISTRY_INDEX: registry index URL
    /// - QUARRY_REGISTRY_DOWNLOAD: archive download template
    /// - QUARRY_NET_TIMEOUT: network timeout in seconds
    fn resolve(&self, global: &GlobalConfig) -> ConfigResult<RegistryConfig> {
        let home = match env::var_os("QUARRY_HOME") {
            Some(home) => PathBuf::from(home),
            None => Self::default_home()?,
        };

        let index_url = env::var("QUARRY_REGISTRY_INDEX")
            .ok()
            .or_else(|| global.index_url().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_INDEX_URL.to_string());

        let mut config = RegistryConfig::new(home, index_url);

        if let Some(template) = env::var("QUARRY_REGISTRY_DOWNLOAD")
            .ok()
            .or_else(|| global.download_template().map(str::to_string))
        {
            config = config.with_download_template(template);
        }

        let timeout = match env::var("QUARRY_NET_TIMEOUT") {
            Ok(raw) => parse_timeout(&raw)?,
            Err(_) => global
                .timeout_secs()
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
        };

        Ok(config.with_timeout(timeout))
    }

    /// Get the default home directory (~/.quarry)
    pub fn default_home() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".quarry"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_timeout(raw: &str) -> ConfigResult<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidValue {
            field: "QUARRY_NET_TIMEOUT".to_string(),
            reason: format!("expected a positive number of seconds, got '{}'", raw),
        }),
    }
}
