//! Global Configuration (~/.quarry/config.toml)
//!
//! Handles user-level configuration stored in `~/.quarry/config.toml`.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global user configuration from ~/.quarry/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Registry locations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistrySection>,

    /// Network settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net: Option<NetSection>,
}

/// Registry locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RegistrySection {
    /// Git URL of the registry index
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,

    /// Archive download template (`{name}` and `{version}` are substituted)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download: Option<String>,
}

/// Network settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct NetSection {
    /// Upper bound for a single clone, pull or download, in seconds
    #[serde(rename = "timeout-secs", skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the global configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(registry) = &self.registry {
            if let Some(index) = &registry.index {
                validate_url("registry.index", index)?;
            }
            if let Some(download) = &registry.download {
                validate_url("registry.download", download)?;
            }
        }

        if let Some(net) = &self.net {
            if net.timeout_secs == Some(0) {
                return Err(ConfigError::InvalidValue {
                    field: "net.timeout-secs".to_string(),
                    reason: "timeout must be at least one second".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Get the global config file path (~/.quarry/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".quarry").join("config.toml"))
    }

    pub fn index_url(&self) -> Option<&str> {
        self.registry.as_ref().and_then(|r| r.index.as_deref())
    }

    pub fn download_template(&self) -> Option<&str> {
        self.registry.as_ref().and_then(|r| r.download.as_deref())
    }

    pub fn timeout_secs(&self) -> Option<u64> {
        self.net.as_ref().and_then(|n| n.timeout_secs)
    }
}

/// Registry locations must be absolute URLs (`scheme://...`)
fn validate_url(field: &str, value: &str) -> ConfigResult<()> {
    let valid = value
        .split_once("://")
        .map(|(scheme, rest)| {
            !scheme.is_empty()
                && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+')
                && !rest.is_empty()
        })
        .unwrap_or(false);

    if !valid {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("'{}' is not an absolute URL", value),
        });
    }
    Ok(())
}
