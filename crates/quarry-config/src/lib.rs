//! Quarry Configuration System
//!
//! Provides the configuration consumed by the quarry package manager:
//! - Global user configuration (~/.quarry/config.toml)
//! - Environment overrides (QUARRY_*)
//! - Registry paths derived from the merged configuration
//! - Package manifests (quarry.toml)
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config (~/.quarry/config.toml)
//! 3. Environment variables (QUARRY_*)
//!
//! # Example
//!
//! ```no_run
//! use quarry_config::ConfigLoader;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load().unwrap();
//! println!("index mirror: {}", config.local_index_dir().display());
//! ```

pub mod global;
pub mod loader;
pub mod manifest;
pub mod registry;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid semver version: {0}")]
    InvalidVersion(String),

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use global::GlobalConfig;
pub use loader::ConfigLoader;
pub use manifest::{DependencySpec, Manifest};
pub use registry::RegistryConfig;
