//! Package Manifest (quarry.toml)
//!
//! Handles package metadata, dependencies and workspace membership.
//!
//! ```toml
//! [package]
//! name = "my-app"
//! version = "0.1.0"
//!
//! [dependencies]
//! left-pad = "1.0"
//! serde = { version = "^1.0", features = ["derive"], default-features = false }
//!
//! [workspace]
//! members = ["crates/core", "crates/cli"]
//! ```

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Manifest file name
pub const MANIFEST_NAME: &str = "quarry.toml";

/// Package manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Package metadata
    pub package: PackageConfig,

    /// Dependencies, ordered by name
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, DependencySpec>,

    /// Workspace membership (root manifests only)
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceConfig>,
}

/// Package metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageConfig {
    /// Package name
    pub name: String,

    /// Package version (semver)
    pub version: String,

    /// Package description
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Package authors
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,

    /// License identifier
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
}

/// Workspace configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Member directories, relative to the root manifest
    #[serde(default)]
    pub members: Vec<PathBuf>,
}

/// Dependency specification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DependencySpec {
    /// Simple version requirement (e.g., "1.0")
    Version(String),

    /// Detailed dependency spec
    Detailed(DetailedDependency),
}

/// Detailed dependency specification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DetailedDependency {
    /// Version requirement
    pub version: String,

    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,

    #[serde(default)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,

    #[serde(default = "default_true", rename = "default-features")]
    pub default_features: bool,
}

fn default_true() -> bool {
    true
}

impl DependencySpec {
    /// Version requirement text
    pub fn version_req(&self) -> &str {
        match self {
            DependencySpec::Version(v) => v,
            DependencySpec::Detailed(d) => &d.version,
        }
    }

    pub fn features(&self) -> &[String] {
        match self {
            DependencySpec::Version(_) => &[],
            DependencySpec::Detailed(d) => &d.features,
        }
    }

    pub fn is_optional(&self) -> bool {
        match self {
            DependencySpec::Version(_) => false,
            DependencySpec::Detailed(d) => d.optional,
        }
    }

    pub fn default_features(&self) -> bool {
        match self {
            DependencySpec::Version(_) => true,
            DependencySpec::Detailed(d) => d.default_features,
        }
    }
}

impl Manifest {
    /// Load manifest from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let manifest: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        manifest.validate()?;
        Ok(manifest)
    }

    /// Load `quarry.toml` from a package directory
    pub fn load_from_dir(dir: &Path) -> ConfigResult<Self> {
        Self::load_from_file(&dir.join(MANIFEST_NAME))
    }

    /// Validate the manifest
    pub fn validate(&self) -> ConfigResult<()> {
        if self.package.name.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "package.name".to_string(),
                reason: "name cannot be empty".to_string(),
            });
        }

        if semver::Version::parse(&self.package.version).is_err() {
            return Err(ConfigError::InvalidVersion(self.package.version.clone()));
        }

        for (name, spec) in &self.dependencies {
            validate_dependency(name, spec)?;
        }

        Ok(())
    }

    /// Get package name
    pub fn name(&self) -> &str {
        &self.package.name
    }

    /// Get package version
    pub fn version(&self) -> &str {
        &self.package.version
    }

    /// Workspace member directories (empty for non-workspace manifests)
    pub fn members(&self) -> &[PathBuf] {
        self.workspace
            .as_ref()
            .map(|w| w.members.as_slice())
            .unwrap_or(&[])
    }
}

/// Validate a dependency specification
fn validate_dependency(name: &str, spec: &DependencySpec) -> ConfigResult<()> {
    if name.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "dependency name".to_string(),
            reason: "name cannot be empty".to_string(),
        });
    }

    let req = spec.version_req();
    if req.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            field: format!("dependency '{}'", name),
            reason: "version cannot be empty".to_string(),
        });
    }

    if let Err(e) = semver::VersionReq::parse(req) {
        return Err(ConfigError::InvalidValue {
            field: format!("dependency '{}'", name),
            reason: format!("invalid version requirement '{}': {}", req, e),
        });
    }

    Ok(())
}
