//! Registry Configuration
//!
//! The resolved configuration value handed to every registry operation.
//! All on-disk locations (index mirror, archive cache, extracted sources)
//! are derived here so that no other component computes paths of its own.
//!
//! ```text
//! {home}/registry/index/{index_name}/                      local index mirror
//! {home}/registry/cache/{index_name}/{name}-{version}.tar.gz  trusted archives
//! {home}/registry/src/{index_name}/{name}-{version}/        extracted sources
//! ```

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default registry index repository
pub const DEFAULT_INDEX_URL: &str = "https://github.com/quarry-pm/registry-index";

/// Default archive download template
pub const DEFAULT_DOWNLOAD_TEMPLATE: &str = "https://packages.quarry.dev/api/v1/packages";

/// Default bound for a single network operation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Merged registry configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    home: PathBuf,
    index_url: String,
    download_template: String,
    timeout: Duration,
}

impl RegistryConfig {
    /// Create a configuration rooted at `home` with default download
    /// template and timeout
    pub fn new(home: impl Into<PathBuf>, index_url: impl Into<String>) -> Self {
        Self {
            home: home.into(),
            index_url: index_url.into(),
            download_template: DEFAULT_DOWNLOAD_TEMPLATE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_download_template(mut self, template: impl Into<String>) -> Self {
        self.download_template = template.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Quarry home directory
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Remote URL of the registry index repository
    pub fn index_url(&self) -> &str {
        &self.index_url
    }

    pub fn download_template(&self) -> &str {
        &self.download_template
    }

    /// Upper bound for any single clone, pull or download
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Directory name shared by every per-registry location.
    ///
    /// Derived from the index URL so that two registries never share a
    /// mirror or an archive cache.
    pub fn index_name(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.index_url.as_bytes());
        let hex = format!("{:x}", hasher.finalize());
        format!("index-{}", &hex[..16])
    }

    /// Parent directory the index mirror is cloned into
    pub fn index_parent_dir(&self) -> PathBuf {
        self.home.join("registry").join("index")
    }

    /// Local mirror of the registry index
    pub fn local_index_dir(&self) -> PathBuf {
        self.index_parent_dir().join(self.index_name())
    }

    /// Directory holding trusted (verified) archives
    pub fn archive_dir(&self) -> PathBuf {
        self.home
            .join("registry")
            .join("cache")
            .join(self.index_name())
    }

    /// Trusted archive location for one package version
    pub fn archive_path(&self, name: &str, version: &str) -> PathBuf {
        self.archive_dir()
            .join(format!("{}-{}.tar.gz", name, version))
    }

    /// Extraction directory for one package version
    pub fn extract_dir(&self, name: &str, version: &str) -> PathBuf {
        self.home
            .join("registry")
            .join("src")
            .join(self.index_name())
            .join(format!("{}-{}", name, version))
    }

    /// Remote archive URL for one package version.
    ///
    /// `{name}` and `{version}` markers in the template are substituted;
    /// a template with neither marker gets `/{name}/{version}/download`
    /// appended.
    pub fn archive_url(&self, name: &str, version: &str) -> String {
        let template = &self.download_template;
        if template.contains("{name}") || template.contains("{version}") {
            template
                .replace("{name}", name)
                .replace("{version}", version)
        } else {
            format!(
                "{}/{}/{}/download",
                template.trim_end_matches('/'),
                name,
                version
            )
        }
    }
}
