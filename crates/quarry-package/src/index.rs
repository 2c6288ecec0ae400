//! Registry index reader
//!
//! The index is a git-mirrored directory tree with one file per package
//! name. Each file holds newline-delimited JSON, one record per published
//! version:
//!
//! ```json
//! {"name":"left-pad","vers":"1.0.0","deps":[],"cksum":"abc123","features":{},"yanked":false}
//! ```

use crate::dependency::{Dependency, Registration, SourceId};
use crate::validator::Validator;
use crate::{PackageError, Result};
use quarry_config::RegistryConfig;
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// One published version of a package
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexRecord {
    pub name: String,
    pub vers: Version,
    #[serde(default)]
    pub deps: Vec<IndexDependency>,
    pub cksum: String,
    #[serde(default)]
    pub features: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub yanked: bool,
}

/// Dependency entry inside an index record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexDependency {
    pub name: String,
    pub req: VersionReq,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default = "default_true")]
    pub default_features: bool,
}

fn default_true() -> bool {
    true
}

impl IndexRecord {
    /// Convert to a candidate registration served from `index_url`
    pub fn into_registration(self, index_url: &str) -> Registration {
        let mut source = SourceId::registry(index_url);
        if !self.cksum.is_empty() {
            source = source.with_details(self.cksum);
        }

        let dependencies = self
            .deps
            .into_iter()
            .map(|d| Dependency {
                name: d.name,
                req: d.req,
                source: SourceId::registry(index_url),
                optional: d.optional,
                default_features: d.default_features,
                features: d.features,
            })
            .collect();

        Registration::new(self.name, self.vers, source, dependencies)
    }
}

/// Relative location of a package's index file.
///
/// `a` → `1/a`, `ab` → `2/ab`, `abc` → `3/a/abc`, `abcde` → `ab/cd/abcde`
pub fn shard_path(name: &str) -> PathBuf {
    let chars: Vec<char> = name.chars().collect();
    match chars.len() {
        0 => PathBuf::new(),
        1 => Path::new("1").join(name),
        2 => Path::new("2").join(name),
        3 => Path::new("3").join(chars[0].to_string()).join(name),
        _ => {
            let first: String = chars[..2].iter().collect();
            let second: String = chars[2..4].iter().collect();
            Path::new(&first).join(second).join(name)
        }
    }
}

/// Source of candidate registrations, queried by package name
pub trait PackageIndex: Sync {
    /// Every available (non-yanked) version of `name`
    fn candidates(&self, name: &str) -> Result<Vec<Registration>>;
}

/// Reads the locally mirrored registry index
#[derive(Debug, Clone)]
pub struct IndexReader {
    index_dir: PathBuf,
    index_url: String,
}

impl IndexReader {
    /// Reader over the mirror configured in `config`
    pub fn new(config: &RegistryConfig) -> Self {
        Self::with_dir(config.local_index_dir(), config.index_url())
    }

    pub fn with_dir(index_dir: impl Into<PathBuf>, index_url: impl Into<String>) -> Self {
        Self {
            index_dir: index_dir.into(),
            index_url: index_url.into(),
        }
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    /// Absolute path of the index file for `name`
    pub fn record_path(&self, name: &str) -> Result<PathBuf> {
        Validator::validate_package_name(name)?;
        Ok(self.index_dir.join(shard_path(name)))
    }

    /// All records for `name`, yanked ones included.
    ///
    /// A missing index file means the package is unknown and yields no
    /// records. Any malformed line fails the whole read.
    pub fn records(&self, name: &str) -> Result<Vec<IndexRecord>> {
        let path = self.record_path(name)?;

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(package = name, path = %path.display(), "no index entry");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: IndexRecord =
                serde_json::from_str(&line).map_err(|error| PackageError::IndexParse {
                    path: path.clone(),
                    line: i + 1,
                    error,
                })?;
            records.push(record);
        }

        tracing::debug!(package = name, records = records.len(), "read index file");
        Ok(records)
    }
}

impl PackageIndex for IndexReader {
    fn candidates(&self, name: &str) -> Result<Vec<Registration>> {
        Ok(self
            .records(name)?
            .into_iter()
            .filter(|r| !r.yanked)
            .map(|r| r.into_registration(&self.index_url))
            .collect())
    }
}
