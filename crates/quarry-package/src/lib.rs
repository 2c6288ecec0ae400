//! Quarry Package Management
//!
//! Resolves workspace dependency constraints against a git-mirrored
//! registry index, fetches and verifies package archives, and persists
//! a reproducible lockfile (quarry.lock).
//!
//! Data flow:
//! workspace manifests -> [`Resolver`] (queries [`IndexReader`], after
//! [`SourceProvider::update`]) -> [`DependencyGraph`] -> [`Lockfile`] ->
//! later runs validate the lockfile and hand its packages to
//! [`PackageFetcher`].

pub mod archive;
pub mod dependency;
pub mod fetcher;
pub mod graph;
pub mod index;
pub mod lockfile;
pub mod manager;
pub mod resolver;
pub mod source;
pub mod validator;
pub mod workspace;

pub use dependency::{Dependency, Registration, Snapshot, SourceId, Workspace};
pub use fetcher::{HttpTransport, PackageFetcher, Transport};
pub use graph::DependencyGraph;
pub use index::{IndexReader, IndexRecord, PackageIndex};
pub use lockfile::{Lockfile, LOCKFILE_NAME};
pub use manager::PackageManager;
pub use resolver::{Conflict, ConflictingConstraint, Resolver};
pub use source::{GitMirror, Mirror, SourceProvider};
pub use workspace::load_workspace;

use std::path::PathBuf;

/// Package management errors
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("Malformed lockfile: missing [root] table")]
    MissingRoot,

    #[error("Malformed lockfile: {0}")]
    MalformedLockfile(String),

    #[error("Package '{0}' not found in lockfile")]
    NotInLockfile(String),

    #[error("No package found for dependency '{name} {req}'")]
    NoPackageFound { name: String, req: String },

    #[error("Ambiguous dependency '{name} {req}': matches {candidates}")]
    AmbiguousDependency {
        name: String,
        req: String,
        candidates: String,
    },

    #[error("{0}")]
    VersionConflict(String),

    #[error("Dependency resolution did not settle after {0} rounds")]
    ResolutionDidNotConverge(usize),

    #[error("Checksum verification failed for {name} {version}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        name: String,
        version: String,
        expected: String,
        actual: String,
    },

    #[error("No checksum recorded for {name} {version}")]
    MissingChecksum { name: String, version: String },

    #[error("Cannot fetch {name}: unsupported source kind '{kind}'")]
    UnsupportedSource { name: String, kind: String },

    #[error("Invalid source '{raw}': {reason}")]
    InvalidSource { raw: String, reason: String },

    #[error("Invalid package name '{name}': {reason}")]
    InvalidPackageName { name: String, reason: String },

    #[error("Duplicate package in graph: {0}")]
    DuplicatePackage(String),

    #[error("Invalid index record in {} line {line}: {error}", .path.display())]
    IndexParse {
        path: PathBuf,
        line: usize,
        error: serde_json::Error,
    },

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Semver error: {0}")]
    SemverError(#[from] semver::Error),

    #[error("Failed to parse lockfile: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize lockfile: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error(transparent)]
    Config(#[from] quarry_config::ConfigError),
}

pub type Result<T> = std::result::Result<T, PackageError>;
