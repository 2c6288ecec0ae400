//! Dependency data model: requirements, resolved package nodes, and the
//! manifest snapshots they are checked against.

use crate::{PackageError, Result};
use semver::{BuildMetadata, Comparator, Op, Version, VersionReq};
use std::fmt;
use std::str::FromStr;

/// Source kind for packages served by the registry index
pub const REGISTRY_KIND: &str = "registry";

/// Compact source descriptor: `kind+location` or `kind+location#details`.
///
/// For registry sources `details` is the archive's integrity digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceId {
    kind: String,
    location: String,
    details: Option<String>,
}

impl SourceId {
    /// Parse a source string
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| PackageError::InvalidSource {
            raw: raw.to_string(),
            reason: reason.to_string(),
        };

        let (kind, rest) = raw
            .split_once('+')
            .ok_or_else(|| invalid("expected 'type+location'"))?;

        if kind.is_empty() || !kind.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(invalid("source type must be alphanumeric"));
        }

        let (location, details) = match rest.split_once('#') {
            Some((_, "")) => return Err(invalid("empty details after '#'")),
            Some((location, details)) => (location, Some(details.to_string())),
            None => (rest, None),
        };

        if location.is_empty() {
            return Err(invalid("empty location"));
        }
        if raw.contains(char::is_whitespace) {
            return Err(invalid("source strings cannot contain whitespace"));
        }

        Ok(Self {
            kind: kind.to_string(),
            location: location.to_string(),
            details,
        })
    }

    /// Registry source without details
    pub fn registry(location: impl Into<String>) -> Self {
        Self {
            kind: REGISTRY_KIND.to_string(),
            location: location.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn is_registry(&self) -> bool {
        self.kind == REGISTRY_KIND
    }

    /// Integrity digest carried by a registry source
    pub fn checksum(&self) -> Option<&str> {
        if self.is_registry() {
            self.details()
        } else {
            None
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.kind, self.location)?;
        if let Some(details) = &self.details {
            write!(f, "#{}", details)?;
        }
        Ok(())
    }
}

impl FromStr for SourceId {
    type Err = PackageError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A requirement on another package, not yet bound to a concrete version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub req: VersionReq,
    pub source: SourceId,
    pub optional: bool,
    pub default_features: bool,
    pub features: Vec<String>,
}

impl Dependency {
    pub fn new(name: impl Into<String>, req: VersionReq, source: SourceId) -> Self {
        Self {
            name: name.into(),
            req,
            source,
            optional: false,
            default_features: true,
            features: Vec::new(),
        }
    }

    /// Requirement pinned to exactly `version`
    pub fn locked(name: impl Into<String>, version: &Version, source: SourceId) -> Self {
        Self::new(name, exact_req(version), source)
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.req.matches(version)
    }

    /// The concrete version this requirement pins, if it is an `=x.y.z` requirement
    pub fn pinned_version(&self) -> Option<Version> {
        match self.req.comparators.as_slice() {
            [Comparator {
                op: Op::Exact,
                major,
                minor: Some(minor),
                patch: Some(patch),
                pre,
            }] => Some(Version {
                major: *major,
                minor: *minor,
                patch: *patch,
                pre: pre.clone(),
                build: BuildMetadata::EMPTY,
            }),
            _ => None,
        }
    }
}

fn exact_req(version: &Version) -> VersionReq {
    VersionReq {
        comparators: vec![Comparator {
            op: Op::Exact,
            major: version.major,
            minor: Some(version.minor),
            patch: Some(version.patch),
            pre: version.pre.clone(),
        }],
    }
}

/// Graph key of a resolved package
pub fn registration_id(name: &str, version: &Version) -> String {
    format!("{}@{}", name, version)
}

/// A resolved package node. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    id: String,
    name: String,
    version: Version,
    source: SourceId,
    dependencies: Vec<Dependency>,
}

impl Registration {
    pub fn new(
        name: impl Into<String>,
        version: Version,
        source: SourceId,
        dependencies: Vec<Dependency>,
    ) -> Self {
        let name = name.into();
        Self {
            id: registration_id(&name, &version),
            name,
            version,
            source,
            dependencies,
        }
    }

    /// `name@version`
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn source(&self) -> &SourceId {
        &self.source
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Lockfile reference triple: `name version source`
    pub fn lock_ref(&self) -> String {
        format!("{} {} {}", self.name, self.version, self.source)
    }

    /// Requirement that is satisfied by exactly this registration
    pub fn to_locked_dependency(&self) -> Dependency {
        Dependency::locked(self.name.clone(), &self.version, self.source.clone())
    }
}

/// Dependency-relevant projection of a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub name: String,
    pub version: Version,
    pub dependencies: Vec<Dependency>,
}

impl Snapshot {
    pub fn new(name: impl Into<String>, version: Version, dependencies: Vec<Dependency>) -> Self {
        Self {
            name: name.into(),
            version,
            dependencies,
        }
    }

    /// Current dependency with the given name
    pub fn dependency(&self, name: &str) -> Option<&Dependency> {
        self.dependencies.iter().find(|d| d.name == name)
    }
}

/// A root snapshot plus its member snapshots, resolved as one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub root: Snapshot,
    pub members: Vec<Snapshot>,
}

impl Workspace {
    pub fn new(root: Snapshot, members: Vec<Snapshot>) -> Self {
        Self { root, members }
    }

    /// Root followed by every member
    pub fn snapshots(&self) -> impl Iterator<Item = &Snapshot> {
        std::iter::once(&self.root).chain(self.members.iter())
    }

    pub fn member(&self, name: &str) -> Option<&Snapshot> {
        self.members.iter().find(|m| m.name == name)
    }
}
