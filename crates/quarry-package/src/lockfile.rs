//! Package lockfile (quarry.lock) for reproducible builds
//!
//! ```toml
//! [root]
//! dependencies = [
//!     "left-pad 1.0.0 registry+https://example.com/index#abc123",
//! ]
//! name = "app"
//! version = "0.1.0"
//!
//! [[packages]]
//! dependencies = []
//! name = "left-pad"
//! source = "registry+https://example.com/index#abc123"
//! version = "1.0.0"
//! ```
//!
//! Every dependency is written as the triple `name version source` of the
//! package it resolved to. On load only the name is used to find the
//! package entry; the rest of the triple is informational.

use crate::dependency::{Dependency, Registration, Snapshot, SourceId, Workspace};
use crate::graph::DependencyGraph;
use crate::{PackageError, Result};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Lockfile name at the workspace root
pub const LOCKFILE_NAME: &str = "quarry.lock";

const HEADER: &str = "# This file is generated by quarry. Do not edit it by hand.\n\n";

/// Persisted resolution result
#[derive(Debug, Clone, PartialEq)]
pub struct Lockfile {
    pub workspace: Workspace,
    pub packages: DependencyGraph,
}

// Field order is the on-disk order; entry fields are alphabetical.
#[derive(Serialize)]
struct LockDocument {
    root: LockEntry,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    members: Vec<LockEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    packages: Vec<LockEntry>,
}

#[derive(Serialize)]
struct LockEntry {
    dependencies: Vec<String>,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    version: String,
}

#[derive(Deserialize)]
struct RawDocument {
    root: Option<RawEntry>,
    #[serde(default)]
    members: Vec<RawEntry>,
    #[serde(default)]
    packages: Vec<RawEntry>,
}

#[derive(Deserialize)]
struct RawEntry {
    name: Option<String>,
    version: Option<String>,
    source: Option<String>,
    dependencies: Option<toml::Value>,
}

/// Validated entry before its dependency ids are hydrated
struct Skeleton {
    name: String,
    version: Version,
    source: Option<SourceId>,
    dependency_ids: Vec<String>,
}

impl Lockfile {
    pub fn new(workspace: Workspace, packages: DependencyGraph) -> Self {
        Self {
            workspace,
            packages,
        }
    }

    /// Location of the lockfile for a workspace rooted at `dir`
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(LOCKFILE_NAME)
    }

    /// Every locked package, in id order
    pub fn registrations(&self) -> Vec<Registration> {
        self.packages.iter().cloned().collect()
    }

    /// Render the canonical text form.
    ///
    /// Fails if any dependency has no matching package in the graph.
    pub fn to_text(&self) -> Result<String> {
        let root = self.snapshot_entry(&self.workspace.root)?;
        let members = self
            .workspace
            .members
            .iter()
            .map(|m| self.snapshot_entry(m))
            .collect::<Result<Vec<_>>>()?;
        let packages = self
            .packages
            .iter()
            .map(|r| -> Result<LockEntry> {
                Ok(LockEntry {
                    dependencies: self.references(r.dependencies())?,
                    name: r.name().to_string(),
                    source: Some(r.source().to_string()),
                    version: r.version().to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let document = LockDocument {
            root,
            members,
            packages,
        };
        let body = toml::to_string_pretty(&document)?;
        Ok(format!("{}{}", HEADER, body))
    }

    fn snapshot_entry(&self, snapshot: &Snapshot) -> Result<LockEntry> {
        Ok(LockEntry {
            dependencies: self.references(&snapshot.dependencies)?,
            name: snapshot.name.clone(),
            source: None,
            version: snapshot.version.to_string(),
        })
    }

    fn references(&self, dependencies: &[Dependency]) -> Result<Vec<String>> {
        dependencies
            .iter()
            .map(|d| -> Result<String> { Ok(self.packages.lookup(d)?.lock_ref()) })
            .collect()
    }

    /// Parse and hydrate a lockfile
    pub fn from_text(text: &str) -> Result<Self> {
        let raw: RawDocument = toml::from_str(text)?;
        let root = raw.root.ok_or(PackageError::MissingRoot)?;

        // Pass 1: package skeletons and the name-keyed stand-ins
        let mut skeletons = Vec::with_capacity(raw.packages.len());
        let mut locked: HashMap<String, Dependency> = HashMap::new();

        for (i, entry) in raw.packages.into_iter().enumerate() {
            let section = format!("packages[{}]", i);
            let mut skeleton = Skeleton::parse(&section, entry, true)?;
            let source = skeleton.source.take().ok_or_else(|| {
                PackageError::MalformedLockfile(format!("{}: missing field 'source'", section))
            })?;

            let stand_in =
                Dependency::locked(skeleton.name.clone(), &skeleton.version, source.clone());
            if locked.insert(skeleton.name.clone(), stand_in).is_some() {
                return Err(PackageError::MalformedLockfile(format!(
                    "{}: package '{}' is listed more than once",
                    section, skeleton.name
                )));
            }
            skeletons.push((skeleton, source));
        }

        // Pass 2: replace dependency ids with the stand-ins
        let mut packages = DependencyGraph::new();
        for (skeleton, source) in skeletons {
            let dependencies = hydrate_all(&skeleton.dependency_ids, &locked)?;
            packages.insert(Registration::new(
                skeleton.name,
                skeleton.version,
                source,
                dependencies,
            ))?;
        }

        let root = Skeleton::parse("root", root, false)?.into_snapshot(&locked)?;
        let members = raw
            .members
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                Skeleton::parse(&format!("members[{}]", i), entry, false)?.into_snapshot(&locked)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(Workspace::new(root, members), packages))
    }

    /// Whether this lockfile still describes `current`.
    ///
    /// Root and members are paired by name. For each pair, the current
    /// requirement must accept the locked version of every dependency, and
    /// the two dependency lists must name the same packages.
    pub fn is_valid(&self, current: &Workspace) -> bool {
        if !self.satisfies(&self.workspace.root, &current.root) {
            return false;
        }

        if self.workspace.members.len() != current.members.len() {
            return false;
        }

        self.workspace.members.iter().all(|locked| {
            current
                .member(&locked.name)
                .is_some_and(|member| self.satisfies(locked, member))
        })
    }

    fn satisfies(&self, locked: &Snapshot, current: &Snapshot) -> bool {
        if locked.dependencies.len() != current.dependencies.len() {
            return false;
        }

        locked.dependencies.iter().all(|dependency| {
            let Some(wanted) = current.dependency(&dependency.name) else {
                return false;
            };
            match self.packages.lookup(dependency) {
                Ok(registration) => wanted.matches(registration.version()),
                Err(_) => false,
            }
        })
    }

    /// Load a lockfile, treating a missing or unreadable file as absent
    pub fn read(path: &Path) -> Option<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "no lockfile");
                return None;
            }
        };

        match Self::from_text(&text) {
            Ok(lockfile) => Some(lockfile),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable lockfile");
                None
            }
        }
    }

    /// Replace the file at `path` with this lockfile
    pub fn write(&self, path: &Path) -> Result<()> {
        let text = self.to_text()?;

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(text.as_bytes())?;
        temp.flush()?;
        temp.persist(path).map_err(|e| e.error)?;

        tracing::info!(path = %path.display(), packages = self.packages.len(), "wrote lockfile");
        Ok(())
    }
}

impl Skeleton {
    fn parse(section: &str, entry: RawEntry, with_source: bool) -> Result<Self> {
        let missing =
            |field: &str| PackageError::MalformedLockfile(format!("{}: missing field '{}'", section, field));

        let name = entry.name.ok_or_else(|| missing("name"))?;
        let raw_version = entry.version.ok_or_else(|| missing("version"))?;
        let version = Version::parse(&raw_version).map_err(|e| {
            PackageError::MalformedLockfile(format!(
                "{}: invalid version '{}': {}",
                section, raw_version, e
            ))
        })?;

        let source = match (with_source, entry.source) {
            (true, Some(raw)) => Some(SourceId::parse(&raw)?),
            (true, None) => return Err(missing("source")),
            (false, _) => None,
        };

        let dependency_ids = match entry.dependencies {
            None => return Err(missing("dependencies")),
            Some(toml::Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    toml::Value::String(id) => Ok(id),
                    _ => Err(PackageError::MalformedLockfile(format!(
                        "{}: dependencies must be strings",
                        section
                    ))),
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => {
                return Err(PackageError::MalformedLockfile(format!(
                    "{}: dependencies must be an array",
                    section
                )))
            }
        };

        Ok(Self {
            name,
            version,
            source,
            dependency_ids,
        })
    }

    fn into_snapshot(self, locked: &HashMap<String, Dependency>) -> Result<Snapshot> {
        let dependencies = hydrate_all(&self.dependency_ids, locked)?;
        Ok(Snapshot::new(self.name, self.version, dependencies))
    }
}

fn hydrate_all(ids: &[String], locked: &HashMap<String, Dependency>) -> Result<Vec<Dependency>> {
    ids.iter().map(|id| hydrate(id, locked)).collect()
}

/// Resolve a `name version source` id through the name alone
fn hydrate(id: &str, locked: &HashMap<String, Dependency>) -> Result<Dependency> {
    let name = id.split(' ').next().unwrap_or(id);
    let dependency = locked
        .get(name)
        .ok_or_else(|| PackageError::NotInLockfile(name.to_string()))?;

    if let Some(version) = dependency.pinned_version() {
        let canonical = format!("{} {} {}", dependency.name, version, dependency.source);
        if canonical != id {
            tracing::warn!(reference = id, package = %canonical, "lockfile reference disagrees with package entry");
        }
    }

    Ok(dependency.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hydrate_uses_name_prefix() {
        let mut locked = HashMap::new();
        locked.insert(
            "a".to_string(),
            Dependency::locked(
                "a",
                &Version::new(1, 0, 0),
                SourceId::parse("registry+x#c1").unwrap(),
            ),
        );

        let dep = hydrate("a 9.9.9 registry+elsewhere", &locked).unwrap();
        assert_eq!(dep.pinned_version(), Some(Version::new(1, 0, 0)));

        let bare = hydrate("a", &locked).unwrap();
        assert_eq!(bare.name, "a");

        assert!(matches!(
            hydrate("b 1.0.0 registry+x", &locked),
            Err(PackageError::NotInLockfile(name)) if name == "b"
        ));
    }

    #[test]
    fn test_skeleton_rejects_non_array_dependencies() {
        let entry = RawEntry {
            name: Some("a".to_string()),
            version: Some("1.0.0".to_string()),
            source: None,
            dependencies: Some(toml::Value::String("b".to_string())),
        };

        match Skeleton::parse("root", entry, false) {
            Err(PackageError::MalformedLockfile(msg)) => assert!(msg.starts_with("root:")),
            _ => panic!("Expected MalformedLockfile"),
        }
    }
}
