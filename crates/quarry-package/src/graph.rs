//! Resolved dependency graph

use crate::dependency::{Dependency, Registration};
use crate::{PackageError, Result};
use std::collections::BTreeMap;

/// Complete set of registrations satisfying a workspace, keyed by `name@version`.
///
/// Registrations refer to each other by name through their [`Dependency`]
/// values; edges are followed with [`DependencyGraph::lookup`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    packages: BTreeMap<String, Registration>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph, rejecting repeated ids
    pub fn from_registrations(registrations: impl IntoIterator<Item = Registration>) -> Result<Self> {
        let mut graph = Self::new();
        for registration in registrations {
            graph.insert(registration)?;
        }
        Ok(graph)
    }

    pub fn insert(&mut self, registration: Registration) -> Result<()> {
        if self.packages.contains_key(registration.id()) {
            return Err(PackageError::DuplicatePackage(registration.id().to_string()));
        }
        self.packages
            .insert(registration.id().to_string(), registration);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Registration> {
        self.packages.get(id)
    }

    /// The unique registration satisfying `dependency`.
    ///
    /// Matches by name, then by version requirement. Zero or several
    /// matches are both errors.
    pub fn lookup(&self, dependency: &Dependency) -> Result<&Registration> {
        let mut matches = self
            .packages
            .values()
            .filter(|r| r.name() == dependency.name && dependency.matches(r.version()));

        let first = matches.next().ok_or_else(|| PackageError::NoPackageFound {
            name: dependency.name.clone(),
            req: dependency.req.to_string(),
        })?;

        let rest: Vec<&Registration> = matches.collect();
        if !rest.is_empty() {
            let candidates = std::iter::once(first)
                .chain(rest)
                .map(|r| r.id())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(PackageError::AmbiguousDependency {
                name: dependency.name.clone(),
                req: dependency.req.to_string(),
                candidates,
            });
        }

        Ok(first)
    }

    /// Registrations in id order
    pub fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.packages.values()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
