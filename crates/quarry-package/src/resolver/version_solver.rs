use crate::dependency::Registration;
use semver::{Version, VersionReq};
use std::collections::HashMap;

/// Candidate store for finding compatible package versions
#[derive(Debug, Clone, Default)]
pub struct VersionSolver {
    /// Candidates per package name, ascending by version
    candidates: HashMap<String, Vec<Registration>>,
}

impl VersionSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the candidates the index returned for a package
    pub fn add_candidates(&mut self, package: &str, mut candidates: Vec<Registration>) {
        candidates.sort_by(|a, b| a.version().cmp(b.version()));
        self.candidates.insert(package.to_string(), candidates);
    }

    /// Whether the index has already been queried for `package`
    pub fn is_known(&self, package: &str) -> bool {
        self.candidates.contains_key(package)
    }

    /// Highest candidate satisfying every requirement
    pub fn max_satisfying(&self, package: &str, requirements: &[&VersionReq]) -> Option<&Registration> {
        self.candidates
            .get(package)?
            .iter()
            .rev()
            .find(|r| requirements.iter().all(|req| req.matches(r.version())))
    }

    /// Check if a single requirement can be met on its own
    pub fn is_satisfiable(&self, package: &str, requirement: &VersionReq) -> bool {
        self.max_satisfying(package, &[requirement]).is_some()
    }

    /// All known versions of a package, ascending
    pub fn versions(&self, package: &str) -> Vec<&Version> {
        self.candidates
            .get(package)
            .map(|c| c.iter().map(|r| r.version()).collect())
            .unwrap_or_default()
    }
}
