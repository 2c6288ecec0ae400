//! Dependency graph resolver
//!
//! Picks, per package name, the highest version satisfying every active
//! constraint on that name. Constraints are recomputed each round by walking
//! the workspace snapshots through the current selection, so the
//! dependencies of a selected version only count while that version stays
//! selected. Resolution ends once a round reproduces the previous
//! selection.
//!
//! A name with no acceptable candidate only fails resolution once every
//! package requiring it kept its selection through the round. Otherwise the
//! name is left out and the next round decides with fresh constraints.

use crate::dependency::{Dependency, Registration, Workspace};
use crate::graph::DependencyGraph;
use crate::index::PackageIndex;
use crate::{PackageError, Result};
use rayon::prelude::*;
use semver::VersionReq;
use std::collections::{BTreeMap, HashSet, VecDeque};

pub mod conflict;
mod version_solver;

pub use conflict::{Conflict, ConflictingConstraint};
pub use version_solver::VersionSolver;

/// Version constraint with source tracking
#[derive(Debug, Clone, PartialEq)]
pub struct VersionConstraint {
    pub requirement: VersionReq,
    /// Workspace snapshot name or registration id that imposed it
    pub source: String,
    /// Package name of the requiring registration; `None` for snapshots
    pub requirer: Option<String>,
}

/// Resolves a workspace against a package index
pub struct Resolver<'a, I: ?Sized> {
    index: &'a I,
}

impl<'a, I: PackageIndex + ?Sized> Resolver<'a, I> {
    pub fn new(index: &'a I) -> Self {
        Self { index }
    }

    /// Build a complete graph for `workspace`
    pub fn resolve(&self, workspace: &Workspace) -> Result<DependencyGraph> {
        let mut solver = VersionSolver::new();
        let mut selected: BTreeMap<String, Registration> = BTreeMap::new();
        let mut seen: HashSet<Vec<String>> = HashSet::new();
        let mut round = 0usize;

        loop {
            round += 1;
            let constraints = collect_constraints(workspace, &selected);
            self.load_candidates(&mut solver, constraints.keys())?;

            let mut next = BTreeMap::new();
            let mut deferred = Vec::new();
            for (name, package_constraints) in &constraints {
                match select(&solver, name, package_constraints) {
                    Ok(registration) => {
                        next.insert(name.clone(), registration.clone());
                    }
                    Err(error) => deferred.push((package_constraints, error)),
                }
            }

            let mut pending = Vec::with_capacity(deferred.len());
            for (package_constraints, error) in deferred {
                if requirers_settled(package_constraints, &selected, &next) {
                    return Err(error);
                }
                pending.push(error);
            }

            tracing::debug!(
                round,
                packages = next.len(),
                deferred = pending.len(),
                "resolution round"
            );

            if pending.is_empty() && next == selected {
                return DependencyGraph::from_registrations(selected.into_values());
            }

            // Selection depends only on the previous one, so a repeat is a cycle
            let key: Vec<String> = next.values().map(|r| r.id().to_string()).collect();
            if !seen.insert(key) {
                return Err(pending
                    .into_iter()
                    .next()
                    .unwrap_or(PackageError::ResolutionDidNotConverge(round)));
            }
            selected = next;
        }
    }

    /// Query the index for every name not seen yet, in parallel
    fn load_candidates<'n>(
        &self,
        solver: &mut VersionSolver,
        names: impl Iterator<Item = &'n String>,
    ) -> Result<()> {
        let missing: Vec<&String> = names.filter(|n| !solver.is_known(n)).collect();

        let fetched: Vec<(String, Vec<Registration>)> = missing
            .par_iter()
            .map(|name| -> Result<(String, Vec<Registration>)> {
                Ok((name.to_string(), self.index.candidates(name)?))
            })
            .collect::<Result<_>>()?;

        for (name, candidates) in fetched {
            solver.add_candidates(&name, candidates);
        }
        Ok(())
    }
}

/// Whether every package imposing `constraints` kept its selection.
/// Workspace snapshots never change.
fn requirers_settled(
    constraints: &[VersionConstraint],
    selected: &BTreeMap<String, Registration>,
    next: &BTreeMap<String, Registration>,
) -> bool {
    constraints.iter().all(|c| match &c.requirer {
        None => true,
        Some(name) => match (selected.get(name), next.get(name)) {
            (Some(before), Some(after)) => before.id() == after.id(),
            _ => false,
        },
    })
}

/// Active constraints per name, reachable from the workspace through the
/// current selection
fn collect_constraints<'s>(
    workspace: &Workspace,
    selected: &'s BTreeMap<String, Registration>,
) -> BTreeMap<String, Vec<VersionConstraint>> {
    let mut constraints = BTreeMap::new();
    let mut queue: VecDeque<&'s Registration> = VecDeque::new();
    let mut visited: HashSet<&'s str> = HashSet::new();

    for snapshot in workspace.snapshots() {
        require(&mut constraints, &snapshot.name, None, &snapshot.dependencies);
        reach(&snapshot.dependencies, selected, &mut visited, &mut queue);
    }

    while let Some(registration) = queue.pop_front() {
        require(
            &mut constraints,
            registration.id(),
            Some(registration.name()),
            registration.dependencies(),
        );
        reach(registration.dependencies(), selected, &mut visited, &mut queue);
    }

    constraints
}

fn require(
    constraints: &mut BTreeMap<String, Vec<VersionConstraint>>,
    source: &str,
    requirer: Option<&str>,
    dependencies: &[Dependency],
) {
    for dep in dependencies {
        constraints
            .entry(dep.name.clone())
            .or_default()
            .push(VersionConstraint {
                requirement: dep.req.clone(),
                source: source.to_string(),
                requirer: requirer.map(str::to_string),
            });
    }
}

fn reach<'s>(
    dependencies: &[Dependency],
    selected: &'s BTreeMap<String, Registration>,
    visited: &mut HashSet<&'s str>,
    queue: &mut VecDeque<&'s Registration>,
) {
    for dep in dependencies {
        if let Some(registration) = selected.get(&dep.name) {
            if visited.insert(registration.id()) {
                queue.push_back(registration);
            }
        }
    }
}

/// Highest candidate meeting every constraint on `name`
fn select<'s>(
    solver: &'s VersionSolver,
    name: &str,
    constraints: &[VersionConstraint],
) -> Result<&'s Registration> {
    let requirements: Vec<&VersionReq> = constraints.iter().map(|c| &c.requirement).collect();

    if let Some(registration) = solver.max_satisfying(name, &requirements) {
        return Ok(registration);
    }

    if let Some(unmatched) = constraints
        .iter()
        .find(|c| !solver.is_satisfiable(name, &c.requirement))
    {
        return Err(PackageError::NoPackageFound {
            name: name.to_string(),
            req: unmatched.requirement.to_string(),
        });
    }

    let conflict = Conflict::new(
        name.to_string(),
        constraints
            .iter()
            .map(|c| ConflictingConstraint::new(c.requirement.clone(), c.source.clone()))
            .collect(),
    )
    .with_available(solver.versions(name).into_iter().cloned().collect());

    Err(PackageError::VersionConflict(conflict.report()))
}
