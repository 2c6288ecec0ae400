//! Workspace loading: manifests to snapshots

use crate::dependency::{Dependency, Snapshot, SourceId, Workspace};
use crate::validator::Validator;
use crate::Result;
use quarry_config::{Manifest, RegistryConfig};
use semver::{Version, VersionReq};
use std::path::Path;

/// Load the workspace rooted at `root_dir`.
///
/// Reads the root `quarry.toml` and the manifest of every directory listed
/// under `[workspace] members`. All dependencies are served by the
/// configured registry.
pub fn load_workspace(root_dir: &Path, config: &RegistryConfig) -> Result<Workspace> {
    let manifest = Manifest::load_from_dir(root_dir)?;
    let root = snapshot_from_manifest(&manifest, config)?;

    let members = manifest
        .members()
        .iter()
        .map(|member| {
            let member_manifest = Manifest::load_from_dir(&root_dir.join(member))?;
            snapshot_from_manifest(&member_manifest, config)
        })
        .collect::<Result<Vec<_>>>()?;

    let workspace = Workspace::new(root, members);
    Validator::validate_workspace(&workspace)?;

    tracing::debug!(
        root = %workspace.root.name,
        members = workspace.members.len(),
        "loaded workspace"
    );
    Ok(workspace)
}

/// Dependency-relevant projection of one manifest
pub fn snapshot_from_manifest(manifest: &Manifest, config: &RegistryConfig) -> Result<Snapshot> {
    let version = Version::parse(manifest.version())?;

    let dependencies = manifest
        .dependencies
        .iter()
        .map(|(name, spec)| -> Result<Dependency> {
            Ok(Dependency {
                name: name.clone(),
                req: VersionReq::parse(spec.version_req())?,
                source: SourceId::registry(config.index_url()),
                optional: spec.is_optional(),
                default_features: spec.default_features(),
                features: spec.features().to_vec(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Snapshot::new(manifest.name(), version, dependencies))
}
