//! Package manager orchestrator
//!
//! Ties the pieces together for one workspace: reuse the lockfile while it
//! still matches the manifests, otherwise refresh the index mirror,
//! re-resolve and rewrite the lockfile. Installing fetches every locked
//! package.

use crate::dependency::Workspace;
use crate::fetcher::{HttpTransport, PackageFetcher, Transport};
use crate::index::{IndexReader, PackageIndex};
use crate::lockfile::Lockfile;
use crate::resolver::Resolver;
use crate::source::{GitMirror, Mirror, SourceProvider};
use crate::workspace::load_workspace;
use crate::Result;
use quarry_config::RegistryConfig;
use std::path::{Path, PathBuf};

pub struct PackageManager<M, T> {
    config: RegistryConfig,
    project_root: PathBuf,
    provider: SourceProvider<M>,
    fetcher: PackageFetcher<T>,
}

impl PackageManager<GitMirror, HttpTransport> {
    /// Manager using git for the index mirror and HTTP for archives
    pub fn new(config: RegistryConfig, project_root: impl Into<PathBuf>) -> Result<Self> {
        let mirror = GitMirror::new(config.timeout());
        let transport = HttpTransport::new(config.timeout())?;
        Ok(Self::with_parts(config, project_root, mirror, transport))
    }
}

impl<M: Mirror, T: Transport> PackageManager<M, T> {
    pub fn with_parts(
        config: RegistryConfig,
        project_root: impl Into<PathBuf>,
        mirror: M,
        transport: T,
    ) -> Self {
        let provider = SourceProvider::new(&config, mirror);
        let fetcher = PackageFetcher::new(config.clone(), transport);
        Self {
            config,
            project_root: project_root.into(),
            provider,
            fetcher,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn lockfile_path(&self) -> PathBuf {
        Lockfile::path_in(&self.project_root)
    }

    pub fn load_workspace(&self) -> Result<Workspace> {
        load_workspace(&self.project_root, &self.config)
    }

    /// The lockfile for the current workspace, re-resolving if needed
    pub fn lock(&self) -> Result<Lockfile> {
        let workspace = self.load_workspace()?;
        let path = self.lockfile_path();

        if let Some(existing) = Lockfile::read(&path) {
            if existing.is_valid(&workspace) {
                tracing::debug!(path = %path.display(), "lockfile is up to date");
                return Ok(existing);
            }
            tracing::info!(path = %path.display(), "lockfile is out of date, re-resolving");
        }

        self.provider.update()?;
        let index = IndexReader::new(&self.config);
        let lockfile = self.resolve(&index, workspace)?;
        lockfile.write(&path)?;
        Ok(lockfile)
    }

    /// Resolve a fresh lockfile without touching the mirror or the disk
    pub fn resolve<I: PackageIndex + ?Sized>(&self, index: &I, workspace: Workspace) -> Result<Lockfile> {
        let packages = Resolver::new(index).resolve(&workspace)?;
        Ok(Lockfile::new(workspace, packages))
    }

    /// Lock, then fetch and extract every locked package
    pub fn install(&self) -> Result<Vec<PathBuf>> {
        let lockfile = self.lock()?;
        let dirs = self.fetcher.fetch_all(&lockfile.registrations())?;
        tracing::info!(packages = dirs.len(), "installed packages");
        Ok(dirs)
    }
}
