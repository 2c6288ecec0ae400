//! Source provider: keeps the local registry index mirror present and current.

use crate::Result;
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{FetchOptions, RemoteCallbacks, Repository};
use quarry_config::RegistryConfig;
use std::io;
use std::os::raw::c_int;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Serializes writes to libgit2's process-wide server timeouts
static SERVER_TIMEOUT_LOCK: Mutex<()> = Mutex::new(());

/// Mirror primitives the source provider drives
pub trait Mirror: Send + Sync {
    /// Clone `remote` into `parent/name`
    fn clone_into(&self, remote: &str, name: &str, parent: &Path) -> Result<()>;

    /// Bring an existing local mirror up to date with its remote
    fn pull(&self, local: &Path) -> Result<()>;
}

/// Git-backed mirror.
///
/// `timeout` bounds connecting and every server read, and a transfer is
/// aborted once it runs past the deadline. The connect and read bounds are
/// libgit2 process globals, so the most recently created mirror wins.
#[derive(Debug, Clone)]
pub struct GitMirror {
    timeout: Duration,
}

impl GitMirror {
    pub fn new(timeout: Duration) -> Self {
        if let Err(e) = set_server_timeouts(timeout) {
            tracing::warn!(error = %e, "could not set git server timeouts");
        }
        Self { timeout }
    }

    fn fetch_options(&self) -> FetchOptions<'static> {
        let deadline = Instant::now() + self.timeout;
        let mut callbacks = RemoteCallbacks::new();
        callbacks.transfer_progress(move |_| Instant::now() < deadline);

        let mut options = FetchOptions::new();
        options.remote_callbacks(callbacks);
        options
    }
}

impl Mirror for GitMirror {
    fn clone_into(&self, remote: &str, name: &str, parent: &Path) -> Result<()> {
        std::fs::create_dir_all(parent)?;
        let dest = parent.join(name);

        let result = RepoBuilder::new()
            .fetch_options(self.fetch_options())
            .clone(remote, &dest);

        if let Err(e) = result {
            // A leftover directory would be mistaken for a finished clone
            if dest.exists() {
                if let Err(cleanup) = std::fs::remove_dir_all(&dest) {
                    tracing::warn!(
                        path = %dest.display(),
                        error = %cleanup,
                        "could not remove partial clone; delete it before the next update"
                    );
                }
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn pull(&self, local: &Path) -> Result<()> {
        let repo = Repository::open(local)?;

        let mut remote = repo.find_remote("origin")?;
        remote.fetch::<&str>(&[], Some(&mut self.fetch_options()), None)?;

        let branch = {
            let head = repo.head()?;
            head.shorthand()
                .ok_or_else(|| git2::Error::from_str("HEAD does not name a branch"))?
                .to_string()
        };

        let upstream = repo.find_reference(&format!("refs/remotes/origin/{}", branch))?;
        let upstream_commit = repo.reference_to_annotated_commit(&upstream)?;
        let (analysis, _) = repo.merge_analysis(&[&upstream_commit])?;

        if analysis.is_up_to_date() {
            tracing::debug!(path = %local.display(), "index already up to date");
            return Ok(());
        }

        if analysis.is_fast_forward() {
            let refname = format!("refs/heads/{}", branch);
            let mut reference = repo.find_reference(&refname)?;
            reference.set_target(upstream_commit.id(), "quarry: fast-forward index")?;
            repo.set_head(&refname)?;
            repo.checkout_head(Some(CheckoutBuilder::default().force()))?;
            return Ok(());
        }

        Err(git2::Error::from_str("local index has diverged from its remote").into())
    }
}

/// Owns the local mirror directory of the registry index
pub struct SourceProvider<M> {
    mirror: M,
    remote: String,
    local: PathBuf,
}

impl<M: Mirror> SourceProvider<M> {
    /// Provider for the index configured in `config`
    pub fn new(config: &RegistryConfig, mirror: M) -> Self {
        Self::with_paths(mirror, config.index_url(), config.local_index_dir())
    }

    pub fn with_paths(mirror: M, remote: impl Into<String>, local: impl Into<PathBuf>) -> Self {
        Self {
            mirror,
            remote: remote.into(),
            local: local.into(),
        }
    }

    pub fn local_dir(&self) -> &Path {
        &self.local
    }

    /// Clone the mirror if its directory is absent, then pull.
    ///
    /// A directory that exists is never re-cloned, even when empty.
    /// Mirror failures are returned unchanged.
    pub fn update(&self) -> Result<()> {
        if !self.local.exists() {
            let (parent, name) = split_local(&self.local)?;
            tracing::info!(remote = %self.remote, path = %self.local.display(), "cloning registry index");
            self.mirror.clone_into(&self.remote, name, parent)?;
        }

        tracing::info!(path = %self.local.display(), "updating registry index");
        self.mirror.pull(&self.local)
    }
}

fn set_server_timeouts(timeout: Duration) -> std::result::Result<(), git2::Error> {
    let millis = c_int::try_from(timeout.as_millis()).unwrap_or(c_int::MAX);
    let _guard = SERVER_TIMEOUT_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    // SAFETY: both setters store a plain integer that libgit2 reads when it
    // opens a connection; concurrent writers are serialized by the lock.
    unsafe {
        git2::opts::set_server_connect_timeout_in_milliseconds(millis)?;
        git2::opts::set_server_timeout_in_milliseconds(millis)?;
    }
    Ok(())
}

fn split_local(local: &Path) -> Result<(&Path, &str)> {
    let parent = local.parent();
    let name = local.file_name().and_then(|n| n.to_str());
    match (parent, name) {
        (Some(parent), Some(name)) => Ok((parent, name)),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid index mirror path: {}", local.display()),
        )
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PackageError;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingMirror {
        calls: Mutex<Vec<String>>,
        fail_pull: bool,
    }

    impl RecordingMirror {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Mirror for RecordingMirror {
        fn clone_into(&self, remote: &str, name: &str, parent: &Path) -> Result<()> {
            std::fs::create_dir_all(parent.join(name))?;
            self.calls
                .lock()
                .unwrap()
                .push(format!("clone {} {}", remote, name));
            Ok(())
        }

        fn pull(&self, _local: &Path) -> Result<()> {
            self.calls.lock().unwrap().push("pull".to_string());
            if self.fail_pull {
                return Err(git2::Error::from_str("remote unreachable").into());
            }
            Ok(())
        }
    }

    #[test]
    fn test_mirror_bounds_server_connections() {
        GitMirror::new(Duration::from_millis(4_500));

        let (connect, read) = unsafe {
            (
                git2::opts::get_server_connect_timeout_in_milliseconds().unwrap(),
                git2::opts::get_server_timeout_in_milliseconds().unwrap(),
            )
        };
        assert_eq!(connect, 4_500);
        assert_eq!(read, 4_500);
    }

    #[test]
    fn test_update_clones_missing_mirror() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("index").join("index-abc");
        let provider = SourceProvider::with_paths(RecordingMirror::default(), "file:///remote", &local);

        provider.update().unwrap();

        assert_eq!(
            provider.mirror.calls(),
            vec!["clone file:///remote index-abc".to_string(), "pull".to_string()]
        );
    }

    #[test]
    fn test_update_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("index-abc");
        let provider = SourceProvider::with_paths(RecordingMirror::default(), "file:///remote", &local);

        provider.update().unwrap();
        provider.update().unwrap();

        assert_eq!(
            provider.mirror.calls(),
            vec![
                "clone file:///remote index-abc".to_string(),
                "pull".to_string(),
                "pull".to_string()
            ]
        );
    }

    #[test]
    fn test_existing_empty_dir_is_only_pulled() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("index-abc");
        std::fs::create_dir_all(&local).unwrap();
        let provider = SourceProvider::with_paths(RecordingMirror::default(), "file:///remote", &local);

        provider.update().unwrap();

        assert_eq!(provider.mirror.calls(), vec!["pull".to_string()]);
    }

    #[test]
    fn test_pull_failure_propagates() {
        let temp = TempDir::new().unwrap();
        let mirror = RecordingMirror {
            fail_pull: true,
            ..Default::default()
        };
        let provider = SourceProvider::with_paths(mirror, "file:///remote", temp.path());

        assert!(matches!(provider.update(), Err(PackageError::Git(_))));
        assert_eq!(provider.mirror.calls(), vec!["pull".to_string()]);
    }
}
