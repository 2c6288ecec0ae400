//! Package fetcher
//!
//! Guarantees a verified archive is present for a registration and that its
//! sources are extracted. Downloads land in a temporary file next to the
//! trusted archive path and are only moved into place after the digest
//! matches the one recorded in the registration's source.

use crate::archive;
use crate::dependency::Registration;
use crate::validator::Validator;
use crate::{PackageError, Result};
use quarry_config::RegistryConfig;
use rayon::prelude::*;
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

/// Download primitive used by the fetcher
pub trait Transport: Send + Sync {
    /// Write the body served at `url` into `dest`
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Blocking HTTP transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Transport whose requests fail once `timeout` has elapsed
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let mut response = self.client.get(url).send()?.error_for_status()?;
        let mut file = File::create(dest)?;
        response.copy_to(&mut file)?;
        Ok(())
    }
}

/// Materializes registrations into extracted source directories
pub struct PackageFetcher<T> {
    config: RegistryConfig,
    transport: T,
}

impl<T: Transport> PackageFetcher<T> {
    pub fn new(config: RegistryConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Trusted archive location for `registration`
    pub fn archive_path(&self, registration: &Registration) -> PathBuf {
        self.config
            .archive_path(registration.name(), &registration.version().to_string())
    }

    /// Extraction directory for `registration`
    pub fn extract_dir(&self, registration: &Registration) -> PathBuf {
        self.config
            .extract_dir(registration.name(), &registration.version().to_string())
    }

    /// Ensure the archive is present and verified, extract it, and return
    /// the extraction directory.
    ///
    /// An archive already at the trusted path is used without any network
    /// access.
    pub fn fetch(&self, registration: &Registration) -> Result<PathBuf> {
        Validator::validate_package_name(registration.name())?;

        let source = registration.source();
        if !source.is_registry() {
            return Err(PackageError::UnsupportedSource {
                name: registration.name().to_string(),
                kind: source.kind().to_string(),
            });
        }

        let archive_path = self.archive_path(registration);
        if archive_path.exists() {
            tracing::debug!(package = %registration.id(), "archive cache hit");
        } else {
            self.download_verified(registration, &archive_path)?;
        }

        let dest = self.extract_dir(registration);
        fs::create_dir_all(&dest)?;
        archive::extract(&archive_path, &dest)?;

        Ok(dest)
    }

    /// Fetch every registration, in parallel. The first error wins.
    pub fn fetch_all(&self, registrations: &[Registration]) -> Result<Vec<PathBuf>> {
        registrations
            .par_iter()
            .map(|registration| self.fetch(registration))
            .collect()
    }

    fn download_verified(&self, registration: &Registration, archive_path: &Path) -> Result<()> {
        let version = registration.version().to_string();
        let expected = registration.source().checksum().ok_or_else(|| {
            PackageError::MissingChecksum {
                name: registration.name().to_string(),
                version: version.clone(),
            }
        })?;

        let archive_dir = archive_path.parent().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid archive path: {}", archive_path.display()),
            )
        })?;
        fs::create_dir_all(archive_dir)?;

        let temp = NamedTempFile::new_in(archive_dir)?;
        let url = self.config.archive_url(registration.name(), &version);

        tracing::info!(package = %registration.id(), %url, "downloading archive");
        self.transport.download(&url, temp.path())?;

        let actual = archive::digest(temp.path())?;
        if !actual.eq_ignore_ascii_case(expected) {
            tracing::warn!(package = %registration.id(), %expected, %actual, "checksum mismatch, discarding download");
            return Err(PackageError::ChecksumMismatch {
                name: registration.name().to_string(),
                version,
                expected: expected.to_string(),
                actual,
            });
        }

        temp.persist(archive_path).map_err(|e| e.error)?;
        Ok(())
    }
}
