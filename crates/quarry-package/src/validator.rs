//! Package name and workspace validation
//!
//! Names end up as path components (index shards, archive and extraction
//! directories), so they are checked before any of those paths are built.

use crate::dependency::Workspace;
use crate::{PackageError, Result};
use std::collections::HashSet;

/// Maximum package name length
pub const MAX_NAME_LEN: usize = 64;

/// Package validator
pub struct Validator;

impl Validator {
    /// Validate package name format
    pub fn validate_package_name(name: &str) -> Result<()> {
        let invalid = |reason: &str| {
            Err(PackageError::InvalidPackageName {
                name: name.to_string(),
                reason: reason.to_string(),
            })
        };

        if name.is_empty() {
            return invalid("name cannot be empty");
        }

        if name.len() > MAX_NAME_LEN {
            return invalid("name exceeds maximum length of 64 characters");
        }

        if name.contains("..") || name.contains('/') || name.contains('\\') {
            return invalid("name cannot contain path separators or '..'");
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return invalid("only ASCII letters, digits, - and _ are allowed");
        }

        Ok(())
    }

    /// Validate every snapshot and dependency name in a workspace.
    ///
    /// Member names must be distinct from each other and from the root,
    /// since lockfile validity pairs members by name.
    pub fn validate_workspace(workspace: &Workspace) -> Result<()> {
        let mut seen = HashSet::new();

        for snapshot in workspace.snapshots() {
            Self::validate_package_name(&snapshot.name)?;

            if !seen.insert(snapshot.name.as_str()) {
                return Err(PackageError::InvalidPackageName {
                    name: snapshot.name.clone(),
                    reason: "duplicate workspace member".to_string(),
                });
            }

            for dependency in &snapshot.dependencies {
                Self::validate_package_name(&dependency.name)?;
            }
        }

        Ok(())
    }
}
