//! Conflict reporting for dependency resolution

use semver::{Version, VersionReq};

/// Conflict information for reporting
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub package: String,
    pub constraints: Vec<ConflictingConstraint>,
    pub available: Vec<Version>,
}

/// A single conflicting constraint
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictingConstraint {
    pub requirement: VersionReq,
    pub source: String, // Which package imposed this constraint
}

impl Conflict {
    pub fn new(package: String, constraints: Vec<ConflictingConstraint>) -> Self {
        Self {
            package,
            constraints,
            available: Vec::new(),
        }
    }

    pub fn with_available(mut self, available: Vec<Version>) -> Self {
        self.available = available;
        self
    }

    /// Generate human-readable conflict report
    pub fn report(&self) -> String {
        let mut report = format!("Version conflict for package '{}':\n", self.package);

        for constraint in &self.constraints {
            report.push_str(&format!(
                "  {} requires {}\n",
                constraint.source, constraint.requirement
            ));
        }

        if !self.available.is_empty() {
            let versions: Vec<String> = self.available.iter().map(|v| v.to_string()).collect();
            report.push_str(&format!("\nAvailable versions: {}\n", versions.join(", ")));
        }

        report.push_str("\nPossible solutions:\n");
        report.push_str("  1. Update dependencies to compatible versions\n");
        report.push_str("  2. Relax the version requirement in quarry.toml\n");

        report
    }
}

impl ConflictingConstraint {
    pub fn new(requirement: VersionReq, source: String) -> Self {
        Self {
            requirement,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_version_req(req: &str) -> VersionReq {
        req.parse().unwrap()
    }

    #[test]
    fn test_conflict_new() {
        let conflict = Conflict::new("test-pkg".to_string(), vec![]);
        assert_eq!(conflict.package, "test-pkg");
        assert!(conflict.constraints.is_empty());
    }

    #[test]
    fn test_conflict_report() {
        let conflict = Conflict::new(
            "shared".to_string(),
            vec![
                ConflictingConstraint::new(make_version_req("^1.0"), "app".to_string()),
                ConflictingConstraint::new(make_version_req("^2.0"), "tool@1.0.0".to_string()),
            ],
        )
        .with_available(vec![Version::new(1, 4, 0), Version::new(2, 1, 0)]);

        insta::assert_snapshot!(conflict.report().trim_end(), @r###"
        Version conflict for package 'shared':
          app requires ^1.0
          tool@1.0.0 requires ^2.0

        Available versions: 1.4.0, 2.1.0

        Possible solutions:
          1. Update dependencies to compatible versions
          2. Relax the version requirement in quarry.toml
        "###);
    }

    #[test]
    fn test_report_without_available_versions() {
        let conflict = Conflict::new(
            "pkg".to_string(),
            vec![ConflictingConstraint::new(
                make_version_req("^1.0"),
                "root".to_string(),
            )],
        );

        let report = conflict.report();
        assert!(report.contains("root requires ^1.0"));
        assert!(!report.contains("Available versions"));
    }
}
