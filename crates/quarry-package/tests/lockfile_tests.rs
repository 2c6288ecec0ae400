//! Lockfile codec tests: serialization, hydration, validity and file helpers

use pretty_assertions::assert_eq;
use quarry_package::{
    Dependency, DependencyGraph, Lockfile, PackageError, Registration, Snapshot, SourceId,
    Workspace,
};
use rstest::rstest;
use semver::{Version, VersionReq};
use std::fs;
use tempfile::TempDir;

const SINGLE_PACKAGE_LOCK: &str = r#"
[root]
name = "app"
version = "0.1.0"
dependencies = ["a 1.0.0 registry+x#c1"]

[[packages]]
name = "a"
version = "1.0.0"
source = "registry+x#c1"
dependencies = []
"#;

fn dep(name: &str, req: &str) -> Dependency {
    Dependency::new(name, VersionReq::parse(req).unwrap(), SourceId::registry("x"))
}

fn reg(name: &str, version: &str, checksum: &str, deps: Vec<Dependency>) -> Registration {
    Registration::new(
        name,
        Version::parse(version).unwrap(),
        SourceId::registry("x").with_details(checksum),
        deps,
    )
}

fn snapshot(name: &str, deps: Vec<Dependency>) -> Snapshot {
    Snapshot::new(name, Version::new(0, 1, 0), deps)
}

/// app -> a ^1, b ^2; core -> a ^1; a -> c ^0.3
fn sample_lockfile() -> Lockfile {
    let workspace = Workspace::new(
        snapshot("app", vec![dep("a", "^1.0.0"), dep("b", "^2")]),
        vec![snapshot("core", vec![dep("a", "^1")])],
    );
    let packages = DependencyGraph::from_registrations(vec![
        reg("a", "1.0.0", "ca", vec![dep("c", "^0.3")]),
        reg("b", "2.1.0", "cb", vec![]),
        reg("c", "0.3.4", "cc", vec![]),
    ])
    .unwrap();
    Lockfile::new(workspace, packages)
}

fn dependency_names(snapshot: &Snapshot) -> Vec<&str> {
    snapshot.dependencies.iter().map(|d| d.name.as_str()).collect()
}

mod serialization {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_to_text_is_deterministic() {
        let lockfile = sample_lockfile();
        assert_eq!(lockfile.to_text().unwrap(), lockfile.to_text().unwrap());
    }

    #[test]
    fn test_references_are_triples() {
        let text = sample_lockfile().to_text().unwrap();

        assert!(text.contains("\"a 1.0.0 registry+x#ca\","));
        assert!(text.contains("\"b 2.1.0 registry+x#cb\","));
        assert!(text.contains("\"c 0.3.4 registry+x#cc\","));
        assert!(text.contains("source = \"registry+x#cc\""));
    }

    #[test]
    fn test_section_order() {
        let text = sample_lockfile().to_text().unwrap();

        let root = text.find("[root]").unwrap();
        let members = text.find("[[members]]").unwrap();
        let packages = text.find("[[packages]]").unwrap();
        assert!(root < members);
        assert!(members < packages);
    }

    #[test]
    fn test_entry_fields_alphabetical() {
        let text = sample_lockfile().to_text().unwrap();
        let package = &text[text.find("[[packages]]").unwrap()..];

        let dependencies = package.find("dependencies =").unwrap();
        let name = package.find("name =").unwrap();
        let source = package.find("source =").unwrap();
        let version = package.find("version =").unwrap();
        assert!(dependencies < name);
        assert!(name < source);
        assert!(source < version);
    }

    #[test]
    fn test_incomplete_graph_is_rejected() {
        let mut lockfile = sample_lockfile();
        lockfile.workspace.root.dependencies.push(dep("missing", "*"));

        assert!(matches!(
            lockfile.to_text(),
            Err(PackageError::NoPackageFound { name, .. }) if name == "missing"
        ));
    }

    #[test]
    fn test_workspace_without_members_or_packages() {
        let lockfile = Lockfile::new(
            Workspace::new(snapshot("app", vec![]), vec![]),
            DependencyGraph::new(),
        );

        let text = lockfile.to_text().unwrap();
        assert!(text.contains("[root]"));
        assert!(!text.contains("[[members]]"));
        assert!(!text.contains("[[packages]]"));

        let loaded = Lockfile::from_text(&text).unwrap();
        assert_eq!(loaded.workspace.root.name, "app");
        assert!(loaded.packages.is_empty());
    }
}

mod deserialization {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_root_dependency_hydrates_to_package() {
        let lockfile = Lockfile::from_text(SINGLE_PACKAGE_LOCK).unwrap();

        let root = &lockfile.workspace.root;
        assert_eq!(root.name, "app");
        assert_eq!(root.dependencies.len(), 1);

        let first = &root.dependencies[0];
        assert_eq!(first.name, "a");
        assert_eq!(first.pinned_version(), Some(Version::new(1, 0, 0)));

        let package = lockfile.packages.lookup(first).unwrap();
        assert_eq!(package.id(), "a@1.0.0");
        assert_eq!(package.source().to_string(), "registry+x#c1");
        assert!(package.dependencies().is_empty());
    }

    #[test]
    fn test_missing_root() {
        let text = r#"
[[packages]]
name = "a"
version = "1.0.0"
source = "registry+x#c1"
dependencies = []
"#;
        assert!(matches!(
            Lockfile::from_text(text),
            Err(PackageError::MissingRoot)
        ));
    }

    #[rstest]
    #[case::package_without_source(
        "[root]\nname = \"app\"\nversion = \"0.1.0\"\ndependencies = []\n\n[[packages]]\nname = \"a\"\nversion = \"1.0.0\"\ndependencies = []\n",
        "packages[0]"
    )]
    #[case::root_without_version(
        "[root]\nname = \"app\"\ndependencies = []\n",
        "root"
    )]
    #[case::member_dependencies_not_array(
        "[root]\nname = \"app\"\nversion = \"0.1.0\"\ndependencies = []\n\n[[members]]\nname = \"core\"\nversion = \"0.1.0\"\ndependencies = \"a\"\n",
        "members[0]"
    )]
    #[case::root_without_dependencies(
        "[root]\nname = \"app\"\nversion = \"0.1.0\"\n",
        "root"
    )]
    #[case::dependency_not_string(
        "[root]\nname = \"app\"\nversion = \"0.1.0\"\ndependencies = [1]\n",
        "root"
    )]
    fn test_malformed_sections(#[case] text: &str, #[case] section: &str) {
        match Lockfile::from_text(text) {
            Err(PackageError::MalformedLockfile(msg)) => {
                assert!(msg.starts_with(section), "unexpected message: {}", msg)
            }
            other => panic!("Expected MalformedLockfile, got {:?}", other),
        }
    }

    #[test]
    fn test_reference_to_unlisted_package() {
        let text = r#"
[root]
name = "app"
version = "0.1.0"
dependencies = ["ghost 1.0.0 registry+x#c1"]
"#;
        assert!(matches!(
            Lockfile::from_text(text),
            Err(PackageError::NotInLockfile(name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_duplicate_package_names() {
        let text = r#"
[root]
name = "app"
version = "0.1.0"
dependencies = []

[[packages]]
name = "a"
version = "1.0.0"
source = "registry+x#c1"
dependencies = []

[[packages]]
name = "a"
version = "2.0.0"
source = "registry+x#c2"
dependencies = []
"#;
        assert!(matches!(
            Lockfile::from_text(text),
            Err(PackageError::MalformedLockfile(_))
        ));
    }

    #[test]
    fn test_reference_suffix_is_informational() {
        let text = SINGLE_PACKAGE_LOCK.replace("a 1.0.0 registry+x#c1", "a 7.7.7 registry+elsewhere");
        let lockfile = Lockfile::from_text(&text).unwrap();

        let first = &lockfile.workspace.root.dependencies[0];
        assert_eq!(first.pinned_version(), Some(Version::new(1, 0, 0)));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Lockfile::from_text("[root"),
            Err(PackageError::ParseError(_))
        ));
    }
}

mod round_trip {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_names_versions_and_edges_survive() {
        let original = sample_lockfile();
        let loaded = Lockfile::from_text(&original.to_text().unwrap()).unwrap();

        assert_eq!(loaded.workspace.root.name, "app");
        assert_eq!(dependency_names(&loaded.workspace.root), vec!["a", "b"]);
        assert_eq!(loaded.workspace.members.len(), 1);
        assert_eq!(dependency_names(&loaded.workspace.members[0]), vec!["a"]);

        let ids: Vec<&str> = loaded.packages.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["a@1.0.0", "b@2.1.0", "c@0.3.4"]);

        let a = loaded.packages.get("a@1.0.0").unwrap();
        let a_deps: Vec<&str> = a.dependencies().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(a_deps, vec!["c"]);
        assert_eq!(a.source().checksum(), Some("ca"));
    }

    #[test]
    fn test_text_is_stable_across_reload() {
        let text = sample_lockfile().to_text().unwrap();
        let reloaded = Lockfile::from_text(&text).unwrap().to_text().unwrap();
        assert_eq!(reloaded, text);
    }

    #[test]
    fn test_mutually_dependent_packages() {
        let workspace = Workspace::new(snapshot("app", vec![dep("a", "*")]), vec![]);
        let packages = DependencyGraph::from_registrations(vec![
            reg("a", "1.0.0", "ca", vec![dep("b", "^1")]),
            reg("b", "1.0.0", "cb", vec![dep("a", "^1")]),
        ])
        .unwrap();

        let text = Lockfile::new(workspace, packages).to_text().unwrap();
        let loaded = Lockfile::from_text(&text).unwrap();

        let b = loaded.packages.get("b@1.0.0").unwrap();
        assert_eq!(loaded.packages.lookup(&b.dependencies()[0]).unwrap().id(), "a@1.0.0");
    }
}

mod validity {
    use super::*;
    use pretty_assertions::assert_eq;

    fn single_package_lock() -> Lockfile {
        Lockfile::from_text(SINGLE_PACKAGE_LOCK).unwrap()
    }

    #[rstest]
    #[case("^1.0.0", true)]
    #[case("=1.0.0", true)]
    #[case(">=0.5", true)]
    #[case("*", true)]
    #[case("^2.0.0", false)]
    #[case("<1.0.0", false)]
    fn test_current_requirement_judges_locked_version(#[case] req: &str, #[case] valid: bool) {
        let current = Workspace::new(snapshot("app", vec![dep("a", req)]), vec![]);
        assert_eq!(single_package_lock().is_valid(&current), valid);
    }

    #[test]
    fn test_added_dependency_invalidates() {
        let current = Workspace::new(
            snapshot("app", vec![dep("a", "^1"), dep("b", "^1")]),
            vec![],
        );
        assert!(!single_package_lock().is_valid(&current));
    }

    #[test]
    fn test_renamed_dependency_invalidates() {
        let current = Workspace::new(snapshot("app", vec![dep("z", "^1")]), vec![]);
        assert!(!single_package_lock().is_valid(&current));
    }

    #[test]
    fn test_sample_is_valid_for_its_own_workspace() {
        let lockfile = sample_lockfile();
        let workspace = lockfile.workspace.clone();
        assert!(lockfile.is_valid(&workspace));
    }

    #[test]
    fn test_member_count_mismatch() {
        let lockfile = sample_lockfile();
        let mut current = lockfile.workspace.clone();
        current.members.push(snapshot("extra", vec![]));
        assert!(!lockfile.is_valid(&current));
    }

    #[test]
    fn test_member_without_counterpart() {
        let lockfile = sample_lockfile();
        let mut current = lockfile.workspace.clone();
        current.members[0].name = "renamed".to_string();
        assert!(!lockfile.is_valid(&current));
    }

    #[test]
    fn test_member_requirement_moved() {
        let lockfile = sample_lockfile();
        let mut current = lockfile.workspace.clone();
        current.members[0].dependencies = vec![dep("a", "^3")];
        assert!(!lockfile.is_valid(&current));
    }

    #[test]
    fn test_reloaded_lockfile_is_valid() {
        let original = sample_lockfile();
        let loaded = Lockfile::from_text(&original.to_text().unwrap()).unwrap();
        assert!(loaded.is_valid(&original.workspace));
    }
}

mod file_io {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(Lockfile::read(&Lockfile::path_in(temp.path())).is_none());
    }

    #[test]
    fn test_read_corrupt_file() {
        let temp = TempDir::new().unwrap();
        let path = Lockfile::path_in(temp.path());
        fs::write(&path, "[[packages]]\nname = 3\n").unwrap();

        assert!(Lockfile::read(&path).is_none());
    }

    #[test]
    fn test_write_then_read() {
        let temp = TempDir::new().unwrap();
        let path = Lockfile::path_in(temp.path());
        let lockfile = sample_lockfile();

        lockfile.write(&path).unwrap();

        assert!(path.ends_with("quarry.lock"));
        let loaded = Lockfile::read(&path).unwrap();
        assert_eq!(loaded.to_text().unwrap(), lockfile.to_text().unwrap());
    }

    #[test]
    fn test_write_replaces_whole_file() {
        let temp = TempDir::new().unwrap();
        let path = Lockfile::path_in(temp.path());
        fs::write(&path, "stale contents that are much longer than anything else ".repeat(100)).unwrap();

        let lockfile = Lockfile::from_text(SINGLE_PACKAGE_LOCK).unwrap();
        lockfile.write(&path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), lockfile.to_text().unwrap());
        let leftovers = fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
