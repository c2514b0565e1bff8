//! Fixture discovery
//!
//! A fixture is an immediate subdirectory of a group root whose name matches the group's inclusion pattern and is
//! not explicitly excluded. Fixture internals are never read here.
//!
//! Discovery goes through the [`FixtureDiscovery`] trait so the executor can be driven from an in-memory listing in
//! tests; [`FsScanner`] is the filesystem implementation.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use fixtest_core::FixtureGroup;
use regex::Regex;
use thiserror::Error;

/// Errors that occur while listing a group root
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("fixture root not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("fixture root is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Produce the set of fixture names under a root.
pub trait FixtureDiscovery: Send + Sync {
    /// List fixture names under `root`. Order is not meaningful.
    fn scan(&self, root: &Path, include: &Regex, exclude: &BTreeSet<String>) -> Result<BTreeSet<String>, ScanError>;

    /// Scan using a group's own root, pattern and exclusions.
    fn scan_group(&self, group: &FixtureGroup) -> Result<BTreeSet<String>, ScanError> {
        self.scan(group.root(), group.pattern(), group.exclude())
    }
}

/// Non-recursive directory listing (default discovery).
#[derive(Debug, Default, Clone, Copy)]
pub struct FsScanner;

impl FixtureDiscovery for FsScanner {
    fn scan(&self, root: &Path, include: &Regex, exclude: &BTreeSet<String>) -> Result<BTreeSet<String>, ScanError> {
        scan(root, include, exclude)
    }
}

/// List the fixture directories directly under `root`.
///
/// Plain files are ignored, as are hidden (`.`-prefixed) entries and names that are not valid UTF-8.
#[tracing::instrument(skip_all, fields(root = %root.display()))]
pub fn scan(root: &Path, include: &Regex, exclude: &BTreeSet<String>) -> Result<BTreeSet<String>, ScanError> {
    let metadata = match fs::metadata(root) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ScanError::NotFound(root.to_path_buf())),
        Err(source) => {
            return Err(ScanError::Io {
                path: root.to_path_buf(),
                source,
            });
        }
    };
    if !metadata.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let io_err = |source| ScanError::Io {
        path: root.to_path_buf(),
        source,
    };

    let mut fixtures = BTreeSet::new();
    for entry in fs::read_dir(root).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        // Follow symlinks: a linked fixture directory is still a fixture.
        let is_dir = fs::metadata(entry.path()).map(|m| m.is_dir()).unwrap_or(false);
        if !is_dir {
            continue;
        }

        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            tracing::warn!(entry = %entry.path().display(), "skipping fixture with non UTF-8 name");
            continue;
        };
        if name.starts_with('.') || !include.is_match(&name) || exclude.contains(&name) {
            tracing::trace!(%name, "entry filtered out");
            continue;
        }
        fixtures.insert(name);
    }

    tracing::debug!(count = fixtures.len(), "scan complete");
    Ok(fixtures)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use fixtest_core::default_pattern;

    fn tree(dirs: &[&str], files: &[&str]) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        for d in dirs {
            fs::create_dir_all(tmp.path().join(d)).unwrap();
        }
        for f in files {
            fs::write(tmp.path().join(f), "x").unwrap();
        }
        tmp
    }

    fn names(set: &BTreeSet<String>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_scan_lists_directories_only() {
        let tmp = tree(&["filterA", "full"], &["README.md"]);
        let found = scan(tmp.path(), &default_pattern(), &BTreeSet::new()).unwrap();
        assert_eq!(names(&found), ["filterA", "full"]);
    }

    #[test]
    fn test_scan_applies_default_pattern() {
        let tmp = tree(&["_disabled", "x", "modulesA", ".git"], &[]);
        let found = scan(tmp.path(), &default_pattern(), &BTreeSet::new()).unwrap();
        assert_eq!(names(&found), ["modulesA"]);
    }

    #[test]
    fn test_scan_applies_exclusions() {
        let tmp = tree(&["filterA", "filterB"], &[]);
        let exclude = BTreeSet::from(["filterB".to_string()]);
        let found = scan(tmp.path(), &default_pattern(), &exclude).unwrap();
        assert_eq!(names(&found), ["filterA"]);
    }

    #[test]
    fn test_scan_is_not_recursive() {
        let tmp = tree(&["full/nested/deeper"], &[]);
        let found = scan(tmp.path(), &default_pattern(), &BTreeSet::new()).unwrap();
        assert_eq!(names(&found), ["full"]);
    }

    #[test]
    fn test_scan_custom_pattern() {
        let tmp = tree(&["filterA", "modulesA"], &[]);
        let found = scan(tmp.path(), &Regex::new("^modules").unwrap(), &BTreeSet::new()).unwrap();
        assert_eq!(names(&found), ["modulesA"]);
    }

    #[test]
    fn test_scan_missing_root() {
        let tmp = tempfile::tempdir().unwrap();
        let err = scan(&tmp.path().join("nope"), &default_pattern(), &BTreeSet::new()).unwrap_err();
        assert!(matches!(err, ScanError::NotFound(_)));
    }

    #[test]
    fn test_scan_root_is_file() {
        let tmp = tree(&[], &["file.txt"]);
        let err = scan(&tmp.path().join("file.txt"), &default_pattern(), &BTreeSet::new()).unwrap_err();
        assert!(matches!(err, ScanError::NotADirectory(_)));
    }

    #[test]
    fn test_scan_group_uses_group_settings() {
        let tmp = tree(&["keep1", "drop1", "_skip"], &[]);
        let group = FixtureGroup::new("g", tmp.path(), ["keep1"])
            .unwrap()
            .with_exclude(["drop1"]);
        let found = FsScanner.scan_group(&group).unwrap();
        assert_eq!(names(&found), ["keep1"]);
    }
}
