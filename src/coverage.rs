//! Coverage verification
//!
//! Checks that the fixtures present on disk and the registered cases of a group are the same set. This is a
//! property of the suite definition, not of the subject under test, so it runs for every group whether or not any
//! case is executed.

use std::collections::BTreeSet;

use fixtest_core::CoverageViolation;

/// Compare scanned fixture names with registered case names.
///
/// Returns the violation when the sets differ in either direction.
#[tracing::instrument(skip_all, fields(scanned = scanned.len(), registered = registered.len()))]
pub fn verify(scanned: &BTreeSet<String>, registered: &BTreeSet<String>) -> Result<(), CoverageViolation> {
    let violation = CoverageViolation {
        missing: scanned.difference(registered).cloned().collect(),
        extra: registered.difference(scanned).cloned().collect(),
    };

    if violation.is_empty() {
        Ok(())
    } else {
        tracing::debug!(missing = violation.missing.len(), extra = violation.extra.len(), "coverage mismatch");
        Err(violation)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_equal_sets_pass() {
        assert!(verify(&set(&["a1", "b1"]), &set(&["b1", "a1"])).is_ok());
        assert!(verify(&set(&[]), &set(&[])).is_ok());
    }

    #[test]
    fn test_unregistered_directory_is_missing() {
        let err = verify(&set(&["full", "newOne"]), &set(&["full"])).unwrap_err();
        assert_eq!(err.missing, set(&["newOne"]));
        assert!(err.extra.is_empty());
    }

    #[test]
    fn test_removed_directory_is_extra() {
        let scanned = set(&["filterA", "filterAB", "full"]);
        let registered = set(&["filterA", "filterAB", "full", "modulesA"]);
        let err = verify(&scanned, &registered).unwrap_err();
        assert!(err.missing.is_empty());
        assert_eq!(err.extra, set(&["modulesA"]));
    }

    #[test]
    fn test_both_directions() {
        let err = verify(&set(&["a1", "b1"]), &set(&["b1", "c1"])).unwrap_err();
        assert_eq!(err.missing, set(&["a1"]));
        assert_eq!(err.extra, set(&["c1"]));
    }
}
