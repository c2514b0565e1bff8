//! Property-based tests for the fixtest harness
//!
//! These tests use proptest to check the coverage set algebra and the scanner's agreement with the filesystem
//! across many randomly generated fixture layouts.

use std::collections::BTreeSet;
use std::fs;

use fixtest::coverage::verify;
use fixtest::scanner;
use proptest::prelude::*;

fn name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{1,6}"
}

fn name_set() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(name_strategy(), 0..8)
}

// =============================================================================
// Coverage Properties
// =============================================================================

proptest! {
    /// Property: verification succeeds exactly when both sets are equal
    #[test]
    fn verify_ok_iff_equal(scanned in name_set(), registered in name_set()) {
        prop_assert_eq!(verify(&scanned, &registered).is_ok(), scanned == registered);
    }

    /// Property: missing and extra are the two set differences and never overlap
    #[test]
    fn violation_is_symmetric_difference(scanned in name_set(), registered in name_set()) {
        if let Err(v) = verify(&scanned, &registered) {
            prop_assert!(v.missing.is_disjoint(&v.extra));
            let expected_missing: BTreeSet<String> = scanned.difference(&registered).cloned().collect();
            let expected_extra: BTreeSet<String> = registered.difference(&scanned).cloned().collect();
            prop_assert_eq!(&v.missing, &expected_missing);
            prop_assert_eq!(&v.extra, &expected_extra);
            prop_assert!(!v.is_empty());
        }
    }

    /// Property: registering the missing names and dropping the extra ones repairs the group
    #[test]
    fn applying_violation_repairs_registration(scanned in name_set(), registered in name_set()) {
        if let Err(v) = verify(&scanned, &registered) {
            let repaired: BTreeSet<String> = registered
                .difference(&v.extra)
                .cloned()
                .chain(v.missing.iter().cloned())
                .collect();
            prop_assert!(verify(&scanned, &repaired).is_ok());
        }
    }
}

// =============================================================================
// Scanner Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: on a clean tree the scan equals the set of created directories
    #[test]
    fn scan_matches_created_dirs(dirs in name_set(), hidden in name_set()) {
        let tmp = tempfile::tempdir().unwrap();
        for d in &dirs {
            fs::create_dir(tmp.path().join(d)).unwrap();
        }
        for h in &hidden {
            let name = format!("_{h}");
            fs::create_dir(tmp.path().join(&name)).unwrap();
            fs::write(tmp.path().join(format!("{h}.txt")), "not a fixture").unwrap();
        }
        let found = scanner::scan(tmp.path(), &fixtest_core::default_pattern(), &BTreeSet::new()).unwrap();
        prop_assert_eq!(found, dirs);
    }
}
