//! Coverage violations: drift between fixture directories on disk and the registered case list.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// Mismatch between the scanned fixture set and the registered case set of one group.
///
/// - `missing`: a directory exists on disk but no case is registered for it.
/// - `extra`: a case is registered but its directory is gone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoverageViolation {
    pub missing: BTreeSet<String>,
    pub extra: BTreeSet<String>,
}

impl CoverageViolation {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

impl fmt::Display for CoverageViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!(
                "unregistered fixtures on disk: {}",
                self.missing.iter().cloned().collect::<Vec<_>>().join(", ")
            ));
        }
        if !self.extra.is_empty() {
            parts.push(format!(
                "registered cases without a fixture directory: {}",
                self.extra.iter().cloned().collect::<Vec<_>>().join(", ")
            ));
        }
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for CoverageViolation {}
