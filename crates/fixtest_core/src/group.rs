//! Fixture group definitions.
//!
//! A group names a root directory, the pattern that decides which entries under it are fixtures, and the ordered
//! list of cases registered to run. Groups are built once when the suite is defined and never mutated afterwards.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Default inclusion pattern: any entry of at least two characters that does not start with `_`.
pub const DEFAULT_PATTERN: &str = "^([^_](.+))$";

static DEFAULT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_PATTERN).expect("INVARIANT: default fixture pattern is a valid regex"));

/// Return the compiled [`DEFAULT_PATTERN`].
pub fn default_pattern() -> Regex {
    DEFAULT_REGEX.clone()
}

/// Errors raised while defining a group.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupError {
    #[error("group name must not be empty")]
    EmptyName,

    #[error("group `{group}` registers case `{case}` more than once")]
    DuplicateCase { group: String, case: String },

    #[error("group `{group}` registers an invalid case name `{case}`")]
    InvalidCaseName { group: String, case: String },
}

/// A named collection of fixtures sharing a root directory and inclusion pattern.
#[derive(Debug, Clone)]
pub struct FixtureGroup {
    name: String,
    root: PathBuf,
    pattern: Regex,
    exclude: BTreeSet<String>,
    cases: Vec<String>,
}

impl FixtureGroup {
    /// Define a group with the default pattern and no exclusions.
    ///
    /// `cases` keeps its order; it is the order cases are dispatched in. Case names are single path segments, so
    /// empty names and names containing a separator are rejected along with duplicates.
    pub fn new<I, S>(name: impl Into<String>, root: impl Into<PathBuf>, cases: I) -> Result<Self, GroupError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(GroupError::EmptyName);
        }

        let mut seen = BTreeSet::new();
        let mut ordered = Vec::new();
        for case in cases {
            let case = case.into();
            if case.is_empty() || case.contains(['/', '\\']) || case == "." || case == ".." {
                return Err(GroupError::InvalidCaseName { group: name, case });
            }
            if !seen.insert(case.clone()) {
                return Err(GroupError::DuplicateCase { group: name, case });
            }
            ordered.push(case);
        }

        Ok(Self {
            name,
            root: root.into(),
            pattern: default_pattern(),
            exclude: BTreeSet::new(),
            cases: ordered,
        })
    }

    /// Replace the inclusion pattern.
    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.pattern = pattern;
        self
    }

    /// Add entries that are never treated as fixtures, even when they match the pattern.
    pub fn with_exclude<I, S>(mut self, exclude: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(exclude.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn exclude(&self) -> &BTreeSet<String> {
        &self.exclude
    }

    /// Registered case names, in registration order.
    pub fn cases(&self) -> &[String] {
        &self.cases
    }

    /// Registered case names as a set, for coverage comparison.
    pub fn registered(&self) -> BTreeSet<String> {
        self.cases.iter().cloned().collect()
    }

    /// Path of the fixture directory backing `case`.
    pub fn fixture_path(&self, case: &str) -> PathBuf {
        self.root.join(case)
    }

    /// Stable identifier used by filters and reports: `group/case`.
    pub fn case_id(&self, case: &str) -> String {
        format!("{}/{}", self.name, case)
    }
}
