//! Suite report
//!
//! The aggregated outcome of one run: per-group case records and counts, structural errors (coverage drift and
//! unreadable roots), and an overall verdict that maps to the process exit code.

use std::path::PathBuf;
use std::time::Duration;

use fixtest_core::{CaseResult, CoverageViolation, FixtureGroup, StatusKind, serialize_millis};
use serde::Serialize;
use thiserror::Error;

/// Where a case ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Finished,
    /// Never dispatched because the run was interrupted.
    NotRun,
    /// Excluded by the case filter.
    Filtered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseRecord {
    pub name: String,
    pub state: RecordState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<CaseResult>,
}

impl CaseRecord {
    pub fn finished(name: impl Into<String>, result: CaseResult) -> Self {
        Self {
            name: name.into(),
            state: RecordState::Finished,
            result: Some(result),
        }
    }

    pub fn not_run(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RecordState::NotRun,
            result: None,
        }
    }

    pub fn filtered(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RecordState::Filtered,
            result: None,
        }
    }
}

/// Per-group tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub not_run: usize,
    pub filtered: usize,
}

impl Counts {
    fn add(&mut self, other: &Counts) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
        self.errored += other.errored;
        self.not_run += other.not_run;
        self.filtered += other.filtered;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub name: String,
    pub root: PathBuf,
    pub pattern: String,
    pub counts: Counts,
    pub cases: Vec<CaseRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageViolation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_error: Option<String>,
}

impl GroupReport {
    pub fn new(group: &FixtureGroup) -> Self {
        Self {
            name: group.name().to_string(),
            root: group.root().to_path_buf(),
            pattern: group.pattern().as_str().to_string(),
            counts: Counts::default(),
            cases: Vec::new(),
            coverage: None,
            scan_error: None,
        }
    }

    /// Recompute `counts` from `cases`.
    pub fn recount(&mut self) {
        let mut counts = Counts {
            total: self.cases.len(),
            ..Counts::default()
        };
        for case in &self.cases {
            match (case.state, case.result.as_ref().map(CaseResult::kind)) {
                (RecordState::Finished, Some(StatusKind::Passed)) => counts.passed += 1,
                (RecordState::Finished, Some(StatusKind::Failed)) => counts.failed += 1,
                (RecordState::Finished, Some(StatusKind::Error)) => counts.errored += 1,
                (RecordState::Filtered, _) => counts.filtered += 1,
                _ => counts.not_run += 1,
            }
        }
        self.counts = counts;
    }

    pub fn structural_errors(&self) -> Vec<StructuralError> {
        let mut errors = Vec::new();
        if let Some(message) = &self.scan_error {
            errors.push(StructuralError::Scan {
                group: self.name.clone(),
                message: message.clone(),
            });
        }
        if let Some(violation) = &self.coverage {
            errors.push(StructuralError::Coverage {
                group: self.name.clone(),
                violation: violation.clone(),
            });
        }
        errors
    }
}

/// Defects of the suite definition itself, reported apart from case outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("group `{group}`: {violation}")]
    Coverage {
        group: String,
        violation: CoverageViolation,
    },

    #[error("group `{group}`: {message}")]
    Scan { group: String, message: String },
}

/// Why a run stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Interruption {
    Cancelled,
    FailFast,
}

/// Overall outcome, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed,
    Cancelled,
}

impl Verdict {
    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Passed => 0,
            Verdict::Failed => 1,
            Verdict::Cancelled => 130,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteReport {
    pub groups: Vec<GroupReport>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrupted: Option<Interruption>,
}

impl SuiteReport {
    pub fn totals(&self) -> Counts {
        let mut totals = Counts::default();
        for group in &self.groups {
            totals.add(&group.counts);
        }
        totals
    }

    pub fn structural_errors(&self) -> Vec<StructuralError> {
        self.groups.iter().flat_map(GroupReport::structural_errors).collect()
    }

    /// Worst outcome across all groups.
    ///
    /// A user cancellation dominates; otherwise any failed or errored case, any structural error, or cases left
    /// unrun by fail-fast make the suite fail.
    pub fn verdict(&self) -> Verdict {
        if self.interrupted == Some(Interruption::Cancelled) {
            return Verdict::Cancelled;
        }
        let totals = self.totals();
        let clean = totals.failed == 0
            && totals.errored == 0
            && totals.not_run == 0
            && self.structural_errors().is_empty();
        if clean { Verdict::Passed } else { Verdict::Failed }
    }

    /// Serialize as pretty JSON, including the derived totals and verdict.
    pub fn to_json(&self) -> serde_json::Result<String> {
        #[derive(Serialize)]
        struct Envelope<'a> {
            verdict: Verdict,
            totals: Counts,
            structural_errors: Vec<String>,
            #[serde(flatten)]
            report: &'a SuiteReport,
        }

        serde_json::to_string_pretty(&Envelope {
            verdict: self.verdict(),
            totals: self.totals(),
            structural_errors: self.structural_errors().iter().map(ToString::to_string).collect(),
            report: self,
        })
    }
}
