//! Case outcomes.
//!
//! `Failed` means the subject ran and its output diverged from the golden artifacts. `Error` means the case could
//! not be judged at all (timeout, crash, missing input). The two are kept apart so reports can tell a regression in
//! the subject from a broken test environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::serialize_millis;

/// Why a case ended in `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorCause {
    #[error("timed out after {:.1}s", .limit.as_secs_f64())]
    Timeout {
        #[serde(rename = "limit_ms", serialize_with = "serialize_millis")]
        limit: Duration,
    },

    #[error("cancelled before completion")]
    Cancelled,

    #[error("fixture directory not found: {}", .path.display())]
    MissingFixture { path: PathBuf },

    #[error("golden artifact not found: {}", .path.display())]
    MissingGolden { path: PathBuf },

    #[error("malformed golden artifact {}: {reason}", .path.display())]
    MalformedGolden { path: PathBuf, reason: String },

    #[error("subject crashed: {reason}")]
    Crashed { reason: String },

    #[error("subject could not be invoked: {reason}")]
    Subject { reason: String },
}

/// Terminal status of one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    Failed { diff: String },
    Error { cause: ErrorCause },
}

/// Discriminant of [`CaseStatus`], used for counting and for comparing outcomes across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Passed,
    Failed,
    Error,
}

impl CaseStatus {
    pub fn kind(&self) -> StatusKind {
        match self {
            CaseStatus::Passed => StatusKind::Passed,
            CaseStatus::Failed { .. } => StatusKind::Failed,
            CaseStatus::Error { .. } => StatusKind::Error,
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, CaseStatus::Passed)
    }
}

/// Outcome of running one fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseResult {
    #[serde(flatten)]
    pub status: CaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl CaseResult {
    pub fn passed(elapsed: Duration) -> Self {
        Self {
            status: CaseStatus::Passed,
            message: None,
            elapsed,
        }
    }

    pub fn failed(diff: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            status: CaseStatus::Failed { diff: diff.into() },
            message: None,
            elapsed,
        }
    }

    pub fn error(cause: ErrorCause, elapsed: Duration) -> Self {
        Self {
            message: Some(cause.to_string()),
            status: CaseStatus::Error { cause },
            elapsed,
        }
    }

    /// Attach a diagnostic message (e.g. captured stderr of a failing run).
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn kind(&self) -> StatusKind {
        self.status.kind()
    }
}
