#![forbid(unsafe_code)]
//! fixtest: a directory-driven fixture test harness
//!
//! Every subdirectory of a group root is a test case. The harness scans the roots, checks that the fixtures on
//! disk match the registered cases, runs each fixture through a subject under test with a timeout, and compares
//! what the subject produced against golden files kept in the fixture.
//!
//! - [`scanner`]: enumerate fixture directories
//! - [`coverage`]: compare scanned fixtures with registered cases
//! - [`runner`]: run one fixture and judge it against its goldens
//! - [`executor`]: run whole suites on a worker pool
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **True invariants**: If a panic represents a harness bug (logic error), use `.expect("INVARIANT: reason")` with a
//!   clear explanation.
//!
//! A panic inside a subject is contained to the case that triggered it and reported as a crash.

pub mod cancel;
pub mod cli;
pub mod config;
pub mod coverage;
pub mod executor;
pub mod golden;
pub mod report;
pub mod reporter;
pub mod runner;
pub mod scanner;
pub mod subject;
pub mod version;

pub use fixtest_core::{
    CaseResult, CaseStatus, CoverageViolation, DEFAULT_PATTERN, ErrorCause, FixtureGroup, GroupError, StatusKind,
};

pub use cancel::CancelToken;
pub use config::{ConfigError, SuiteConfig};
pub use executor::{ExecutorOptions, SuiteExecutor};
pub use report::{SuiteReport, Verdict};
pub use reporter::{ConsoleReporter, JsonReporter, SuiteReporter};
pub use runner::{CaseRunner, RunnerOptions};
pub use scanner::{FixtureDiscovery, FsScanner, ScanError};
pub use subject::{CommandSubject, FnSubject, Subject, SubjectError, SubjectOutput};
