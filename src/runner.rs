//! Single-case execution
//!
//! Runs one fixture through the subject and judges the result against the fixture's golden artifacts. The runner
//! holds no per-case state, so a fixture can be run any number of times and, with the subject unchanged, yields
//! the same status each time. Fixtures are only written to in bless mode.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use fixtest_core::{CaseResult, ErrorCause};

use crate::cancel::CancelToken;
use crate::golden::{self, GoldenLayout};
use crate::subject::Subject;

/// Default per-case time limit.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-case execution settings.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Upper bound on a single subject invocation
    pub timeout: Duration,
    /// Golden file names inside each fixture
    pub golden: GoldenLayout,
    /// Overwrite goldens with actual output instead of comparing
    pub bless: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            golden: GoldenLayout::default(),
            bless: false,
        }
    }
}

impl RunnerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_golden(mut self, golden: GoldenLayout) -> Self {
        self.golden = golden;
        self
    }

    pub fn with_bless(mut self, bless: bool) -> Self {
        self.bless = bless;
        self
    }
}

/// Runs fixtures against an injected subject.
pub struct CaseRunner<S> {
    subject: Arc<S>,
    options: RunnerOptions,
}

impl<S> Clone for CaseRunner<S> {
    fn clone(&self) -> Self {
        Self {
            subject: Arc::clone(&self.subject),
            options: self.options.clone(),
        }
    }
}

impl<S: Subject> CaseRunner<S> {
    pub fn new(subject: S, options: RunnerOptions) -> Self {
        Self {
            subject: Arc::new(subject),
            options,
        }
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    pub fn subject(&self) -> &S {
        &self.subject
    }

    /// Run the fixture at `fixture` to a terminal result.
    ///
    /// Never panics on subject misbehavior and never blocks past the configured timeout or a cancellation.
    #[tracing::instrument(skip_all, fields(fixture = %fixture.display()))]
    pub async fn run(&self, fixture: &Path, cancel: &CancelToken) -> CaseResult {
        let start = Instant::now();

        if cancel.is_cancelled() {
            return CaseResult::error(ErrorCause::Cancelled, start.elapsed());
        }
        if !fixture.is_dir() {
            return CaseResult::error(
                ErrorCause::MissingFixture {
                    path: fixture.to_path_buf(),
                },
                start.elapsed(),
            );
        }

        let expected = if self.options.bless {
            None
        } else {
            match golden::load(fixture, &self.options.golden) {
                Ok(expected) => Some(expected),
                Err(cause) => return CaseResult::error(cause, start.elapsed()),
            }
        };

        let invocation = tokio::time::timeout(self.options.timeout, self.subject.invoke(fixture));
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("cancelled while subject was running");
                return CaseResult::error(ErrorCause::Cancelled, start.elapsed());
            }
            outcome = invocation => outcome,
        };

        let output = match outcome {
            Err(_) => {
                tracing::debug!(limit = ?self.options.timeout, "subject timed out");
                return CaseResult::error(
                    ErrorCause::Timeout {
                        limit: self.options.timeout,
                    },
                    start.elapsed(),
                );
            }
            Ok(Err(e)) => {
                return CaseResult::error(ErrorCause::Subject { reason: e.to_string() }, start.elapsed());
            }
            Ok(Ok(output)) => output,
        };

        if output.exit_code.is_none() {
            let result = CaseResult::error(
                ErrorCause::Crashed {
                    reason: "terminated without an exit code".to_string(),
                },
                start.elapsed(),
            );
            return if output.stderr.is_empty() {
                result
            } else {
                result.with_message(output.stderr)
            };
        }

        let Some(expected) = expected else {
            return match golden::bless(fixture, &self.options.golden, &output) {
                Ok(written) => {
                    tracing::info!(files = written.len(), "blessed golden artifacts");
                    CaseResult::passed(start.elapsed())
                }
                Err(e) => CaseResult::error(
                    ErrorCause::MalformedGolden {
                        path: fixture.to_path_buf(),
                        reason: format!("could not write goldens: {e}"),
                    },
                    start.elapsed(),
                ),
            };
        };

        let mismatches = golden::compare(&expected, &output, &self.options.golden);
        if mismatches.is_empty() {
            CaseResult::passed(start.elapsed())
        } else {
            let result = CaseResult::failed(golden::render_mismatches(&mismatches), start.elapsed());
            if output.stderr.trim().is_empty() {
                result
            } else {
                result.with_message(output.stderr)
            }
        }
    }
}
