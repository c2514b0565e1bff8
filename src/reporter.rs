//! Progress and summary reporting
//!
//! ## SuiteReporter Trait
//!
//! The executor reports through the `SuiteReporter` trait so output format is independent of execution. All
//! callbacks are made from the executor's aggregation loop, one at a time, so implementations need no locking.
//!
//! - [`ConsoleReporter`]: pytest-style progress and summary for humans.
//! - [`JsonReporter`]: a single JSON document at the end, for CI.

use std::io::{self, Write};

use fixtest_core::{CaseResult, CaseStatus, FixtureGroup};

use crate::report::{GroupReport, SuiteReport, Verdict};

/// Receives progress events from the executor.
pub trait SuiteReporter {
    /// Called once before any group is scanned
    fn on_suite_start(&mut self, _groups: &[FixtureGroup]) {}

    /// Called after a group's coverage check, before its cases run
    fn on_group_verified(&mut self, _group: &GroupReport) {}

    /// Called when a case moves to `Running`
    fn on_case_start(&mut self, _id: &str) {}

    /// Called exactly once per case that reached a terminal state
    fn on_case_complete(&mut self, id: &str, result: &CaseResult);

    /// Called once with the final report
    fn on_suite_complete(&mut self, report: &SuiteReport);
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullReporter;

impl SuiteReporter for NullReporter {
    fn on_case_complete(&mut self, _id: &str, _result: &CaseResult) {}

    fn on_suite_complete(&mut self, _report: &SuiteReport) {}
}

// ============================================================================
// Console
// ============================================================================

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Console reporter (pytest-style)
pub struct ConsoleReporter<W: Write> {
    out: W,
    verbose: bool,
    color: bool,
    failures: Vec<(String, CaseResult)>,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout(verbose: bool) -> Self {
        use std::io::IsTerminal;
        let color = io::stdout().is_terminal();
        Self::new(io::stdout(), verbose, color)
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, verbose: bool, color: bool) -> Self {
        Self {
            out,
            verbose,
            color,
            failures: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.color {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn status_label(&self, result: &CaseResult) -> String {
        let label = match &result.status {
            CaseStatus::Passed => self.paint(GREEN, "PASSED"),
            CaseStatus::Failed { .. } => self.paint(RED, "FAILED"),
            CaseStatus::Error { .. } => self.paint(YELLOW, "ERROR"),
        };
        if self.verbose {
            format!("{label} ({}ms)", result.elapsed.as_millis())
        } else {
            label
        }
    }

    /// Summary block printed after all cases finished.
    pub fn render_summary(&self, report: &SuiteReport) -> String {
        let mut text = String::new();

        if !self.failures.is_empty() {
            text.push('\n');
            text.push_str(&self.paint(BOLD, "=================== FAILURES ==================="));
            text.push('\n');
            for (id, result) in &self.failures {
                text.push_str(&format!("\n___________ {id} ___________\n"));
                match &result.status {
                    CaseStatus::Failed { diff } => text.push_str(diff),
                    CaseStatus::Error { cause } => text.push_str(&format!("{cause}\n")),
                    CaseStatus::Passed => {}
                }
                if let Some(message) = &result.message {
                    if !matches!(result.status, CaseStatus::Error { .. }) || self.verbose {
                        text.push_str(&format!("{}\n", message.trim_end()));
                    }
                }
            }
        }

        let structural = report.structural_errors();
        if !structural.is_empty() {
            text.push('\n');
            text.push_str(&self.paint(BOLD, "=============== STRUCTURAL ERRORS ==============="));
            text.push('\n');
            for error in &structural {
                text.push_str(&format!("{error}\n"));
            }
        }

        text.push('\n');
        for group in &report.groups {
            let c = group.counts;
            text.push_str(&format!(
                "{}: {} passed, {} failed, {} errors",
                group.name, c.passed, c.failed, c.errored
            ));
            if c.not_run > 0 {
                text.push_str(&format!(", {} not run", c.not_run));
            }
            if c.filtered > 0 {
                text.push_str(&format!(", {} filtered", c.filtered));
            }
            text.push('\n');
        }

        let totals = report.totals();
        let mut parts = Vec::new();
        if totals.passed > 0 {
            parts.push(format!("{} passed", totals.passed));
        }
        if totals.failed > 0 {
            parts.push(format!("{} failed", totals.failed));
        }
        if totals.errored > 0 {
            parts.push(format!("{} errors", totals.errored));
        }
        if !structural.is_empty() {
            parts.push(format!("{} structural", structural.len()));
        }
        if totals.not_run > 0 {
            parts.push(format!("{} not run", totals.not_run));
        }
        if parts.is_empty() {
            parts.push("no cases run".to_string());
        }
        let line = format!(
            "====== {} in {:.2}s ======",
            parts.join(", "),
            report.elapsed.as_secs_f64()
        );
        let color = match report.verdict() {
            Verdict::Passed => GREEN,
            Verdict::Failed => RED,
            Verdict::Cancelled => YELLOW,
        };
        text.push_str(&self.paint(color, &line));
        text.push('\n');
        if report.verdict() == Verdict::Cancelled {
            text.push_str("run cancelled; completed results retained\n");
        }
        text
    }
}

impl<W: Write> SuiteReporter for ConsoleReporter<W> {
    fn on_suite_start(&mut self, groups: &[FixtureGroup]) {
        let cases: usize = groups.iter().map(|g| g.cases().len()).sum();
        let header = self.paint(BOLD, "=================== fixture session starts ===================");
        let _ = writeln!(self.out, "{header}");
        let _ = writeln!(self.out, "collected {} group(s), {} case(s)", groups.len(), cases);
    }

    fn on_group_verified(&mut self, group: &GroupReport) {
        if self.verbose {
            let _ = writeln!(self.out, "{} ({})", group.name, group.root.display());
        }
    }

    fn on_case_start(&mut self, id: &str) {
        tracing::trace!(%id, "case started");
    }

    fn on_case_complete(&mut self, id: &str, result: &CaseResult) {
        let label = self.status_label(result);
        let _ = writeln!(self.out, "{id} {label}");
        if !result.status.is_passed() {
            self.failures.push((id.to_string(), result.clone()));
        }
    }

    fn on_suite_complete(&mut self, report: &SuiteReport) {
        let summary = self.render_summary(report);
        let _ = write!(self.out, "{summary}");
        let _ = self.out.flush();
    }
}

// ============================================================================
// JSON
// ============================================================================

/// Writes the final report as one JSON document.
pub struct JsonReporter<W: Write> {
    out: W,
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SuiteReporter for JsonReporter<W> {
    fn on_case_complete(&mut self, id: &str, result: &CaseResult) {
        tracing::debug!(%id, status = ?result.kind(), "case complete");
    }

    fn on_suite_complete(&mut self, report: &SuiteReport) {
        match report.to_json() {
            Ok(json) => {
                let _ = writeln!(self.out, "{json}");
                let _ = self.out.flush();
            }
            Err(e) => tracing::error!(error = %e, "failed to serialize report"),
        }
    }
}
