//! Suite execution
//!
//! For every group the executor scans the root, verifies coverage, and queues the registered cases. A fixed pool of
//! workers pulls `(group, case)` jobs from a shared queue and runs each one in its own task, so a panicking subject
//! only takes down its own case. Workers never touch the report: they send events over a channel and the executor
//! is the single writer of all aggregation state.
//!
//! ## Cancellation
//!
//! Cancelling the token passed to [`SuiteExecutor::run_suite`] stops dispatch, makes idle workers drop queued jobs,
//! and interrupts in-flight subject invocations. Results that completed before the cancellation stay in the report;
//! cases that never started are recorded as not run.

use std::sync::Arc;
use std::time::Instant;

use fixtest_core::{CaseResult, CaseState, ErrorCause, FixtureGroup};
use regex::Regex;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

use crate::cancel::CancelToken;
use crate::coverage;
use crate::report::{CaseRecord, GroupReport, Interruption, SuiteReport};
use crate::reporter::SuiteReporter;
use crate::runner::CaseRunner;
use crate::scanner::{FixtureDiscovery, FsScanner};
use crate::subject::Subject;

/// Suite-level execution settings.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Number of cases run concurrently
    pub workers: usize,
    /// Only cases whose `group/case` id matches are run
    pub filter: Option<Regex>,
    /// Cancel the remaining cases after the first failure or error
    pub fail_fast: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            filter: None,
            fail_fast: false,
        }
    }
}

impl ExecutorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool size. Zero is treated as one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_filter(mut self, filter: Option<Regex>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

type CaseKey = (usize, usize);

struct Job {
    key: CaseKey,
    id: String,
    path: std::path::PathBuf,
}

enum Event {
    Started(CaseKey, String),
    Finished(CaseKey, String, CaseResult),
}

/// Orchestrates scanning, coverage verification and case execution across groups.
pub struct SuiteExecutor<S, D = FsScanner> {
    runner: CaseRunner<S>,
    discovery: D,
    options: ExecutorOptions,
}

impl<S: Subject> SuiteExecutor<S, FsScanner> {
    pub fn new(runner: CaseRunner<S>, options: ExecutorOptions) -> Self {
        Self {
            runner,
            discovery: FsScanner,
            options,
        }
    }
}

impl<S: Subject, D: FixtureDiscovery> SuiteExecutor<S, D> {
    /// Replace filesystem discovery.
    pub fn with_discovery<D2: FixtureDiscovery>(self, discovery: D2) -> SuiteExecutor<S, D2> {
        SuiteExecutor {
            runner: self.runner,
            discovery,
            options: self.options,
        }
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Scan and verify one group. Never fails: problems are recorded on the returned report.
    fn verify_group(&self, group: &FixtureGroup) -> GroupReport {
        let mut report = GroupReport::new(group);
        match self.discovery.scan_group(group) {
            Ok(scanned) => {
                if let Err(violation) = coverage::verify(&scanned, &group.registered()) {
                    tracing::warn!(group = group.name(), %violation, "coverage violation");
                    report.coverage = Some(violation);
                }
            }
            Err(e) => {
                tracing::warn!(group = group.name(), error = %e, "group root could not be scanned");
                report.scan_error = Some(e.to_string());
            }
        }
        report
    }

    /// Run every group and return the aggregated report.
    #[tracing::instrument(skip_all, fields(groups = groups.len(), workers = self.options.workers))]
    pub async fn run_suite(
        &self,
        groups: &[FixtureGroup],
        cancel: &CancelToken,
        reporter: &mut dyn SuiteReporter,
    ) -> SuiteReport {
        let start = Instant::now();
        reporter.on_suite_start(groups);

        // Structural checks for every group happen up front and do not depend on case execution.
        let mut group_reports = Vec::with_capacity(groups.len());
        let mut states: Vec<Vec<CaseState>> = Vec::with_capacity(groups.len());
        let mut selected: Vec<Vec<bool>> = Vec::with_capacity(groups.len());
        let mut jobs = Vec::new();

        for (gi, group) in groups.iter().enumerate() {
            let report = self.verify_group(group);
            reporter.on_group_verified(&report);
            group_reports.push(report);

            states.push(vec![CaseState::Pending; group.cases().len()]);
            let mut group_selected = Vec::with_capacity(group.cases().len());
            for (ci, case) in group.cases().iter().enumerate() {
                let id = group.case_id(case);
                let keep = self.options.filter.as_ref().is_none_or(|f| f.is_match(&id));
                group_selected.push(keep);
                if keep {
                    jobs.push(Job {
                        key: (gi, ci),
                        id,
                        path: group.fixture_path(case),
                    });
                }
            }
            selected.push(group_selected);
        }
        tracing::debug!(jobs = jobs.len(), "dispatching cases");

        // Internal token so fail-fast can stop the run without cancelling the caller's token.
        let run_cancel = CancelToken::new();
        let link = {
            let outer = cancel.clone();
            let inner = run_cancel.clone();
            tokio::spawn(async move {
                outer.cancelled().await;
                inner.cancel();
            })
        };

        let workers = self.options.workers.max(1);
        let (job_tx, job_rx) = mpsc::channel::<Job>(workers * 2);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

        let mut pool = JoinSet::new();
        for worker in 0..workers {
            let runner = self.runner.clone();
            let job_rx = Arc::clone(&job_rx);
            let event_tx = event_tx.clone();
            let cancel = run_cancel.clone();
            let fail_fast = self.options.fail_fast;
            pool.spawn(async move {
                loop {
                    let job = { job_rx.lock().await.recv().await };
                    let Some(job) = job else { break };
                    if cancel.is_cancelled() {
                        continue;
                    }
                    let _ = event_tx.send(Event::Started(job.key, job.id.clone()));
                    let result = run_isolated(&runner, &job, &cancel).await;
                    // Trip before reporting so no worker picks up another job after a failure.
                    if fail_fast && !result.status.is_passed() && !cancel.is_cancelled() {
                        tracing::info!(id = %job.id, "stopping after first failure");
                        cancel.cancel();
                    }
                    let _ = event_tx.send(Event::Finished(job.key, job.id, result));
                }
                tracing::trace!(worker, "worker drained");
            });
        }
        drop(event_tx);

        let dispatcher = {
            let cancel = run_cancel.clone();
            tokio::spawn(async move {
                for job in jobs {
                    if cancel.is_cancelled() {
                        break;
                    }
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        sent = job_tx.send(job) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                }
            })
        };

        let mut fail_fast_tripped = false;
        while let Some(event) = event_rx.recv().await {
            match event {
                Event::Started((gi, ci), id) => {
                    if let Err(e) = states[gi][ci].start() {
                        tracing::error!(%id, error = %e, "invalid case transition");
                        continue;
                    }
                    reporter.on_case_start(&id);
                }
                Event::Finished((gi, ci), id, result) => {
                    let state = &mut states[gi][ci];
                    if let Err(e) = state.finish(result) {
                        tracing::error!(%id, error = %e, "invalid case transition");
                        continue;
                    }
                    let Some(result) = state.result() else { continue };
                    reporter.on_case_complete(&id, result);
                    if self.options.fail_fast && !result.status.is_passed() && !cancel.is_cancelled() {
                        fail_fast_tripped = true;
                    }
                }
            }
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "worker task failed");
            }
        }
        let _ = dispatcher.await;
        link.abort();

        for (gi, group) in groups.iter().enumerate() {
            let report = &mut group_reports[gi];
            report.cases = group
                .cases()
                .iter()
                .enumerate()
                .map(|(ci, case)| {
                    if !selected[gi][ci] {
                        return CaseRecord::filtered(case.clone());
                    }
                    match std::mem::take(&mut states[gi][ci]) {
                        CaseState::Finished(result) => CaseRecord::finished(case.clone(), result),
                        CaseState::Pending => CaseRecord::not_run(case.clone()),
                        CaseState::Running => {
                            tracing::error!(case = %case, "case never reported a result");
                            CaseRecord::not_run(case.clone())
                        }
                    }
                })
                .collect();
            report.recount();
        }

        let interrupted = if cancel.is_cancelled() {
            Some(Interruption::Cancelled)
        } else if fail_fast_tripped {
            Some(Interruption::FailFast)
        } else {
            None
        };

        let report = SuiteReport {
            groups: group_reports,
            elapsed: start.elapsed(),
            interrupted,
        };
        reporter.on_suite_complete(&report);
        report
    }
}

/// Run one case in its own task so a panic in the subject is contained to that case.
async fn run_isolated<S: Subject>(runner: &CaseRunner<S>, job: &Job, cancel: &CancelToken) -> CaseResult {
    let started = Instant::now();
    let task = {
        let runner = runner.clone();
        let path = job.path.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { runner.run(&path, &cancel).await })
    };
    match task.await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(id = %job.id, error = %e, "case task aborted");
            let reason = if e.is_panic() {
                "subject panicked".to_string()
            } else {
                e.to_string()
            };
            CaseResult::error(ErrorCause::Crashed { reason }, started.elapsed())
        }
    }
}
