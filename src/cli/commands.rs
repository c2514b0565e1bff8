//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::io;
use std::path::Path;
use std::time::Duration;

use fixtest_core::FixtureGroup;
use regex::Regex;

use crate::cancel::CancelToken;
use crate::config::{ConfigError, DEFAULT_CONFIG_FILE, GroupConfig, SubjectConfig, SuiteConfig};
use crate::coverage;
use crate::executor::{ExecutorOptions, SuiteExecutor};
use crate::reporter::{ConsoleReporter, JsonReporter, SuiteReporter};
use crate::runner::CaseRunner;
use crate::scanner::{FixtureDiscovery, FsScanner};
use crate::subject::CommandSubject;

use super::{CliError, CliResult, ExitCode, OutputFormat, RunArgs, SuiteSource};

// ============================================================================
// Suite loading (shared between run and list)
// ============================================================================

/// Resolve the suite file and groups selected on the command line.
///
/// `--root` builds a single group whose registered cases are the scanned fixtures; otherwise the suite file named
/// by `--config`, or `./fixtest.toml`, supplies the groups.
fn load_suite(source: &SuiteSource) -> CliResult<(SuiteConfig, Vec<FixtureGroup>)> {
    let mut config = match &source.config {
        Some(path) => SuiteConfig::load(path).map_err(CliError::diagnostic)?,
        None if source.root.is_none() => {
            let path = Path::new(DEFAULT_CONFIG_FILE);
            if !path.is_file() {
                return Err(CliError::failure(format!(
                    "Error: no {DEFAULT_CONFIG_FILE} in the current directory; pass --config <FILE> or --root <DIR>"
                )));
            }
            SuiteConfig::load(path).map_err(CliError::diagnostic)?
        }
        None => SuiteConfig::default(),
    };

    if let Some(root) = &source.root {
        let root = std::path::absolute(root)
            .map_err(|e| CliError::failure(format!("Error: cannot resolve {}: {e}", root.display())))?;
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());
        config.groups = vec![GroupConfig {
            name,
            root,
            pattern: source.pattern.clone(),
            exclude: source.exclude.clone(),
            cases: None,
        }];
    }

    let groups = config.to_groups(&FsScanner).map_err(CliError::diagnostic)?;
    tracing::debug!(groups = groups.len(), "suite loaded");
    Ok((config, groups))
}

fn select_subject(args: &RunArgs, config: &SuiteConfig) -> CliResult<CommandSubject> {
    if let Some((program, rest)) = args.subject.split_first() {
        return Ok(CommandSubject::new(program).with_args(rest.iter().cloned()));
    }
    config
        .subject
        .as_ref()
        .map(SubjectConfig::to_subject)
        .ok_or_else(|| CliError::diagnostic(ConfigError::MissingSubject))
}

// ============================================================================
// run
// ============================================================================

/// Run the suite and map its verdict to the process exit code.
pub fn run_suite(args: RunArgs) -> CliResult<ExitCode> {
    let (config, groups) = load_suite(&args.source)?;
    let subject = select_subject(&args, &config)?;

    let mut runner_options = config.runner.runner_options().with_bless(args.bless);
    if let Some(secs) = args.timeout {
        runner_options = runner_options.with_timeout(Duration::from_secs(secs));
    }
    let filter = args
        .filter
        .as_deref()
        .map(Regex::new)
        .transpose()
        .map_err(|e| CliError::failure(format!("Error: invalid --filter: {e}")))?;
    let workers = args.workers.or(config.runner.workers).unwrap_or_else(num_cpus::get);
    let executor = SuiteExecutor::new(
        CaseRunner::new(subject, runner_options),
        ExecutorOptions::new()
            .with_workers(workers)
            .with_filter(filter)
            .with_fail_fast(args.fail_fast),
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::failure(format!("Error: failed to start runtime: {e}")))?;

    let mut reporter: Box<dyn SuiteReporter> = match args.format {
        OutputFormat::Console => Box::new(ConsoleReporter::stdout(args.verbose)),
        OutputFormat::Json => Box::new(JsonReporter::new(io::stdout())),
    };

    let cancel = CancelToken::new();
    let report = runtime.block_on(async {
        let interrupt = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, cancelling remaining cases");
                    cancel.cancel();
                }
            })
        };
        let report = executor.run_suite(&groups, &cancel, reporter.as_mut()).await;
        interrupt.abort();
        report
    });

    Ok(ExitCode(report.verdict().exit_code()))
}

// ============================================================================
// list
// ============================================================================

/// Print every group's fixtures with their registration status.
pub fn list_fixtures(source: &SuiteSource) -> CliResult<ExitCode> {
    let (_, groups) = load_suite(source)?;
    let (text, clean) = render_listing(&groups, &FsScanner);
    print!("{text}");
    Ok(if clean { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Render the listing; the flag is false when any group is out of sync with its root.
///
/// Fixtures on disk that are not registered are tagged `[unregistered]`, registered cases without a directory are
/// tagged `[missing]`.
pub fn render_listing(groups: &[FixtureGroup], discovery: &impl FixtureDiscovery) -> (String, bool) {
    let mut text = String::new();
    let mut clean = true;

    for group in groups {
        let _ = writeln!(text, "{} ({})", group.name(), group.root().display());
        let scanned = match discovery.scan_group(group) {
            Ok(scanned) => scanned,
            Err(e) => {
                clean = false;
                let _ = writeln!(text, "  error: {e}");
                continue;
            }
        };
        let registered = group.registered();
        let violation = coverage::verify(&scanned, &registered).err().unwrap_or_default();
        clean &= violation.is_empty();

        let all: BTreeSet<&String> = scanned.iter().chain(registered.iter()).collect();
        for name in all {
            let tag = if violation.missing.contains(name) {
                " [unregistered]"
            } else if violation.extra.contains(name) {
                " [missing]"
            } else {
                ""
            };
            let _ = writeln!(text, "  {name}{tag}");
        }
    }
    (text, clean)
}
