//! CLI module for the fixtest harness
//!
//! ## Commands
//!
//! - `run` - Scan, verify and execute every fixture group
//! - `list` - Show the fixtures found on disk and how they line up with the registered cases
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::version::FIXTEST_VERSION;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }

    /// Render a diagnostic with miette's graphical handler.
    pub fn diagnostic(err: impl miette::Diagnostic + Send + Sync + 'static) -> Self {
        Self::failure(format!("{:?}", miette::Report::new(err)))
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Directory-driven fixture test harness
#[derive(Parser, Debug)]
#[command(name = "fixtest")]
#[command(version = FIXTEST_VERSION)]
#[command(about = "Discover fixture directories, verify their registration, and check them against goldens", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Where the fixture groups come from.
#[derive(Args, Debug, Clone, Default)]
pub struct SuiteSource {
    /// Suite file (default: ./fixtest.toml)
    #[arg(long, value_name = "FILE", conflicts_with = "root")]
    pub config: Option<PathBuf>,

    /// Treat one directory as a group whose fixtures are whatever it contains
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Fixture name pattern for --root
    #[arg(long, value_name = "REGEX", requires = "root")]
    pub pattern: Option<String>,

    /// Entry under --root that is never a fixture (repeatable)
    #[arg(long, value_name = "NAME", requires = "root")]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Console,
    Json,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SuiteSource,

    /// Number of cases run concurrently (default: number of CPUs)
    #[arg(short = 'j', long, value_name = "N")]
    pub workers: Option<usize>,

    /// Per-case time limit in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Only run cases whose `group/case` id matches
    #[arg(short = 'k', long, value_name = "REGEX")]
    pub filter: Option<String>,

    /// Overwrite goldens with the actual output
    #[arg(long)]
    pub bless: bool,

    /// Stop on first failure
    #[arg(short = 'x', long = "exitfirst")]
    pub fail_fast: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Console)]
    pub format: OutputFormat,

    /// Subject command and arguments, overriding the suite file
    #[arg(last = true, value_name = "SUBJECT")]
    pub subject: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the suite
    Run(RunArgs),

    /// List fixtures and their registration status
    List {
        #[command(flatten)]
        source: SuiteSource,
    },
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Command::Run(args) => commands::run_suite(args),
        Command::List { source } => commands::list_fixtures(&source),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run_defaults() {
        let cli = Cli::try_parse_from(["fixtest", "run"]).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("Expected Run command");
        };
        assert_eq!(args.format, OutputFormat::Console);
        assert!(args.subject.is_empty());
        assert!(!args.bless);
    }

    #[test]
    fn test_cli_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "fixtest", "run", "--root", "testData", "-x", "-v", "-k", "filter", "-j", "4", "--timeout", "10",
            "--format", "json",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("Expected Run command");
        };
        assert_eq!(args.source.root, Some(PathBuf::from("testData")));
        assert!(args.fail_fast);
        assert!(args.verbose);
        assert_eq!(args.filter.as_deref(), Some("filter"));
        assert_eq!(args.workers, Some(4));
        assert_eq!(args.timeout, Some(10));
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn test_cli_parse_trailing_subject() {
        let cli = Cli::try_parse_from(["fixtest", "run", "--root", "t", "--", "cinterop", "-def", "{fixture}/a.def"])
            .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("Expected Run command");
        };
        assert_eq!(args.subject, ["cinterop", "-def", "{fixture}/a.def"]);
    }

    #[test]
    fn test_cli_parse_list() {
        let cli = Cli::try_parse_from(["fixtest", "list", "--config", "suite.toml"]).unwrap();
        let Command::List { source } = cli.command else {
            panic!("Expected List command");
        };
        assert_eq!(source.config, Some(PathBuf::from("suite.toml")));
    }

    #[test]
    fn test_cli_pattern_requires_root() {
        assert!(Cli::try_parse_from(["fixtest", "list", "--pattern", "^a"]).is_err());
        assert!(Cli::try_parse_from(["fixtest", "list", "--config", "a.toml", "--root", "b"]).is_err());
    }
}
