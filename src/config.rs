//! Suite configuration
//!
//! A suite is described by a TOML file, `fixtest.toml` by convention:
//!
//! ```toml
//! [subject]
//! command = "cinterop"
//! args = ["-def", "{fixture}/pod1.def", "-o", "{out}/out"]
//!
//! [runner]
//! workers = 8
//! timeout_secs = 60
//! stdout_golden = "contents.gold.txt"
//!
//! [[group]]
//! name = "simpleDefs"
//! root = "testData/CInterop/simple/simpleDefs"
//! cases = ["filterA", "filterAB", "full", "modulesA"]
//! ```
//!
//! Relative group roots are resolved against the directory holding the file. A group without `cases` registers
//! whatever its root contains at load time; when that root cannot be read the group registers nothing and the scan
//! failure surfaces as a structural error when the suite runs.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fixtest_core::{FixtureGroup, GroupError};
use miette::{Diagnostic, NamedSource, SourceSpan};
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::golden::GoldenLayout;
use crate::runner::RunnerOptions;
use crate::scanner::FixtureDiscovery;
use crate::subject::CommandSubject;

/// Conventional config file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "fixtest.toml";

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    #[diagnostic(code(fixtest::config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid suite file: {message}")]
    #[diagnostic(code(fixtest::config::parse))]
    Parse {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: Option<SourceSpan>,
    },

    #[error("group `{group}` has an invalid pattern")]
    #[diagnostic(code(fixtest::config::pattern), help("patterns use Rust `regex` syntax"))]
    InvalidPattern {
        group: String,
        #[source]
        source: regex::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(fixtest::config::group))]
    Group(#[from] GroupError),

    #[error("group `{0}` is defined more than once")]
    #[diagnostic(code(fixtest::config::duplicate_group))]
    DuplicateGroup(String),

    #[error("no subject configured")]
    #[diagnostic(
        code(fixtest::config::subject),
        help("add a [subject] table or pass the command after `--`")
    )]
    MissingSubject,
}

/// `[subject]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubjectConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl SubjectConfig {
    pub fn to_subject(&self) -> CommandSubject {
        CommandSubject::new(&self.command)
            .with_args(self.args.iter().cloned())
            .with_env(self.env.clone())
    }
}

/// `[runner]`. Every key is optional; unset keys keep the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    pub workers: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub stdout_golden: Option<String>,
    pub stderr_golden: Option<String>,
    pub exit_golden: Option<String>,
    pub artifact_suffix: Option<String>,
}

impl RunnerConfig {
    pub fn golden_layout(&self) -> GoldenLayout {
        let mut layout = GoldenLayout::default();
        if let Some(name) = &self.stdout_golden {
            layout.stdout = name.clone();
        }
        if let Some(name) = &self.stderr_golden {
            layout.stderr = name.clone();
        }
        if let Some(name) = &self.exit_golden {
            layout.exit_code = name.clone();
        }
        if let Some(suffix) = &self.artifact_suffix {
            layout.artifact_suffix = suffix.clone();
        }
        layout
    }

    pub fn runner_options(&self) -> RunnerOptions {
        let options = RunnerOptions::new().with_golden(self.golden_layout());
        match self.timeout_secs {
            Some(secs) => options.with_timeout(Duration::from_secs(secs)),
            None => options,
        }
    }
}

/// One `[[group]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub name: String,
    pub root: PathBuf,
    pub pattern: Option<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    /// `None` registers the scanned set.
    pub cases: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteConfig {
    pub subject: Option<SubjectConfig>,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default, rename = "group")]
    pub groups: Vec<GroupConfig>,
    /// Directory relative roots are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl SuiteConfig {
    /// Read and parse a suite file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        tracing::debug!(path = %path.display(), "loading suite file");
        Self::parse(&source, &path.display().to_string(), base_dir)
    }

    /// Parse suite TOML. `name` labels the source in diagnostics.
    pub fn parse(source: &str, name: &str, base_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let mut config: SuiteConfig = toml::from_str(source).map_err(|e| ConfigError::Parse {
            message: e.message().to_string(),
            src: NamedSource::new(name, source.to_string()),
            span: e.span().map(SourceSpan::from),
        })?;
        config.base_dir = base_dir.into();
        Ok(config)
    }

    pub fn resolve_root(&self, root: &Path) -> PathBuf {
        if root.is_absolute() {
            root.to_path_buf()
        } else {
            self.base_dir.join(root)
        }
    }

    /// Build the fixture groups, scanning roots of groups that do not list their cases.
    pub fn to_groups(&self, discovery: &impl FixtureDiscovery) -> Result<Vec<FixtureGroup>, ConfigError> {
        let mut names = BTreeSet::new();
        let mut groups = Vec::with_capacity(self.groups.len());

        for entry in &self.groups {
            if !names.insert(entry.name.as_str()) {
                return Err(ConfigError::DuplicateGroup(entry.name.clone()));
            }
            let pattern = match &entry.pattern {
                Some(p) => Regex::new(p).map_err(|source| ConfigError::InvalidPattern {
                    group: entry.name.clone(),
                    source,
                })?,
                None => fixtest_core::default_pattern(),
            };
            let root = self.resolve_root(&entry.root);
            let exclude: BTreeSet<String> = entry.exclude.iter().cloned().collect();

            // An unscannable root registers nothing here; the executor reports it against this group only.
            let cases = match &entry.cases {
                Some(cases) => cases.clone(),
                None => match discovery.scan(&root, &pattern, &exclude) {
                    Ok(scanned) => scanned.into_iter().collect(),
                    Err(e) => {
                        tracing::warn!(group = %entry.name, error = %e, "could not register cases from group root");
                        Vec::new()
                    }
                },
            };

            groups.push(
                FixtureGroup::new(&entry.name, root, cases)?
                    .with_pattern(pattern)
                    .with_exclude(exclude),
            );
        }
        Ok(groups)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::scanner::FsScanner;

    const SAMPLE: &str = r#"
[subject]
command = "cinterop"
args = ["-def", "{fixture}/pod1.def", "-o", "{out}/out"]

[runner]
workers = 8
timeout_secs = 5
stdout_golden = "contents.gold.txt"

[[group]]
name = "simpleDefs"
root = "testData/CInterop/simple/simpleDefs"
exclude = ["_scratch"]
cases = ["filterA", "filterAB", "full", "modulesA"]
"#;

    #[test]
    fn test_parse_sample() {
        let config = SuiteConfig::parse(SAMPLE, "fixtest.toml", "/suite").unwrap();
        let subject = config.subject.as_ref().unwrap();
        assert_eq!(subject.command, "cinterop");
        assert_eq!(subject.args.len(), 4);
        assert_eq!(config.runner.workers, Some(8));
        assert_eq!(config.groups.len(), 1);
        assert_eq!(config.groups[0].cases.as_ref().unwrap().len(), 4);
    }

    #[test]
    fn test_runner_options_from_config() {
        let config = SuiteConfig::parse(SAMPLE, "fixtest.toml", "/suite").unwrap();
        let options = config.runner.runner_options();
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.golden.stdout, "contents.gold.txt");
        assert_eq!(options.golden.stderr, GoldenLayout::default().stderr);
    }

    #[test]
    fn test_relative_roots_resolve_against_config_dir() {
        let config = SuiteConfig::parse(SAMPLE, "fixtest.toml", "/suite").unwrap();
        let groups = config.to_groups(&FsScanner).unwrap();
        assert_eq!(
            groups[0].root(),
            Path::new("/suite/testData/CInterop/simple/simpleDefs")
        );
        assert!(groups[0].exclude().contains("_scratch"));
    }

    #[test]
    fn test_parse_error_carries_span() {
        let err = SuiteConfig::parse("[runner]\nworkers = \"many\"\n", "bad.toml", ".").unwrap_err();
        match err {
            ConfigError::Parse { span, .. } => assert!(span.is_some()),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = SuiteConfig::parse("[runner]\nthreads = 4\n", "bad.toml", ".").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_duplicate_group_rejected() {
        let source = r#"
[[group]]
name = "g"
root = "a"
cases = []

[[group]]
name = "g"
root = "b"
cases = []
"#;
        let config = SuiteConfig::parse(source, "dup.toml", ".").unwrap();
        let err = config.to_groups(&FsScanner).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateGroup(name) if name == "g"));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let source = "[[group]]\nname = \"g\"\nroot = \"a\"\npattern = \"(\"\ncases = []\n";
        let config = SuiteConfig::parse(source, "pat.toml", ".").unwrap();
        assert!(matches!(
            config.to_groups(&FsScanner).unwrap_err(),
            ConfigError::InvalidPattern { .. }
        ));
    }

    #[test]
    fn test_group_without_cases_registers_scanned_set() {
        let tmp = tempfile::tempdir().unwrap();
        for dir in ["b1", "a1", "_ignored"] {
            fs::create_dir(tmp.path().join(dir)).unwrap();
        }
        let source = "[[group]]\nname = \"g\"\nroot = \".\"\n";
        let config = SuiteConfig::parse(source, "dyn.toml", tmp.path()).unwrap();
        let groups = config.to_groups(&FsScanner).unwrap();
        assert_eq!(groups[0].cases(), ["a1".to_string(), "b1".to_string()]);
    }

    #[test]
    fn test_unscannable_dynamic_group_does_not_reject_suite() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("a1")).unwrap();
        let source = r#"
[[group]]
name = "good"
root = "."
cases = ["a1"]

[[group]]
name = "dyn"
root = "gone"
"#;
        let config = SuiteConfig::parse(source, "mixed.toml", tmp.path()).unwrap();
        let groups = config.to_groups(&FsScanner).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].cases(), ["a1".to_string()]);
        assert!(groups[1].cases().is_empty());
    }

    #[test]
    fn test_load_reports_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = SuiteConfig::load(&tmp.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
