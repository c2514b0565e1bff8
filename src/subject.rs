//! Subject under test
//!
//! The harness never knows what the subject does with a fixture. It hands over the fixture directory and gets back
//! whatever the subject printed, its exit code, and any files it produced. Two implementations ship with the crate:
//!
//! - [`CommandSubject`]: spawns an external program once per fixture.
//! - [`FnSubject`]: wraps a closure, mainly for exercising the harness itself.

use std::collections::BTreeMap;
use std::fs;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised when the subject cannot be invoked at all
#[derive(Debug, Error)]
pub enum SubjectError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to prepare scratch directory: {0}")]
    Scratch(#[source] io::Error),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// A file produced by the subject, identified by its path relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub contents: String,
}

/// Everything the subject produced for one fixture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub artifacts: Vec<Artifact>,
}

impl SubjectOutput {
    /// Output of a run that exited with status 0.
    pub fn new(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
            artifacts: Vec::new(),
        }
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    pub fn with_exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }

    pub fn with_artifact(mut self, name: impl Into<String>, contents: impl Into<String>) -> Self {
        self.artifacts.push(Artifact {
            name: name.into(),
            contents: contents.into(),
        });
        self
    }
}

/// The external collaborator a fixture is run against.
///
/// Implementations must tolerate being dropped mid-flight: the runner abandons the returned future on timeout or
/// cancellation.
pub trait Subject: Send + Sync + 'static {
    fn invoke(&self, fixture: &Path) -> impl Future<Output = Result<SubjectOutput, SubjectError>> + Send;
}

// ============================================================================
// Process subject
// ============================================================================

/// Run an external program once per fixture.
///
/// Arguments may contain placeholders:
/// - `{fixture}`: absolute path of the fixture directory
/// - `{name}`: fixture directory name
/// - `{out}`: a fresh scratch directory; every file written there is returned as an [`Artifact`]
///
/// The process runs with the fixture directory as its working directory, a null stdin, and is killed if the
/// invocation is abandoned.
#[derive(Debug, Clone)]
pub struct CommandSubject {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
}

impl CommandSubject {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_env<I, K, V>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env.extend(env.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Resolve the program so the changed working directory does not affect it.
    ///
    /// Bare names are left to `PATH` lookup; relative paths are anchored at the harness working directory.
    fn resolved_program(&self) -> PathBuf {
        let program = Path::new(&self.program);
        if program.components().count() > 1 && program.is_relative() {
            std::path::absolute(program).unwrap_or_else(|_| program.to_path_buf())
        } else {
            program.to_path_buf()
        }
    }
}

impl Subject for CommandSubject {
    fn invoke(&self, fixture: &Path) -> impl Future<Output = Result<SubjectOutput, SubjectError>> + Send {
        async move {
            let fixture = std::path::absolute(fixture).map_err(|source| SubjectError::Io {
                path: fixture.to_path_buf(),
                source,
            })?;
            let name = fixture
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            let out_dir = tempfile::Builder::new()
                .prefix("fixtest-out-")
                .tempdir()
                .map_err(SubjectError::Scratch)?;

            let args: Vec<String> = self
                .args
                .iter()
                .map(|arg| expand_placeholders(arg, &fixture, &name, out_dir.path()))
                .collect();
            tracing::debug!(program = %self.program, ?args, fixture = %fixture.display(), "spawning subject");

            let output = tokio::process::Command::new(self.resolved_program())
                .args(&args)
                .envs(&self.env)
                .current_dir(&fixture)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|source| SubjectError::Spawn {
                    program: self.program.clone(),
                    source,
                })?;

            let mut artifacts = Vec::new();
            collect_artifacts(out_dir.path(), out_dir.path(), &mut artifacts)?;

            Ok(SubjectOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code(),
                artifacts,
            })
        }
    }
}

fn expand_placeholders(arg: &str, fixture: &Path, name: &str, out: &Path) -> String {
    arg.replace("{fixture}", &fixture.to_string_lossy())
        .replace("{name}", name)
        .replace("{out}", &out.to_string_lossy())
}

fn collect_artifacts(base: &Path, dir: &Path, artifacts: &mut Vec<Artifact>) -> Result<(), SubjectError> {
    let io_err = |source| SubjectError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries: Vec<_> = fs::read_dir(dir)
        .map_err(io_err)?
        .collect::<Result<_, _>>()
        .map_err(io_err)?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            collect_artifacts(base, &path, artifacts)?;
            continue;
        }
        let bytes = fs::read(&path).map_err(|source| SubjectError::Io {
            path: path.clone(),
            source,
        })?;
        let name = path
            .strip_prefix(base)
            .unwrap_or(&path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        artifacts.push(Artifact {
            name,
            contents: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }
    Ok(())
}

// ============================================================================
// Function subject
// ============================================================================

/// Adapt a synchronous closure into a [`Subject`].
///
/// The closure runs on tokio's blocking pool, so a slow or stuck closure never stalls a runtime worker and the
/// runner can abandon it on timeout or cancellation. An abandoned closure keeps running until it returns; its result
/// is discarded. A panic in the closure is resumed in the invoking task.
pub struct FnSubject<F>(Arc<F>);

impl<F> FnSubject<F>
where
    F: Fn(&Path) -> Result<SubjectOutput, SubjectError> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self(Arc::new(f))
    }
}

impl<F> Subject for FnSubject<F>
where
    F: Fn(&Path) -> Result<SubjectOutput, SubjectError> + Send + Sync + 'static,
{
    fn invoke(&self, fixture: &Path) -> impl Future<Output = Result<SubjectOutput, SubjectError>> + Send {
        let f = Arc::clone(&self.0);
        let fixture = fixture.to_path_buf();
        async move {
            match tokio::task::spawn_blocking(move || (*f)(&fixture)).await {
                Ok(result) => result,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => Err(SubjectError::Other(format!("subject task failed: {e}"))),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_placeholders() {
        let arg = expand_placeholders("{fixture}/{name}.def:{out}", Path::new("/t/full"), "full", Path::new("/o"));
        assert_eq!(arg, "/t/full/full.def:/o");
    }

    #[test]
    fn test_collect_artifacts_is_recursive_and_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("b.txt"), "B").unwrap();
        fs::write(tmp.path().join("a.txt"), "A").unwrap();
        fs::write(tmp.path().join("sub/c.txt"), "C").unwrap();

        let mut artifacts = Vec::new();
        collect_artifacts(tmp.path(), tmp.path(), &mut artifacts).unwrap();
        let names: Vec<_> = artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["a.txt", "b.txt", "sub/c.txt"]);
        assert_eq!(artifacts[2].contents, "C");
    }

    #[tokio::test]
    async fn test_fn_subject_forwards_fixture() {
        let subject = FnSubject::new(|p| Ok(SubjectOutput::new(p.display().to_string())));
        let out = subject.invoke(Path::new("some/fixture")).await.unwrap();
        assert_eq!(out.stdout, "some/fixture");
        assert_eq!(out.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_fn_subject_can_be_abandoned() {
        let subject = FnSubject::new(|_| {
            std::thread::sleep(std::time::Duration::from_secs(2));
            Ok(SubjectOutput::new("late"))
        });
        let start = std::time::Instant::now();
        let outcome = tokio::time::timeout(std::time::Duration::from_millis(50), subject.invoke(Path::new("f"))).await;
        assert!(outcome.is_err());
        assert!(start.elapsed() < std::time::Duration::from_secs(1));
    }

    #[tokio::test]
    #[should_panic(expected = "closure exploded")]
    async fn test_fn_subject_resumes_panics() {
        let subject = FnSubject::new(|_| panic!("closure exploded"));
        let _ = subject.invoke(Path::new("f")).await;
    }

    /// True once `pid` is gone or only a zombie awaiting its reaper.
    #[cfg(target_os = "linux")]
    fn process_ended(pid: u32) -> bool {
        match fs::read_to_string(format!("/proc/{pid}/stat")) {
            Err(_) => true,
            Ok(stat) => stat.rsplit_once(") ").is_some_and(|(_, rest)| rest.starts_with(['Z', 'X'])),
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_command_subject_killed_when_abandoned() {
        let fixture = tempfile::tempdir().unwrap();
        let subject = CommandSubject::new("sh").with_args(["-c", "echo $$ > pid; exec sleep 600"]);

        let start = std::time::Instant::now();
        let outcome = tokio::time::timeout(std::time::Duration::from_millis(300), subject.invoke(fixture.path())).await;
        assert!(outcome.is_err());
        assert!(start.elapsed() < std::time::Duration::from_secs(5));

        let pid: u32 = fs::read_to_string(fixture.path().join("pid")).unwrap().trim().parse().unwrap();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while !process_ended(pid) {
            assert!(std::time::Instant::now() < deadline, "subject process {pid} survived its timeout");
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_subject_captures_output_and_artifacts() {
        let fixture = tempfile::tempdir().unwrap();
        fs::write(fixture.path().join("input.txt"), "hello").unwrap();

        let subject = CommandSubject::new("sh").with_args([
            "-c",
            "cat input.txt; echo oops >&2; echo gen > {out}/bindings.txt; exit 3",
        ]);
        let out = subject.invoke(fixture.path()).await.unwrap();
        assert_eq!(out.stdout, "hello");
        assert_eq!(out.stderr, "oops\n");
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(
            out.artifacts,
            vec![Artifact {
                name: "bindings.txt".to_string(),
                contents: "gen\n".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_command_subject_spawn_failure() {
        let fixture = tempfile::tempdir().unwrap();
        let subject = CommandSubject::new("definitely-not-a-real-program-fixtest");
        let err = subject.invoke(fixture.path()).await.unwrap_err();
        assert!(matches!(err, SubjectError::Spawn { .. }));
    }
}
