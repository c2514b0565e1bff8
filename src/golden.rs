//! Golden artifacts
//!
//! Each fixture directory carries the expected output of the subject next to its inputs:
//!
//! | file               | compared against          | required |
//! |--------------------|---------------------------|----------|
//! | `expected.stdout`  | captured stdout           | yes      |
//! | `expected.stderr`  | captured stderr           | no       |
//! | `expected.exit`    | exit code (default `0`)   | no       |
//! | `<artifact>.gold`  | produced artifact         | no       |
//!
//! File names are configurable through [`GoldenLayout`]. Text is compared after normalizing line endings and
//! trailing newlines, so goldens written on Windows or by editors that append a final newline still match.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use fixtest_core::ErrorCause;

use crate::subject::SubjectOutput;

/// Names of the golden files inside a fixture directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoldenLayout {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: String,
    /// Suffix appended to an artifact name to form its golden file name.
    pub artifact_suffix: String,
}

impl Default for GoldenLayout {
    fn default() -> Self {
        Self {
            stdout: "expected.stdout".to_string(),
            stderr: "expected.stderr".to_string(),
            exit_code: "expected.exit".to_string(),
            artifact_suffix: ".gold".to_string(),
        }
    }
}

impl GoldenLayout {
    fn is_layout_file(&self, name: &str) -> bool {
        name == self.stdout || name == self.stderr || name == self.exit_code
    }
}

/// Expected output of one fixture, loaded from its golden files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectations {
    pub stdout: String,
    pub stderr: Option<String>,
    pub exit_code: i32,
    /// `(artifact name, expected contents)`, sorted by name.
    pub artifacts: Vec<(String, String)>,
}

/// One golden that did not match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub golden: String,
    pub diff: String,
}

/// Read the golden files of `fixture`.
pub fn load(fixture: &Path, layout: &GoldenLayout) -> Result<Expectations, ErrorCause> {
    let stdout_path = fixture.join(&layout.stdout);
    let stdout = read_optional(&stdout_path)?.ok_or(ErrorCause::MissingGolden { path: stdout_path })?;
    let stderr = read_optional(&fixture.join(&layout.stderr))?;

    let exit_path = fixture.join(&layout.exit_code);
    let exit_code = match read_optional(&exit_path)? {
        Some(raw) => raw.trim().parse::<i32>().map_err(|e| ErrorCause::MalformedGolden {
            path: exit_path.clone(),
            reason: format!("expected an integer exit code: {e}"),
        })?,
        None => 0,
    };

    let mut artifacts = Vec::new();
    let entries = fs::read_dir(fixture).map_err(|e| unreadable(fixture, &e))?;
    for entry in entries {
        let entry = entry.map_err(|e| unreadable(fixture, &e))?;
        let Some(file_name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if layout.is_layout_file(&file_name) || !entry.path().is_file() {
            continue;
        }
        let Some(artifact) = file_name.strip_suffix(&layout.artifact_suffix) else {
            continue;
        };
        if artifact.is_empty() {
            continue;
        }
        let contents = fs::read_to_string(entry.path()).map_err(|e| unreadable(&entry.path(), &e))?;
        artifacts.push((artifact.to_string(), contents));
    }
    artifacts.sort();

    Ok(Expectations {
        stdout,
        stderr,
        exit_code,
        artifacts,
    })
}

fn read_optional(path: &Path) -> Result<Option<String>, ErrorCause> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(unreadable(path, &e)),
    }
}

fn unreadable(path: &Path, err: &io::Error) -> ErrorCause {
    ErrorCause::MalformedGolden {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

/// Compare a subject run against its expectations. An empty result means the case passed.
pub fn compare(expected: &Expectations, actual: &SubjectOutput, layout: &GoldenLayout) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();

    if let Some(code) = actual.exit_code {
        if code != expected.exit_code {
            mismatches.push(Mismatch {
                golden: layout.exit_code.clone(),
                diff: format!("-{}\n+{}", expected.exit_code, code),
            });
        }
    }

    if let Some(diff) = diff_text(&expected.stdout, &actual.stdout) {
        mismatches.push(Mismatch {
            golden: layout.stdout.clone(),
            diff,
        });
    }

    if let Some(stderr) = &expected.stderr {
        if let Some(diff) = diff_text(stderr, &actual.stderr) {
            mismatches.push(Mismatch {
                golden: layout.stderr.clone(),
                diff,
            });
        }
    }

    for (name, contents) in &expected.artifacts {
        let golden = format!("{name}{}", layout.artifact_suffix);
        match actual.artifacts.iter().find(|a| &a.name == name) {
            Some(produced) => {
                if let Some(diff) = diff_text(contents, &produced.contents) {
                    mismatches.push(Mismatch { golden, diff });
                }
            }
            None => mismatches.push(Mismatch {
                golden,
                diff: format!("artifact `{name}` was not produced"),
            }),
        }
    }

    mismatches
}

/// Render mismatches as one report block.
pub fn render_mismatches(mismatches: &[Mismatch]) -> String {
    let mut out = String::new();
    for m in mismatches {
        let _ = writeln!(out, "--- {}", m.golden);
        let _ = writeln!(out, "+++ actual");
        out.push_str(&m.diff);
        if !m.diff.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

/// Overwrite the golden files of `fixture` with `actual`.
///
/// Goldens that describe defaults (empty stderr, exit code 0) are removed rather than written, so a blessed
/// fixture stays minimal. Artifact goldens with no matching produced artifact are deleted. Returns the paths written.
pub fn bless(fixture: &Path, layout: &GoldenLayout, actual: &SubjectOutput) -> io::Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    let stdout = fixture.join(&layout.stdout);
    fs::write(&stdout, &actual.stdout)?;
    written.push(stdout);

    let stderr = fixture.join(&layout.stderr);
    if actual.stderr.is_empty() {
        remove_if_present(&stderr)?;
    } else {
        fs::write(&stderr, &actual.stderr)?;
        written.push(stderr);
    }

    let exit = fixture.join(&layout.exit_code);
    match actual.exit_code {
        Some(0) | None => remove_if_present(&exit)?,
        Some(code) => {
            fs::write(&exit, format!("{code}\n"))?;
            written.push(exit);
        }
    }

    remove_stale_artifacts(fixture, layout, actual)?;
    for artifact in &actual.artifacts {
        if artifact.name.contains('/') {
            tracing::warn!(artifact = %artifact.name, "nested artifacts cannot be blessed; skipping");
            continue;
        }
        let path = fixture.join(format!("{}{}", artifact.name, layout.artifact_suffix));
        fs::write(&path, &artifact.contents)?;
        written.push(path);
    }

    Ok(written)
}

/// Delete artifact goldens in `fixture` whose artifact the subject no longer produces.
fn remove_stale_artifacts(fixture: &Path, layout: &GoldenLayout, actual: &SubjectOutput) -> io::Result<()> {
    // An empty suffix would match the fixture's inputs too.
    if layout.artifact_suffix.is_empty() {
        return Ok(());
    }
    for entry in fs::read_dir(fixture)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if layout.is_layout_file(name) {
            continue;
        }
        let Some(artifact) = name.strip_suffix(layout.artifact_suffix.as_str()) else { continue };
        if artifact.is_empty() || actual.artifacts.iter().any(|a| a.name == artifact) {
            continue;
        }
        tracing::info!(golden = %entry.path().display(), "removing golden of an artifact no longer produced");
        fs::remove_file(entry.path())?;
    }
    Ok(())
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n").trim_end_matches('\n').to_string()
}

/// Line diff of two texts after normalization, or `None` when they match.
///
/// Unchanged runs longer than the context window are collapsed to `...`.
pub fn diff_text(expected: &str, actual: &str) -> Option<String> {
    const CONTEXT: usize = 2;

    let expected = normalize(expected);
    let actual = normalize(actual);
    if expected == actual {
        return None;
    }

    let old: Vec<&str> = if expected.is_empty() { Vec::new() } else { expected.split('\n').collect() };
    let new: Vec<&str> = if actual.is_empty() { Vec::new() } else { actual.split('\n').collect() };
    let ops = line_ops(&old, &new);

    let mut out = String::new();
    let mut i = 0;
    while i < ops.len() {
        match ops[i] {
            LineOp::Keep(_) => {
                let run_end = ops[i..]
                    .iter()
                    .position(|op| !matches!(op, LineOp::Keep(_)))
                    .map_or(ops.len(), |p| i + p);
                let leading = if i == 0 { 0 } else { CONTEXT };
                let trailing = if run_end == ops.len() { 0 } else { CONTEXT };
                if run_end - i > leading + trailing {
                    for op in &ops[i..i + leading] {
                        push_op(&mut out, op);
                    }
                    out.push_str("...\n");
                    for op in &ops[run_end - trailing..run_end] {
                        push_op(&mut out, op);
                    }
                } else {
                    for op in &ops[i..run_end] {
                        push_op(&mut out, op);
                    }
                }
                i = run_end;
            }
            op => {
                push_op(&mut out, &op);
                i += 1;
            }
        }
    }
    Some(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineOp<'a> {
    Keep(&'a str),
    Remove(&'a str),
    Add(&'a str),
}

fn push_op(out: &mut String, op: &LineOp<'_>) {
    let _ = match op {
        LineOp::Keep(l) => writeln!(out, " {l}"),
        LineOp::Remove(l) => writeln!(out, "-{l}"),
        LineOp::Add(l) => writeln!(out, "+{l}"),
    };
}

/// Table cells the LCS may allocate before falling back to a line-by-line comparison.
const MAX_LCS_CELLS: usize = 4_000_000;

/// Edit script between two line lists.
///
/// The common prefix and suffix are kept as is and only the differing middle is aligned.
fn line_ops<'a>(old: &[&'a str], new: &[&'a str]) -> Vec<LineOp<'a>> {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let old_mid = &old[prefix..old.len() - suffix];
    let new_mid = &new[prefix..new.len() - suffix];

    let mut ops = Vec::with_capacity(old.len() + new.len());
    ops.extend(old[..prefix].iter().map(|l| LineOp::Keep(l)));
    let cells = (old_mid.len() + 1).saturating_mul(new_mid.len() + 1);
    if cells > MAX_LCS_CELLS {
        tracing::debug!(old = old_mid.len(), new = new_mid.len(), "diff too large to align; comparing by position");
        positional_ops(old_mid, new_mid, &mut ops);
    } else {
        lcs_ops(old_mid, new_mid, &mut ops);
    }
    ops.extend(old[old.len() - suffix..].iter().map(|l| LineOp::Keep(l)));
    ops
}

fn lcs_ops<'a>(old: &[&'a str], new: &[&'a str], ops: &mut Vec<LineOp<'a>>) {
    let (n, m) = (old.len(), new.len());
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            ops.push(LineOp::Keep(old[i]));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            ops.push(LineOp::Remove(old[i]));
            i += 1;
        } else {
            ops.push(LineOp::Add(new[j]));
            j += 1;
        }
    }
    ops.extend(old[i..].iter().map(|l| LineOp::Remove(l)));
    ops.extend(new[j..].iter().map(|l| LineOp::Add(l)));
}

/// Compare line `i` of one side with line `i` of the other.
fn positional_ops<'a>(old: &[&'a str], new: &[&'a str], ops: &mut Vec<LineOp<'a>>) {
    for i in 0..old.len().max(new.len()) {
        match (old.get(i), new.get(i)) {
            (Some(a), Some(b)) if a == b => ops.push(LineOp::Keep(a)),
            (a, b) => {
                if let Some(a) = a {
                    ops.push(LineOp::Remove(a));
                }
                if let Some(b) = b {
                    ops.push(LineOp::Add(b));
                }
            }
        }
    }
}
