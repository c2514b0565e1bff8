//! Tests that drive the `fixtest` binary against throwaway fixture trees

#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn fixtest(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fixtest"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run fixtest")
}

fn fixture(root: &Path, case: &str, input: &str, expected: &str) {
    let dir = root.join(case);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("input.txt"), input).unwrap();
    fs::write(dir.join("expected.stdout"), expected).unwrap();
}

const CAT: [&str; 4] = ["--", "sh", "-c", "cat input.txt"];

#[test]
fn test_run_passing_root() {
    let tmp = tempfile::tempdir().unwrap();
    fixture(tmp.path(), "a1", "hello\n", "hello\n");
    fixture(tmp.path(), "b1", "world", "world");
    let root = tmp.path().to_str().unwrap();

    let mut args = vec!["run", "--root", root];
    args.extend(CAT);
    let output = fixtest(&args);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(0), "{stdout}");
    assert!(stdout.contains("a1 PASSED"));
    assert!(stdout.contains("2 passed"));
}

#[test]
fn test_run_failing_case_exits_nonzero() {
    let tmp = tempfile::tempdir().unwrap();
    fixture(tmp.path(), "a1", "actual", "expected");
    let root = tmp.path().to_str().unwrap();

    let mut args = vec!["run", "--root", root];
    args.extend(CAT);
    let output = fixtest(&args);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout.contains("-expected"));
    assert!(stdout.contains("+actual"));
}

#[test]
fn test_run_json_from_config() {
    let tmp = tempfile::tempdir().unwrap();
    fixture(&tmp.path().join("defs"), "a1", "x", "x");
    fs::write(
        tmp.path().join("fixtest.toml"),
        r#"
[subject]
command = "sh"
args = ["-c", "cat input.txt"]

[[group]]
name = "defs"
root = "defs"
cases = ["a1", "gone"]
"#,
    )
    .unwrap();
    let config = tmp.path().join("fixtest.toml");

    let output = fixtest(&["run", "--config", config.to_str().unwrap(), "--format", "json"]);
    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["verdict"], "failed");
    assert_eq!(json["groups"][0]["coverage"]["extra"][0], "gone");
    assert_eq!(json["totals"]["passed"], 1);
}

#[test]
fn test_list_marks_unregistered() {
    let tmp = tempfile::tempdir().unwrap();
    fixture(&tmp.path().join("defs"), "a1", "", "");
    fixture(&tmp.path().join("defs"), "new1", "", "");
    fs::write(
        tmp.path().join("suite.toml"),
        "[[group]]\nname = \"defs\"\nroot = \"defs\"\ncases = [\"a1\"]\n",
    )
    .unwrap();
    let config = tmp.path().join("suite.toml");

    let output = fixtest(&["list", "--config", config.to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout.contains("  a1\n"));
    assert!(stdout.contains("  new1 [unregistered]"));
}

#[test]
fn test_bad_config_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let config = tmp.path().join("broken.toml");
    fs::write(&config, "[runner]\nworkers = \"lots\"\n").unwrap();

    let output = fixtest(&["list", "--config", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid suite file"));
}

#[test]
fn test_run_missing_root_is_reported_not_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("gone");

    let mut args = vec!["run", "--root", root.to_str().unwrap()];
    args.extend(CAT);
    let output = fixtest(&args);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout.contains("fixture root not found"), "{stdout}");
}
