//! Integration tests for the CLI interface
//!
//! Runs the built binary against small workflow trees in a temp directory

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn nap_in(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("nap").unwrap();
    cmd.current_dir(dir.path()).env_remove("NAP_LOG");
    cmd
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = Command::cargo_bin("nap").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn test_run_help() {
    let mut cmd = Command::cargo_bin("nap").unwrap();
    cmd.args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--env"))
        .stdout(predicate::str::contains("--param"));
}

#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("nap").unwrap();
    cmd.arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn test_missing_target_fails_with_report() {
    let dir = TempDir::new().unwrap();

    nap_in(&dir)
        .args(["run", "nothing.yml", "-q"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("file doesn't exist"))
        .stdout(predicate::str::contains("0/0 succeeded."));
}

#[test]
fn test_passing_script_with_param() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("check.rhai"),
        "if nap.env.get(\"name\") != \"bob\" { nap.fail(\"unexpected name\"); }\n",
    )
    .unwrap();

    nap_in(&dir)
        .args(["run", "check.rhai", "-q", "-p", "name=bob"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1/1 succeeded."));
}

#[test]
fn test_failing_script_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("check.rhai"), "nap.fail(\"nope\");\n").unwrap();

    nap_in(&dir)
        .args(["run", "check.rhai", "-q"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[ERROR] check.rhai: nope"))
        .stdout(predicate::str::contains("0/1 succeeded."));
}

#[test]
fn test_environment_file_feeds_script() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("env")).unwrap();
    fs::write(dir.path().join("env").join("dev.yml"), "name: ann\n").unwrap();
    fs::write(
        dir.path().join("check.rhai"),
        "if nap.env.get(\"name\") != \"ann\" { nap.fail(\"env not loaded\"); }\n",
    )
    .unwrap();

    nap_in(&dir)
        .args(["run", "check.rhai", "-q", "-e", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1/1 succeeded."));
}

#[test]
fn test_malformed_param_is_rejected() {
    let dir = TempDir::new().unwrap();

    nap_in(&dir)
        .args(["run", "check.rhai", "-p", "novalue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_missing_environment_is_fatal() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("check.rhai"), "").unwrap();

    nap_in(&dir)
        .args(["run", "check.rhai", "-e", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("environment 'missing.yml' not found."));
}

#[test]
fn test_verbose_report_lists_stats() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("ok.rhai"), "console.log(\"hi\");\n").unwrap();

    nap_in(&dir)
        .args(["run", "ok.rhai", "-q", "-v"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Scripts"));
}
