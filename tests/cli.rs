//! Integration tests for the oj-sandbox CLI.
//!
//! These run the actual binary and check output, exit codes, and file
//! system effects. None of them needs a Docker daemon.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

// -----------------------------------------------------------------------------
// Test helpers
// -----------------------------------------------------------------------------

/// Creates a Command for the oj-sandbox binary.
#[allow(deprecated)]
fn oj_sandbox() -> Command {
    Command::cargo_bin("oj-sandbox").expect("failed to find oj-sandbox binary")
}

/// Creates a Command running in `dir`, isolated from the user's config.
fn oj_sandbox_in(dir: &TempDir) -> Command {
    let mut cmd = oj_sandbox();
    cmd.current_dir(dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join(".config"))
        .env("HOME", dir.path());
    cmd
}

// -----------------------------------------------------------------------------
// Help and version tests
// -----------------------------------------------------------------------------

#[test]
fn test_help_shows_all_commands() {
    oj_sandbox()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("oj-sandbox"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("languages"));
}

#[test]
fn test_version_shows_version() {
    oj_sandbox()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("oj-sandbox"));
}

#[test]
fn test_run_help_shows_limit_options() {
    oj_sandbox()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--lang"))
        .stdout(predicate::str::contains("--stdin"))
        .stdout(predicate::str::contains("--time-limit"))
        .stdout(predicate::str::contains("--compile-time-limit"))
        .stdout(predicate::str::contains("--memory"))
        .stdout(predicate::str::contains("--cpus"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn test_verbose_flag_is_global() {
    let dir = TempDir::new().unwrap();

    oj_sandbox_in(&dir)
        .args(["languages", "--verbose"])
        .assert()
        .success();
}

// -----------------------------------------------------------------------------
// Init command tests
// -----------------------------------------------------------------------------

#[test]
fn test_init_creates_config() {
    let dir = TempDir::new().unwrap();

    oj_sandbox_in(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("initialized"));

    let content = fs::read_to_string(dir.path().join("oj-sandbox.toml")).unwrap();
    assert!(content.contains("[limits]"));
    assert!(content.contains("[docker]"));
}

#[test]
fn test_init_skips_existing_without_force() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("oj-sandbox.toml"), "# existing").unwrap();

    oj_sandbox_in(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"))
        .stdout(predicate::str::contains("--force"));

    let content = fs::read_to_string(dir.path().join("oj-sandbox.toml")).unwrap();
    assert_eq!(content, "# existing");
}

#[test]
fn test_init_force_overwrites_existing() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("oj-sandbox.toml"), "# existing").unwrap();

    oj_sandbox_in(&dir)
        .args(["init", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("overwritten"));

    let content = fs::read_to_string(dir.path().join("oj-sandbox.toml")).unwrap();
    assert!(content.contains("[limits]"));
}

#[test]
fn test_initialized_config_loads() {
    let dir = TempDir::new().unwrap();
    oj_sandbox_in(&dir).arg("init").assert().success();

    oj_sandbox_in(&dir)
        .arg("languages")
        .assert()
        .success()
        .stdout(predicate::str::contains("python"));
}

// -----------------------------------------------------------------------------
// Languages command tests
// -----------------------------------------------------------------------------

#[test]
fn test_languages_lists_defaults() {
    let dir = TempDir::new().unwrap();

    oj_sandbox_in(&dir)
        .arg("languages")
        .assert()
        .success()
        .stdout(predicate::str::contains("python"))
        .stdout(predicate::str::contains("cpp"))
        .stdout(predicate::str::contains("oj-python-runner"))
        .stdout(predicate::str::contains("oj-cpp-runner"));
}

#[test]
fn test_languages_applies_overrides() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("oj-sandbox.toml"),
        "[languages.python]\nimage = \"registry.local/py:3.12\"\n",
    )
    .unwrap();

    oj_sandbox_in(&dir)
        .arg("languages")
        .assert()
        .success()
        .stdout(predicate::str::contains("registry.local/py:3.12"))
        .stdout(predicate::str::contains("oj-cpp-runner"));
}

#[test]
fn test_invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("oj-sandbox.toml"), "[limits\nbroken").unwrap();

    oj_sandbox_in(&dir)
        .arg("languages")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config file"));
}

#[test]
fn test_config_with_zero_time_limit_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("oj-sandbox.toml"),
        "[limits]\ntime_limit_secs = 0.0\n",
    )
    .unwrap();

    oj_sandbox_in(&dir)
        .arg("languages")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config file"));
}

// -----------------------------------------------------------------------------
// Run command tests
// -----------------------------------------------------------------------------

#[test]
fn test_run_unknown_language_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("main.rb"), "puts 1").unwrap();

    oj_sandbox_in(&dir)
        .args(["run", "main.rb", "--lang", "ruby"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported language"));
}

#[test]
fn test_run_missing_file_fails() {
    let dir = TempDir::new().unwrap();

    oj_sandbox_in(&dir)
        .args(["run", "missing.py"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read source file"));
}

#[test]
fn test_run_uninferable_extension_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("Main.java"), "class Main {}").unwrap();

    oj_sandbox_in(&dir)
        .args(["run", "Main.java"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--lang"));
}

#[test]
fn test_run_rejects_zero_time_limit() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("main.py"), "print(1)").unwrap();

    oj_sandbox_in(&dir)
        .args(["run", "main.py", "--time-limit", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("time limit must be greater than zero"));
}

#[test]
fn test_run_missing_stdin_file_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("main.py"), "print(input())").unwrap();

    oj_sandbox_in(&dir)
        .args(["run", "main.py", "--stdin", "nope.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read stdin file"));
}
