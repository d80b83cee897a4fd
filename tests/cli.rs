//! Runs the `tidybot` binary end to end.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[allow(deprecated)]
fn tidybot_cmd() -> Command {
    let mut cmd = Command::cargo_bin("tidybot").expect("tidybot binary not found");
    cmd.env_remove("RUST_LOG");
    cmd
}

/// A config at `<tmp>/config.yaml` organizing `<tmp>/inbox`.
fn workspace() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let inbox = temp_dir.path().join("inbox");
    fs::create_dir(&inbox).unwrap();
    fs::write(inbox.join("report.pdf"), "pdf").unwrap();
    fs::write(inbox.join("song.mp3"), "mp3").unwrap();

    let config = temp_dir.path().join("config.yaml");
    fs::write(
        &config,
        format!(
            r#"target_directory: {}
log_file: {}
rules:
  - name: Documents
    conditions:
      - extension: [.pdf]
        destination: Documents/{{extension_group}}
"#,
            inbox.display(),
            temp_dir.path().join("logs").join("organizer.log").display()
        ),
    )
    .unwrap();
    (temp_dir, config)
}

fn inbox(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("inbox")
}

fn arg(path: &Path) -> &str {
    path.to_str().expect("temp paths are UTF-8")
}

#[test]
fn help_lists_commands() {
    tidybot_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("schedule").and(predicate::str::contains("undo")));
}

#[test]
fn init_writes_sample_once() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("config.yaml");

    tidybot_cmd()
        .args(["-c", arg(&config), "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sample configuration written"));
    assert!(fs::read_to_string(&config).unwrap().contains("target_directory"));

    tidybot_cmd()
        .args(["-c", arg(&config), "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("refusing to overwrite"));

    tidybot_cmd()
        .args(["-c", arg(&config), "init", "--force"])
        .assert()
        .success();
}

#[test]
fn check_lists_rules() {
    let (_temp_dir, config) = workspace();

    tidybot_cmd()
        .args(["-c", arg(&config), "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid").and(predicate::str::contains("Documents")));
}

#[test]
fn check_reports_missing_config() {
    let temp_dir = TempDir::new().unwrap();

    tidybot_cmd()
        .args(["-c", arg(&temp_dir.path().join("nope.yaml")), "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn run_dry_run_reports_without_moving() {
    let (temp_dir, config) = workspace();

    tidybot_cmd()
        .args(["-c", arg(&config), "run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[DRY RUN]").and(predicate::str::contains("Documents/PDF")));

    assert!(inbox(&temp_dir).join("report.pdf").exists());
    assert!(!inbox(&temp_dir).join("Documents").exists());
}

#[test]
fn run_then_undo() {
    let (temp_dir, config) = workspace();

    tidybot_cmd()
        .args(["-c", arg(&config), "run"])
        .assert()
        .success();
    assert!(inbox(&temp_dir).join("Documents/PDF/report.pdf").exists());
    assert!(inbox(&temp_dir).join("song.mp3").exists());

    let log = fs::read_to_string(temp_dir.path().join("logs").join("organizer.log")).unwrap();
    assert!(log.contains("moved"));

    tidybot_cmd()
        .args(["-c", arg(&config), "undo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored 1 file"));
    assert!(inbox(&temp_dir).join("report.pdf").exists());
    assert!(!inbox(&temp_dir).join("Documents").exists());

    tidybot_cmd()
        .args(["-c", arg(&config), "undo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to undo"));
}

#[test]
fn interactive_is_the_default() {
    let (temp_dir, config) = workspace();

    tidybot_cmd()
        .args(["-c", arg(&config)])
        .write_stdin("1\n3\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Interactive Mode").and(predicate::str::contains("Goodbye!")));

    assert!(inbox(&temp_dir).join("report.pdf").exists());
}
