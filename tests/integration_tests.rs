//! Integration tests for the reposweep CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// A command isolated from the caller's config files and token
fn reposweep(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("reposweep").unwrap();
    cmd.current_dir(home)
        .env("HOME", home)
        .env_remove("GITHUB_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

/// Scratch tree with truffleHog and repo-supervisor results for acme/api,
/// and an empty result map for acme/docs
fn prepared_scratch(root: &Path) {
    let api = root.join("results/acme/api");
    fs::create_dir_all(&api).unwrap();
    fs::write(
        api.join("truffleHog"),
        "{\"path\":\"config.yml\",\"stringsFound\":[\"AKIAEXAMPLE\"]}\n",
    )
    .unwrap();
    fs::write(
        api.join("repo-supervisor"),
        "{\"result\":{\"config.yml\":[\"hunter2\"]}}",
    )
    .unwrap();

    let docs = root.join("results/acme/docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("repo-supervisor"), "{\"result\":{}}").unwrap();
}

#[test]
fn test_cli_help() {
    let temp = TempDir::new().unwrap();
    reposweep(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("scan them for committed secrets"));
}

#[test]
fn test_cli_version() {
    let temp = TempDir::new().unwrap();
    reposweep(temp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("reposweep"));

    reposweep(temp.path())
        .args(["version", "--detailed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("trufflehog"));
}

#[test]
fn test_invalid_subcommand() {
    let temp = TempDir::new().unwrap();
    reposweep(temp.path())
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_scan_requires_token() {
    let temp = TempDir::new().unwrap();
    reposweep(temp.path())
        .args(["scan", "--org", "acme"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("token"));
}

#[test]
fn test_scan_requires_selector() {
    let temp = TempDir::new().unwrap();
    reposweep(temp.path())
        .args(["scan", "--token", "t"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--org"));
}

#[test]
fn test_scan_rejects_two_selectors() {
    let temp = TempDir::new().unwrap();
    reposweep(temp.path())
        .args(["scan", "--token", "t", "--org", "acme", "--user", "octo"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("only one of"));
}

#[test]
fn test_scan_rejects_entropy_without_trufflehog() {
    let temp = TempDir::new().unwrap();
    reposweep(temp.path())
        .args([
            "scan",
            "--token",
            "t",
            "--user",
            "octo",
            "--thog-entropy",
            "--tool",
            "repo-supervisor",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--thog-entropy"));
}

#[test]
fn test_scan_rejects_public_ssh_url() {
    let temp = TempDir::new().unwrap();
    reposweep(temp.path())
        .args(["scan", "--token", "t", "--repo-url", "git@github.com:acme/api.git"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("SSH URL"));
}

#[test]
fn test_private_only_needs_ssh_key() {
    let temp = TempDir::new().unwrap();
    reposweep(temp.path())
        .env("REPOSWEEP_GITHUB__SSH_KEY", temp.path().join("missing_key"))
        .args(["scan", "--token", "t", "--user", "octo", "--private-only"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("SSH key"));
}

#[test]
fn test_missing_config_file() {
    let temp = TempDir::new().unwrap();
    reposweep(temp.path())
        .args(["--config", "nowhere.toml", "scan", "--token", "t", "--org", "acme"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_config_show_defaults() {
    let temp = TempDir::new().unwrap();
    reposweep(temp.path())
        .args(["config", "show", "--defaults"])
        .assert()
        .success()
        .stdout(predicate::str::contains("threads = 10"))
        .stdout(predicate::str::contains("[tools.trufflehog]"));
}

#[test]
fn test_config_show_reads_local_file() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("reposweep.toml"), "[general]\nthreads = 3\n").unwrap();
    reposweep(temp.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("threads = 3"));
}

#[test]
fn test_report_merged_json() {
    let temp = TempDir::new().unwrap();
    prepared_scratch(temp.path());
    let output = temp.path().join("merged.json");

    reposweep(temp.path())
        .arg("--scratch-dir")
        .arg(temp.path())
        .args(["report", "--merge-output", "-o"])
        .arg(&output)
        .assert()
        .success();

    let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(
        written,
        serde_json::json!([{
            "repository": "acme/api",
            "stringsFound": {"config.yml": ["hunter2", "AKIAEXAMPLE"]}
        }])
    );
}

#[test]
fn test_report_concatenated_text() {
    let temp = TempDir::new().unwrap();
    prepared_scratch(temp.path());
    let output = temp.path().join("results.txt");

    reposweep(temp.path())
        .arg("--scratch-dir")
        .arg(temp.path())
        .args(["report", "-o"])
        .arg(&output)
        .assert()
        .success();

    let text = fs::read_to_string(&output).unwrap();
    let delimiter = "-".repeat(304);
    assert!(text.starts_with("Tool: truffleHog\nOrgorUser: acme RepoName: api\n"));
    assert!(text.contains("Tool: repo-supervisor\n"));
    assert_eq!(text.matches(&delimiter).count(), 2);
    assert!(!text.contains("RepoName: docs"));
}

#[test]
fn test_report_corrupt_result_fails() {
    let temp = TempDir::new().unwrap();
    let api = temp.path().join("results/acme/api");
    fs::create_dir_all(&api).unwrap();
    fs::write(api.join("repo-supervisor"), "{not json").unwrap();

    reposweep(temp.path())
        .arg("--scratch-dir")
        .arg(temp.path())
        .args(["report", "--merge-output", "-o"])
        .arg(temp.path().join("merged.json"))
        .assert()
        .code(1);
}
