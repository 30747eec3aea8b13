#![allow(deprecated)]

//! CLI tests against the compiled binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
mod common;

fn convlog(log_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("convlog").unwrap();
    cmd.env_remove("RUST_LOG")
        .arg("--config")
        .arg(log_dir.path().join("missing.yaml"))
        .arg("--log-dir")
        .arg(log_dir.path());
    cmd
}

#[test]
fn test_save_then_query_json() {
    let dir = TempDir::new().unwrap();

    convlog(&dir)
        .args([
            "save",
            "--messages",
            r#"[{"role":"user","content":"hello from the cli"}]"#,
            "--session-id",
            "cli-1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"session_id\": \"cli-1\""))
        .stdout(predicate::str::contains("\"message_count\": 1"));

    convlog(&dir)
        .args(["query", "--keyword", "CLI", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"count\": 1"))
        .stdout(predicate::str::contains("hello from the cli"));

    convlog(&dir)
        .args(["sessions"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cli-1"));
}

#[test]
fn test_save_reads_messages_from_stdin() {
    let dir = TempDir::new().unwrap();

    convlog(&dir)
        .args(["save", "--messages", "-"])
        .write_stdin(r#"[{"role":"assistant","content":"piped in"}]"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("session_"));
}

#[test]
fn test_save_rejects_invalid_role() {
    let dir = TempDir::new().unwrap();

    convlog(&dir)
        .args(["save", "--messages", r#"[{"role":"system","content":"x"}]"#])
        .assert()
        .failure()
        .stderr(predicate::str::contains("role"));

    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test]
fn test_query_empty_store_prints_notice() {
    let dir = TempDir::new().unwrap();

    convlog(&dir)
        .arg("query")
        .assert()
        .success()
        .stdout(predicate::str::contains("No matching log entries found."));
}

#[test]
fn test_tools_lists_three_definitions() {
    let dir = TempDir::new().unwrap();

    convlog(&dir)
        .arg("tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("save_conversation"))
        .stdout(predicate::str::contains("query_logs"))
        .stdout(predicate::str::contains("list_sessions"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (_config_dir, config_path) =
        common::temp_config_file("query:\n  default_limit: 0\n");

    Command::cargo_bin("convlog")
        .unwrap()
        .arg("--config")
        .arg(config_path)
        .arg("--log-dir")
        .arg(dir.path())
        .arg("tools")
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be greater than 0"));
}
