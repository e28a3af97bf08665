//! `session list|create|delete` exercised end to end against the real
//! binary, each test isolated to its own `CORE_STATE_DIR`.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn cli_command(state_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("core-daemon").expect("failed to find core-daemon binary");
    cmd.env("CORE_STATE_DIR", state_dir);
    cmd
}

#[test]
fn list_is_empty_in_a_fresh_state_dir() {
    let dir = tempdir().unwrap();
    cli_command(dir.path())
        .args(["session", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no saved sessions"));
}

#[test]
fn create_then_list_shows_the_new_session() {
    let dir = tempdir().unwrap();
    cli_command(dir.path())
        .args(["session", "create", "demo-topology"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created session 1"));

    cli_command(dir.path())
        .args(["session", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("demo-topology"));
}

#[test]
fn delete_removes_a_session_and_is_idempotent_failure_on_repeat() {
    let dir = tempdir().unwrap();
    cli_command(dir.path()).args(["session", "create", "one"]).assert().success();

    cli_command(dir.path())
        .args(["session", "delete", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted session 1"));

    cli_command(dir.path())
        .args(["session", "delete", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no saved session"));
}

#[test]
fn created_sessions_reuse_the_lowest_free_id() {
    let dir = tempdir().unwrap();
    cli_command(dir.path()).args(["session", "create", "a"]).assert().success();
    cli_command(dir.path()).args(["session", "create", "b"]).assert().success();
    cli_command(dir.path()).args(["session", "delete", "1"]).assert().success();

    cli_command(dir.path())
        .args(["session", "create", "c"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created session 1"));
}
