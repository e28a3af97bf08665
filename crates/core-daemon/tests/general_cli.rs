//! General CLI tests covering help, version, and cross-cutting behavior.

use assert_cmd::Command;
use predicates::prelude::*;

fn cli_command() -> Command {
    Command::cargo_bin("core-daemon").expect("failed to find core-daemon binary")
}

#[test]
fn help_lists_top_level_commands() {
    let mut cmd = cli_command();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("session"))
        .stdout(predicate::str::contains("scenario"));
}

#[test]
fn version_reports_the_binary_name() {
    let mut cmd = cli_command();
    cmd.arg("--version");
    cmd.assert().success().stdout(predicate::str::contains("core-daemon"));
}

#[test]
fn invalid_subcommand_is_a_usage_error() {
    let mut cmd = cli_command();
    cmd.arg("not-a-real-command");
    cmd.assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn verbose_flag_is_accepted_before_or_after_the_subcommand() {
    let mut cmd = cli_command();
    cmd.args(["--verbose", "session", "list"]);
    cmd.assert().success();

    let mut cmd = cli_command();
    cmd.args(["session", "--verbose", "list"]);
    cmd.assert().success();
}

#[test]
fn subcommand_help_describes_its_own_arguments() {
    let mut cmd = cli_command();
    cmd.args(["run", "--help"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--scenario"))
        .stdout(predicate::str::contains("--duration"));
}
