//! `scenario open` exercised end to end against the real binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn cli_command() -> Command {
    Command::cargo_bin("core-daemon").expect("failed to find core-daemon binary")
}

#[test]
fn opens_a_valid_scenario_document() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("two-node.json");
    std::fs::write(
        &path,
        r#"{
            "name": "two-node",
            "description": "",
            "nodes": [
                {"id": 1, "name": "n1", "node_type": "Default", "position": {"x": 0.0, "y": 0.0, "z": 0.0}, "geo": null},
                {"id": 2, "name": "n2", "node_type": "Default", "position": {"x": 100.0, "y": 0.0, "z": 0.0}, "geo": null}
            ],
            "links": [
                {"id": 1, "link_type": "Wired", "node1": {"node_id": 1, "iface_id": 0}, "node2": {"node_id": 2, "iface_id": 0}, "network_id": null}
            ]
        }"#,
    )
    .unwrap();

    cli_command()
        .args(["scenario", "open", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 node(s)"))
        .stdout(predicate::str::contains("1 link(s)"))
        .stdout(predicate::str::contains("valid"));
}

#[test]
fn rejects_a_malformed_document() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{ not json").unwrap();

    cli_command()
        .args(["scenario", "open", path.to_str().unwrap()])
        .assert()
        .failure();
}

#[test]
fn rejects_a_missing_file() {
    cli_command()
        .args(["scenario", "open", "/nonexistent/path/scenario.json"])
        .assert()
        .failure();
}
