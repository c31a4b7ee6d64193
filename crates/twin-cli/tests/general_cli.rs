//! General CLI tests covering help, version, error handling, and cross-cutting concerns
//!
//! Tests basic CLI functionality that doesn't fit into specific command categories,
//! including global flags, error codes, and the analyze/inject entry points.

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper function to create a command instance for the ndt-twin binary
fn cli_command() -> Command {
    Command::cargo_bin("ndt-twin").expect("Failed to find ndt-twin binary")
}

#[test]
fn test_cli_help_and_version() {
    let mut cmd = cli_command();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("CLI for the network digital twin"))
        .stdout(predicate::str::contains("Commands:"));

    let mut cmd = cli_command();
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ndt-twin"));
}

#[test]
fn test_cli_invalid_command() {
    let mut cmd = cli_command();
    cmd.arg("invalid-command");

    cmd.assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("error: unrecognized subcommand"));
}

#[test]
fn test_subcommand_help() {
    let subcommands = vec![
        ("analyze", "Characterize the captures"),
        ("replay", "Replay traffic shaped like a previous analysis"),
        ("inject", "Run a named impairment scenario"),
        ("clean", "Remove any impairment left on the interface"),
    ];

    for (cmd, description) in subcommands {
        let mut command = cli_command();
        command.args([cmd, "--help"]);
        command
            .assert()
            .success()
            .stdout(predicate::str::contains(description));
    }
}

#[test]
fn test_cli_verbose_flag_positioning() {
    let mut cmd = cli_command();
    cmd.args(["--verbose", "list"]);
    cmd.assert().success();

    let mut cmd = cli_command();
    cmd.args(["list", "--verbose"]);
    cmd.assert().success();
}

#[test]
fn test_replay_rejects_zero_duration() {
    let mut cmd = cli_command();
    cmd.args(["replay", "--analysis", "traffic_analysis.json", "--duration", "0"]);
    cmd.assert().failure().code(2);
}

#[test]
fn test_analyze_writes_artifact() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("ue_ping.log"),
        "64 bytes from 8.8.8.8: icmp_seq=1 ttl=117 time=10.0 ms\n\
         64 bytes from 8.8.8.8: icmp_seq=2 ttl=117 time=15.0 ms\n",
    )
    .unwrap();

    let mut cmd = cli_command();
    cmd.arg("analyze").arg(dir.path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Traffic analysis"))
        .stdout(predicate::str::contains("2 samples"));

    assert!(dir.path().join("traffic_analysis.json").exists());
}

#[test]
fn test_analyze_missing_directory_fails() {
    let mut cmd = cli_command();
    cmd.args(["analyze", "/nonexistent-data-dir-zzz"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Data directory not found"));
}

#[test]
fn test_inject_unknown_scenario_fails() {
    let mut cmd = cli_command();
    cmd.args(["inject", "--scenario", "nonexistent_scenario"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("nonexistent_scenario"));
}

#[test]
fn test_inject_missing_interface_fails() {
    let mut cmd = cli_command();
    cmd.args(["inject", "--scenario", "mild", "--interface", "if_not_exist_zzz"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}
