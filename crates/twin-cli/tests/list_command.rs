//! Tests for the 'list' command
//!
//! Verifies that the list command displays every scenario with its phases.

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper function to create a command instance for the ndt-twin binary
fn cli_command() -> Command {
    Command::cargo_bin("ndt-twin").expect("Failed to find ndt-twin binary")
}

#[test]
fn test_cli_list_command() {
    let mut cmd = cli_command();
    cmd.arg("list");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Available scenarios:"))
        .stdout(predicate::str::contains("mild"))
        .stdout(predicate::str::contains("moderate"))
        .stdout(predicate::str::contains("severe"))
        .stdout(predicate::str::contains("mixed"))
        .stdout(predicate::str::contains("stress"))
        .stdout(predicate::str::contains("baseline"));
}

#[test]
fn test_cli_list_with_verbose() {
    let mut cmd = cli_command();
    cmd.args(["--verbose", "list"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Available scenarios:"));
}

#[test]
fn test_cli_list_help() {
    let mut cmd = cli_command();
    cmd.args(["list", "--help"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("List available scenarios"))
        .stdout(predicate::str::contains("--verbose"));
}
