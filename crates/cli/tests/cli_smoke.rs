// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-level smoke tests for the `orchard` binary.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use assert_cmd::Command;

#[test]
fn help_lists_subcommands() {
    let assert = Command::cargo_bin("orchard").unwrap().arg("--help").assert();
    let output = assert.success().get_output().stdout.clone();
    let help = String::from_utf8_lossy(&output);
    for subcommand in ["project", "daemon", "run", "status", "logs", "send"] {
        assert!(help.contains(subcommand), "missing subcommand {}", subcommand);
    }
}

#[test]
fn version_prints() {
    let assert = Command::cargo_bin("orchard")
        .unwrap()
        .arg("--version")
        .assert()
        .success();
    let output = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    assert!(output.contains("orchard"), "got: {}", output);
}

#[test]
fn unknown_subcommand_fails() {
    Command::cargo_bin("orchard")
        .unwrap()
        .arg("frobnicate")
        .assert()
        .failure();
}
