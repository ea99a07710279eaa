//! Integration tests for the `nspanel` binary. None of them need a running
//! Home Assistant.
#![allow(clippy::unwrap_used)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

const CONFIG: &str = "
home_assistant:
  url: http://ha.lan:8123
panels:
  - name: hall
    panelRecvTopic: tele/hall/RESULT
    panelSendTopic: cmnd/hall/CustomSend
    cards:
      - type: cardEntities
        heading: Lights
        key: lights
        entities:
          - light.kitchen
          - navigate.heat
    hiddenCards:
      - type: cardThermo
        key: heat
        entities:
          - climate.living
";

// ── Helpers ─────────────────────────────────────────────────────────

/// The binary with config discovery pointed away from the user's files.
fn nspanel_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("nspanel");
    cmd.env("HOME", "/tmp/nspanel-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/nspanel-cli-test-nonexistent")
        .env_remove("NSPANEL_CONFIG")
        .env_remove("NSPANEL_LOG_FILE")
        .env_remove("NSPANEL_HOME_ASSISTANT__URL")
        .env_remove("NSPANEL_HOME_ASSISTANT__TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("nspanel.yaml");
    fs::write(&path, contents).unwrap();
    path
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_usage() {
    nspanel_cmd()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_help_lists_subcommands() {
    nspanel_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("NSPanel")
            .and(predicate::str::contains("run"))
            .and(predicate::str::contains("check")),
    );
}

#[test]
fn test_version_flag() {
    nspanel_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("nspanel"));
}

// ── check ───────────────────────────────────────────────────────────

#[test]
fn test_check_summarises_panels() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, CONFIG);

    nspanel_cmd()
        .arg("check")
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("panel hall (tele/hall/RESULT -> cmnd/hall/CustomSend)")
                .and(predicate::str::contains("cardEntities"))
                .and(predicate::str::contains("navigate.heat hidden"))
                .and(predicate::str::contains("ok: 1 panel(s)")),
        );
}

#[test]
fn test_check_rejects_unknown_card_type() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, &CONFIG.replace("cardThermo", "cardHologram"));

    nspanel_cmd()
        .args(["check", "--config"])
        .arg(&path)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("cardHologram"));
}

#[test]
fn test_check_with_missing_file() {
    nspanel_cmd()
        .args(["check", "--config", "/tmp/nspanel-cli-test-nonexistent/panels.yaml"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_run_without_token_fails_before_connecting() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        &CONFIG.replace(
            "url: http://ha.lan:8123",
            "url: http://ha.lan:8123\n  token_env: NSPANEL_CLI_TEST_UNSET_TOKEN",
        ),
    );

    nspanel_cmd()
        .args(["run", "--config"])
        .arg(&path)
        .env_remove("NSPANEL_CLI_TEST_UNSET_TOKEN")
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .failure();
}
