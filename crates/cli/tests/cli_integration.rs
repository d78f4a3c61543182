//! CLI integration tests for the `sustain` binary.
//!
//! Every test runs in its own temp directory with an explicit `--state`
//! file, so no `sustain.toml` from the workspace is picked up. Logging is
//! switched off to keep stderr limited to the error report.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const OWNER: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";
const MANAGER: &str = "ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG";
const STRANGER: &str = "ST2JHG361ZXG51QTKY2NQCVBPPRRE2KZB1HR05NNC";

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn state(&self) -> PathBuf {
        self.dir.path().join("registry.json")
    }

    /// A `sustain` command rooted in the temp dir, pointed at its state file.
    fn sustain(&self) -> Command {
        let mut cmd = self.bare();
        cmd.arg("--state").arg(self.state());
        cmd
    }

    /// A `sustain` command without `--state`.
    fn bare(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("sustain");
        cmd.current_dir(self.dir.path());
        for var in [
            "SUSTAIN_STATE",
            "SUSTAIN_CLOCK",
            "SUSTAIN_CALLER",
            "SUSTAIN_PORT",
            "SUSTAIN_RATE_LIMIT",
            "SUSTAIN_API_KEY",
            "RUST_LOG",
        ] {
            cmd.env_remove(var);
        }
        cmd.env("SUSTAIN_LOG", "off");
        cmd
    }

    fn init(&self) {
        self.sustain()
            .args(["init", "--owner", OWNER])
            .assert()
            .success();
    }

    fn verify_manager(&self, manager: &str, level: &str) {
        self.sustain()
            .args([
                "verify",
                manager,
                "--name",
                "Green Fund",
                "--organization",
                "EcoCapital",
                "--level",
                level,
                "--caller",
                OWNER,
            ])
            .assert()
            .success();
    }
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

fn stderr_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stderr).expect("stderr should be JSON")
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    Workspace::new()
        .bare()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Sustainability manager verification registry",
        ));
}

#[test]
fn version_exits_0() {
    Workspace::new()
        .bare()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sustain"));
}

#[test]
fn list_flags_conflict() {
    Workspace::new()
        .sustain()
        .args(["list", "--active", "--revoked"])
        .assert()
        .failure();
}

// ──────────────────────────────────────────────
// 2. Init
// ──────────────────────────────────────────────

#[test]
fn init_creates_state_file() {
    let ws = Workspace::new();
    assert!(!ws.state().exists());
    ws.sustain()
        .args(["init", "--owner", OWNER])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("owner: {}", OWNER)));
    assert!(ws.state().exists());
}

#[test]
fn init_twice_fails_with_106() {
    let ws = Workspace::new();
    ws.init();
    ws.sustain()
        .args(["init", "--owner", STRANGER])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[106]"));
}

#[test]
fn verify_before_init_fails_with_105() {
    let ws = Workspace::new();
    ws.sustain()
        .args([
            "verify", MANAGER, "--name", "n", "--organization", "o", "--level", "1", "--caller",
            OWNER,
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[105]: Registry not initialized"));
}

// ──────────────────────────────────────────────
// 3. Verify / status / details
// ──────────────────────────────────────────────

#[test]
fn verify_then_status_reports_verified() {
    let ws = Workspace::new();
    ws.init();
    ws.verify_manager(MANAGER, "3");
    ws.sustain()
        .args(["status", MANAGER])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("{}: verified", MANAGER)));
}

#[test]
fn status_of_unknown_manager_is_not_verified() {
    let ws = Workspace::new();
    ws.init();
    let output = ws
        .sustain()
        .args(["--output", "json", "status", STRANGER])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["verified"], false);
    assert_eq!(json["manager"], STRANGER);
}

#[test]
fn verify_json_output_has_camel_case_details() {
    let ws = Workspace::new();
    ws.init();
    let output = ws
        .sustain()
        .args([
            "--output",
            "json",
            "verify",
            MANAGER,
            "--name",
            "Green Fund",
            "--organization",
            "EcoCapital",
            "--level",
            "3",
            "--caller",
            OWNER,
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["success"], true);
    assert_eq!(json["verified"], true);
    assert_eq!(json["manager"], MANAGER);
    assert_eq!(json["details"]["name"], "Green Fund");
    assert_eq!(json["details"]["organization"], "EcoCapital");
    assert_eq!(json["details"]["certificationLevel"], 3);
    // Block clock: init is height 1, verify height 2.
    assert_eq!(json["details"]["verifiedAt"], 2);
}

#[test]
fn duplicate_verify_fails_with_101() {
    let ws = Workspace::new();
    ws.init();
    ws.verify_manager(MANAGER, "3");
    ws.sustain()
        .args([
            "verify", MANAGER, "--name", "Other", "--organization", "Org", "--level", "2",
            "--caller", OWNER,
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[101]: Already verified"));
}

#[test]
fn json_errors_carry_code_and_message() {
    let ws = Workspace::new();
    ws.init();
    ws.verify_manager(MANAGER, "3");
    let output = ws
        .sustain()
        .args([
            "--output",
            "json",
            "verify",
            MANAGER,
            "--name",
            "Other",
            "--organization",
            "Org",
            "--level",
            "2",
            "--caller",
            OWNER,
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let json = stderr_json(&output);
    assert_eq!(json["code"], 101);
    assert_eq!(json["message"], "Already verified");
}

#[test]
fn non_owner_verify_fails_with_100() {
    let ws = Workspace::new();
    ws.init();
    ws.sustain()
        .args([
            "verify", MANAGER, "--name", "n", "--organization", "o", "--level", "1", "--caller",
            STRANGER,
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[100]: Not authorized"));
    ws.sustain()
        .args(["status", MANAGER])
        .assert()
        .success()
        .stdout(predicate::str::contains("not verified"));
}

#[test]
fn out_of_range_level_fails_with_103() {
    let ws = Workspace::new();
    ws.init();
    ws.sustain()
        .args([
            "verify", MANAGER, "--name", "n", "--organization", "o", "--level", "9", "--caller",
            OWNER,
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[103]"));
}

#[test]
fn missing_caller_is_a_usage_error() {
    let ws = Workspace::new();
    ws.init();
    ws.sustain()
        .args([
            "verify", MANAGER, "--name", "n", "--organization", "o", "--level", "1",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[104]: no caller given"));
}

#[test]
fn details_of_unknown_manager_prints_null() {
    let ws = Workspace::new();
    ws.init();
    ws.sustain()
        .args(["--output", "json", "details", STRANGER])
        .assert()
        .success()
        .stdout(predicate::str::diff("null\n"));
    ws.sustain()
        .args(["details", STRANGER])
        .assert()
        .success()
        .stdout(predicate::str::contains("no verification record"));
}

// ──────────────────────────────────────────────
// 4. Revoke / list / history
// ──────────────────────────────────────────────

#[test]
fn revoke_keeps_record_with_revoked_flag() {
    let ws = Workspace::new();
    ws.init();
    ws.verify_manager(MANAGER, "4");
    ws.sustain()
        .args(["revoke", MANAGER, "--caller", OWNER])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Revoked {}", MANAGER)));

    ws.sustain()
        .args(["status", MANAGER])
        .assert()
        .success()
        .stdout(predicate::str::contains("not verified"));

    let output = ws
        .sustain()
        .args(["--output", "json", "details", MANAGER])
        .output()
        .unwrap();
    let json = stdout_json(&output);
    assert_eq!(json["revoked"], true);
    assert_eq!(json["certificationLevel"], 4);
    assert_eq!(json["verifiedAt"], 2);
    assert_eq!(json["revokedAt"], 3);
}

#[test]
fn revoke_unverified_fails_with_102() {
    let ws = Workspace::new();
    ws.init();
    ws.sustain()
        .args(["revoke", MANAGER, "--caller", OWNER])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[102]: Not verified"));
}

#[test]
fn list_filters_by_status() {
    let ws = Workspace::new();
    ws.init();
    ws.verify_manager(MANAGER, "3");
    ws.verify_manager(STRANGER, "2");
    ws.sustain()
        .args(["revoke", STRANGER, "--caller", OWNER])
        .assert()
        .success();

    let all = stdout_json(
        &ws.sustain()
            .args(["--output", "json", "list"])
            .output()
            .unwrap(),
    );
    assert_eq!(all.as_array().unwrap().len(), 2);

    let active = stdout_json(
        &ws.sustain()
            .args(["--output", "json", "list", "--active"])
            .output()
            .unwrap(),
    );
    assert_eq!(active.as_array().unwrap().len(), 1);
    assert_eq!(active[0]["manager"], MANAGER);

    ws.sustain()
        .args(["list", "--revoked"])
        .assert()
        .success()
        .stdout(predicate::str::contains(STRANGER).and(predicate::str::contains("revoked")));
}

#[test]
fn history_shows_manager_events_in_order() {
    let ws = Workspace::new();
    ws.init();
    ws.verify_manager(MANAGER, "3");
    ws.sustain()
        .args(["revoke", MANAGER, "--caller", OWNER])
        .assert()
        .success();

    let events = stdout_json(
        &ws.sustain()
            .args(["--output", "json", "history", MANAGER])
            .output()
            .unwrap(),
    );
    let kinds: Vec<&str> = events
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["verified", "revoked"]);

    ws.sustain()
        .args(["history", "--limit", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("initialized"));
}

// ──────────────────────────────────────────────
// 5. Ownership and audit
// ──────────────────────────────────────────────

#[test]
fn transfer_owner_hands_over_privileges() {
    let ws = Workspace::new();
    ws.init();
    ws.sustain()
        .args(["transfer-owner", STRANGER, "--caller", OWNER])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("{} -> {}", OWNER, STRANGER)));

    ws.sustain()
        .args([
            "verify", MANAGER, "--name", "n", "--organization", "o", "--level", "1", "--caller",
            OWNER,
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[100]"));

    ws.sustain()
        .args([
            "verify", MANAGER, "--name", "n", "--organization", "o", "--level", "1", "--caller",
            STRANGER,
        ])
        .assert()
        .success();
}

#[test]
fn audit_passes_on_untouched_state() {
    let ws = Workspace::new();
    ws.init();
    ws.verify_manager(MANAGER, "3");
    ws.sustain()
        .arg("audit")
        .assert()
        .success()
        .stdout(predicate::str::contains("Audit chain OK (2 events)"));
}

#[test]
fn audit_detects_edited_state_file() {
    let ws = Workspace::new();
    ws.init();
    ws.verify_manager(MANAGER, "3");

    let mut state: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(ws.state()).unwrap()).unwrap();
    state["events"][1]["certificationLevel"] = serde_json::json!(5);
    fs::write(ws.state(), serde_json::to_string_pretty(&state).unwrap()).unwrap();

    ws.sustain()
        .arg("audit")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[107]"));
}

// ──────────────────────────────────────────────
// 6. Configuration
// ──────────────────────────────────────────────

fn write_config(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("sustain.toml");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn config_file_supplies_state_and_caller() {
    let ws = Workspace::new();
    write_config(
        ws.dir.path(),
        &format!("state = \"custom.json\"\ncaller = \"{}\"\n", OWNER),
    );
    ws.bare()
        .args(["init", "--owner", OWNER])
        .assert()
        .success();
    assert!(ws.dir.path().join("custom.json").exists());

    ws.bare()
        .args([
            "verify", MANAGER, "--name", "n", "--organization", "o", "--level", "2",
        ])
        .assert()
        .success();
}

#[test]
fn config_policy_narrows_levels() {
    let ws = Workspace::new();
    let config = write_config(
        ws.dir.path(),
        "[policy]\nmax_certification_level = 3\n",
    );
    ws.sustain()
        .arg("--config")
        .arg(&config)
        .args(["init", "--owner", OWNER])
        .assert()
        .success();
    ws.sustain()
        .arg("--config")
        .arg(&config)
        .args([
            "verify", MANAGER, "--name", "n", "--organization", "o", "--level", "4", "--caller",
            OWNER,
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[103]"));
}

#[test]
fn env_state_override() {
    let ws = Workspace::new();
    let path = ws.dir.path().join("from-env.json");
    ws.bare()
        .env("SUSTAIN_STATE", &path)
        .args(["init", "--owner", OWNER])
        .assert()
        .success();
    assert!(path.exists());
}

#[test]
fn malformed_config_is_reported() {
    let ws = Workspace::new();
    let config = write_config(ws.dir.path(), "state = [not toml");
    ws.sustain()
        .arg("--config")
        .arg(&config)
        .arg("audit")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error parsing config"));
}

#[test]
fn quiet_suppresses_confirmation_but_not_answers() {
    let ws = Workspace::new();
    ws.sustain()
        .args(["--quiet", "init", "--owner", OWNER])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
    ws.sustain()
        .args(["--quiet", "status", MANAGER])
        .assert()
        .success()
        .stdout(predicate::str::contains("not verified"));
}
