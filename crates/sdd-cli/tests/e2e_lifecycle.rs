//! E2E lifecycle tests: init, create, next, start, end, block, delete.
//!
//! Every test runs the real `sdd` binary in its own temp project.

use assert_cmd::Command;
use predicates::prelude::*;
use fs2::FileExt;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::path::Path;
use tempfile::TempDir;

fn sdd_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sdd"));
    cmd.current_dir(dir);
    cmd.env("SDD_LOG", "error");
    cmd.env_remove("FORMAT");
    cmd
}

fn init_project() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    sdd_cmd(dir.path()).args(["init"]).assert().success();
    dir
}

fn run_json(dir: &Path, args: &[&str]) -> Value {
    let output = sdd_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("command should not crash");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON")
}

fn create_item(dir: &Path, title: &str, extra: &[&str]) -> String {
    let mut args = vec!["create", "--title", title];
    args.extend_from_slice(extra);
    let json = run_json(dir, &args);
    json["id"].as_str().expect("id must exist").to_string()
}

fn status_of(dir: &Path, id: &str) -> String {
    let json = run_json(dir, &["show", id]);
    json["status"].as_str().expect("status").to_string()
}

const ALL_PASS: [&str; 6] = [
    "--check",
    "tests=pass",
    "--check",
    "lint=pass",
    "--check",
    "acceptance_criteria=pass",
];

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn init_creates_store_and_config() {
    let dir = init_project();
    assert!(dir.path().join(".sdd").join("config.toml").exists());
    let json = run_json(dir.path(), &["init"]);
    assert_eq!(json["ok"], true);
}

#[test]
fn commands_outside_a_project_exit_2() {
    let dir = TempDir::new().expect("tempdir");
    sdd_cmd(dir.path())
        .args(["list", "--json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("E1001"));
}

#[test]
fn held_store_lock_exits_3() {
    let dir = init_project();
    let sdd = dir.path().join(".sdd");
    fs::write(sdd.join("config.toml"), "[store]\nlock_timeout_ms = 100\n").expect("write config");

    let lock = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(sdd.join("lock"))
        .expect("open lock file");
    lock.lock_exclusive().expect("hold lock");

    sdd_cmd(dir.path())
        .args(["create", "--title", "Login", "--json"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("E5002"));

    FileExt::unlock(&lock).expect("release lock");
    assert!(run_json(dir.path(), &["list"]).as_array().expect("array").is_empty());
}

#[test]
fn create_derives_id_from_type_and_title() {
    let dir = init_project();
    let id = create_item(dir.path(), "User Login", &[]);
    assert_eq!(id, "feature_user_login");

    let bug = create_item(dir.path(), "User Login", &["--type", "bug", "--priority", "high"]);
    assert_eq!(bug, "bug_user_login");

    let again = create_item(dir.path(), "User Login", &[]);
    assert_eq!(again, "feature_user_login_2");
}

#[test]
fn create_rejects_blank_title() {
    let dir = init_project();
    sdd_cmd(dir.path())
        .args(["create", "--title", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("title"));
}

#[test]
fn next_prefers_the_shared_blocker() {
    let dir = init_project();
    let a = create_item(dir.path(), "A", &["--priority", "high"]);
    create_item(dir.path(), "B", &["--priority", "high", "--dep", &a]);
    create_item(dir.path(), "C", &["--priority", "high", "--dep", &a]);

    let json = run_json(dir.path(), &["next"]);
    assert_eq!(json["id"], a.as_str());
    assert_eq!(json["on_critical_path"], true);
    assert_eq!(json["bottleneck_score"], 2);
}

#[test]
fn next_on_empty_project_is_null() {
    let dir = init_project();
    let json = run_json(dir.path(), &["next"]);
    assert!(json.is_null());
}

#[test]
fn show_unknown_item_exits_2() {
    let dir = init_project();
    sdd_cmd(dir.path())
        .args(["show", "feature_missing"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("feature_missing"));
}

#[test]
fn full_session_completes_item() {
    let dir = init_project();
    let id = create_item(dir.path(), "Login", &[]);

    let started = run_json(dir.path(), &["start", &id]);
    assert_eq!(started["session"], 1);
    assert_eq!(status_of(dir.path(), &id), "in_progress");

    let mut args = vec!["end", id.as_str(), "--no-run", "--done"];
    args.extend_from_slice(&ALL_PASS);
    let ended = run_json(dir.path(), &args);
    assert_eq!(ended["verdict"]["passed"], true);
    assert_eq!(ended["session"]["status"], "completed");
    assert_eq!(status_of(dir.path(), &id), "completed");
}

#[test]
fn failing_check_exits_4_and_keeps_item_in_progress() {
    let dir = init_project();
    let id = create_item(dir.path(), "Login", &[]);
    sdd_cmd(dir.path()).args(["start", &id]).assert().success();

    sdd_cmd(dir.path())
        .args([
            "end",
            &id,
            "--no-run",
            "--done",
            "--check",
            "tests=pass",
            "--check",
            "lint=fail",
            "--check",
            "acceptance_criteria=pass",
            "--json",
        ])
        .assert()
        .code(4)
        .stdout(predicate::str::contains("\"lint\""))
        .stderr(predicate::str::contains("E6001"));

    assert_eq!(status_of(dir.path(), &id), "in_progress");
}

#[test]
fn end_without_open_session_is_rejected() {
    let dir = init_project();
    let id = create_item(dir.path(), "Login", &[]);
    sdd_cmd(dir.path())
        .args(["end", &id, "--no-run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("session"));
}

#[test]
fn start_refuses_item_with_unmet_dependencies() {
    let dir = init_project();
    let a = create_item(dir.path(), "A", &[]);
    let b = create_item(dir.path(), "B", &["--dep", &a]);
    sdd_cmd(dir.path()).args(["start", &b]).assert().failure();
    assert_eq!(status_of(dir.path(), &b), "not_started");
}

#[test]
fn block_and_unblock_round_trip() {
    let dir = init_project();
    let id = create_item(dir.path(), "Login", &[]);
    sdd_cmd(dir.path()).args(["start", &id]).assert().success();

    sdd_cmd(dir.path())
        .args(["block", &id, "--reason", "waiting on keys"])
        .assert()
        .success();
    assert_eq!(status_of(dir.path(), &id), "blocked");
    let status = run_json(dir.path(), &["status"]);
    assert_eq!(status["blocked"], 1);

    sdd_cmd(dir.path()).args(["unblock", &id]).assert().success();
    assert_eq!(status_of(dir.path(), &id), "in_progress");
}

#[test]
fn delete_refuses_until_detached() {
    let dir = init_project();
    let a = create_item(dir.path(), "A", &[]);
    let b = create_item(dir.path(), "B", &["--dep", &a]);

    sdd_cmd(dir.path())
        .args(["delete", &a])
        .assert()
        .failure()
        .stderr(predicate::str::contains(b.as_str()));

    let removed = run_json(dir.path(), &["delete", &a, "--detach"]);
    assert_eq!(removed["detached_from"][0], b.as_str());

    let shown = run_json(dir.path(), &["show", &b]);
    assert_eq!(shown["ready"], true);
}

#[test]
fn update_changes_only_given_fields() {
    let dir = init_project();
    let id = create_item(dir.path(), "Login", &["--milestone", "v1"]);
    let updated = run_json(dir.path(), &["update", &id, "--priority", "critical"]);
    assert_eq!(updated["priority"], "critical");
    assert_eq!(updated["milestone"], "v1");
    assert_eq!(updated["title"], "Login");
}

#[test]
fn text_output_is_tab_separated_rows() {
    let dir = init_project();
    let id = create_item(dir.path(), "Login", &[]);
    sdd_cmd(dir.path())
        .args(["list", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("{id}\tnot_started")));
}
