use std::path::Path;

use assert_cmd::Command;
use chrono::{Duration, SecondsFormat, Utc};
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::{TempDir, tempdir};

fn horizon(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("horizon").unwrap();
    cmd.current_dir(dir)
        .env("HORIZON_DB", dir.join("horizon.db"))
        .env("HORIZON_LOG", "off")
        .env("NO_COLOR", "1");
    cmd
}

fn run_json(dir: &Path, args: &[&str]) -> Value {
    let output = horizon(dir).args(args).assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout should be json")
}

fn error_json(dir: &Path, args: &[&str]) -> Value {
    let output = horizon(dir).args(args).assert().failure().get_output().stderr.clone();
    serde_json::from_slice(&output).expect("stderr should be json")
}

fn iso(offset: Duration) -> String {
    (Utc::now() + offset).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Users 1 and 2; user 1 owns a daily template, a parent with two children,
/// a private task, a shared task and a task finished a few minutes ago.
fn seeded() -> TempDir {
    let dir = tempdir().unwrap();
    let created = iso(-Duration::days(3));
    let task = |id: i64, name: &str, user: i64| {
        json!({
            "id": id,
            "name": name,
            "user_id": user,
            "created_at": created,
            "updated_at": created,
        })
    };

    let mut template = task(1, "Stretch", 1);
    template["due_date"] = json!(iso(-Duration::days(2)));
    template["recurrence"] = json!({"type": "daily"});
    let mut child_a = task(3, "Outline", 1);
    child_a["parent_task_id"] = json!(2);
    let mut child_b = task(4, "Draft", 1);
    child_b["parent_task_id"] = json!(2);
    child_b["status"] = json!("done");
    child_b["completed_at"] = json!(iso(-Duration::minutes(5)));

    let snapshot = json!({
        "users": [{"id": 1, "timezone": "UTC"}, {"id": 2, "timezone": "Asia/Tokyo"}],
        "projects": [{"id": 1, "user_id": 1, "name": "Home"}],
        "tasks": [
            template,
            task(2, "Write essay", 1),
            child_a,
            child_b,
            task(5, "Private", 1),
            task(6, "Shared", 1),
        ],
        "grants": [{
            "resource_type": "task",
            "resource_id": 6,
            "grantee_id": 2,
            "access_level": "read_only",
            "grantor_id": 1
        }]
    });
    let path = dir.path().join("snapshot.json");
    std::fs::write(&path, serde_json::to_string_pretty(&snapshot).unwrap()).unwrap();

    let summary = run_json(dir.path(), &["import", "snapshot.json"]);
    assert_eq!(summary["tasks"], 6);
    assert_eq!(summary["grants"], 1);
    dir
}

#[test]
fn generate_is_idempotent() {
    let dir = seeded();

    let first = run_json(dir.path(), &["generate", "--user", "1", "--days", "3"]);
    assert_eq!(first["outcome"], "generated");
    assert_eq!(first["created"], 4);

    let second = run_json(dir.path(), &["generate", "--user", "1", "--days", "3"]);
    assert_eq!(second["created"], 0);
    assert_eq!(second["existing"], 4);
}

#[test]
fn metrics_report_has_seven_day_histogram() {
    let dir = seeded();

    let metrics = run_json(dir.path(), &["metrics", "--user", "1"]);

    let weekly = metrics["weekly_completions"].as_array().unwrap();
    assert_eq!(weekly.len(), 7);
    let total: u64 = weekly.iter().map(|d| d["count"].as_u64().unwrap()).sum();
    assert_eq!(total, 0, "subtasks are not counted");
    assert_eq!(metrics["timezone"], "UTC");
    assert_eq!(metrics["total_open_tasks"], 3);
}

#[test]
fn visibility_follows_grants() {
    let dir = seeded();

    let visible = run_json(dir.path(), &["visible", "--user", "2"]);
    let names: Vec<&str> = visible
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Shared"]);

    run_json(dir.path(), &["revoke", "6", "--from", "2"]);
    let visible = run_json(dir.path(), &["visible", "--user", "2"]);
    assert_eq!(visible.as_array().unwrap().len(), 0);

    run_json(dir.path(), &["grant", "--resource", "project", "1", "--to", "2", "--by", "1"]);
    let projects = run_json(dir.path(), &["visible", "--user", "2", "--resource", "project"]);
    assert_eq!(projects[0]["name"], "Home");
}

#[test]
fn finishing_last_child_completes_parent() {
    let dir = seeded();

    let change = run_json(dir.path(), &["status", "3", "done"]);
    assert_eq!(change["changed"], true);
    assert_eq!(change["parent"]["id"], 2);
    assert_eq!(change["parent"]["state"], "done");

    let reopened = run_json(dir.path(), &["status", "4", "in_progress"]);
    assert_eq!(reopened["parent"]["state"], "open");
}

#[test]
fn upcoming_pretty_groups_start_with_today() {
    let dir = seeded();

    horizon(dir.path())
        .args(["upcoming", "--user", "1", "--days", "2", "--pretty"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Today"))
        .stdout(predicate::str::contains("Tomorrow"))
        .stdout(predicate::str::contains("Stretch"));
}

#[test]
fn today_view_generates_before_listing() {
    let dir = seeded();

    let today = run_json(dir.path(), &["today", "--user", "1"]);
    let tasks = today.as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["name"], "Stretch");
    assert_eq!(tasks[0]["recurring_parent_id"], 1);
}

#[test]
fn rule_change_on_occurrence_is_rejected() {
    let dir = seeded();
    run_json(dir.path(), &["generate", "--user", "1", "--days", "1"]);

    let changed = run_json(dir.path(), &["rule-changed", "1"]);
    assert_eq!(changed["template_id"], 1);

    let err = error_json(dir.path(), &["rule-changed", "7"]);
    assert_eq!(err["error"], "invalid_input");

    let err = error_json(dir.path(), &["rule-changed", "999"]);
    assert_eq!(err["error"], "task_not_found");
}

#[test]
fn invalid_recurrence_in_snapshot_is_surfaced() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("bad.yaml"),
        "tasks:\n  - name: Broken\n    user_id: 1\n    created_at: \"2026-03-01T00:00:00Z\"\n    updated_at: \"2026-03-01T00:00:00Z\"\n    recurrence:\n      type: weekly\n      weekday: 9\n",
    )
    .unwrap();

    let err = error_json(dir.path(), &["import", "bad.yaml"]);
    assert_eq!(err["error"], "invalid_recurrence_rule");
}

#[test]
fn broken_config_is_reported() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("horizon.yaml"), "horizon_days: 0\n").unwrap();

    let err = error_json(dir.path(), &["metrics", "--user", "1"]);
    assert_eq!(err["error"], "invalid_config");
}

#[test]
fn version_reports_package_version() {
    let dir = tempdir().unwrap();
    horizon(dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
