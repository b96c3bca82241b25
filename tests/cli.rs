use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;

const NOON: &str = "2026-02-01T12:00:00Z";

fn grind(db: &Path, now: &str) -> Command {
    let mut cmd = Command::cargo_bin("grind").expect("binary grind is built");
    cmd.env_remove("GRIND_DB_PATH")
        .env_remove("GRIND_NOW")
        .env_remove("GRIND_LOG")
        .env("NO_COLOR", "1")
        .args(["--db", db.to_str().unwrap(), "--now", now]);
    cmd
}

fn json(db: &Path, now: &str, args: &[&str]) -> Value {
    let out = grind(db, now)
        .args(["--format", "json"])
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&out).expect("valid json")
}

fn balance(db: &Path) -> i64 {
    json(db, NOON, &["balance"])["balance"].as_i64().unwrap()
}

#[test]
fn manual_log_awards_points_and_flags_review() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("db.json");

    let v = json(&db, NOON, &["log", "Deep Work", "--minutes", "60", "--activity", "coding"]);
    assert_eq!(v["award"]["points"], 10);
    assert_eq!(v["session"]["source"], "manual");
    assert_eq!(v["session"]["review_flag"], true);
    assert_eq!(v["session"]["activity_id"], "a0002");
    assert_eq!(v["ledger_entry"]["type"], "earn_session");
    assert_eq!(v["ledger_entry"]["reference_id"], v["session"]["id"]);

    assert_eq!(balance(&db), 10);
}

#[test]
fn short_session_is_stored_without_points() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("db.json");

    let v = json(&db, NOON, &["log", "fitness", "--minutes", "4"]);
    assert_eq!(v["award"]["points"], 0);
    assert_eq!(v["award"]["below_minimum"], true);
    assert!(v["ledger_entry"].is_null());
    assert_eq!(v["domain"]["lifetime_minutes"], 4);

    let sessions = json(&db, NOON, &["sessions"]);
    assert_eq!(sessions["sessions"].as_array().unwrap().len(), 1);
    assert_eq!(balance(&db), 0);
}

#[test]
fn zero_minutes_is_rejected_as_too_short() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("db.json");

    grind(&db, NOON)
        .args(["log", "fitness", "--minutes", "0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Session too short"));
}

#[test]
fn timer_flow_start_twice_then_stop() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("db.json");

    grind(&db, "2026-02-01T09:00:00Z")
        .args(["start", "deep", "--activity", "writing"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Timer started for Deep Work"));

    grind(&db, "2026-02-01T09:10:00Z")
        .args(["start", "fitness"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("already active"));

    let status = json(&db, "2026-02-01T09:20:00Z", &["status"]);
    assert_eq!(status["active_session"]["elapsed_minutes"], 20);

    let v = json(&db, "2026-02-01T09:30:00Z", &["stop"]);
    assert_eq!(v["session"]["duration_minutes"], 30);
    assert_eq!(v["session"]["source"], "timer");
    assert_eq!(v["session"]["review_flag"], false);
    assert_eq!(v["award"]["points"], 5);

    grind(&db, "2026-02-01T09:31:00Z")
        .arg("stop")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No active session"));
}

#[test]
fn stop_within_first_minute_is_too_short_and_keeps_timer() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("db.json");

    grind(&db, "2026-02-01T09:00:00Z").args(["start", "learning"]).assert().success();
    grind(&db, "2026-02-01T09:00:40Z").arg("stop").assert().code(2);

    let status = json(&db, "2026-02-01T09:01:00Z", &["status"]);
    assert!(status["active_session"].is_object());

    grind(&db, "2026-02-01T09:02:00Z").arg("cancel").assert().success();
    let status = json(&db, "2026-02-01T09:03:00Z", &["status"]);
    assert!(status["active_session"].is_null());
}

#[test]
fn soft_cap_reduces_rate_for_the_rest_of_the_day() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("db.json");

    json(&db, "2026-02-01T18:00:00Z", &["log", "deep", "--minutes", "360", "--at", "2026-02-01T08:00:00Z"]);
    let v = json(&db, "2026-02-01T20:00:00Z", &["log", "deep", "--minutes", "60"]);
    assert_eq!(v["award"]["applies_penalty"], true);
    assert_eq!(v["award"]["points"], 7);
}

#[test]
fn hard_cap_rejection_leaves_no_trace() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("db.json");

    json(&db, "2026-02-01T20:00:00Z", &["log", "deep", "--minutes", "700"]);
    let before = json(&db, NOON, &["ledger"]);

    grind(&db, "2026-02-01T21:00:00Z")
        .args(["log", "fitness", "--minutes", "25"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("hard cap"));

    assert_eq!(json(&db, NOON, &["ledger"]), before);
    let fitness = json(&db, NOON, &["level", "fitness"]);
    assert_eq!(fitness["domains"][0]["lifetime_minutes"], 0);
    assert_eq!(json(&db, NOON, &["sessions"])["sessions"].as_array().unwrap().len(), 1);
}

#[test]
fn bonus_then_purchase_then_cooldown() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("db.json");

    let v = json(&db, "2026-02-01T08:00:00Z", &["bonus", "award", "Finished course", "--points", "200"]);
    assert_eq!(v["ledger_entry"]["type"], "earn_bonus");

    grind(&db, "2026-02-01T09:00:00Z")
        .args(["buy", "movie"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--yes"));

    let v = json(&db, "2026-02-01T09:00:00Z", &["buy", "movie", "--yes"]);
    assert_eq!(v["redemption"]["price_points"], 60);
    assert_eq!(v["ledger_entry"]["points_delta"], -60);
    assert_eq!(v["balance_after"], 140);

    // Enough funds, so the cooldown is what stops the repurchase.
    grind(&db, "2026-02-01T09:00:00Z")
        .args(["buy", "movie", "--yes"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("On cooldown: 7 day(s) left"));

    let shop = json(&db, "2026-02-02T09:00:00Z", &["shop", "list"]);
    let movie = shop["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["item"]["id"] == "i0002")
        .unwrap()
        .clone();
    assert_eq!(movie["achieved_count"], 1);
    assert_eq!(movie["cooldown_days_left"], 6);
    assert_eq!(balance(&db), 140);

    let v = json(&db, "2026-02-09T09:00:00Z", &["buy", "movie", "--yes"]);
    assert_eq!(v["balance_after"], 80);
    assert_eq!(json(&db, NOON, &["redemptions"])["redemptions"].as_array().unwrap().len(), 2);
}

#[test]
fn rejected_purchase_is_reported_once() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("db.json");

    let out = grind(&db, NOON)
        .args(["buy", "movie", "--yes"])
        .assert()
        .code(6)
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(out).unwrap();
    assert_eq!(stderr.lines().count(), 1, "{}", stderr);
    assert!(stderr.starts_with("error: Insufficient balance"));
    assert!(!stderr.contains("WARN"));
    assert!(!stderr.contains("purchase rejected"));
}

#[test]
fn purchase_without_funds_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("db.json");

    grind(&db, NOON)
        .args(["buy", "fancy", "--yes"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("Insufficient balance"));

    assert!(json(&db, NOON, &["redemptions"])["redemptions"]
        .as_array()
        .unwrap()
        .is_empty());
}

#[test]
fn review_items_need_explicit_confirmation() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("db.json");
    json(&db, NOON, &["bonus", "award", "Big win", "--points", "500"]);

    grind(&db, NOON)
        .args(["buy", "day off", "--yes"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("requires review"));

    let v = json(&db, NOON, &["buy", "day off", "--yes", "--reviewed"]);
    assert_eq!(v["balance_after"], 100);
}

#[test]
fn inactive_domain_rejects_sessions_until_reactivated() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("db.json");

    grind(&db, NOON).args(["domain", "deactivate", "fitness"]).assert().success();
    grind(&db, NOON)
        .args(["log", "fitness", "--minutes", "30"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("inactive"));

    let listed = json(&db, NOON, &["domain", "list"]);
    assert_eq!(listed["domains"].as_array().unwrap().len(), 2);

    grind(&db, NOON).args(["domain", "activate", "d0002"]).assert().success();
    json(&db, NOON, &["log", "fitness", "--minutes", "30"]);
}

#[test]
fn table_output_renders_status() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("db.json");
    json(&db, NOON, &["log", "deep", "--minutes", "90"]);

    grind(&db, NOON)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Balance: 15"))
        .stdout(predicate::str::contains("placeholder catalog"))
        .stdout(predicate::str::contains("Deep Work"));
}
