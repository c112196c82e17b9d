use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use assert_fs::prelude::*;
use chrono::{Duration, Utc};
use predicates::prelude::*;
use serde_json::json;

/// Run qhlog with given args.
fn qhlog() -> Command {
    let mut cmd = cargo_bin_cmd!("qhlog");
    cmd.env_remove("QHLOG_CONFIG")
        .env_remove("QHLOG_LOG_PATH")
        .env("NO_COLOR", "1");
    cmd
}

/// One log line captured `hours_ago` hours before now.
fn entry_line(hours_ago: i64, records: serde_json::Value) -> String {
    let count = records.as_array().map(|a| a.len()).unwrap_or(0);
    let line = json!({
        "captured_at": (Utc::now() - Duration::hours(hours_ago)).to_rfc3339(),
        "record_count": count,
        "records": records,
    });
    format!("{line}\n")
}

fn write_log(dir: &assert_fs::TempDir, content: &str) {
    dir.child("query_history_log.jsonl").write_str(content).unwrap();
}

fn sample_log() -> String {
    let mut log = String::new();
    log.push_str(&entry_line(
        48,
        json!([{"query_text": "SELECT old_stuff", "cpu_time_ms": 900}]),
    ));
    log.push_str(&entry_line(
        2,
        json!([
            {"query_text": "SELECT * FROM sales", "cpu_time_ms": 150, "elapsed_time_ms": 200},
            {"query_text": "SELECT 1", "cpu_time_ms": 1, "elapsed_time_ms": 1}
        ]),
    ));
    log.push_str(&entry_line(
        1,
        json!([{"query_text": "select  *  from sales", "cpu_time_ms": 50}]),
    ));
    log
}

// ─── Read tests ──────────────────────────────────────────────────

#[test]
fn read_shows_recent_queries() {
    let dir = assert_fs::TempDir::new().unwrap();
    write_log(&dir, &sample_log());

    qhlog()
        .current_dir(dir.path())
        .arg("read")
        .assert()
        .success()
        .stdout(predicate::str::contains("3 queries"))
        .stdout(predicate::str::contains("SELECT * FROM sales"))
        .stdout(predicate::str::contains("old_stuff").not());
}

#[test]
fn read_all_includes_old_captures() {
    let dir = assert_fs::TempDir::new().unwrap();
    write_log(&dir, &sample_log());

    qhlog()
        .current_dir(dir.path())
        .args(["read", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("old_stuff"));
}

#[test]
fn read_filters_by_search_and_cpu() {
    let dir = assert_fs::TempDir::new().unwrap();
    write_log(&dir, &sample_log());

    let output = qhlog()
        .current_dir(dir.path())
        .args(["read", "--search", "SALES", "--min-cpu", "100", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let rows: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["query_text"], "SELECT * FROM sales");
    assert!(rows[0]["captured_at"].is_string());
}

#[test]
fn read_last_limits_rows() {
    let dir = assert_fs::TempDir::new().unwrap();
    write_log(&dir, &sample_log());

    let output = qhlog()
        .current_dir(dir.path())
        .args(["read", "--last", "1", "--json"])
        .output()
        .unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 1);
    assert!(stdout.contains("select  *  from sales"));
}

#[test]
fn read_missing_log_reports_nothing_found() {
    let dir = assert_fs::TempDir::new().unwrap();

    qhlog()
        .current_dir(dir.path())
        .arg("read")
        .assert()
        .success()
        .stdout(predicate::str::contains("No captured queries found"));
}

#[test]
fn read_ignores_truncated_final_line() {
    let dir = assert_fs::TempDir::new().unwrap();
    let mut log = sample_log();
    log.push_str("{\"captured_at\":\"2026-");
    write_log(&dir, &log);

    qhlog()
        .current_dir(dir.path())
        .arg("read")
        .assert()
        .success()
        .stdout(predicate::str::contains("3 queries"))
        .stdout(predicate::str::contains("incomplete final line"));
}

#[test]
fn read_json_stays_parseable_with_damaged_log() {
    let dir = assert_fs::TempDir::new().unwrap();
    let mut log = entry_line(1, json!([{"query_text": "SELECT 1", "cpu_time_ms": 1}]));
    log.push_str("garbage\n");
    log.push_str(&entry_line(1, json!([{"query_text": "SELECT 2", "cpu_time_ms": 2}])));
    log.push_str("{\"captured_at\":\"20");
    write_log(&dir, &log);

    let output = qhlog()
        .current_dir(dir.path())
        .args(["read", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let rows: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(rows.len(), 2);

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("incomplete final line"));
    assert!(stderr.contains("Skipped 1 malformed line(s)"));
}

#[test]
fn read_twice_is_identical() {
    let dir = assert_fs::TempDir::new().unwrap();
    write_log(&dir, &sample_log());

    let run = || {
        qhlog()
            .current_dir(dir.path())
            .args(["read", "--all", "--json"])
            .output()
            .unwrap()
            .stdout
    };
    assert_eq!(run(), run());
}

// ─── Summary tests ───────────────────────────────────────────────

#[test]
fn summary_groups_patterns() {
    let dir = assert_fs::TempDir::new().unwrap();
    write_log(&dir, &sample_log());

    qhlog()
        .current_dir(dir.path())
        .arg("summary")
        .assert()
        .success()
        .stdout(predicate::str::contains("Total query executions logged: 3"))
        .stdout(predicate::str::contains("Unique query patterns: 3"))
        .stdout(predicate::str::contains("1. "));
}

#[test]
fn summary_top_limits_output() {
    let dir = assert_fs::TempDir::new().unwrap();
    write_log(&dir, &sample_log());

    qhlog()
        .current_dir(dir.path())
        .args(["summary", "--all", "--top", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Top 1 most frequent"))
        .stdout(predicate::str::contains("2. ").not());
}

// ─── Status tests ────────────────────────────────────────────────

#[test]
fn status_reports_entries() {
    let dir = assert_fs::TempDir::new().unwrap();
    write_log(&dir, &sample_log());

    qhlog()
        .current_dir(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("3 entries, 4 records"))
        .stdout(predicate::str::contains("All lines intact"));
}

#[test]
fn status_flags_damaged_lines() {
    let dir = assert_fs::TempDir::new().unwrap();
    let mut log = entry_line(3, json!([]));
    log.push_str("garbage\n");
    log.push_str(&entry_line(2, json!([])));
    log.push_str("{\"partial");
    write_log(&dir, &log);

    qhlog()
        .current_dir(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 entries, 0 records"))
        .stdout(predicate::str::contains("1 malformed line(s)"))
        .stdout(predicate::str::contains("Final line is incomplete"));
}

#[test]
fn status_without_log() {
    let dir = assert_fs::TempDir::new().unwrap();

    qhlog()
        .current_dir(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No capture log yet"));
}
