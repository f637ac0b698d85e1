//! E2E tests for the `tally` binary: fresh runs, update runs, watermark reuse.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn tally_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tally"));
    cmd.current_dir(dir);
    cmd.env("TALLY_LOG", "warn");
    cmd.env("NO_COLOR", "1");
    cmd
}

fn write_events(dir: &Path, name: &str, events: &Value) {
    fs::write(dir.join(name), serde_json::to_vec(events).unwrap()).unwrap();
}

fn read_summary(dir: &Path) -> Value {
    let text = fs::read_to_string(dir.join("summary.json")).expect("summary must exist");
    serde_json::from_str(&text).expect("summary must be JSON")
}

fn watermark(dir: &Path) -> Option<String> {
    fs::read_to_string(dir.join("last_processed_timestamp.txt")).ok()
}

#[test]
fn fresh_run_writes_summary_and_watermark() {
    let dir = TempDir::new().unwrap();
    write_events(
        dir.path(),
        "events.json",
        &json!([
            {"timestamp": 1000, "userId": "u1", "eventType": "post"},
            {"timestamp": 1200, "userId": "u1", "eventType": "comment"},
            {"timestamp": 90000, "userId": 2, "eventType": "likeReceived"}
        ]),
    );

    tally_cmd(dir.path())
        .args(["-i", "events.json", "-o", "summary.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("processed=3"));

    assert_eq!(
        read_summary(dir.path()),
        json!([
            {"userId": "u1", "date": "1970-01-01", "post": 1, "likeReceived": 0, "comment": 1},
            {"userId": 2, "date": "1970-01-02", "post": 0, "likeReceived": 1, "comment": 0}
        ])
    );
    assert_eq!(watermark(dir.path()).as_deref(), Some("90000"));
}

#[test]
fn summary_uses_two_space_indent() {
    let dir = TempDir::new().unwrap();
    write_events(
        dir.path(),
        "events.json",
        &json!([{"timestamp": 1000, "userId": "u1", "eventType": "post"}]),
    );

    tally_cmd(dir.path())
        .args(["-i", "events.json", "-o", "summary.json"])
        .assert()
        .success();

    let text = fs::read_to_string(dir.path().join("summary.json")).unwrap();
    assert!(text.contains("\n  {\n    \"userId\": \"u1\""));
}

#[test]
fn rerun_with_same_input_does_not_double_count() {
    let dir = TempDir::new().unwrap();
    write_events(
        dir.path(),
        "events.json",
        &json!([{"timestamp": 1000, "userId": "u1", "eventType": "post"}]),
    );

    for _ in 0..2 {
        tally_cmd(dir.path())
            .args(["-i", "events.json", "-o", "summary.json", "--update"])
            .assert()
            .success();
    }

    let summary = read_summary(dir.path());
    assert_eq!(summary[0]["post"], 1);
    assert_eq!(watermark(dir.path()).as_deref(), Some("1000"));
}

#[test]
fn update_mode_merges_new_events_into_prior_summary() {
    let dir = TempDir::new().unwrap();
    write_events(
        dir.path(),
        "day1.json",
        &json!([{"timestamp": 1000, "userId": "u1", "eventType": "post"}]),
    );
    write_events(
        dir.path(),
        "day1b.json",
        &json!([{"timestamp": 1500, "userId": "u1", "eventType": "comment"}]),
    );

    tally_cmd(dir.path())
        .args(["-i", "day1.json", "-o", "summary.json"])
        .assert()
        .success();
    tally_cmd(dir.path())
        .args(["-i", "day1b.json", "-o", "summary.json", "--update"])
        .assert()
        .success();

    assert_eq!(
        read_summary(dir.path()),
        json!([{"userId": "u1", "date": "1970-01-01", "post": 1, "likeReceived": 0, "comment": 1}])
    );
    assert_eq!(watermark(dir.path()).as_deref(), Some("1500"));
}

#[test]
fn unknown_event_type_warns_on_stderr_and_continues() {
    let dir = TempDir::new().unwrap();
    write_events(
        dir.path(),
        "events.json",
        &json!([{"timestamp": 2000, "userId": "u1", "eventType": "wave"}]),
    );

    tally_cmd(dir.path())
        .args(["-i", "events.json", "-o", "summary.json"])
        .assert()
        .success()
        .stderr(predicate::str::contains("unknown event type 'wave'"));

    assert_eq!(
        read_summary(dir.path()),
        json!([{"userId": "u1", "date": "1970-01-01", "post": 0, "likeReceived": 0, "comment": 0}])
    );
}

#[test]
fn json_report_lists_unknown_events() {
    let dir = TempDir::new().unwrap();
    write_events(
        dir.path(),
        "events.json",
        &json!([
            {"timestamp": 10, "userId": "u1", "eventType": "post"},
            {"timestamp": 20, "userId": "u1", "eventType": "share"}
        ]),
    );

    let output = tally_cmd(dir.path())
        .args(["-i", "events.json", "-o", "summary.json", "--json"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(report["processed"], 2);
    assert_eq!(report["skipped"], 0);
    assert_eq!(report["records"], 1);
    assert_eq!(report["watermark"], 20);
    assert_eq!(report["unknown"][0]["event_type"], "share");
}

#[test]
fn custom_watermark_file_is_honoured() {
    let dir = TempDir::new().unwrap();
    write_events(
        dir.path(),
        "events.json",
        &json!([{"timestamp": 77, "userId": "u1", "eventType": "post"}]),
    );

    tally_cmd(dir.path())
        .args([
            "-i",
            "events.json",
            "-o",
            "summary.json",
            "--watermark-file",
            "state/wm.txt",
        ])
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(dir.path().join("state/wm.txt")).unwrap(),
        "77"
    );
    assert!(watermark(dir.path()).is_none());
}

#[test]
fn config_file_sets_watermark_path() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("tally.toml"),
        "[watermark]\npath = \"cursor.txt\"\n",
    )
    .unwrap();
    write_events(
        dir.path(),
        "events.json",
        &json!([{"timestamp": 5, "userId": "u1", "eventType": "post"}]),
    );

    tally_cmd(dir.path())
        .args(["-i", "events.json", "-o", "summary.json"])
        .assert()
        .success();

    assert_eq!(fs::read_to_string(dir.path().join("cursor.txt")).unwrap(), "5");
}

#[test]
fn existing_watermark_skips_old_events() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("last_processed_timestamp.txt"), "1000\n").unwrap();
    write_events(
        dir.path(),
        "events.json",
        &json!([
            {"timestamp": 999, "userId": "u1", "eventType": "post"},
            {"timestamp": 1001, "userId": "u2", "eventType": "post"}
        ]),
    );

    tally_cmd(dir.path())
        .args(["-i", "events.json", "-o", "summary.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped=1"));

    let summary = read_summary(dir.path());
    assert_eq!(summary.as_array().map(Vec::len), Some(1));
    assert_eq!(summary[0]["userId"], "u2");
}

#[test]
fn malformed_event_fails_without_touching_outputs() {
    let dir = TempDir::new().unwrap();
    write_events(
        dir.path(),
        "events.json",
        &json!([{"timestamp": 1000, "eventType": "post"}]),
    );

    tally_cmd(dir.path())
        .args(["-i", "events.json", "-o", "summary.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2001"));

    assert!(!dir.path().join("summary.json").exists());
    assert!(watermark(dir.path()).is_none());
}

#[test]
fn missing_input_file_fails() {
    let dir = TempDir::new().unwrap();
    tally_cmd(dir.path())
        .args(["-i", "absent.json", "-o", "summary.json"])
        .assert()
        .failure();
}

#[test]
fn corrupt_watermark_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("last_processed_timestamp.txt"), "not-a-number").unwrap();
    write_events(dir.path(), "events.json", &json!([]));

    tally_cmd(dir.path())
        .args(["-i", "events.json", "-o", "summary.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E3001"));
}

#[test]
fn bad_config_fails_with_parse_code() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("tally.toml"), "[watermark\npath = 1").unwrap();
    write_events(dir.path(), "events.json", &json!([]));

    tally_cmd(dir.path())
        .args(["-i", "events.json", "-o", "summary.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1001"));
}

#[test]
fn same_timestamp_events_count_once() {
    let dir = TempDir::new().unwrap();
    write_events(
        dir.path(),
        "events.json",
        &json!([
            {"timestamp": 1000, "userId": "u1", "eventType": "post"},
            {"timestamp": 1000, "userId": "u1", "eventType": "post"}
        ]),
    );

    tally_cmd(dir.path())
        .args(["-i", "events.json", "-o", "summary.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("processed=1 skipped=1"));

    assert_eq!(read_summary(dir.path())[0]["post"], 1);
}

#[test]
fn update_mode_keeps_legacy_records_verbatim() {
    let dir = TempDir::new().unwrap();
    let legacy = json!([{"userId": "u1", "date": "1970-01-01", "post": 2.0, "share": 4}]);
    fs::write(
        dir.path().join("summary.json"),
        serde_json::to_vec(&legacy).unwrap(),
    )
    .unwrap();
    fs::write(dir.path().join("last_processed_timestamp.txt"), "5000").unwrap();
    write_events(dir.path(), "events.json", &json!([]));

    tally_cmd(dir.path())
        .args(["-i", "events.json", "-o", "summary.json", "--update"])
        .assert()
        .success();

    assert_eq!(read_summary(dir.path()), legacy);
}
