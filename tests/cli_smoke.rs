//! Smoke tests driving the built binary in an isolated working directory.

use std::path::Path;
use std::process::{Command, Output};

fn dagr(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dagr"))
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run dagr")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn help_prints_usage() {
    let dir = tempfile::tempdir().unwrap();
    let output = dagr(dir.path(), &["--help"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("critical path"));
}

#[test]
fn commands_require_init() {
    let dir = tempfile::tempdir().unwrap();
    let output = dagr(dir.path(), &["list"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("dagr init"));
}

#[test]
fn init_add_schedule_flow() {
    let dir = tempfile::tempdir().unwrap();
    let init = dagr(dir.path(), &["init", "--start", "2026-02-23"]);
    assert!(init.status.success(), "{}", stderr(&init));
    assert!(dir.path().join("dagr.json").exists());

    let add = dagr(
        dir.path(),
        &["add", "Write thesis", "-d", "10", "--deadline", "2026-03-02"],
    );
    assert!(add.status.success(), "{}", stderr(&add));
    assert!(stdout(&add).contains("T-1"));

    let add2 = dagr(
        dir.path(),
        &["add", "Defend", "-d", "2", "--depends", "T-1"],
    );
    assert!(add2.status.success());

    let list = dagr(dir.path(), &["list"]);
    assert!(list.status.success());
    let text = stdout(&list);
    assert!(text.contains("Write thesis"));
    assert!(text.contains("Defend"));

    let schedule = dagr(dir.path(), &["schedule"]);
    assert!(schedule.status.success(), "{}", stderr(&schedule));
    assert!(stdout(&schedule).contains("CRITICAL"));

    let export = dagr(dir.path(), &["schedule", "--csv", "sched.csv"]);
    assert!(export.status.success(), "{}", stderr(&export));
    let content = std::fs::read_to_string(dir.path().join("sched.csv")).unwrap();
    assert!(content.starts_with("ID,Task Name,Hours,Status,Start,End"));
    assert!(content.contains("Write thesis"));

    let critical = dagr(dir.path(), &["critical-path", "--sort", "chain"]);
    assert!(critical.status.success());
    assert!(stdout(&critical).contains("Total critical path duration"));
}

#[test]
fn unknown_task_fails_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    assert!(dagr(dir.path(), &["init", "--start", "2026-02-23"])
        .status
        .success());
    let output = dagr(dir.path(), &["start", "T-99"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("T-99"));
}

#[test]
fn cycle_is_rejected_and_state_untouched() {
    let dir = tempfile::tempdir().unwrap();
    assert!(dagr(dir.path(), &["init", "--start", "2026-02-23"])
        .status
        .success());
    assert!(dagr(dir.path(), &["add", "a", "-d", "1"]).status.success());
    assert!(dagr(dir.path(), &["add", "b", "-d", "1", "--depends", "T-1"])
        .status
        .success());

    let before = std::fs::read_to_string(dir.path().join("dagr.json")).unwrap();
    let output = dagr(dir.path(), &["update", "T-1", "--add-dep", "T-2"]);
    assert!(!output.status.success());
    assert!(stderr(&output).to_lowercase().contains("circular"));
    let after = std::fs::read_to_string(dir.path().join("dagr.json")).unwrap();
    assert_eq!(before, after, "failed update must not rewrite the state file");
}

#[test]
fn next_shows_dopamine_menu() {
    let dir = tempfile::tempdir().unwrap();
    assert!(dagr(dir.path(), &["init", "--start", "2026-02-23"])
        .status
        .success());
    assert!(dagr(dir.path(), &["add", "Main work", "-d", "10"])
        .status
        .success());
    assert!(dagr(
        dir.path(),
        &["add", "Tiny chore", "-d", "0.2", "--flex"]
    )
    .status
    .success());
    assert!(dagr(
        dir.path(),
        &["add", "Fold laundry", "-d", "1", "--flex", "--tag", "low-energy"]
    )
    .status
    .success());

    let output = dagr(dir.path(), &["next"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("Next up"));
    assert!(text.contains("Main work"));
    assert!(text.contains("Dopamine Menu"));
    assert!(text.contains("Quick Wins"));
    assert!(text.contains("Tiny chore"));
    assert!(text.contains("Low Energy"));
    assert!(text.contains("Fold laundry"));
}

#[test]
fn import_and_capacity_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    assert!(dagr(dir.path(), &["init", "--start", "2026-02-23"])
        .status
        .success());

    let payload_path = dir.path().join("batch.json");
    std::fs::write(
        &payload_path,
        r#"{"tasks": [
            {"name": "First", "duration_hrs": 2.0},
            {"name": "Second", "duration_hrs": 1.0, "depends_on": ["First"]}
        ]}"#,
    )
    .unwrap();
    let import = dagr(dir.path(), &["import", "batch.json"]);
    assert!(import.status.success(), "{}", stderr(&import));
    assert!(stdout(&import).contains("2 new task(s)"));

    let capacity = dagr(dir.path(), &["capacity", "2026-02-28", "4"]);
    assert!(capacity.status.success());

    let raw = std::fs::read_to_string(dir.path().join("dagr.json")).unwrap();
    assert!(raw.contains("2026-02-28"));

    // Unresolvable import reference leaves state untouched and exits nonzero
    std::fs::write(
        &payload_path,
        r#"{"tasks": [{"name": "Broken", "duration_hrs": 1.0, "depends_on": ["Nope"]}]}"#,
    )
    .unwrap();
    let before = std::fs::read_to_string(dir.path().join("dagr.json")).unwrap();
    let broken = dagr(dir.path(), &["import", "batch.json"]);
    assert!(!broken.status.success());
    assert!(stderr(&broken).contains("Nope"));
    let after = std::fs::read_to_string(dir.path().join("dagr.json")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn viz_writes_mermaid_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(dagr(dir.path(), &["init", "--start", "2026-02-23"])
        .status
        .success());
    assert!(dagr(dir.path(), &["add", "a", "-d", "1"]).status.success());
    assert!(dagr(dir.path(), &["add", "b", "-d", "1", "--depends", "T-1"])
        .status
        .success());

    let output = dagr(dir.path(), &["viz", "-o", "graph.md"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let content = std::fs::read_to_string(dir.path().join("graph.md")).unwrap();
    assert!(content.contains("```mermaid"));
    assert!(content.contains("T-1 --> T-2"));

    let html = dagr(dir.path(), &["viz-html", "-o", "graph.html"]);
    assert!(html.status.success());
    let content = std::fs::read_to_string(dir.path().join("graph.html")).unwrap();
    assert!(content.contains("<!DOCTYPE html>"));
}
