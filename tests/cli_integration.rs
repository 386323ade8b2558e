//! Integration tests for the `tb` CLI.
//!
//! Each test creates a temp board directory, runs `tb` as a subprocess,
//! and verifies stdout and/or the store file.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::{Value, json};

/// Get the path to the built `tb` binary.
fn tb_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_tb"))
}

/// Create a test board with a few tasks in the given directory.
fn create_test_board(root: &Path) {
    let board_dir = root.join("board");
    fs::create_dir_all(&board_dir).unwrap();

    fs::write(
        board_dir.join("board.toml"),
        r#"[board]
name = "test-board"
columns = ["ToDo", "InProgress", "Done"]

[tasks]
require_description = true
labels = "priority"
"#,
    )
    .unwrap();

    let record = json!({
        "columns": {
            "ToDo": [
                {"id": "task-1", "title": "Write spec", "description": "draft v1",
                 "deadline": "2025-06-30", "tags": ["docs"], "priority": "High"},
                {"id": "task-2", "title": "Review parser", "description": "look for panics",
                 "tags": ["code"], "priority": "Low"},
                {"id": "task-3", "title": "Fix the build", "description": "ci is red",
                 "tags": [], "priority": "Medium"}
            ],
            "InProgress": [
                {"id": "task-4", "title": "Design board", "description": "columns and cards",
                 "tags": ["design"], "priority": "Medium"}
            ],
            "Done": []
        },
        "preferences": {"darkMode": false}
    });
    write_record(root, &record);
}

fn write_record(root: &Path, record: &Value) {
    let store = json!({ "tasks": record.to_string() });
    fs::write(
        root.join("board").join("store.json"),
        serde_json::to_string_pretty(&store).unwrap(),
    )
    .unwrap();
}

/// The board record currently in the store file
fn read_record(root: &Path) -> Value {
    let store: Value =
        serde_json::from_str(&fs::read_to_string(root.join("board/store.json")).unwrap()).unwrap();
    serde_json::from_str(store["tasks"].as_str().unwrap()).unwrap()
}

fn column_ids(record: &Value, column: &str) -> Vec<String> {
    record["columns"][column]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap().to_string())
        .collect()
}

/// Run `tb` with the given args in the given directory, returning (stdout, stderr, success).
fn run_tb(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(tb_bin())
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run tb");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Run `tb` expecting success, return stdout.
fn run_tb_ok(dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, success) = run_tb(dir, args);
    if !success {
        panic!(
            "tb {:?} failed:\nstdout: {}\nstderr: {}",
            args, stdout, stderr
        );
    }
    stdout
}

// ---------------------------------------------------------------------------
// Init
// ---------------------------------------------------------------------------

#[test]
fn test_init_creates_board() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = run_tb_ok(tmp.path(), &["init", "--name", "Sprint"]);
    assert!(out.contains("Initialized board: Sprint"));
    assert!(tmp.path().join("board/board.toml").exists());

    let out = run_tb_ok(tmp.path(), &["columns"]);
    assert!(out.contains("ToDo"));
    assert!(out.contains("(intake)"));
    assert!(out.contains("InProgress"));
}

#[test]
fn test_init_twice_fails() {
    let tmp = tempfile::TempDir::new().unwrap();
    run_tb_ok(tmp.path(), &["init"]);
    let (_, stderr, success) = run_tb(tmp.path(), &["init"]);
    assert!(!success);
    assert!(stderr.contains("already exists"));
}

#[test]
fn test_init_custom_columns() {
    let tmp = tempfile::TempDir::new().unwrap();
    run_tb_ok(
        tmp.path(),
        &["init", "--column", "Now", "--column", "Later", "--intake", "Later"],
    );
    let id = run_tb_ok(tmp.path(), &["add", "Someday", "-d", "maybe"]);
    let out = run_tb_ok(tmp.path(), &["list", "Later"]);
    assert!(out.contains(id.trim()));
}

#[test]
fn test_no_board_is_an_error() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (_, stderr, success) = run_tb(tmp.path(), &["list"]);
    assert!(!success);
    assert!(stderr.contains("not a task board"));
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

#[test]
fn test_list_default() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());

    let out = run_tb_ok(tmp.path(), &["list"]);
    assert!(out.contains("== ToDo (3) =="));
    assert!(out.contains("0. [H] task-1 Write spec #docs (due 2025-06-30)"));
    assert!(out.contains("== InProgress (1) =="));
    assert!(out.contains("== Done (0) =="));
}

#[test]
fn test_list_query_and_sort() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());

    let out = run_tb_ok(tmp.path(), &["list", "ToDo", "--sort", "priority"]);
    let ids: Vec<&str> = out
        .lines()
        .skip(1)
        .filter_map(|l| l.split_whitespace().nth(2))
        .collect();
    assert_eq!(ids, vec!["task-2", "task-3", "task-1"]);

    let out = run_tb_ok(tmp.path(), &["list", "-q", "RE"]);
    assert!(out.contains("task-2"));
    assert!(!out.contains("task-1"));
    assert!(!out.contains("task-4"));
}

#[test]
fn test_list_json() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());

    let out = run_tb_ok(tmp.path(), &["list", "InProgress", "--json"]);
    let parsed: Value = serde_json::from_str(&out).unwrap();
    let arr = parsed.as_array().unwrap();
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["column"], "InProgress");
    assert_eq!(arr[0]["tasks"][0]["id"], "task-4");
    assert_eq!(arr[0]["tasks"][0]["priority"], "Medium");
}

#[test]
fn test_list_unknown_column() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());
    let (_, stderr, success) = run_tb(tmp.path(), &["list", "Backlog"]);
    assert!(!success);
    assert!(stderr.contains("unknown column: Backlog"));
}

#[test]
fn test_show() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());

    let out = run_tb_ok(tmp.path(), &["show", "task-1"]);
    assert!(out.contains("Write spec"));
    assert!(out.contains("column: ToDo (position 0)"));
    assert!(out.contains("deadline: 2025-06-30"));
    assert!(out.contains("  draft v1"));
}

#[test]
fn test_show_json() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());

    let out = run_tb_ok(tmp.path(), &["show", "task-4", "--json"]);
    let parsed: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["column"], "InProgress");
    assert_eq!(parsed["index"], 0);
    assert_eq!(parsed["title"], "Design board");
}

#[test]
fn test_search_fields() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());

    // description hit
    let out = run_tb_ok(tmp.path(), &["search", "panics"]);
    assert!(out.contains("[ToDo]"));
    assert!(out.contains("task-2"));

    // tag hit
    let out = run_tb_ok(tmp.path(), &["search", "^design$", "--json"]);
    let parsed: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed[0]["task_id"], "task-4");
    assert_eq!(parsed[0]["field"], "tag");
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

#[test]
fn test_add_appends_to_intake() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());

    let id = run_tb_ok(
        tmp.path(),
        &[
            "add", "New task", "-d", "details", "--tags", "a, b,,a", "-p", "hard", "--deadline",
            "2025-07-01",
        ],
    );
    let id = id.trim();
    assert!(id.starts_with("task-"));

    let record = read_record(tmp.path());
    let todo = record["columns"]["ToDo"].as_array().unwrap();
    assert_eq!(todo.len(), 4);
    assert_eq!(todo[3]["id"], id);
    assert_eq!(todo[3]["tags"], json!(["a", "b"]));
    assert_eq!(todo[3]["priority"], "High");
    assert_eq!(todo[3]["deadline"], "2025-07-01");
}

#[test]
fn test_add_missing_description_fails() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());

    let (_, stderr, success) = run_tb(tmp.path(), &["add", "No description"]);
    assert!(!success);
    assert!(stderr.contains("missing required field(s): description"));
    assert_eq!(column_ids(&read_record(tmp.path()), "ToDo").len(), 3);
}

#[test]
fn test_add_bad_deadline_fails() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());
    let (_, stderr, success) = run_tb(tmp.path(), &["add", "x", "-d", "y", "--deadline", "soon"]);
    assert!(!success);
    assert!(stderr.contains("invalid deadline"));
}

#[test]
fn test_edit_keeps_identity_and_position() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());

    run_tb_ok(
        tmp.path(),
        &["edit", "task-2", "--title", "Review lexer", "--no-deadline", "-p", "high"],
    );
    let record = read_record(tmp.path());
    assert_eq!(column_ids(&record, "ToDo"), vec!["task-1", "task-2", "task-3"]);
    let task = &record["columns"]["ToDo"][1];
    assert_eq!(task["title"], "Review lexer");
    assert_eq!(task["description"], "look for panics");
    assert_eq!(task["priority"], "High");
}

#[test]
fn test_rm_is_idempotent_and_recorded() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());

    let out = run_tb_ok(tmp.path(), &["rm", "task-3"]);
    assert!(out.contains("deleted task-3 Fix the build"));
    let (_, stderr, success) = run_tb(tmp.path(), &["rm", "task-3"]);
    assert!(success);
    assert!(stderr.contains("not found: task-3"));

    assert_eq!(column_ids(&read_record(tmp.path()), "ToDo"), vec!["task-1", "task-2"]);

    let out = run_tb_ok(tmp.path(), &["recovery", "--json"]);
    let entries: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(entries.as_array().unwrap().len(), 1);
    assert_eq!(entries[0]["category"], "delete");
    assert!(entries[0]["body"].as_str().unwrap().contains("Fix the build"));
}

#[test]
fn test_deleted_identity_not_reused() {
    let tmp = tempfile::TempDir::new().unwrap();
    run_tb_ok(tmp.path(), &["init"]);
    let first = run_tb_ok(tmp.path(), &["add", "a", "-d", "b"]);
    run_tb_ok(tmp.path(), &["rm", first.trim()]);
    let second = run_tb_ok(tmp.path(), &["add", "c", "-d", "d"]);
    assert_ne!(first.trim(), second.trim());
}

// ---------------------------------------------------------------------------
// Moves
// ---------------------------------------------------------------------------

#[test]
fn test_mv_within_column() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());

    let out = run_tb_ok(tmp.path(), &["mv", "task-1", "ToDo", "2"]);
    assert_eq!(out.trim(), "task-1: ToDo[0] -> ToDo[2]");
    assert_eq!(
        column_ids(&read_record(tmp.path()), "ToDo"),
        vec!["task-2", "task-3", "task-1"]
    );
}

#[test]
fn test_mv_across_columns_defaults_to_end() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());

    run_tb_ok(tmp.path(), &["mv", "task-2", "InProgress"]);
    let record = read_record(tmp.path());
    assert_eq!(column_ids(&record, "ToDo"), vec!["task-1", "task-3"]);
    assert_eq!(column_ids(&record, "InProgress"), vec!["task-4", "task-2"]);
}

#[test]
fn test_mv_position_past_end_is_clamped() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());

    run_tb_ok(tmp.path(), &["mv", "task-1", "Done", "7"]);
    assert_eq!(column_ids(&read_record(tmp.path()), "Done"), vec!["task-1"]);
}

#[test]
fn test_mv_in_sorted_view() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());

    // Sorted by priority ToDo shows [task-2, task-3, task-1]; put task-1 first
    run_tb_ok(tmp.path(), &["mv", "task-1", "ToDo", "0", "--sort", "priority"]);
    assert_eq!(
        column_ids(&read_record(tmp.path()), "ToDo"),
        vec!["task-1", "task-2", "task-3"]
    );
}

#[test]
fn test_drag_event_json() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());

    let event = r#"{"source":{"columnId":"ToDo","index":0},"destination":{"columnId":"InProgress","index":0}}"#;
    let out = run_tb_ok(tmp.path(), &["drag", event]);
    assert_eq!(out.trim(), "task-1: ToDo[0] -> InProgress[0]");
    let record = read_record(tmp.path());
    assert_eq!(column_ids(&record, "InProgress"), vec!["task-1", "task-4"]);
}

#[test]
fn test_cancelled_drag_changes_nothing() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());
    let before = read_record(tmp.path());

    let out = run_tb_ok(
        tmp.path(),
        &["drag", r#"{"source":{"columnId":"ToDo","index":1},"destination":null}"#],
    );
    assert_eq!(out.trim(), "cancelled");
    assert_eq!(read_record(tmp.path()), before);
}

#[test]
fn test_drag_invalid_column() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());

    let (_, stderr, success) = run_tb(
        tmp.path(),
        &["drag", r#"{"source":{"columnId":"Nope","index":0},"destination":{"columnId":"ToDo","index":0}}"#],
    );
    assert!(!success);
    assert!(stderr.contains("unknown column: Nope"));
}

// ---------------------------------------------------------------------------
// Preferences, persistence and recovery
// ---------------------------------------------------------------------------

#[test]
fn test_theme_toggle_persists() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());

    assert_eq!(run_tb_ok(tmp.path(), &["theme"]).trim(), "light");
    assert_eq!(run_tb_ok(tmp.path(), &["theme", "toggle"]).trim(), "dark");
    assert_eq!(read_record(tmp.path())["preferences"]["darkMode"], true);
    assert_eq!(run_tb_ok(tmp.path(), &["theme", "light"]).trim(), "light");
}

#[test]
fn test_legacy_record_is_read() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());
    let legacy = json!({
        "ToDo": [{"id": "task-9", "title": "Old", "description": "x", "deadline": "",
                  "tags": [""], "difficulty": "Hard"}],
        "InProgress": [],
        "Done": []
    });
    write_record(tmp.path(), &legacy);

    let out = run_tb_ok(tmp.path(), &["show", "task-9", "--json"]);
    let parsed: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["priority"], "High");
    assert!(parsed.get("deadline").is_none());
    assert_eq!(parsed["tags"], json!([]));
}

#[test]
fn test_corrupt_store_falls_back_to_empty() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());
    let store = json!({ "tasks": "{not json" });
    fs::write(tmp.path().join("board/store.json"), store.to_string()).unwrap();

    let (stdout, stderr, success) = run_tb(tmp.path(), &["list"]);
    assert!(success);
    assert!(stdout.contains("== ToDo (0) =="));
    assert!(stderr.contains("unreadable"));

    let out = run_tb_ok(tmp.path(), &["recovery"]);
    assert!(out.contains("load: unreadable board record"));
}

#[test]
fn test_quota_exceeded_reports_error() {
    let tmp = tempfile::TempDir::new().unwrap();
    let board_dir = tmp.path().join("board");
    fs::create_dir_all(&board_dir).unwrap();
    fs::write(
        board_dir.join("board.toml"),
        "[storage]\nquota_bytes = 64\n",
    )
    .unwrap();

    let (_, stderr, success) = run_tb(
        tmp.path(),
        &["add", "A title that will not fit in the quota", "-d", "with a description"],
    );
    assert!(!success);
    assert!(stderr.contains("change not saved"));
    assert!(!board_dir.join("store.json").exists());

    let out = run_tb_ok(tmp.path(), &["recovery", "--json"]);
    let entries: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(entries[0]["category"], "write");
}

#[test]
fn test_recovery_prune_all() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());
    run_tb_ok(tmp.path(), &["rm", "task-1", "task-2"]);

    let out = run_tb_ok(tmp.path(), &["recovery", "prune", "--all"]);
    assert_eq!(out.trim(), "pruned 2 entries");
    assert_eq!(run_tb_ok(tmp.path(), &["recovery"]).trim(), "recovery log is empty");
}

#[test]
fn test_board_dir_flag() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_board(tmp.path());
    let elsewhere = tempfile::TempDir::new().unwrap();

    let root = tmp.path().to_str().unwrap();
    let out = run_tb_ok(elsewhere.path(), &["-C", root, "show", "task-4"]);
    assert!(out.contains("Design board"));
}
