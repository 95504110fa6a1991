//! End-to-end tests for the tabgov binary.
//!
//! Replays a session into a database, then reads it back with the
//! reporting commands.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn tabgov_binary() -> String {
    env!("CARGO_BIN_EXE_tabgov").to_string()
}

/// Runs tabgov with its config and data confined to `home`.
fn tabgov(home: &Path, args: &[&str]) -> Output {
    Command::new(tabgov_binary())
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("XDG_DATA_HOME", home.join(".local/share"))
        .env("TABGOV_DATABASE_PATH", home.join("tabgov.db"))
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("failed to run tabgov")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "tabgov should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

const SESSION: &str = r#"
{"action": "seed_window", "urls": ["https://a.test/", "https://b.test/"]}
{"action": "settings", "edit": {"max_tabs": 3, "max_tabs_enabled": true}}
{"action": "open_tab", "window": 1, "url": "https://c.test/"}
{"action": "open_tab", "window": 1, "url": "https://d.test/"}
{"action": "open_tab", "window": 1, "url": "https://a.test/"}
{"action": "wait", "seconds": 30}
{"action": "snapshot"}
"#;

#[test]
fn persisted_replay_is_visible_to_reporting_commands() {
    let temp = TempDir::new().unwrap();
    let script = temp.path().join("session.jsonl");
    std::fs::write(&script, SESSION).unwrap();

    let replay = stdout(&tabgov(
        temp.path(),
        &["replay", script.to_str().unwrap(), "--persist"],
    ));
    assert!(replay.contains("started with 2 tabs"), "{replay}");
    assert!(replay.contains("   30s  tabs 1 2 3,"), "{replay}");

    let tracker = stdout(&tabgov(temp.path(), &["tracker", "--json"]));
    let rows: serde_json::Value = serde_json::from_str(&tracker).unwrap();
    let ids: Vec<i64> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, [1, 2, 3]);

    let stats = stdout(&tabgov(temp.path(), &["stats", "--days", "1", "--json"]));
    let peaks: serde_json::Value = serde_json::from_str(&stats).unwrap();
    assert_eq!(peaks[0]["maxTabs"], 3);

    let status = stdout(&tabgov(temp.path(), &["status"]));
    assert!(status.contains("Open tabs:         3"), "{status}");
    assert!(status.contains("Tab limit:         3 (enforced)"), "{status}");
}

#[test]
fn lowering_the_limit_disables_enforcement_and_enabling_is_refused() {
    let temp = TempDir::new().unwrap();
    let script = temp.path().join("session.jsonl");
    std::fs::write(&script, SESSION).unwrap();
    stdout(&tabgov(
        temp.path(),
        &["replay", script.to_str().unwrap(), "--persist"],
    ));

    let settings = stdout(&tabgov(temp.path(), &["settings", "--max-tabs", "1"]));
    assert!(settings.contains("Tab limit:         1 (not enforced)"), "{settings}");
    let countdown = settings
        .lines()
        .find(|line| line.starts_with("Countdown:"))
        .unwrap();
    assert!(countdown.ends_with("(off)"), "{settings}");
    assert!(settings.contains("Kill-all mode:     off"), "{settings}");

    let output = tabgov(temp.path(), &["settings", "--kill-all", "true"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("You need to close 2 tabs."), "{stderr}");

    let settings = stdout(&tabgov(
        temp.path(),
        &["settings", "--max-tabs", "3", "--kill-all", "true"],
    ));
    assert!(settings.contains("Tab limit:         3 (enforced)"), "{settings}");
    assert!(settings.contains("Kill-all mode:     on"), "{settings}");
}

#[test]
fn scratch_replay_leaves_no_database() {
    let temp = TempDir::new().unwrap();
    let script = temp.path().join("session.jsonl");
    std::fs::write(&script, SESSION).unwrap();

    stdout(&tabgov(temp.path(), &["replay", script.to_str().unwrap()]));
    assert!(!temp.path().join("tabgov.db").exists());
}

#[test]
fn invalid_script_names_the_line() {
    let temp = TempDir::new().unwrap();
    let script = temp.path().join("broken.jsonl");
    std::fs::write(&script, "{\"action\": \"snapshot\"}\n{\"action\": \"teleport\"}\n").unwrap();

    let output = tabgov(temp.path(), &["replay", script.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("line 2: invalid step"), "{stderr}");
}
