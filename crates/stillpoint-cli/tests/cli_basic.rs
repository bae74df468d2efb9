//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a throwaway data directory and
//! verify outputs.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(data_dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_stillpoint"))
        .args(args)
        .env("STILLPOINT_DATA_DIR", data_dir)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

/// Run a CLI command feeding `input` on stdin and return (exit code, stdout).
fn run_cli_with_input(data_dir: &Path, args: &[&str], input: &str) -> (i32, String) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_stillpoint"))
        .args(args)
        .env("STILLPOINT_DATA_DIR", data_dir)
        .env("RUST_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn CLI command");
    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(input.as_bytes())
        .expect("Failed to write stdin");
    let output = child.wait_with_output().expect("Failed to wait for CLI");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    (output.status.code().unwrap_or(-1), stdout)
}

fn json_lines(stdout: &str) -> Vec<serde_json::Value> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).expect("event line is JSON"))
        .collect()
}

#[test]
fn test_config_show_has_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["config", "show"]);
    assert_eq!(code, 0);
    let config: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(config["meditation_duration"], 1800);
    assert_eq!(config["start_delay"], 5);
}

#[test]
fn test_config_set_then_get() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["config", "set", "meditation_duration", "900"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "ok");

    let (code, stdout, _) = run_cli(dir.path(), &["config", "get", "meditation_duration"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "900");
    assert!(dir.path().join("config.toml").exists());
}

#[test]
fn test_config_set_bell_count_resizes_gaps() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, _) = run_cli(dir.path(), &["config", "set", "start_bell_count", "3"]);
    assert_eq!(code, 0);
    let (_, stdout, _) = run_cli(dir.path(), &["config", "get", "start_bell_gaps"]);
    assert_eq!(stdout.trim(), "[5.0,5.0]");
}

#[test]
fn test_config_get_unknown_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(dir.path(), &["config", "get", "no_such_key"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("unknown key"));
}

#[test]
fn test_config_reset() {
    let dir = tempfile::tempdir().unwrap();
    run_cli(dir.path(), &["config", "set", "guided", "true"]);
    let (code, _, _) = run_cli(dir.path(), &["config", "reset"]);
    assert_eq!(code, 0);
    let (_, stdout, _) = run_cli(dir.path(), &["config", "get", "guided"]);
    assert_eq!(stdout.trim(), "false");
}

#[test]
fn test_schedule_json() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["schedule", "--duration", "600", "--json"]);
    assert_eq!(code, 0);
    let schedule: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let times: Vec<u64> = schedule
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["time"].as_u64().unwrap())
        .collect();
    assert_eq!(times, vec![0, 120, 264]);
    assert_eq!(schedule[0]["type"], "intro");
}

#[test]
fn test_schedule_table() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["schedule", "--duration", "1800"]);
    assert_eq!(code, 0);
    assert!(stdout.lines().next().unwrap().contains("intro"));
    assert!(stdout.contains("18:08"));
}

#[test]
fn test_schedule_rejects_missing_script() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    let (code, _, stderr) = run_cli(
        dir.path(),
        &["schedule", "--script", missing.to_str().unwrap()],
    );
    assert_ne!(code, 0);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_run_short_session_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(
        dir.path(),
        &[
            "run",
            "--duration",
            "20",
            "--delay",
            "0",
            "--start-bells",
            "0",
            "--end-bells",
            "0",
            "--speed",
            "20",
            "--silent",
            "--no-input",
        ],
    );
    assert_eq!(code, 0);
    let events = json_lines(&stdout);
    assert_eq!(events[0]["type"], "SessionStarted");
    assert!(events.iter().any(|e| e["type"] == "SessionCompleted"));
    let last = events.last().unwrap();
    assert_eq!(last["type"], "StateSnapshot");
    assert_eq!(last["state"]["phase"], "finished");
    assert_eq!(last["state"]["remaining_time"], 20);
}

#[test]
fn test_run_with_seek() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(
        dir.path(),
        &[
            "run",
            "--duration",
            "600",
            "--delay",
            "0",
            "--start-bells",
            "0",
            "--end-bells",
            "0",
            "--seek",
            "5",
            "--speed",
            "10",
            "--silent",
            "--no-input",
        ],
    );
    assert_eq!(code, 0);
    let events = json_lines(&stdout);
    let seeked = events
        .iter()
        .find(|e| e["type"] == "SessionSeeked")
        .expect("seek event");
    assert_eq!(seeked["elapsed"], 595);
    assert!(events.iter().any(|e| e["type"] == "SessionCompleted"));
}

#[test]
fn test_cache_show_and_clear_on_empty_dir() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["cache", "show"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("cache is empty"));

    let (code, stdout, _) = run_cli(dir.path(), &["cache", "clear"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "removed 0 entries");
}

#[test]
fn test_run_mute_toggle_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _) = run_cli_with_input(
        dir.path(),
        &["run", "--duration", "600", "--silent", "--no-noise"],
        "m\nq\n",
    );
    assert_eq!(code, 0);

    let (_, stdout, _) = run_cli(dir.path(), &["config", "get", "volume.muted"]);
    assert_eq!(stdout.trim(), "true");
    // Only the volume is written back, not the per-run overrides.
    let (_, stdout, _) = run_cli(dir.path(), &["config", "get", "meditation_duration"]);
    assert_eq!(stdout.trim(), "1800");
}
