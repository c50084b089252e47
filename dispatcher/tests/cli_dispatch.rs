//! CLI tests for `dispatcher run` and the local subcommands.
//!
//! Spawns the dispatcher binary and checks that rejected inputs exit with
//! the invalid code before any network access.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use dispatcher::exit_codes;

fn dispatcher(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dispatcher"))
        .current_dir(dir)
        .env_remove("DISPATCHER_CONFIG")
        .env_remove("INPUT_CAN_WRITE_WORKFLOWS")
        .args(args)
        .output()
        .expect("spawn dispatcher")
}

fn run_event(dir: &Path, event_name: &str, payload: &str) -> Output {
    let event_path = dir.join("event.json");
    fs::write(&event_path, payload).expect("write event");
    dispatcher(
        dir,
        &[
            "run",
            "--event-path",
            event_path.to_str().expect("utf-8 path"),
            "--event-name",
            event_name,
            "--token",
            "tok",
        ],
    )
}

const RERENDER_EVENT: &str = r#"{
  "action": "rerender",
  "client_payload": {"pr": 5},
  "repository": {"full_name": "conda-forge/pkg-feedstock"}
}"#;

#[test]
fn other_event_names_are_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = run_event(temp.path(), "push", RERENDER_EVENT);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn unknown_action_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let payload = RERENDER_EVENT.replace("rerender", "lint");
    let output = run_event(temp.path(), "repository_dispatch", &payload);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot be processed"), "stderr: {stderr}");
}

#[test]
fn payload_without_pr_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let payload = r#"{"action": "rerender", "client_payload": {}, "repository": {"full_name": "a/b"}}"#;
    let output = run_event(temp.path(), "repository_dispatch", payload);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn unreadable_config_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("bot.toml"), "http_timeout_secs = \"soon\"\n").expect("write");
    let output = dispatcher(
        temp.path(),
        &[
            "--config",
            "bot.toml",
            "resolve",
            "--feedstock-dir",
            ".",
            "--repo-name",
            "conda-forge/pkg-feedstock",
        ],
    );
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn malformed_repo_name_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = dispatcher(
        temp.path(),
        &[
            "update-version",
            "--feedstock-dir",
            ".",
            "--repo-name",
            "not-a-full-name",
        ],
    );
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn missing_checkout_fails() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = dispatcher(
        temp.path(),
        &[
            "resolve",
            "--feedstock-dir",
            ".",
            "--repo-name",
            "conda-forge/pkg-feedstock",
        ],
    );
    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
}
