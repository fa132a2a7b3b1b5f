//! Command-line tests for the pvas_server binary
//!
//! Config errors are reported through the log output with a failing exit
//! code; a valid config runs the requested number of cycles.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run_server(config: &Path, extra: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pvas_server"))
        .arg("--config")
        .arg(config)
        .args(extra)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn combined(output: &Output) -> String {
    format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

#[test]
fn test_malformed_config_is_reported() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bad.toml");
    fs::write(&path, "invalid toml {{{{\n").unwrap();

    let output = run_server(&path, &["--cycles", "1", "--period-ms", "1"]);
    assert_eq!(output.status.code(), Some(1));

    let text = combined(&output);
    assert!(text.contains("Server failed"), "output: {text}");
    assert!(text.contains("Failed to parse configuration"), "output: {text}");
}

#[test]
fn test_invalid_config_is_reported() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("server.toml");
    fs::write(&path, "monitor_queue_size = 1\n").unwrap();

    let output = run_server(&path, &["--cycles", "1", "--period-ms", "1"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(combined(&output).contains("Configuration validation failed"));
}

#[test]
fn test_valid_config_runs_cycles() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("server.toml");
    fs::write(
        &path,
        r#"
[shared]
service_name = "pvas-cli-test"

[[pvs]]
name = "cli:counter"
initial = 10.0
"#,
    )
    .unwrap();

    let output = run_server(&path, &["--cycles", "2", "--period-ms", "1"]);
    assert!(output.status.success());

    let text = combined(&output);
    assert!(text.contains("cli:counter"), "output: {text}");
    assert!(text.contains("after 2 updates"), "output: {text}");
}
