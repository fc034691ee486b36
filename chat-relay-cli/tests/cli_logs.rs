use std::process::Command;

fn chat_relay(config_dir: &std::path::Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_chat-relay"));
    command
        .arg("--config-dir")
        .arg(config_dir)
        .env_remove("RUST_LOG")
        .env("LOG_FORMAT", "json");
    command
}

#[test]
fn test_status_logs_as_json_and_to_file() {
    let dir = tempfile::tempdir().unwrap();

    let output = chat_relay(dir.path())
        .arg("status")
        .env_remove("GEMINI_API_KEY")
        .env_remove("GOOGLE_API_KEY")
        .output()
        .expect("Failed to run chat-relay");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("chat-relay Status"));
    assert!(stdout.contains("gemini-2.5-flash"));
    assert!(stdout.contains("not configured (set GEMINI_API_KEY)"));

    let log_line = stdout
        .lines()
        .find(|line| line.contains("Showing status"))
        .expect("status log line missing");
    let entry: serde_json::Value = serde_json::from_str(log_line.trim()).unwrap();
    assert_eq!(entry["level"], "INFO");

    // the rolling file lands under <config-dir>/logs
    let logs: Vec<_> = std::fs::read_dir(dir.path().join("logs"))
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("relay.log"))
        .collect();
    assert_eq!(logs.len(), 1);
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.json"),
        r#"{"relay": {"temperature": 5.0}, "gateway": {"port": 0}}"#,
    )
    .unwrap();

    let output = chat_relay(dir.path())
        .arg("status")
        .output()
        .expect("Failed to run chat-relay");
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("temperature"));
    assert!(stderr.contains("port"));
}
