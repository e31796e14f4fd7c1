#![cfg(feature = "cli")]

use std::path::Path;
use std::process::{Command, Output};

const REFERENCE_HEX: &str = "01 01 00 00 00 00 20 41 00 00 48 42 00 00 00 00 00 00";

fn wasche(args: &[&str]) -> Output {
    wasche_with_env(args, &[])
}

fn wasche_with_env(args: &[&str], vars: &[(&str, &str)]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_wasche"))
        .args(["--log-level", "error"])
        .args(args)
        .env_remove("WASCHE_SERIAL_PORT")
        .env_remove("WASCHE_JOURNAL")
        .envs(vars.iter().copied())
        .output()
        .expect("wasche should run")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Frames a node would send: WASHING, a heartbeat, then SPINNING.
fn write_capture(path: &Path) {
    let mut bytes = Vec::new();
    bytes.extend([
        0x01, 0x04, 0x00, 0x01, 0x00, 0x00, 0x00, 0x3F, 0x00, 0x00, 0x40, 0x41, 0x0A, 0x00, 0x00,
        0x00, 0x00, 0x00,
    ]);
    bytes.extend([0x02, 0x04, 0x00]);
    bytes.extend([0u8; 15]);
    bytes.extend([
        0x01, 0x04, 0x00, 0x02, 0x00, 0x00, 0x80, 0x3F, 0x00, 0x00, 0x80, 0x41, 0x14, 0x00, 0x00,
        0x00, 0x00, 0x00,
    ]);
    std::fs::write(path, bytes).expect("capture should be writable");
}

#[test]
fn decode_hex_prints_reference_packet_as_json() {
    let output = wasche(&["--format", "json", "decode", "--hex", REFERENCE_HEX]);
    assert!(output.status.success());

    let line = stdout(&output);
    let packet: serde_json::Value =
        serde_json::from_str(line.trim()).expect("one json packet per line");
    assert_eq!(packet["kind"], "DATA");
    assert_eq!(packet["node_id"], 1);
    assert_eq!(packet["state"], "IDLE");
    assert_eq!(packet["rms"], 10.0);
    assert_eq!(packet["freq"], 50.0);
}

#[test]
fn decode_truncated_capture_exits_60() {
    let output = wasche(&["--format", "json", "decode", "--hex", "02 05 00 00"]);
    assert_eq!(output.status.code(), Some(60));
    assert!(String::from_utf8_lossy(&output.stderr).contains("incomplete frame"));
}

#[test]
fn ingest_capture_then_query_journal() {
    let dir = tempfile::tempdir().unwrap();
    let capture = dir.path().join("capture.bin");
    let journal = dir.path().join("wasche.jsonl");
    write_capture(&capture);

    let output = wasche(&[
        "--format",
        "json",
        "ingest",
        "--capture",
        capture.to_str().unwrap(),
        "--journal",
        journal.to_str().unwrap(),
        "--duration",
        "700ms",
    ]);
    assert!(output.status.success(), "ingest failed: {output:?}");
    let health: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(health["data_packets"], 2);
    assert_eq!(health["heartbeats"], 1);
    assert_eq!(health["state"], "stopping");

    let output = wasche(&[
        "--format",
        "json",
        "status",
        "--journal",
        journal.to_str().unwrap(),
    ]);
    assert!(output.status.success());
    let statuses: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(statuses.as_array().unwrap().len(), 1);
    assert_eq!(statuses[0]["node_id"], 4);
    assert_eq!(statuses[0]["current_state"], "SPINNING");

    let output = wasche(&[
        "--format",
        "json",
        "status",
        "--journal",
        journal.to_str().unwrap(),
        "4",
    ]);
    assert!(output.status.success());
    let detail: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(detail["current_state"], "SPINNING");
    assert_eq!(detail["recent_readings"][0]["state"], "SPINNING");
    assert_eq!(detail["recent_readings"][1]["state"], "WASHING");

    let output = wasche(&[
        "--format",
        "json",
        "history",
        "--journal",
        journal.to_str().unwrap(),
        "4",
    ]);
    assert!(output.status.success());
    let history: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(history.as_array().unwrap().len(), 2);
    assert_eq!(history[0]["state"], "WASHING");
}

#[test]
fn status_for_unknown_node_exits_4() {
    let dir = tempfile::tempdir().unwrap();
    let journal = dir.path().join("wasche.jsonl");
    std::fs::write(&journal, "").unwrap();

    let output = wasche(&["status", "--journal", journal.to_str().unwrap(), "9"]);
    assert_eq!(output.status.code(), Some(4));
    assert!(String::from_utf8_lossy(&output.stderr).contains("machine 9 not found"));
}

#[test]
fn status_missing_journal_exits_4() {
    let dir = tempfile::tempdir().unwrap();
    let journal = dir.path().join("absent.jsonl");
    let output = wasche(&["status", "--journal", journal.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn version_prints_package_version() {
    let output = wasche(&["version"]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output).trim(),
        format!("wasche {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn ingest_missing_capture_exits_4() {
    let dir = tempfile::tempdir().unwrap();
    let capture = dir.path().join("absent.bin");
    let journal = dir.path().join("wasche.jsonl");

    let output = wasche(&[
        "ingest",
        "--capture",
        capture.to_str().unwrap(),
        "--journal",
        journal.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(4));
    assert!(String::from_utf8_lossy(&output.stderr).contains("absent.bin"));
    assert!(!journal.exists());
}

#[test]
fn capture_wins_over_port_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let capture = dir.path().join("capture.bin");
    write_capture(&capture);

    let output = wasche_with_env(
        &[
            "--format",
            "json",
            "ingest",
            "--capture",
            capture.to_str().unwrap(),
            "--duration",
            "700ms",
        ],
        &[("WASCHE_SERIAL_PORT", "/dev/wasche-no-such-port")],
    );
    assert!(output.status.success(), "ingest failed: {output:?}");
    let health: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(health["data_packets"], 2);
}

#[test]
fn history_with_oversized_window_exits_64() {
    let dir = tempfile::tempdir().unwrap();
    let journal = dir.path().join("wasche.jsonl");
    std::fs::write(&journal, "").unwrap();

    let output = wasche(&[
        "history",
        "--journal",
        journal.to_str().unwrap(),
        "--hours",
        "4294967295",
        "1",
    ]);
    assert_eq!(output.status.code(), Some(64));
}
