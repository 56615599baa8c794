//! End-to-end runs of the command-line binary

use assert_cmd::Command;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn downloader() -> Command {
    let mut cmd = Command::cargo_bin("tws-history-downloader").unwrap();
    cmd.env_remove("RUST_LOG").env_remove("LOG_FORMAT");
    cmd
}

#[test]
fn test_malformed_end_date_exits_with_configuration_status() {
    downloader()
        .args(["--symbol", "AAPL", "-e", "2014-02-24"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_transport_exits_with_configuration_status() {
    let dir = tempfile::tempdir().unwrap();
    downloader()
        .args(["--symbol", "AAPL", "-e", "end", "--local-tz", "America/New_York"])
        .arg("-o")
        .arg(dir.path().join("out.csv"))
        .assert()
        .code(2);
    assert!(!dir.path().join("out.csv").exists());
}

#[test]
fn test_unreadable_transcript_exits_with_configuration_status() {
    let dir = tempfile::tempdir().unwrap();
    downloader()
        .args(["--symbol", "AAPL", "--local-tz", "America/New_York"])
        .arg("--replay")
        .arg(dir.path().join("missing.json"))
        .assert()
        .code(2);
}

#[test]
fn test_replayed_session_writes_ascending_rows() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("aapl.csv");

    downloader()
        .args([
            "--symbol",
            "AAPL",
            "-e",
            "end",
            "--rth",
            "-n",
            "2",
            "--local-tz",
            "America/New_York",
        ])
        .arg("-o")
        .arg(&output)
        .arg("--replay")
        .arg(fixture("aapl_two_batches.json"))
        .assert()
        .success();

    let contents = std::fs::read_to_string(&output).unwrap();
    let dates: Vec<&str> = contents
        .lines()
        .map(|line| line.split(',').next().unwrap())
        .collect();
    assert_eq!(
        dates,
        vec![
            "20140221 15:55:00",
            "20140221 15:56:00",
            "20140221 15:57:00",
            "20140221 15:58:00",
            "20140221 15:59:00"
        ]
    );
}
