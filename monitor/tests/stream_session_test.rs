//! End-to-end tests for the stream session against a fake serial bridge.
//!
//! The bridge command is replaced through `ESPMON_BRIDGE_CMD` with a
//! small shell script, so these tests exercise the real subprocess
//! spawn, line merging, persistence, and shutdown paths.

#![cfg(unix)]

use std::future::pending;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serial_test::serial;
use tempfile::TempDir;

use espmon_monitor::config::{SessionConfig, BRIDGE_CMD_ENV};
use espmon_monitor::patterns::PatternRegistry;
use espmon_monitor::session::{EndReason, SessionError, StreamSession};

/// Live-view writer that stays readable after the session consumes it.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes an executable fake-bridge script and points the bridge
/// command override at it.
fn install_fake_bridge(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("bridge.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    std::env::set_var(BRIDGE_CMD_ENV, path.to_str().unwrap());
    path
}

fn persisted_log(dir: &TempDir) -> String {
    let entry = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .find(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with("esp32_log_")
        })
        .expect("session log file exists");
    std::fs::read_to_string(entry.path()).unwrap()
}

#[tokio::test]
#[serial]
async fn filtered_view_and_complete_persisted_stream() {
    let bridge_dir = TempDir::new().unwrap();
    let log_dir = TempDir::new().unwrap();
    install_fake_bridge(
        &bridge_dir,
        r#"echo "boot sequence start"
echo ""
echo "SUCCESS: filesystem mounted"
echo "WiFi connected, IP: 192.168.4.1"
echo "ERROR: station offline"
echo "upload SUCCESS""#,
    );

    let out = SharedBuf::default();
    let config = SessionConfig {
        filter: Some("success".to_string()),
        save_log: true,
        log_dir: log_dir.path().to_path_buf(),
        ..SessionConfig::default()
    };
    let session =
        StreamSession::with_output(out.clone(), config, PatternRegistry::defaults()).unwrap();

    let summary = tokio::time::timeout(Duration::from_secs(10), session.run(pending()))
        .await
        .expect("session finishes on EOF")
        .unwrap();
    std::env::remove_var(BRIDGE_CMD_ENV);

    assert_eq!(summary.reason, EndReason::StreamEnded);
    assert_eq!(summary.lines_seen, 5);
    assert_eq!(summary.lines_displayed, 2);
    assert!(summary.log_path.is_some());

    // Live view: only the success lines.
    let view = out.contents();
    assert_eq!(view.lines().count(), 2);
    assert!(view.contains("SUCCESS: filesystem mounted"));
    assert!(view.contains("upload SUCCESS"));
    assert!(!view.contains("ERROR: station offline"));

    // Persisted stream: every non-empty line, in order, stamped.
    let persisted = persisted_log(&log_dir);
    let lines: Vec<&str> = persisted.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines.iter().all(|l| l.starts_with('[')));
    assert!(lines[0].ends_with("boot sequence start"));
    assert!(lines[3].ends_with("ERROR: station offline"));
}

#[tokio::test]
#[serial]
async fn cancellation_drains_and_closes_the_sink() {
    let bridge_dir = TempDir::new().unwrap();
    let log_dir = TempDir::new().unwrap();
    install_fake_bridge(
        &bridge_dir,
        r#"echo "WiFi connected, IP: 192.168.4.1"
echo "charging started on slot 2"
sleep 30"#,
    );

    let config = SessionConfig {
        save_log: true,
        log_dir: log_dir.path().to_path_buf(),
        ..SessionConfig::default()
    };
    let session =
        StreamSession::with_output(SharedBuf::default(), config, PatternRegistry::defaults())
            .unwrap();

    let shutdown = tokio::time::sleep(Duration::from_millis(500));
    let summary = tokio::time::timeout(Duration::from_secs(10), session.run(shutdown))
        .await
        .expect("cancellation is observed promptly")
        .unwrap();
    std::env::remove_var(BRIDGE_CMD_ENV);

    assert_eq!(summary.reason, EndReason::Cancelled);
    assert_eq!(summary.lines_seen, 2);

    // Everything handed to the sink before cancellation is on disk,
    // with no partial trailing line.
    let persisted = persisted_log(&log_dir);
    assert_eq!(persisted.lines().count(), 2);
    assert!(persisted.ends_with('\n'));
}

#[tokio::test]
#[serial]
async fn stderr_lines_are_part_of_the_stream() {
    let bridge_dir = TempDir::new().unwrap();
    install_fake_bridge(
        &bridge_dir,
        r#"echo "normal line"
echo "ERROR: written to stderr" 1>&2"#,
    );

    let out = SharedBuf::default();
    let session = StreamSession::with_output(
        out.clone(),
        SessionConfig::default(),
        PatternRegistry::defaults(),
    )
    .unwrap();

    let summary = tokio::time::timeout(Duration::from_secs(10), session.run(pending()))
        .await
        .unwrap()
        .unwrap();
    std::env::remove_var(BRIDGE_CMD_ENV);

    assert_eq!(summary.lines_seen, 2);
    let view = out.contents();
    assert!(view.contains("normal line"));
    assert!(view.contains("ERROR: written to stderr"));
}

#[tokio::test]
#[serial]
async fn spawn_failure_is_fatal_and_reported() {
    std::env::set_var(BRIDGE_CMD_ENV, "/no/such/bridge-binary");

    let session = StreamSession::with_output(
        SharedBuf::default(),
        SessionConfig::default(),
        PatternRegistry::defaults(),
    )
    .unwrap();

    let err = session.run(pending()).await.unwrap_err();
    std::env::remove_var(BRIDGE_CMD_ENV);

    assert!(matches!(err, SessionError::Spawn { .. }));
    assert!(err.to_string().contains("/no/such/bridge-binary"));
}

#[tokio::test]
#[serial]
async fn sink_open_failure_prevents_streaming() {
    let bridge_dir = TempDir::new().unwrap();
    install_fake_bridge(&bridge_dir, r#"echo "never consumed""#);

    let config = SessionConfig {
        save_log: true,
        log_dir: PathBuf::from("/no/such/log/dir"),
        ..SessionConfig::default()
    };
    let session =
        StreamSession::with_output(SharedBuf::default(), config, PatternRegistry::defaults())
            .unwrap();

    let err = session.run(pending()).await.unwrap_err();
    std::env::remove_var(BRIDGE_CMD_ENV);

    assert!(matches!(err, SessionError::Sink(_)));
}
