//! End-to-end tests for the `wt` binary.
//!
//! Tests the full pipeline: host events on stdin → daemon → local store or
//! collector → `wt status`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::Duration;

use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn wt_binary() -> String {
    env!("CARGO_BIN_EXE_wt").to_string()
}

/// Writes a config file pointing the database into `temp`.
fn write_config(temp: &Path, collector_url: &str) -> PathBuf {
    let config_path = temp.join("wt.toml");
    std::fs::write(
        &config_path,
        format!(
            "database_path = \"{}\"\ncollector_url = \"{collector_url}\"\n",
            temp.join("data").join("wt.db").display()
        ),
    )
    .unwrap();
    config_path
}

/// Runs `wt` with an isolated home directory.
fn wt(temp: &Path, config: &Path, args: &[&str]) -> Output {
    let output = Command::new(wt_binary())
        .env("HOME", temp)
        .env("XDG_CONFIG_HOME", temp.join(".config"))
        .env("XDG_DATA_HOME", temp.join(".local/share"))
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("failed to run wt");
    assert!(
        output.status.success(),
        "wt {args:?} should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

/// Runs the daemon, feeding `events` with `pause` after each one, then
/// closes stdin and waits for the final flush.
fn run_daemon(temp: &Path, config: &Path, events: &[&str], pause: Duration) -> Output {
    let mut child = Command::new(wt_binary())
        .env("HOME", temp)
        .env("XDG_CONFIG_HOME", temp.join(".config"))
        .env("XDG_DATA_HOME", temp.join(".local/share"))
        .arg("--config")
        .arg(config)
        .env("RUST_LOG", "warn")
        .arg("run")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn wt run");

    let mut stdin = child.stdin.take().unwrap();
    for event in events {
        writeln!(stdin, "{event}").unwrap();
        stdin.flush().unwrap();
        std::thread::sleep(pause);
    }
    drop(stdin);

    let output = child.wait_with_output().unwrap();
    assert!(
        output.status.success(),
        "wt run should exit cleanly: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn status_json(temp: &Path, config: &Path) -> serde_json::Value {
    let output = wt(temp, config, &["status", "--json"]);
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_identity_and_rules_round_trip() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "http://127.0.0.1:9");

    let output = wt(temp.path(), &config, &["identity", "show"]);
    assert_eq!(String::from_utf8_lossy(&output.stdout), "(not set)\n");

    wt(temp.path(), &config, &["identity", "set", "user-1"]);
    let output = wt(temp.path(), &config, &["identity", "show"]);
    assert_eq!(String::from_utf8_lossy(&output.stdout), "user-1\n");

    wt(
        temp.path(),
        &config,
        &["rules", "set", "--productive", "docs.rs", "--unproductive", "news.example"],
    );
    let output = wt(temp.path(), &config, &["classify", "https://news.example/today"]);
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "news.example: unproductive\n"
    );

    let status = status_json(temp.path(), &config);
    assert_eq!(status["identity"], "user-1");
    assert_eq!(status["productive_rules"], 1);
    assert_eq!(status["unproductive_rules"], 1);
}

/// Without an identity, tracked time lands in the unkeyed buffer and
/// survives the daemon exiting.
#[test]
fn test_daemon_buffers_time_without_identity() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "http://127.0.0.1:9");

    let output = run_daemon(
        temp.path(),
        &config,
        &[
            r#"{"type":"focus_changed","url":"https://github.com/rust-lang/rust"}"#,
            r#"{"type":"query"}"#,
        ],
        Duration::from_millis(1200),
    );

    let query: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(query["focus"]["domain"], "github.com");
    assert_eq!(query["sync"], "disconnected");

    let status = status_json(temp.path(), &config);
    let buffered = &status["buffered"][0];
    assert!(buffered["owner"].is_null());
    let bucket = &buffered["buckets"]["github.com"];
    assert!(bucket["total"].as_u64().unwrap() >= 1_000, "{bucket}");
    assert_eq!(bucket["total"], bucket["productive"]);
}

/// Malformed host input is skipped; the daemon keeps running.
#[test]
fn test_daemon_skips_malformed_events() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "http://127.0.0.1:9");

    let output = run_daemon(
        temp.path(),
        &config,
        &["garbage", r#"{"type":"unknown"}"#, r#"{"type":"query"}"#],
        Duration::from_millis(10),
    );

    let query: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(query["focus"]["domain"].is_null());
    assert!(String::from_utf8_lossy(&output.stderr).contains("malformed host event"));
}

/// With an identity, the final flush on shutdown delivers to the collector
/// and leaves nothing buffered.
#[tokio::test(flavor = "multi_thread")]
async fn test_daemon_delivers_on_shutdown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/track"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), &server.uri());
    wt(temp.path(), &config, &["identity", "set", "user-1"]);

    run_daemon(
        temp.path(),
        &config,
        &[r#"{"type":"focus_changed","url":"https://stackoverflow.com/q/1"}"#],
        Duration::from_millis(1200),
    );

    let requests = server.received_requests().await.unwrap();
    let delivered: Vec<serde_json::Value> = requests
        .iter()
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect();
    let total: u64 = delivered
        .iter()
        .filter_map(|body| body["buckets"]["stackoverflow.com"]["total"].as_u64())
        .sum();
    assert!(total >= 1_000, "{delivered:?}");
    assert!(delivered.iter().all(|body| body["identity"] == "user-1"));

    let status = status_json(temp.path(), &config);
    assert_eq!(status["buffered"], serde_json::json!([]));
}
