//! Integration tests for the `poolkey` CLI binary.
//!
//! Argument parsing, config editing and error exits run against a temp
//! config file; the provisioning and usage paths run against a wiremock
//! panel.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PASSWORD_VAR: &str = "PANEL_TEST_PASSWORD";

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `poolkey` binary with env isolation.
///
/// Clears all `POOLKEY_*` env vars and points HOME at a nonexistent path so
/// tests never touch the user's real configuration.
fn poolkey_cmd(config: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("poolkey");
    cmd.env("HOME", "/tmp/poolkey-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/poolkey-cli-test-nonexistent")
        .env("POOLKEY_CONFIG", config)
        .env(PASSWORD_VAR, "pw")
        .env_remove("POOLKEY_OUTPUT")
        .env_remove("POOLKEY_INSECURE")
        .env_remove("POOLKEY_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

struct Workspace {
    _dir: TempDir,
    config: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.toml");
        Self { _dir: dir, config }
    }

    /// A workspace whose config lists `servers` as `(id, url, region)`.
    fn with_servers(servers: &[(&str, &str, &str)]) -> Self {
        let ws = Self::new();
        let mut toml = String::from("[defaults]\ntimeout = 5\nprobe_timeout = 2\n");
        for (id, url, region) in servers {
            toml.push_str(&format!(
                "\n[[servers]]\nid = \"{id}\"\nurl = \"{url}\"\nusername = \"admin\"\n\
                 password_env = \"{PASSWORD_VAR}\"\nregion = \"{region}\"\n"
            ));
        }
        std::fs::write(&ws.config, toml).unwrap();
        ws
    }

    fn cmd(&self) -> assert_cmd::Command {
        poolkey_cmd(&self.config)
    }

    fn config_text(&self) -> String {
        std::fs::read_to_string(&self.config).unwrap()
    }
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Run a command off the async runtime so the mock panel keeps serving.
async fn run(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

fn inbound(clients: &Value, stats: &Value) -> Value {
    json!({
        "id": 1,
        "remark": "reality",
        "enable": true,
        "port": 443,
        "protocol": "vless",
        "settings": json!({ "clients": clients, "decryption": "none" }).to_string(),
        "streamSettings": json!({
            "network": "tcp",
            "security": "reality",
            "realitySettings": {
                "serverNames": ["www.example.com"],
                "shortIds": ["0a1b"],
                "settings": { "publicKey": "PUBKEY" }
            }
        }).to_string(),
        "clientStats": stats
    })
}

async fn mock_login(server: &MockServer, success: bool) {
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "success": success, "msg": "", "obj": null })),
        )
        .mount(server)
        .await;
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let ws = Workspace::new();
    let output = ws.cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    let ws = Workspace::new();
    ws.cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("provision")
            .and(predicate::str::contains("usage"))
            .and(predicate::str::contains("servers")),
    );
}

#[test]
fn test_version_flag() {
    let ws = Workspace::new();
    ws.cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("poolkey"));
}

#[test]
fn test_completions_bash() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("poolkey"));
}

#[test]
fn test_region_conflicts_with_server() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["provision", "bob", "--region", "sg", "--server", "sg-1"])
        .assert()
        .code(2);
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_env() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_path_works_with_broken_file() {
    let ws = Workspace::new();
    std::fs::write(&ws.config, "servers = 12").unwrap();
    ws.cmd().args(["config", "path"]).assert().success();
    ws.cmd().args(["config", "show"]).assert().code(1);
}

#[test]
fn test_config_show_masks_passwords() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["servers", "add", "https://203.0.113.7:2053/x/|admin|hunter2|1"])
        .assert()
        .success();

    ws.cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("****").and(predicate::str::contains("hunter2").not()));
}

// ── Server list management ──────────────────────────────────────────

#[test]
fn test_servers_add_pipe_form_and_list() {
    let ws = Workspace::new();
    ws.cmd()
        .args([
            "servers",
            "add",
            "203.0.113.7:2053/x/|admin|s3cret|3",
            "--region",
            "singapore",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("server-1"));

    let saved = ws.config_text();
    assert!(saved.contains("https://203.0.113.7:2053/x/"), "{saved}");
    assert!(saved.contains("inbound_id = 3"), "{saved}");

    let output = ws.cmd().args(["servers", "list", "-o", "json"]).output().unwrap();
    assert!(output.status.success());
    let list: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(list[0]["id"], "server-1");
    assert_eq!(list[0]["region"], "singapore");
    assert_eq!(list[0]["default"], true);
    assert_eq!(list[0]["password_source"], "config");
    assert!(list[0].get("password").is_none());
}

#[test]
fn test_servers_add_installer_output_from_stdin() {
    let ws = Workspace::new();
    let block = "Username: k3Jd9\nPassword: Zx81Qp\nAccess URL: http://198.51.100.4:2053/aB12\\\n";
    ws.cmd()
        .args(["servers", "add", "-", "--id", "jp-1", "--region", "japan"])
        .write_stdin(block)
        .assert()
        .success();

    ws.cmd()
        .args(["servers", "list", "-o", "plain"])
        .assert()
        .success()
        .stdout("jp-1\n");
    assert!(ws.config_text().contains("http://198.51.100.4:2053/aB12"));
}

#[test]
fn test_servers_add_rejects_client_link() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["servers", "add", "vless://abc@1.2.3.4:443|admin|pw|1"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("client connection link"));
    assert!(!ws.config.exists());
}

#[test]
fn test_servers_add_duplicate_is_conflict() {
    let ws = Workspace::new();
    for expected in [0, 6] {
        ws.cmd()
            .args(["servers", "add", "https://h:1/|a|b|1", "--id", "dup"])
            .assert()
            .code(expected);
    }
}

#[test]
fn test_servers_add_without_password_is_usage_error() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["servers", "add", "--url", "https://h:1/", "--username", "admin"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--password"));
}

#[test]
fn test_servers_enable_disable_default_remove() {
    let ws = Workspace::with_servers(&[
        ("a", "https://a.example.net/", "sg"),
        ("b", "https://b.example.net/", "sg"),
    ]);

    ws.cmd().args(["servers", "set-default", "b"]).assert().success();
    ws.cmd().args(["servers", "disable", "a"]).assert().success();
    let saved = ws.config_text();
    assert!(saved.contains("default_server = \"b\""), "{saved}");
    assert!(saved.contains("enabled = false"), "{saved}");

    // Non-interactive removal needs --yes.
    ws.cmd().args(["servers", "remove", "b"]).assert().code(2);
    ws.cmd().args(["servers", "remove", "b", "--yes"]).assert().success();
    assert!(!ws.config_text().contains("default_server"));

    ws.cmd().args(["servers", "enable", "zz"]).assert().code(4);
}

// ── Provisioning ────────────────────────────────────────────────────

#[test]
fn test_provision_without_servers() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["provision", "bob"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No servers configured"));
}

#[test]
fn test_provision_unknown_plan() {
    let ws = Workspace::with_servers(&[("a", "https://a.example.net/", "sg")]);
    ws.cmd()
        .args(["provision", "bob", "--plan", "gold"])
        .assert()
        .code(4);
}

#[test]
fn test_provision_unknown_region() {
    let ws = Workspace::with_servers(&[("a", "https://a.example.net/", "sg")]);
    ws.cmd()
        .args(["provision", "bob", "--region", "japan"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("japan"));
}

#[test]
fn test_provision_invalid_label() {
    let ws = Workspace::with_servers(&[("a", "https://a.example.net/", "sg")]);
    ws.cmd().args(["provision", "   "]).assert().code(2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_provision_end_to_end() {
    let panel = MockServer::start().await;
    mock_login(&panel, true).await;
    Mock::given(method("GET"))
        .and(path("/panel/api/inbounds/get/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "obj": inbound(&json!([]), &Value::Null)
        })))
        .mount(&panel)
        .await;
    Mock::given(method("POST"))
        .and(path("/panel/api/inbounds/addClient"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "success": true, "msg": "", "obj": null })),
        )
        .expect(1)
        .mount(&panel)
        .await;

    let ws = Workspace::with_servers(&[("sg-1", &panel.uri(), "sg")]);
    let mut cmd = ws.cmd();
    cmd.args(["provision", "bob", "--plan", "premium", "-o", "json"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let result: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["existed"], false);
    assert_eq!(result["backend"], "sg-1");
    assert_eq!(result["credential"]["label"], "bob");
    assert_eq!(result["credential"]["quota_bytes"], 100_u64 << 30);
    let uri = result["uri"].as_str().unwrap();
    assert!(uri.starts_with("vless://"), "{uri}");
    assert!(uri.contains("@127.0.0.1:443?type=tcp&security=reality"), "{uri}");
    assert!(uri.ends_with("#bob"), "{uri}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_provision_login_rejected_is_auth_error() {
    let panel = MockServer::start().await;
    mock_login(&panel, false).await;

    let ws = Workspace::with_servers(&[("sg-1", &panel.uri(), "sg")]);
    let mut cmd = ws.cmd();
    cmd.args(["provision", "bob", "--server", "sg-1"]);
    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
}

// ── Usage ───────────────────────────────────────────────────────────

const CLIENT_ID: &str = "6c1f9a4e-0000-4000-8000-000000000001";

async fn usage_panel() -> MockServer {
    let panel = MockServer::start().await;
    mock_login(&panel, true).await;
    let clients = json!([{
        "id": CLIENT_ID, "email": "alice", "totalGB": 1_073_741_824_u64,
        "expiryTime": 0, "enable": true, "subId": "aaaabbbbccccdddd"
    }]);
    let stats = json!([{
        "email": "alice", "up": 100, "down": 200, "total": 1_073_741_824_u64,
        "expiryTime": 0, "enable": true
    }]);
    Mock::given(method("GET"))
        .and(path("/panel/api/inbounds/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "obj": [inbound(&clients, &stats)]
        })))
        .mount(&panel)
        .await;
    panel
}

#[tokio::test(flavor = "multi_thread")]
async fn test_usage_plain_prints_remaining_bytes() {
    let panel = usage_panel().await;
    let ws = Workspace::with_servers(&[("sg-1", &panel.uri(), "sg")]);

    let mut cmd = ws.cmd();
    cmd.args(["usage", CLIENT_ID, "-o", "plain"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "1073741524");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_usage_unknown_client_is_not_found() {
    let panel = usage_panel().await;
    let ws = Workspace::with_servers(&[("sg-1", &panel.uri(), "sg")]);

    let mut cmd = ws.cmd();
    cmd.args(["usage", "00000000-0000-4000-8000-00000000dead"]);
    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
}

// ── Status ──────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_status_reports_offline_without_failing() {
    let panel = MockServer::start().await;
    mock_login(&panel, false).await;
    let ws = Workspace::with_servers(&[("sg-1", &panel.uri(), "sg")]);

    let mut cmd = ws.cmd();
    cmd.args(["servers", "status", "-o", "json"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let statuses: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(statuses[0]["id"], "sg-1");
    assert_eq!(statuses[0]["online"], false);
    assert!(statuses[0]["error"].as_str().unwrap().contains("sg-1"));
}
