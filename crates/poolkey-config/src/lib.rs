//! Configuration for the poolkey CLI.
//!
//! TOML server list and defaults, credential resolution (env + keyring +
//! plaintext), server list editing, and translation to the runtime types
//! of `poolkey_core`.

mod servers;

pub use servers::{ParsedServer, parse_server_spec};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use poolkey_core::{
    BackendDescriptor, PoolSettings, ProbeFailurePolicy, ProvisionRequest, RegistrySnapshot,
    TlsVerification,
};

/// Keyring service name; entries are `{server_id}/password`.
pub const KEYRING_SERVICE: &str = "poolkey";

const GIB: u64 = 1 << 30;
const DAY_SECS: u64 = 86_400;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for server '{server}'")]
    NoCredentials { server: String },

    #[error("unknown server '{id}'")]
    UnknownServer { id: String },

    #[error("server '{id}' already exists")]
    DuplicateServer { id: String },

    #[error("unknown plan '{name}'")]
    UnknownPlan { name: String },

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Id of the server used for pinned provisioning without `--server`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_server: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named quota/lifetime presets.
    #[serde(default = "default_plans")]
    pub plans: BTreeMap<String, Plan>,

    /// Backend panels, in preference order.
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_server: None,
            defaults: Defaults::default(),
            plans: default_plans(),
            servers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Accept self-signed panel certificates.
    #[serde(default = "default_true")]
    pub insecure: bool,

    /// CA certificate to trust instead; wins over `insecure`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Load probe / status check timeout in seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: u64,

    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    #[serde(default = "default_limit_ip")]
    pub limit_ip: u32,

    #[serde(default)]
    pub probe_failure: ProbeFailurePolicy,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: true,
            ca_cert: None,
            timeout: default_timeout(),
            probe_timeout: default_probe_timeout(),
            api_prefix: default_api_prefix(),
            limit_ip: default_limit_ip(),
            probe_failure: ProbeFailurePolicy::default(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_true() -> bool {
    true
}
fn default_timeout() -> u64 {
    15
}
fn default_probe_timeout() -> u64 {
    5
}
fn default_api_prefix() -> String {
    "panel/api".into()
}
fn default_limit_ip() -> u32 {
    1
}
fn default_inbound_id() -> u32 {
    1
}

/// A quota/lifetime preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Plan {
    /// Traffic quota in GiB; `0` is unlimited.
    pub quota_gb: u64,
    /// Lifetime in days; `0` is unlimited.
    pub days: u64,
}

impl Plan {
    pub fn quota_bytes(&self) -> u64 {
        self.quota_gb.saturating_mul(GIB)
    }

    pub fn ttl(&self) -> Option<Duration> {
        (self.days > 0).then(|| Duration::from_secs(self.days.saturating_mul(DAY_SECS)))
    }

    pub fn request(&self, label: &str) -> ProvisionRequest {
        ProvisionRequest::new(label, self.quota_bytes(), self.ttl())
    }
}

fn default_plans() -> BTreeMap<String, Plan> {
    BTreeMap::from([
        ("trial".to_owned(), Plan { quota_gb: 2, days: 1 }),
        ("premium".to_owned(), Plan { quota_gb: 100, days: 30 }),
    ])
}

/// One backend panel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerEntry {
    /// Stable id used on the command line and for keyring entries.
    pub id: String,

    /// Display name; falls back to the id.
    #[serde(default)]
    pub name: String,

    /// Panel root including the web base path,
    /// e.g. `https://203.0.113.7:2053/secret/`.
    pub url: String,

    pub username: String,

    /// Password (plaintext, prefer keyring or `password_env`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable holding the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    #[serde(default = "default_inbound_id")]
    pub inbound_id: u32,

    #[serde(default)]
    pub region: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Host to put in connection links instead of the panel host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_host: Option<String>,
}

impl ServerEntry {
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

impl Config {
    pub fn plan(&self, name: &str) -> Result<&Plan, ConfigError> {
        self.plans.get(name).ok_or_else(|| ConfigError::UnknownPlan {
            name: name.into(),
        })
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "poolkey", "poolkey").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("poolkey");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from `path` + `POOLKEY_` environment variables.
///
/// Nested keys use a double underscore: `POOLKEY_DEFAULTS__TIMEOUT=30`.
/// A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("POOLKEY_").ignore(&["CONFIG"]).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load from the canonical config path.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve a server's password: `password_env` variable, then the
/// system keyring, then plaintext config.
pub fn resolve_password(server: &ServerEntry) -> Result<SecretString, ConfigError> {
    // 1. Server's password_env → env var lookup
    if let Some(ref env_name) = server.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(&server.id)) {
        if let Ok(pw) = entry.get_password() {
            return Ok(SecretString::from(pw));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = server.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        server: server.id.clone(),
    })
}

/// Store a server's password in the system keyring.
pub fn store_password(server_id: &str, password: &SecretString) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &keyring_user(server_id))
        .and_then(|entry| entry.set_password(password.expose_secret()))
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

/// Remove a server's keyring entry, if any.
pub fn forget_password(server_id: &str) {
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(server_id)) {
        let _ = entry.delete_credential();
    }
}

fn keyring_user(server_id: &str) -> String {
    format!("{server_id}/password")
}

// ── Translation to core types ───────────────────────────────────────

/// Parse and sanity-check a panel URL.
///
/// Client links (`vless://...`) are a common paste mistake and are
/// rejected outright; a missing scheme defaults to `https`.
pub fn validate_panel_url(raw: &str) -> Result<Url, ConfigError> {
    let raw = raw.trim().trim_end_matches('\\');
    let invalid = |reason: String| ConfigError::Validation {
        field: "url".into(),
        reason,
    };

    if raw.to_ascii_lowercase().contains("vless://") {
        return Err(invalid(
            "this is a client connection link, not a panel URL".into(),
        ));
    }
    let with_scheme = if raw.contains("://") {
        raw.to_owned()
    } else {
        format!("https://{raw}")
    };
    let url = Url::parse(&with_scheme).map_err(|e| invalid(format!("'{raw}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid(format!("'{raw}' has no host")));
    }
    Ok(url)
}

/// Build a `BackendDescriptor` from a server entry, resolving its password.
pub fn server_to_descriptor(server: &ServerEntry) -> Result<BackendDescriptor, ConfigError> {
    Ok(BackendDescriptor {
        id: server.id.as_str().into(),
        name: server.display_name().to_owned(),
        panel_url: validate_panel_url(&server.url)?,
        username: server.username.clone(),
        password: resolve_password(server)?,
        inbound_id: server.inbound_id,
        region: server.region.trim().to_owned(),
        enabled: server.enabled,
        public_host: server.public_host.clone(),
    })
}

/// Build the registry snapshot for every configured server.
pub fn registry_snapshot(cfg: &Config) -> Result<RegistrySnapshot, ConfigError> {
    let backends = cfg
        .servers
        .iter()
        .map(server_to_descriptor)
        .collect::<Result<Vec<_>, _>>()?;

    let default_index = match cfg.default_server.as_deref() {
        Some(id) => Some(
            cfg.servers
                .iter()
                .position(|s| s.id == id)
                .ok_or_else(|| ConfigError::UnknownServer { id: id.into() })?,
        ),
        None => None,
    };

    RegistrySnapshot::new(backends, default_index).map_err(|e| ConfigError::Validation {
        field: "servers".into(),
        reason: e.to_string(),
    })
}

/// Pool-wide settings from `[defaults]`.
pub fn pool_settings(cfg: &Config) -> PoolSettings {
    let defaults = &cfg.defaults;
    let tls = if let Some(ref ca_path) = defaults.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else if defaults.insecure {
        TlsVerification::DangerAcceptInvalid
    } else {
        TlsVerification::SystemDefaults
    };

    PoolSettings {
        tls,
        request_timeout: Duration::from_secs(defaults.timeout.max(1)),
        probe_timeout: Duration::from_secs(defaults.probe_timeout.max(1)),
        api_prefix: defaults.api_prefix.clone(),
        limit_ip: defaults.limit_ip,
        probe_failure: defaults.probe_failure,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
default_server = "sg-2"

[defaults]
timeout = 20
probe_failure = "fail-closed"

[plans.weekly]
quota_gb = 20
days = 7

[[servers]]
id = "sg-1"
name = "Singapore 1"
url = "https://203.0.113.7:2053/secret/"
username = "admin"
password = "pw1"
region = "singapore"

[[servers]]
id = "sg-2"
url = "203.0.113.8:2053"
username = "admin"
password = "pw2"
inbound_id = 3
region = "singapore"
enabled = false
public_host = "vpn.example.com"
"#;

    // Loading reads `POOLKEY_*` variables, so every load runs inside a
    // figment jail to keep env-setting tests from leaking into it.
    fn with_sample(test: impl FnOnce(&Path)) {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.toml", SAMPLE)?;
            test(&jail.directory().join("config.toml"));
            Ok(())
        });
    }

    #[test]
    fn loads_file_over_defaults() {
        with_sample(|path| {
            let cfg = load_config_from(path).unwrap();

            assert_eq!(cfg.default_server.as_deref(), Some("sg-2"));
            assert_eq!(cfg.defaults.timeout, 20);
            assert_eq!(cfg.defaults.probe_timeout, 5);
            assert!(cfg.defaults.insecure);
            assert_eq!(cfg.defaults.probe_failure, ProbeFailurePolicy::FailClosed);
            assert_eq!(cfg.servers.len(), 2);
            assert_eq!(cfg.servers[0].inbound_id, 1);
            assert!(cfg.servers[0].enabled);
            assert_eq!(cfg.servers[1].display_name(), "sg-2");

            // Built-in plans survive next to configured ones.
            assert_eq!(cfg.plan("trial").unwrap(), &Plan { quota_gb: 2, days: 1 });
            assert_eq!(cfg.plan("weekly").unwrap().days, 7);
            assert!(matches!(cfg.plan("gold"), Err(ConfigError::UnknownPlan { .. })));
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        figment::Jail::expect_with(|jail| {
            let cfg = load_config_from(&jail.directory().join("absent.toml")).unwrap();
            assert_eq!(cfg, Config::default());
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.toml", SAMPLE)?;
            jail.set_env("POOLKEY_DEFAULTS__LIMIT_IP", "3");
            jail.set_env("POOLKEY_DEFAULT_SERVER", "sg-1");
            let cfg = load_config_from(Path::new("config.toml")).unwrap();
            assert_eq!(cfg.defaults.limit_ip, 3);
            assert_eq!(cfg.default_server.as_deref(), Some("sg-1"));
            Ok(())
        });
    }

    #[test]
    fn save_then_load_keeps_servers() {
        with_sample(|path| {
            let cfg = load_config_from(path).unwrap();
            let dir = tempfile::tempdir().unwrap();
            let out = dir.path().join("nested").join("out.toml");
            save_config_to(&cfg, &out).unwrap();
            assert_eq!(load_config_from(&out).unwrap(), cfg);
        });
    }

    #[test]
    fn snapshot_and_settings() {
        with_sample(|path| {
            let cfg = load_config_from(path).unwrap();

            let snapshot = registry_snapshot(&cfg).unwrap();
            let second = snapshot.get("sg-2").unwrap();
            assert_eq!(second.panel_url.as_str(), "https://203.0.113.8:2053/");
            assert_eq!(second.inbound_id, 3);
            assert!(!second.enabled);
            assert_eq!(second.connect_host().as_deref(), Some("vpn.example.com"));
            // Configured default is disabled, so the first enabled one wins.
            assert_eq!(snapshot.default_backend().unwrap().id.as_str(), "sg-1");

            let settings = pool_settings(&cfg);
            assert_eq!(settings.request_timeout, Duration::from_secs(20));
            assert_eq!(settings.probe_timeout, Duration::from_secs(5));
            assert_eq!(settings.tls, TlsVerification::DangerAcceptInvalid);
            assert_eq!(settings.probe_failure, ProbeFailurePolicy::FailClosed);
        });
    }

    #[test]
    fn unknown_default_server_is_an_error() {
        let mut cfg = Config::default();
        cfg.default_server = Some("ghost".into());
        assert!(matches!(
            registry_snapshot(&cfg),
            Err(ConfigError::UnknownServer { .. })
        ));
    }

    #[test]
    fn password_env_wins_over_plaintext() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SG1_PASSWORD", "from-env");
            let server = ServerEntry {
                id: "jail-test-sg-1".into(),
                name: String::new(),
                url: "https://203.0.113.7:2053/".into(),
                username: "admin".into(),
                password: Some("plain".into()),
                password_env: Some("SG1_PASSWORD".into()),
                inbound_id: 1,
                region: String::new(),
                enabled: true,
                public_host: None,
            };
            assert_eq!(resolve_password(&server).unwrap().expose_secret(), "from-env");
            Ok(())
        });
    }

    #[test]
    fn missing_password_is_reported() {
        let server = ServerEntry {
            id: "no-such-keyring-entry-for-poolkey-tests".into(),
            name: String::new(),
            url: "https://203.0.113.7:2053/".into(),
            username: "admin".into(),
            password: None,
            password_env: None,
            inbound_id: 1,
            region: String::new(),
            enabled: true,
            public_host: None,
        };
        assert!(matches!(
            resolve_password(&server),
            Err(ConfigError::NoCredentials { .. })
        ));
    }

    #[test]
    fn panel_url_validation() {
        assert!(matches!(
            validate_panel_url("vless://abc@1.2.3.4:443?type=tcp#x"),
            Err(ConfigError::Validation { .. })
        ));
        assert!(validate_panel_url("ftp://1.2.3.4/").is_err());
        assert_eq!(
            validate_panel_url("1.2.3.4:2053/path/\\").unwrap().as_str(),
            "https://1.2.3.4:2053/path/"
        );
    }

    #[test]
    fn plan_request() {
        let request = Plan { quota_gb: 2, days: 1 }.request("bob");
        assert_eq!(request.quota_bytes, 2 * GIB);
        assert_eq!(request.ttl, Some(Duration::from_secs(DAY_SECS)));
        assert_eq!(Plan { quota_gb: 0, days: 0 }.ttl(), None);
    }
}
