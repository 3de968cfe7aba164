// ── Runtime pool configuration ──
//
// These types describe *which* backends exist and *how* to talk to them.
// They carry credential data and timeouts, but never touch disk.
// The CLI builds them from its config file and hands them in.

use std::fmt;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

/// Stable identifier of a backend within the pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(String);

impl BackendId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for BackendId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One gateway server in the pool.
///
/// Immutable for the duration of a request; a config reload produces a
/// fresh set of descriptors.
#[derive(Debug, Clone)]
pub struct BackendDescriptor {
    pub id: BackendId,
    /// Human-readable name for listings and logs.
    pub name: String,
    /// Panel root, including any web base path.
    pub panel_url: Url,
    pub username: String,
    pub password: SecretString,
    /// The inbound new clients are added to.
    pub inbound_id: u32,
    /// Region tag; empty means untagged.
    pub region: String,
    pub enabled: bool,
    /// Host to put in connection URIs instead of the panel host.
    pub public_host: Option<String>,
}

impl BackendDescriptor {
    /// Case-insensitive region match.
    pub fn in_region(&self, region: &str) -> bool {
        self.region.eq_ignore_ascii_case(region)
    }

    /// Host that clients connect to: the public override, else the panel host.
    pub fn connect_host(&self) -> Option<String> {
        self.public_host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_owned)
            .or_else(|| self.panel_url.host_str().map(str::to_owned))
    }

    /// Whether two descriptors would log in to the same panel the same way.
    pub(crate) fn same_login(&self, other: &Self) -> bool {
        self.panel_url == other.panel_url
            && self.username == other.username
            && self.password.expose_secret() == other.password.expose_secret()
    }
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification. Default, since panels usually run self-signed.
    #[default]
    DangerAcceptInvalid,
}

/// What to do when every load probe fails.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ProbeFailurePolicy {
    /// Pick the first candidate anyway.
    #[default]
    FirstCandidate,
    /// Refuse with `NoBackendsAvailable`.
    FailClosed,
}

/// Pool-wide tuning shared by every backend.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub tls: TlsVerification,
    /// Timeout for login, inbound reads and client creation.
    pub request_timeout: Duration,
    /// Timeout for load probes and status checks.
    pub probe_timeout: Duration,
    /// Path between the panel root and the API endpoints.
    pub api_prefix: String,
    /// Concurrent-IP limit written into new clients.
    pub limit_ip: u32,
    pub probe_failure: ProbeFailurePolicy,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            tls: TlsVerification::default(),
            request_timeout: Duration::from_secs(15),
            probe_timeout: Duration::from_secs(5),
            api_prefix: poolkey_api::DEFAULT_API_PREFIX.into(),
            limit_ip: 1,
            probe_failure: ProbeFailurePolicy::default(),
        }
    }
}
