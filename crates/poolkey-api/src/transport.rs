// HTTP client construction shared by every panel client.
//
// Sessions are per panel, so each client is built around its own cookie jar;
// TLS policy, deadlines and redirect handling are common.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::redirect::Policy;

use crate::error::Error;

/// How panel certificates are checked.
#[derive(Debug, Clone)]
pub enum TlsMode {
    /// System trust store.
    System,
    /// Trust the PEM bundle at this path in addition to the system store.
    CustomCa(PathBuf),
    /// Skip verification. Most panels serve a self-signed certificate on an
    /// IP address.
    DangerAcceptInvalid,
}

/// Settings every panel HTTP client is built from.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Whole-request deadline, connect included.
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::DangerAcceptInvalid,
            timeout: Duration::from_secs(15),
        }
    }
}

impl TransportConfig {
    /// Build a client that stores cookies in `jar` and never follows
    /// redirects (a redirect to the login page means the session is gone).
    pub fn build_client(&self, jar: Arc<Jar>) -> Result<reqwest::Client, Error> {
        let builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .redirect(Policy::none())
            .cookie_provider(jar)
            .user_agent(concat!("poolkey/", env!("CARGO_PKG_VERSION")));

        let builder = match &self.tls {
            TlsMode::System => builder,
            TlsMode::CustomCa(path) => builder.add_root_certificate(load_ca(path)?),
            TlsMode::DangerAcceptInvalid => builder.danger_accept_invalid_certs(true),
        };

        builder
            .build()
            .map_err(|e| Error::Tls(format!("cannot build HTTP client: {e}")))
    }
}

fn load_ca(path: &Path) -> Result<reqwest::Certificate, Error> {
    let pem = std::fs::read(path)
        .map_err(|e| Error::Tls(format!("cannot read CA bundle {}: {e}", path.display())))?;
    reqwest::Certificate::from_pem(&pem)
        .map_err(|e| Error::Tls(format!("{} is not a PEM certificate: {e}", path.display())))
}
