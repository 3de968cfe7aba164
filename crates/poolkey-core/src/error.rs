// ── Core error types ──
//
// User-facing errors from poolkey-core. Consumers never see HTTP status
// codes or JSON parse failures directly: the `From<poolkey_api::Error>`
// impl translates transport-layer errors into domain variants, and
// `for_backend` stamps the backend id onto the ones that carry it.

use thiserror::Error;

use crate::config::BackendId;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Backend errors ───────────────────────────────────────────────
    #[error("Authentication failed on backend {backend}: {message}")]
    AuthenticationFailed { backend: String, message: String },

    #[error("Backend {backend} is unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    #[error("Load probe failed on backend {backend}: {reason}")]
    ProbeFailed { backend: String, reason: String },

    #[error("Provisioning failed on backend {backend}: {message}")]
    ProvisioningFailed { backend: String, message: String },

    #[error("Backend {backend} returned an error: {message}")]
    Backend { backend: String, message: String },

    #[error("Request to backend {backend} timed out")]
    Timeout { backend: String },

    // ── Pool errors ──────────────────────────────────────────────────
    #[error("No backends available{}", region_suffix(.region.as_deref()))]
    NoBackendsAvailable { region: Option<String> },

    #[error("No candidate backends to choose from")]
    NoCandidates,

    #[error("Backend not found: {id}")]
    BackendNotFound { id: String },

    // ── Request errors ───────────────────────────────────────────────
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

fn region_suffix(region: Option<&str>) -> String {
    region.map(|r| format!(" in region '{r}'")).unwrap_or_default()
}

impl CoreError {
    /// Translate an API error raised while talking to `backend`.
    pub fn for_backend(backend: &BackendId, err: poolkey_api::Error) -> Self {
        Self::from(err).with_backend(backend)
    }

    /// Fill in the backend id on variants that carry one.
    #[must_use]
    pub fn with_backend(self, id: &BackendId) -> Self {
        let backend = id.to_string();
        match self {
            Self::AuthenticationFailed { message, .. } => {
                Self::AuthenticationFailed { backend, message }
            }
            Self::BackendUnavailable { reason, .. } => Self::BackendUnavailable { backend, reason },
            Self::ProbeFailed { reason, .. } => Self::ProbeFailed { backend, reason },
            Self::ProvisioningFailed { message, .. } => {
                Self::ProvisioningFailed { backend, message }
            }
            Self::Backend { message, .. } => Self::Backend { backend, message },
            Self::Timeout { .. } => Self::Timeout { backend },
            other => other,
        }
    }

    /// Whether the error came from a single backend rather than the pool
    /// as a whole. Callers may try another backend after these.
    pub fn is_backend_local(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed { .. }
                | Self::BackendUnavailable { .. }
                | Self::ProbeFailed { .. }
                | Self::ProvisioningFailed { .. }
                | Self::Backend { .. }
                | Self::Timeout { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

const UNKNOWN_BACKEND: &str = "<unknown>";

impl From<poolkey_api::Error> for CoreError {
    fn from(err: poolkey_api::Error) -> Self {
        let backend = UNKNOWN_BACKEND.to_owned();
        match err {
            poolkey_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { backend, message }
            }
            poolkey_api::Error::SessionExpired => CoreError::BackendUnavailable {
                backend,
                reason: "session rejected by panel".into(),
            },
            poolkey_api::Error::Transport(ref e) if e.is_timeout() => CoreError::Timeout { backend },
            poolkey_api::Error::Transport(e) => CoreError::BackendUnavailable {
                backend,
                reason: e.to_string(),
            },
            poolkey_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            poolkey_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            poolkey_api::Error::PanelApi { message }
            | poolkey_api::Error::Refused { message }
            | poolkey_api::Error::DuplicateClient { message } => {
                CoreError::Backend { backend, message }
            }
            poolkey_api::Error::Deserialization { message, body: _ } => CoreError::Backend {
                backend,
                message: format!("malformed response: {message}"),
            },
        }
    }
}
