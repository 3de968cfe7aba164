use thiserror::Error;

/// Top-level error type for the `poolkey-api` crate.
///
/// Covers every failure mode of the panel API: login, transport,
/// envelope-level rejections, and payload decoding. `poolkey-core`
/// maps these into pool-level outcomes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed (wrong credentials, panel refused the form, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The panel no longer accepts the session cookie.
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    /// A refusal current panels also give for a stale cookie: HTTP 404 on
    /// an API route, or `success: false` on a read. Only a fresh login
    /// tells the two apart.
    #[error("Panel refused the request: {message}")]
    Refused { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Panel API ───────────────────────────────────────────────────
    /// The panel answered with `success: false` or a non-2xx status.
    #[error("Panel API error: {message}")]
    PanelApi { message: String },

    /// `addClient` was refused because the email (label) is already taken.
    #[error("Duplicate client: {message}")]
    DuplicateClient { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the session cookie was rejected, or might have
    /// been, and a fresh login might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::Refused { .. })
    }

    /// Returns `true` if the request hit its timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }
}

/// Compatibility shim: the panel reports a label conflict only through
/// free text (e.g. `"Duplicate email: alice"`).
pub(crate) fn is_duplicate_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("duplicate") || lower.contains("already exist")
}
