//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use poolkey_config::ConfigError;
use poolkey_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    #[allow(dead_code)]
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const CANCELLED: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Panel '{server}' is unreachable: {reason}")]
    #[diagnostic(
        code(poolkey::unavailable),
        help(
            "Check that the panel is running and reachable.\n\
             Try: poolkey servers status"
        )
    )]
    Unavailable { server: String, reason: String },

    #[error("No panels available{}", region_suffix(.region.as_deref()))]
    #[diagnostic(
        code(poolkey::no_backends),
        help(
            "Every matching panel is disabled or none is configured.\n\
             Run: poolkey servers list"
        )
    )]
    NoBackends { region: Option<String> },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Login to panel '{server}' failed: {message}")]
    #[diagnostic(
        code(poolkey::auth_failed),
        help(
            "Verify the panel username and password.\n\
             Re-register it with: poolkey servers remove {server} && poolkey servers add ..."
        )
    )]
    AuthFailed { server: String, message: String },

    #[error("No password configured for server '{server}'")]
    #[diagnostic(
        code(poolkey::no_credentials),
        help(
            "Set `password_env` or `password` for the server in the config file,\n\
             or re-add it with --keyring."
        )
    )]
    NoCredentials { server: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(poolkey::not_found),
        help("Run: poolkey {list_command}")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("No credential with id '{id}'")]
    #[diagnostic(
        code(poolkey::credential_not_found),
        help(
            "Only enabled panels are searched, and unreachable ones are skipped.\n\
             Run: poolkey servers status"
        )
    )]
    CredentialNotFound { id: String },

    #[error("{resource_type} '{identifier}' already exists")]
    #[diagnostic(code(poolkey::conflict))]
    Conflict {
        resource_type: String,
        identifier: String,
    },

    // ── Panel ────────────────────────────────────────────────────────
    #[error("Provisioning on panel '{server}' failed: {message}")]
    #[diagnostic(
        code(poolkey::provisioning_failed),
        help("No credential was issued. Retrying with the same label is safe.")
    )]
    ProvisioningFailed { server: String, message: String },

    #[error("Panel '{server}' returned an error: {message}")]
    #[diagnostic(code(poolkey::panel_error))]
    PanelError { server: String, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(poolkey::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No servers configured")]
    #[diagnostic(
        code(poolkey::no_servers),
        help(
            "Register one with: poolkey servers add 'https://panel:2053/path|admin|secret|1'\n\
             Config file: {path}"
        )
    )]
    NoServers { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(poolkey::config))]
    Config { message: String },

    #[error("Keyring error: {message}")]
    #[diagnostic(
        code(poolkey::keyring),
        help("Use --password-env or a plaintext password where no keyring service is running.")
    )]
    Keyring { message: String },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("'{action}' requires confirmation")]
    #[diagnostic(
        code(poolkey::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout / cancellation ───────────────────────────────────────
    #[error("Request to panel '{server}' timed out")]
    #[diagnostic(
        code(poolkey::timeout),
        help("Increase the timeout with --timeout or check panel responsiveness.")
    )]
    Timeout { server: String },

    #[error("Interrupted")]
    #[diagnostic(code(poolkey::cancelled))]
    Cancelled,

    // ── Internal / IO ────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    #[diagnostic(code(poolkey::internal))]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn region_suffix(region: Option<&str>) -> String {
    region.map(|r| format!(" in region '{r}'")).unwrap_or_default()
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unavailable { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } | Self::Keyring { .. } => {
                exit_code::AUTH
            }
            Self::NotFound { .. } | Self::CredentialNotFound { .. } | Self::NoBackends { .. } => {
                exit_code::NOT_FOUND
            }
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Cancelled => exit_code::CANCELLED,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthenticationFailed { backend, message } => Self::AuthFailed {
                server: backend,
                message,
            },

            CoreError::BackendUnavailable { backend, reason }
            | CoreError::ProbeFailed { backend, reason } => Self::Unavailable {
                server: backend,
                reason,
            },

            CoreError::ProvisioningFailed { backend, message } => Self::ProvisioningFailed {
                server: backend,
                message,
            },

            CoreError::Backend { backend, message } => Self::PanelError {
                server: backend,
                message,
            },

            CoreError::Timeout { backend } => Self::Timeout { server: backend },

            CoreError::NoBackendsAvailable { region } => Self::NoBackends { region },

            CoreError::NoCandidates => Self::NoBackends { region: None },

            CoreError::BackendNotFound { id } => Self::NotFound {
                resource_type: "server".into(),
                identifier: id,
                list_command: "servers list".into(),
            },

            CoreError::Cancelled => Self::Cancelled,

            CoreError::ValidationFailed { message } => Self::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Config { message } => Self::Config { message },

            CoreError::Internal(message) => Self::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },

            ConfigError::NoCredentials { server } => Self::NoCredentials { server },

            ConfigError::UnknownServer { id } => Self::NotFound {
                resource_type: "server".into(),
                identifier: id,
                list_command: "servers list".into(),
            },

            ConfigError::DuplicateServer { id } => Self::Conflict {
                resource_type: "server".into(),
                identifier: id,
            },

            ConfigError::UnknownPlan { name } => Self::NotFound {
                resource_type: "plan".into(),
                identifier: name,
                list_command: "config show".into(),
            },

            ConfigError::Keyring(message) => Self::Keyring { message },

            ConfigError::Io(e) => Self::Io(e),

            other @ (ConfigError::Serialization(_) | ConfigError::Figment(_)) => Self::Config {
                message: other.to_string(),
            },
        }
    }
}
