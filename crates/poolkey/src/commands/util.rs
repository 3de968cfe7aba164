//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use poolkey_config::Config;
use poolkey_core::{CancellationToken, PoolController, TlsVerification};
use tracing::debug;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// The config file in effect: `--config` / `POOLKEY_CONFIG`, else the
/// platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(poolkey_config::config_path)
}

/// Load the config file (a missing file yields the defaults).
pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = config_path(global);
    debug!(path = %path.display(), "loading config");
    Ok(poolkey_config::load_config_from(&path)?)
}

/// Write the config back to where it was loaded from.
pub fn save_config(global: &GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    let path = config_path(global);
    poolkey_config::save_config_to(cfg, &path)?;
    debug!(path = %path.display(), "config saved");
    Ok(())
}

/// Build a controller over every configured server, applying the
/// `--insecure` and `--timeout` overrides.
pub fn build_controller(global: &GlobalOpts, cfg: &Config) -> Result<PoolController, CliError> {
    if cfg.servers.is_empty() {
        return Err(CliError::NoServers {
            path: config_path(global).display().to_string(),
        });
    }

    let snapshot = poolkey_config::registry_snapshot(cfg)?;
    let mut settings = poolkey_config::pool_settings(cfg);
    if global.insecure {
        settings.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        settings.request_timeout = Duration::from_secs(secs.max(1));
    }
    debug!(
        servers = snapshot.backends().len(),
        timeout = ?settings.request_timeout,
        "controller ready"
    );
    Ok(PoolController::new(settings, snapshot))
}

/// A token that fires on Ctrl-C.
///
/// In-flight logins still finish in the background; everything else is
/// dropped and the command exits with the cancelled code.
pub fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received");
            trigger.cancel();
        }
    });
    token
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.to_owned(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

/// Map a dialoguer failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Format a byte count for humans (`1.5 GiB`).
pub fn human_bytes(bytes: u64) -> String {
    bytesize::ByteSize::b(bytes).to_string_as(true)
}

/// `unlimited` for a zero quota.
pub fn human_quota(bytes: u64) -> String {
    if bytes == 0 {
        "unlimited".into()
    } else {
        human_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_zero_is_unlimited() {
        assert_eq!(human_quota(0), "unlimited");
        assert_eq!(human_quota(2 * 1024 * 1024 * 1024), "2.0 GiB");
    }
}
