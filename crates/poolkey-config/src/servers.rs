// ── Server list management ──
//
// Editing the `[[servers]]` list: add, remove, enable/disable, default.
// Also parses the two paste formats admins use to register a panel.

use crate::{Config, ConfigError, ServerEntry, validate_panel_url};

const INSTALLER_URL_KEY: &str = "Access URL:";

/// Panel details pasted by an admin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedServer {
    pub url: String,
    pub username: String,
    pub password: String,
    pub inbound_id: u32,
}

/// Parse either `URL|USER|PASS|INBOUND` or the block printed by the panel
/// installer (`Username:`, `Password:` and `Access URL:` lines; inbound 1).
pub fn parse_server_spec(input: &str) -> Result<ParsedServer, ConfigError> {
    let parsed = if input.contains(INSTALLER_URL_KEY) {
        parse_installer_output(input)?
    } else {
        parse_pipe_form(input)?
    };
    // Normalises the scheme and rejects client links.
    let url = validate_panel_url(&parsed.url)?;
    Ok(ParsedServer {
        url: url.to_string(),
        ..parsed
    })
}

fn parse_pipe_form(input: &str) -> Result<ParsedServer, ConfigError> {
    let parts: Vec<&str> = input.trim().split('|').map(str::trim).collect();
    let [url, username, password, inbound] = parts.as_slice() else {
        return Err(invalid(format!(
            "expected URL|USER|PASS|INBOUND (4 fields), got {}",
            parts.len()
        )));
    };
    if url.is_empty() || username.is_empty() || password.is_empty() {
        return Err(invalid("URL, user and password must not be empty".into()));
    }
    let inbound_id = inbound
        .parse()
        .map_err(|_| invalid(format!("inbound id '{inbound}' is not a number")))?;
    Ok(ParsedServer {
        url: (*url).to_owned(),
        username: (*username).to_owned(),
        password: (*password).to_owned(),
        inbound_id,
    })
}

fn parse_installer_output(input: &str) -> Result<ParsedServer, ConfigError> {
    let field = |key: &str| {
        input
            .lines()
            .find_map(|line| line.split_once(key).map(|(_, rest)| rest))
            .and_then(|rest| rest.split_whitespace().next())
            .map(str::to_owned)
            .ok_or_else(|| invalid(format!("no '{key}' line in installer output")))
    };
    Ok(ParsedServer {
        username: field("Username:")?,
        password: field("Password:")?,
        url: field(INSTALLER_URL_KEY)?,
        inbound_id: 1,
    })
}

fn invalid(reason: String) -> ConfigError {
    ConfigError::Validation {
        field: "server".into(),
        reason,
    }
}

impl Config {
    pub fn server(&self, id: &str) -> Result<&ServerEntry, ConfigError> {
        self.servers
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| ConfigError::UnknownServer { id: id.into() })
    }

    fn server_mut(&mut self, id: &str) -> Result<&mut ServerEntry, ConfigError> {
        self.servers
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| ConfigError::UnknownServer { id: id.into() })
    }

    /// First `server-N` id not already taken.
    pub fn next_server_id(&self) -> String {
        (self.servers.len() + 1..)
            .map(|n| format!("server-{n}"))
            .find(|id| self.servers.iter().all(|s| &s.id != id))
            .unwrap_or_else(|| "server".into())
    }

    /// Append a server after validating its id and URL.
    pub fn add_server(&mut self, server: ServerEntry) -> Result<(), ConfigError> {
        if server.id.trim().is_empty() || server.id.contains(char::is_whitespace) {
            return Err(ConfigError::Validation {
                field: "id".into(),
                reason: format!("'{}' must be non-empty without whitespace", server.id),
            });
        }
        if self.servers.iter().any(|s| s.id == server.id) {
            return Err(ConfigError::DuplicateServer { id: server.id });
        }
        validate_panel_url(&server.url)?;
        self.servers.push(server);
        Ok(())
    }

    /// Remove a server. Clears the default when it pointed at this one.
    pub fn remove_server(&mut self, id: &str) -> Result<ServerEntry, ConfigError> {
        let index = self
            .servers
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| ConfigError::UnknownServer { id: id.into() })?;
        if self.default_server.as_deref() == Some(id) {
            self.default_server = None;
        }
        Ok(self.servers.remove(index))
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<(), ConfigError> {
        self.server_mut(id)?.enabled = enabled;
        Ok(())
    }

    pub fn set_default(&mut self, id: &str) -> Result<(), ConfigError> {
        self.server(id)?;
        self.default_server = Some(id.to_owned());
        Ok(())
    }

    /// The server pinned provisioning lands on: `default_server` while it
    /// is enabled, else the first enabled server.
    pub fn effective_default(&self) -> Option<&ServerEntry> {
        self.default_server
            .as_deref()
            .and_then(|id| self.servers.iter().find(|s| s.id == id))
            .filter(|s| s.enabled)
            .or_else(|| self.servers.iter().find(|s| s.enabled))
    }
}
