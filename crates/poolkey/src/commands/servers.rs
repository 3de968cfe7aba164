//! Server (panel pool) command handlers.

use std::io::{IsTerminal, Read};

use dialoguer::Password;
use poolkey_config::{Config, ParsedServer, ServerEntry};
use poolkey_core::BackendStatus;
use secrecy::SecretString;
use serde::Serialize;
use tabled::Tabled;
use tracing::debug;

use crate::cli::{ServerAddArgs, ServersArgs, ServersCommand};
use crate::error::CliError;
use crate::output;

use super::{Context, util};

// ── Views ───────────────────────────────────────────────────────────

/// A configured server without its secret.
#[derive(Debug, Serialize)]
struct ServerView {
    id: String,
    name: String,
    region: String,
    url: String,
    inbound_id: u32,
    enabled: bool,
    default: bool,
    public_host: Option<String>,
    password_source: String,
}

impl ServerView {
    fn new(server: &ServerEntry, default_id: Option<&str>) -> Self {
        let password_source = match (&server.password_env, &server.password) {
            (Some(var), _) => format!("env:{var}"),
            (None, Some(_)) => "config".into(),
            (None, None) => "keyring".into(),
        };
        Self {
            id: server.id.clone(),
            name: server.display_name().to_owned(),
            region: server.region.clone(),
            url: server.url.clone(),
            inbound_id: server.inbound_id,
            enabled: server.enabled,
            default: default_id == Some(server.id.as_str()),
            public_host: server.public_host.clone(),
            password_source,
        }
    }
}

#[derive(Tabled)]
struct ServerRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Region")]
    region: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "Inbound")]
    inbound: u32,
    #[tabled(rename = "Enabled")]
    enabled: String,
    #[tabled(rename = "Default")]
    default: String,
}

fn server_row(v: &ServerView, color: bool) -> ServerRow {
    ServerRow {
        id: v.id.clone(),
        name: v.name.clone(),
        region: v.region.clone(),
        url: v.url.clone(),
        inbound: v.inbound_id,
        enabled: output::paint_state(if v.enabled { "yes" } else { "no" }, v.enabled, color),
        default: if v.default { "*".into() } else { String::new() },
    }
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Region")]
    region: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
    #[tabled(rename = "Default")]
    default: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Clients")]
    clients: String,
    #[tabled(rename = "Error")]
    error: String,
}

fn status_row(s: &BackendStatus, color: bool) -> StatusRow {
    StatusRow {
        id: s.id.to_string(),
        name: s.name.clone(),
        region: s.region.clone(),
        enabled: if s.enabled { "yes".into() } else { "no".into() },
        default: if s.is_default { "*".into() } else { String::new() },
        status: output::paint_state(if s.online { "online" } else { "offline" }, s.online, color),
        clients: s.clients.map(|c| c.to_string()).unwrap_or_default(),
        error: s.error.clone().unwrap_or_default(),
    }
}

fn status_plain(s: &BackendStatus) -> String {
    let state = if s.online { "online" } else { "offline" };
    match s.clients {
        Some(n) => format!("{}\t{state}\t{n}", s.id),
        None => format!("{}\t{state}", s.id),
    }
}

// ── Add ─────────────────────────────────────────────────────────────

/// Read the paste form, `-` meaning stdin.
fn read_spec(spec: &str) -> Result<String, CliError> {
    if spec != "-" {
        return Ok(spec.to_owned());
    }
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn required(value: Option<String>, field: &str) -> Result<String, CliError> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CliError::Validation {
            field: field.into(),
            reason: format!("--{field} is required unless a server spec is given"),
        })
}

/// Panel details from flags, prompting for a password when none was given
/// and none will come from the environment.
fn from_flags(args: &ServerAddArgs) -> Result<ParsedServer, CliError> {
    let url = required(args.url.clone(), "url")?;
    let username = required(args.username.clone(), "username")?;
    let password = match (&args.password, &args.password_env) {
        (Some(pw), _) => pw.clone(),
        (None, Some(_)) => String::new(),
        (None, None) => prompt_password(&username)?,
    };
    let url = poolkey_config::validate_panel_url(&url)?.to_string();
    Ok(ParsedServer {
        url,
        username,
        password,
        inbound_id: args.inbound,
    })
}

fn prompt_password(username: &str) -> Result<String, CliError> {
    if !std::io::stdin().is_terminal() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "--password is required in non-interactive use".into(),
        });
    }
    let pw = Password::new()
        .with_prompt(format!("Panel password for {username}"))
        .interact()
        .map_err(util::prompt_err)?;
    if pw.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }
    Ok(pw)
}

fn add(ctx: &mut Context<'_>, args: &ServerAddArgs) -> Result<(), CliError> {
    let parsed = match args.spec.as_deref() {
        Some(spec) => poolkey_config::parse_server_spec(&read_spec(spec)?)?,
        None => from_flags(args)?,
    };

    let id = args
        .id
        .clone()
        .unwrap_or_else(|| ctx.config.next_server_id());
    let plaintext = !args.keyring && args.password_env.is_none();

    let entry = ServerEntry {
        id: id.clone(),
        name: args.name.clone().unwrap_or_default(),
        url: parsed.url,
        username: parsed.username,
        password: plaintext.then(|| parsed.password.clone()),
        password_env: args.password_env.clone(),
        inbound_id: parsed.inbound_id,
        region: args.region.clone().unwrap_or_default().trim().to_owned(),
        enabled: !args.disabled,
        public_host: args.public_host.clone(),
    };
    ctx.config.add_server(entry)?;

    if args.keyring {
        poolkey_config::store_password(&id, &SecretString::from(parsed.password))?;
        debug!(server = %id, "password stored in keyring");
    }
    util::save_config(ctx.global, &ctx.config)?;

    ctx.ui.note(&format!("Server '{id}' added"));
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

fn list(config: &Config) -> Vec<ServerView> {
    let default_id = config.effective_default().map(|s| s.id.as_str());
    config
        .servers
        .iter()
        .map(|s| ServerView::new(s, default_id))
        .collect()
}

pub async fn handle(args: ServersArgs, mut ctx: Context<'_>) -> Result<(), CliError> {
    let color = ctx.ui.color;
    match args.command {
        ServersCommand::List => {
            let views = list(&ctx.config);
            let out = output::render_list(
                ctx.ui.format,
                &views,
                |v| server_row(v, color),
                |v| v.id.clone(),
            )?;
            output::print_output(&out, ctx.ui.quiet);
            Ok(())
        }

        ServersCommand::Status => {
            let controller = util::build_controller(ctx.global, &ctx.config)?;
            let cancel = util::interrupt_token();
            let statuses = controller.status(&cancel).await?;
            let out = output::render_list(
                ctx.ui.format,
                &statuses,
                |s| status_row(s, color),
                status_plain,
            )?;
            output::print_output(&out, ctx.ui.quiet);
            Ok(())
        }

        ServersCommand::Add(add_args) => add(&mut ctx, &add_args),

        ServersCommand::Remove { id } => {
            ctx.config.server(&id)?;
            if !util::confirm(&format!("Remove server '{id}'?"), ctx.global.yes)? {
                return Ok(());
            }
            ctx.config.remove_server(&id)?;
            util::save_config(ctx.global, &ctx.config)?;
            poolkey_config::forget_password(&id);
            ctx.ui.note(&format!("Server '{id}' removed"));
            Ok(())
        }

        ServersCommand::Enable { id } => {
            ctx.config.set_enabled(&id, true)?;
            util::save_config(ctx.global, &ctx.config)?;
            ctx.ui.note(&format!("Server '{id}' enabled"));
            Ok(())
        }

        ServersCommand::Disable { id } => {
            ctx.config.set_enabled(&id, false)?;
            util::save_config(ctx.global, &ctx.config)?;
            ctx.ui.note(&format!("Server '{id}' disabled"));
            Ok(())
        }

        ServersCommand::SetDefault { id } => {
            ctx.config.set_default(&id)?;
            util::save_config(ctx.global, &ctx.config)?;
            if ctx.config.server(&id).is_ok_and(|s| !s.enabled) {
                ctx.ui.note(&format!(
                    "Server '{id}' is disabled; pinned provisioning falls back to the first enabled server"
                ));
            }
            ctx.ui.note(&format!("Default server set to '{id}'"));
            Ok(())
        }
    }
}
