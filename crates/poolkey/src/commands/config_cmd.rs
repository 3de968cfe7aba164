//! Config subcommand handlers.

use poolkey_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::{Context, util};

const MASK: &str = "****";

/// Copy of the config with plaintext passwords masked.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for server in &mut cfg.servers {
        if server.password.is_some() {
            server.password = Some(MASK.into());
        }
    }
    cfg
}

fn as_toml(cfg: &Config) -> String {
    toml::to_string_pretty(cfg).unwrap_or_else(|e| format!("# unable to render config: {e}"))
}

/// Print the config path. Works even when the file does not parse.
pub fn print_path(global: &GlobalOpts) {
    output::print_output(&util::config_path(global).display().to_string(), false);
}

pub fn handle(args: &ConfigArgs, ctx: &Context<'_>) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            print_path(ctx.global);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = redacted(&ctx.config);
            let out = output::render_single(ctx.ui.format, &cfg, as_toml, as_toml)?;
            output::print_output(&out, ctx.ui.quiet);
            Ok(())
        }
    }
}
