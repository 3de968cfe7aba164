//! Command dispatch: bridges CLI args -> controller calls -> output formatting.

pub mod config_cmd;
pub mod provision;
pub mod servers;
pub mod usage;
pub mod util;

use poolkey_config::Config;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::output::Ui;

/// What every handler gets: the flags, the loaded config, and the
/// resolved output settings.
pub struct Context<'a> {
    pub global: &'a GlobalOpts,
    pub config: Config,
    pub ui: Ui,
}

impl<'a> Context<'a> {
    pub fn load(global: &'a GlobalOpts) -> Result<Self, CliError> {
        let config = util::load_config(global)?;
        let ui = Ui::resolve(global, &config.defaults.output, &config.defaults.color);
        Ok(Self { global, config, ui })
    }
}

/// Dispatch a command to its handler.
pub async fn dispatch(cmd: Command, ctx: Context<'_>) -> Result<(), CliError> {
    match cmd {
        Command::Provision(args) => provision::handle(args, &ctx).await,
        Command::Usage(args) => usage::handle(args, &ctx).await,
        Command::Servers(args) => servers::handle(args, ctx).await,
        Command::Config(args) => config_cmd::handle(&args, &ctx),
        // Completions are handled before the config is loaded
        Command::Completions(_) => Ok(()),
    }
}
