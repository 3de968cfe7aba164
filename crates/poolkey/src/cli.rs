//! Clap derive structures for the `poolkey` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// poolkey -- issue VLESS credentials across a pool of panels
#[derive(Debug, Parser)]
#[command(
    name = "poolkey",
    version,
    about = "Issue and inspect VLESS credentials across a pool of proxy panels",
    long_about = "Hands out VLESS access links from a pool of 3x-ui panels.\n\n\
        Each credential is placed on the least-loaded enabled panel in the\n\
        requested region, and its traffic can be looked up by client id.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "POOLKEY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format [default: from config, else table]
    #[arg(long, short = 'o', env = "POOLKEY_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output [default: from config, else auto]
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed panel certificates
    #[arg(long, short = 'k', env = "POOLKEY_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides config)
    #[arg(long, env = "POOLKEY_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Issue a credential on the least-loaded panel (or a pinned one)
    #[command(alias = "issue")]
    Provision(ProvisionArgs),

    /// Show traffic and quota for a credential
    Usage(UsageArgs),

    /// Manage the panel pool
    #[command(alias = "srv")]
    Servers(ServersArgs),

    /// Inspect CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Provision ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ProvisionArgs {
    /// Client label; unique per panel, reused labels return the existing credential
    pub label: String,

    /// Quota/lifetime preset from the config
    #[arg(long, short = 'P', default_value = "trial")]
    pub plan: String,

    /// Override the plan's quota in GiB (0 = unlimited)
    #[arg(long)]
    pub quota_gb: Option<u64>,

    /// Override the plan's lifetime in days (0 = unlimited)
    #[arg(long)]
    pub days: Option<u64>,

    /// Only consider panels in this region
    #[arg(long, short = 'r', conflicts_with_all = ["server", "pinned"])]
    pub region: Option<String>,

    /// Provision on this panel instead of balancing
    #[arg(long, short = 's')]
    pub server: Option<String>,

    /// Provision on the configured default panel
    #[arg(long, conflicts_with = "server")]
    pub pinned: bool,
}

// ── Usage ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct UsageArgs {
    /// Client id (UUID) of the credential
    pub client_id: String,
}

// ── Servers ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ServersArgs {
    #[command(subcommand)]
    pub command: ServersCommand,
}

#[derive(Debug, Subcommand)]
pub enum ServersCommand {
    /// List configured panels
    #[command(alias = "ls")]
    List,

    /// Check reachability and load of every panel
    Status,

    /// Register a panel
    Add(ServerAddArgs),

    /// Remove a panel
    #[command(alias = "rm")]
    Remove {
        /// Server id
        id: String,
    },

    /// Include a panel in balancing and usage lookups
    Enable {
        /// Server id
        id: String,
    },

    /// Exclude a panel from balancing and usage lookups
    Disable {
        /// Server id
        id: String,
    },

    /// Use a panel for pinned provisioning
    SetDefault {
        /// Server id
        id: String,
    },
}

#[derive(Debug, Args)]
pub struct ServerAddArgs {
    /// `URL|USER|PASS|INBOUND`, or the panel installer's output block
    /// (use `-` to read it from stdin)
    #[arg(conflicts_with_all = ["url", "username", "password", "inbound"])]
    pub spec: Option<String>,

    /// Panel URL including the web base path
    #[arg(long)]
    pub url: Option<String>,

    /// Panel admin user
    #[arg(long, short = 'u')]
    pub username: Option<String>,

    /// Panel admin password (prompted when omitted)
    #[arg(long)]
    pub password: Option<String>,

    /// Inbound id to place clients on
    #[arg(long, default_value_t = 1)]
    pub inbound: u32,

    /// Server id (defaults to the next free `server-N`)
    #[arg(long)]
    pub id: Option<String>,

    /// Display name
    #[arg(long)]
    pub name: Option<String>,

    /// Region used for filtering, e.g. `singapore`
    #[arg(long, short = 'r')]
    pub region: Option<String>,

    /// Host to put in connection links instead of the panel host
    #[arg(long)]
    pub public_host: Option<String>,

    /// Read the password from this environment variable at runtime
    #[arg(long, conflicts_with = "keyring")]
    pub password_env: Option<String>,

    /// Store the password in the system keyring instead of the config file
    #[arg(long)]
    pub keyring: bool,

    /// Register the panel disabled
    #[arg(long)]
    pub disabled: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Show the effective configuration (secrets masked)
    Show,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
