//! Clap derive structures for the `nspanel` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// nspanel -- drive NSPanel Lovelace displays from Home Assistant
#[derive(Debug, Parser)]
#[command(
    name = "nspanel",
    version,
    about = "Drive NSPanel Lovelace displays from Home Assistant",
    long_about = "Renders configured cards on Sonoff NSPanel displays running the \
        Lovelace firmware.\n\nPanel messages arrive over MQTT through Home Assistant; \
        entity state comes from the Home Assistant WebSocket API.",
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

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration file (TOML or YAML)
    #[arg(long, short = 'c', env = "NSPANEL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Write logs to this file instead of stderr
    #[arg(long, env = "NSPANEL_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect to Home Assistant and drive every configured panel
    Run,

    /// Validate the configuration and card layout without connecting
    Check,
}
