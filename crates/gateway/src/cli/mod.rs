pub mod config;
pub mod doctor;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "halo", about = "Household AI assistant gateway")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the admin HTTP server (default when no subcommand is given).
    Serve,
    /// Run startup diagnostics without starting the server.
    Doctor,
    /// Inspect or validate the runtime/family config.
    Config(ConfigCommand),
}

#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate config.json and the family config, printing any issues.
    Validate,
    /// Dump the resolved runtime config (with defaults filled in) as TOML.
    Show,
}
