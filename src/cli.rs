use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Poll a Reddit custom feed and archive new posts as JSON lines.
#[derive(Parser, Debug)]
#[command(name = "redditfeed")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Check configuration, credentials and feed access, then exit.
    Validate,
    /// Run a single poll cycle.
    Once,
    /// Poll until interrupted.
    Run,
}
