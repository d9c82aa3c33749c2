use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

/// Scheduled-publish service for a git-backed notes site.
#[derive(Debug, Parser)]
#[command(name = "notepress", version, about)]
pub struct Cli {
    /// Path to notepress.toml (default: ~/.notepress/notepress.toml).
    #[arg(long, short, global = true, env = "NOTEPRESS_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTTP trigger endpoint (default).
    Serve,
    /// Run a single publish batch, print the report as JSON and exit.
    ///
    /// Exits with status 1 when any note failed to publish.
    PublishOnce {
        /// Evaluate due times against this instant instead of the clock (RFC 3339).
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
}
