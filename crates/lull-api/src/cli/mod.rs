//! CLI command definitions for the `lull` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod workflow;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Debounced Slack-mention to workflow dispatcher.
#[derive(Parser)]
#[command(name = "lull", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the TOML config file (missing file means defaults).
    #[arg(long, global = true, env = "LULL_CONFIG", default_value = "lull.toml")]
    pub config: PathBuf,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (Slack events + webhook trigger).
    Serve {
        /// Port to listen on (defaults to `server.port` from config).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to `server.host` from config).
        #[arg(long)]
        host: Option<String>,
    },

    /// List registered workflows.
    #[command(alias = "ls")]
    Workflows,

    /// Run a workflow once in the foreground, reporting to the terminal.
    Run {
        /// Workflow name.
        name: String,

        /// Initial state entry as key=value (repeatable).
        #[arg(short = 's', long = "state")]
        state: Vec<String>,
    },
}
