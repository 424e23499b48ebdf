//! CLI definitions for the `visor` binary.
//!
//! Uses clap derive macros. The default (no subcommand) starts the
//! interactive console session; the subcommands are maintenance tooling
//! around the persisted thread store.

use clap::{Parser, Subcommand};

/// Head-worn assistant client harness.
#[derive(Parser)]
#[command(name = "visor", version, about, long_about = None)]
pub struct Cli {
    /// Structured JSON log output instead of styled text.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive session console (the default).
    Run,

    /// Inspect or maintain persisted conversation threads.
    Threads {
        #[command(subcommand)]
        action: ThreadsAction,
    },

    /// List the configured agents.
    Agents,
}

#[derive(Subcommand)]
pub enum ThreadsAction {
    /// List persisted threads with their metadata.
    #[command(alias = "ls")]
    List,

    /// Drop the persisted thread for an agent.
    Clear {
        /// Agent id whose thread mapping should be removed.
        agent_id: String,
    },

    /// Remove every thread older than the configured TTL.
    Sweep,
}
