//! Visor CLI entry point.
//!
//! Binary name: `visor`
//!
//! Parses CLI arguments, initializes tracing and application state, then
//! either starts the interactive session console or runs a maintenance
//! subcommand against the persisted thread store.

mod cli;
mod console;
mod state;

use clap::Parser;

use visor_core::thread::store::ThreadStore;

use cli::{Cli, Commands, ThreadsAction};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,visor=debug",
        _ => "trace",
    };
    if let Err(err) = visor_observe::tracing_setup::init_tracing(filter, cli.json_logs) {
        eprintln!("warning: could not initialize tracing: {err}");
    }

    let state = AppState::init().await?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => console::Console::new(state).run().await?,

        Commands::Threads { action } => match action {
            ThreadsAction::List => {
                let threads = state.store.all_threads().await?;
                if threads.is_empty() {
                    println!("no persisted threads");
                }
                for record in threads {
                    println!(
                        "{}  agent={}  messages={}  created={}  last-used={}",
                        record.thread_id,
                        record.agent_id,
                        record.message_count,
                        record.created_at.format("%Y-%m-%d %H:%M:%S"),
                        record.last_used_at.format("%Y-%m-%d %H:%M:%S"),
                    );
                }
            }
            ThreadsAction::Clear { agent_id } => {
                state.orchestrator.clear_thread(&agent_id).await?;
                println!("cleared thread mapping for {agent_id}");
            }
            ThreadsAction::Sweep => {
                let removed = state.orchestrator.threads().cleanup_expired().await?;
                println!("removed {removed} expired thread(s)");
            }
        },

        Commands::Agents => {
            for agent in state.registry.iter() {
                println!("{}  {}", agent.id, agent.name);
            }
        }
    }

    Ok(())
}
