//! CORE session daemon CLI (§10.6).
//!
//! This process drives the session engine directly for local testing and
//! demonstrates the full session lifecycle end to end; a real deployment
//! would front it with the out-of-scope RPC edge described in §6.

mod commands;
mod paths;
mod store;

use anyhow::Result;
use clap::{Parser, Subcommand};
use paths::Paths;
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a session and host it until interrupted or a duration elapses
    Run {
        /// Scenario document to load before entering Runtime
        #[arg(long)]
        scenario: Option<PathBuf>,

        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Manage saved session documents
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Inspect a scenario document
    Scenario {
        #[command(subcommand)]
        action: ScenarioAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// List saved sessions
    List,
    /// Create a new, empty saved session
    Create {
        /// Human-readable session name
        name: String,
    },
    /// Delete a saved session
    Delete {
        /// Session id
        id: u32,
    },
}

#[derive(Subcommand)]
enum ScenarioAction {
    /// Parse and validate a scenario document without instantiating it
    Open {
        /// Path to the scenario JSON file
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let paths = Paths::from_env();

    match cli.command {
        Commands::Run { scenario, duration } => {
            commands::cmd_run(&paths, scenario.as_deref(), duration).await
        }
        Commands::Session { action } => match action {
            SessionAction::List => commands::cmd_session_list(&paths),
            SessionAction::Create { name } => commands::cmd_session_create(&paths, &name),
            SessionAction::Delete { id } => commands::cmd_session_delete(&paths, id),
        },
        Commands::Scenario { action } => match action {
            ScenarioAction::Open { path } => commands::cmd_scenario_open(&path).await,
        },
    }
}
