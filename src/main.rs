//! Gemplex main entry point
//!
//! Launches any combination of the four daemons (crawl, rank, index,
//! search) in one process, wires the shared shutdown signal, and exits
//! non-zero when a daemon dies of an unrecoverable error.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

use gemplex::config::load_config;
use gemplex::storage::Store;
use gemplex::{crawler, index, rank, search, Engine};

/// Gemplex: a search engine for the Gemini hypertext space
///
/// Runs the crawler, the link-graph ranker, the ping-pong indexer and
/// the search daemon as long-running workers in a single process.
#[derive(Parser, Debug)]
#[command(name = "gemplex")]
#[command(version)]
#[command(about = "Gemini search engine daemons", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Dump undispatched crawler queues to this file on shutdown
    #[arg(long, value_name = "FILE")]
    dump_crawler_state: Option<PathBuf>,

    /// Daemons to launch: "all", or any of crawl, rank, index, search
    #[arg(value_name = "COMMAND")]
    commands: Vec<String>,
}

const ALL_COMMANDS: [&str; 4] = ["crawl", "rank", "index", "search"];

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let commands = match resolve_commands(&cli.commands) {
        Ok(commands) => commands,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    let engine = Engine::shared(config);

    // the search daemon must have a live index before accepting
    // queries, and the indexer must know which slot is active
    if commands.iter().any(|c| c == "index" || c == "search") {
        let initial = Store::open(Path::new(&engine.config.db.path))
            .and_then(|store| index::load_initial(&engine, &store));
        if let Err(e) = initial {
            tracing::error!("Failed to load initial index: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let mut daemons: JoinSet<gemplex::Result<()>> = JoinSet::new();
    for command in &commands {
        match command.as_str() {
            "crawl" => {
                daemons.spawn(crawler::crawl(
                    engine.clone(),
                    cli.dump_crawler_state.clone(),
                ));
            }
            "rank" => {
                daemons.spawn(rank::rank(engine.clone()));
            }
            "index" => {
                daemons.spawn(index::index(engine.clone()));
            }
            "search" => {
                daemons.spawn(search::search(engine.clone()));
            }
            _ => unreachable!("commands are validated in resolve_commands"),
        }
    }
    tracing::info!("Started daemons: {}", commands.join(", "));

    spawn_signal_handler(engine.clone());

    let mut failed = false;
    while let Some(joined) = daemons.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!("Daemon failed: {}", e);
                engine.shutdown.cancel();
                failed = true;
            }
            Err(e) => {
                tracing::error!("Daemon panicked: {}", e);
                engine.shutdown.cancel();
                failed = true;
            }
        }
    }

    tracing::info!("Done");
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Expands "all" (or no command at all) and rejects unknown or
/// duplicate commands
fn resolve_commands(requested: &[String]) -> Result<Vec<String>, String> {
    if requested.is_empty() || requested.iter().any(|c| c == "all") {
        if requested.len() > 1 {
            return Err("\"all\" cannot be combined with other commands".to_string());
        }
        return Ok(ALL_COMMANDS.iter().map(|c| c.to_string()).collect());
    }

    let mut seen = HashSet::new();
    for command in requested {
        if !ALL_COMMANDS.contains(&command.as_str()) {
            return Err(format!("Unrecognized command: {}", command));
        }
        if !seen.insert(command.as_str()) {
            return Err(format!("Duplicate command: {}", command));
        }
    }

    Ok(requested.to_vec())
}

fn spawn_signal_handler(engine: Arc<Engine>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received signal; shutting down...");
            engine.shutdown.cancel();
        }
    });
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("gemplex=info,warn"),
            1 => EnvFilter::new("gemplex=debug,info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
