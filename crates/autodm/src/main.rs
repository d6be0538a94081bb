// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! autodm - Instagram engagement automation.
//!
//! This is the binary entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod import;
mod serve;
mod shutdown;
mod status;

/// autodm - turn comments, mentions and DMs into replies and private messages.
#[derive(Parser, Debug)]
#[command(name = "autodm", version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of the XDG lookup.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the webhook gateway, trigger workers, reconciler and comment poller.
    Serve,
    /// Fail triggers stuck in processing, then exit.
    Reconcile,
    /// Load accounts and automations from a JSON seed file.
    Import {
        /// Path to the seed file.
        file: PathBuf,
    },
    /// Print trigger counts by status.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => autodm_config::load_and_validate_path(path),
        None => autodm_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            autodm_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.log_level);

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Reconcile => status::run_reconcile(&config).await,
        Commands::Import { file } => import::run_import(&config, &file).await,
        Commands::Status { json } => status::run_status(&config, json).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("autodm={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
