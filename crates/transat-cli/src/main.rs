mod cli;
mod commands;
mod config;
mod error;
mod inputs;
mod logging;
mod utils;

use crate::cli::{Cli, Commands};
use crate::error::{CliError, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};
use transat::engine::progress::CancellationFlag;

#[tokio::main]
async fn main() {
    if let Err(e) = run_app().await {
        eprintln!("\nError: {}", e);
        std::process::exit(1);
    }
}

async fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default().into_hooks();
    eyre_hook.install().map_err(|e| CliError::Other(e.into()))?;
    std::panic::set_hook(Box::new(move |pi| {
        error!("{}", panic_hook.panic_report(pi));
    }));

    info!("Transat CLI v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    if let Some(num_threads) = cli.threads {
        info!("Setting Rayon global thread pool to {} threads.", num_threads);
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .map_err(|e| {
                CliError::Other(anyhow::anyhow!("Failed to build global thread pool: {}", e))
            })?;
    }

    let cancel = CancellationFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; stopping after the current step.");
                cancel.cancel();
            }
        });
    }

    let command_result = match cli.command {
        Commands::Helices(args) => {
            info!("Dispatching to 'helices' command.");
            commands::analyze::run_helices(args, cancel).await
        }
        Commands::Competition(args) => {
            info!("Dispatching to 'competition' command.");
            commands::analyze::run_competition(args, cancel).await
        }
        Commands::BpTable(args) => {
            info!("Dispatching to 'bp-table' command.");
            commands::analyze::run_bp_table(args, cancel).await
        }
        Commands::Coverage(args) => {
            info!("Dispatching to 'coverage' command.");
            commands::analyze::run_coverage(args, cancel).await
        }
        Commands::Simulate(args) => {
            info!("Dispatching to 'simulate' command.");
            commands::simulate::run(args).await
        }
    };

    match &command_result {
        Ok(()) => info!("Command completed successfully."),
        Err(e) => error!("Command failed: {}", e),
    }
    command_result
}
