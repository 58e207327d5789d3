use super::open_output;
use crate::cli::SimulateArgs;
use crate::config::time_seed;
use crate::error::{CliError, Result};
use crate::inputs::{load_evolution, load_tree};
use crate::utils::progress::CliProgressHandler;
use std::io::Write;
use tracing::info;
use transat::core::io::fasta::{FastaFile, SequenceRecord, records_from_alignment};
use transat::core::io::traits::TextFormat;
use transat::core::models::structure::SecondaryStructure;
use transat::engine::progress::{CancellationFlag, ProgressReporter};
use transat::workflows::simulate;

pub const STRUCTURE_RECORD_NAME: &str = "structure";

pub async fn run(args: SimulateArgs) -> Result<()> {
    let structure = SecondaryStructure::from_dot_bracket(&args.structure)
        .map_err(|e| CliError::Argument(format!("invalid --structure: {e}")))?;
    let tree = load_tree(&args.tree)?;
    let evolution = load_evolution(args.model.as_deref())?;
    let seed = args.seed.unwrap_or_else(time_seed);
    info!(seed, "Simulating {} columns.", structure.len());

    // Simulation is not interruptible, so the bar never shows a cancellation.
    let progress_handler = CliProgressHandler::new(CancellationFlag::new());
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let simulated = tokio::task::block_in_place(|| {
        simulate::run(&tree, &evolution, &structure, seed, &reporter)
    });
    progress_handler.finish();
    let alignment = simulated?;

    let mut records = records_from_alignment(&alignment, true);
    if !args.no_struct {
        records.push(SequenceRecord::new(STRUCTURE_RECORD_NAME, args.structure.clone()));
    }
    let mut writer = open_output(args.output.as_deref())?;
    FastaFile::write_to(&records, &mut writer).map_err(|e| CliError::Other(e.into()))?;
    writer.flush()?;
    info!("Wrote {} simulated sequence(s).", alignment.num_sequences());
    Ok(())
}
