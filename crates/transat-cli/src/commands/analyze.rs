use super::open_output;
use crate::cli::{BpTableArgs, CompetitionArgs, CoverageArgs, HelicesArgs};
use crate::config::{ExternalOverrides, PartialAnalysisConfig};
use crate::error::Result;
use crate::inputs::load_inputs;
use crate::utils::progress::CliProgressHandler;
use std::io::Write;
use tracing::{info, warn};
use transat::core::io::report::{
    COMPETITION_TABLE_HEADER, HELIX_TABLE_HEADER, write_sparse_table, write_table,
};
use transat::engine::progress::{CancellationFlag, ProgressReporter};
use transat::workflows::analyze;

pub async fn run_helices(args: HelicesArgs, cancel: CancellationFlag) -> Result<()> {
    let config = PartialAnalysisConfig::load(args.input.config.as_deref())?
        .merge_with_cli(&args.analysis, &ExternalOverrides::for_helices(&args))?;
    let input = load_inputs(&args.input)?;

    let progress_handler = CliProgressHandler::new(cancel.clone());
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    info!("Invoking the all-helices workflow...");
    let outcome =
        tokio::task::block_in_place(|| analyze::helices(&input, &config, &reporter, &cancel));
    progress_handler.finish();
    let rows = outcome?;
    if rows.is_empty() {
        warn!("No helices longer than {} pairs were found.", config.min_stem_length);
    }

    write_table(
        &rows,
        &HELIX_TABLE_HEADER,
        config.print_headers,
        open_output(args.input.output.as_deref())?,
    )?;
    info!("Wrote {} helix row(s).", rows.len());
    Ok(())
}

pub async fn run_competition(args: CompetitionArgs, cancel: CancellationFlag) -> Result<()> {
    let config = PartialAnalysisConfig::load(args.input.config.as_deref())?
        .merge_with_cli(&args.analysis, &ExternalOverrides::for_competition(&args))?;
    let input = load_inputs(&args.input)?;

    let progress_handler = CliProgressHandler::new(cancel.clone());
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    info!("Invoking the per-true-helix competition workflow...");
    let outcome =
        tokio::task::block_in_place(|| analyze::competition(&input, &config, &reporter, &cancel));
    progress_handler.finish();
    let rows = outcome?;

    write_table(
        &rows,
        &COMPETITION_TABLE_HEADER,
        config.print_headers,
        open_output(args.input.output.as_deref())?,
    )?;
    info!("Wrote {} competing helix row(s).", rows.len());
    Ok(())
}

pub async fn run_bp_table(args: BpTableArgs, cancel: CancellationFlag) -> Result<()> {
    let config = PartialAnalysisConfig::load(args.input.config.as_deref())?
        .merge_with_cli(&args.analysis, &ExternalOverrides::default())?;
    let input = load_inputs(&args.input)?;

    let progress_handler = CliProgressHandler::new(cancel.clone());
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let outcome =
        tokio::task::block_in_place(|| analyze::bp_table(&input, &config, &reporter, &cancel));
    progress_handler.finish();
    let rows = outcome?;
    write_sparse_table(&rows, open_output(args.input.output.as_deref())?)?;
    info!("Wrote {} base-pair feature row(s).", rows.len());
    Ok(())
}

pub async fn run_coverage(args: CoverageArgs, cancel: CancellationFlag) -> Result<()> {
    let config = PartialAnalysisConfig::load(args.input.config.as_deref())?
        .merge_with_cli(&args.analysis, &ExternalOverrides::default())?;
    let input = load_inputs(&args.input)?;

    let progress_handler = CliProgressHandler::new(cancel.clone());
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let outcome =
        tokio::task::block_in_place(|| analyze::coverage(&input, &config, &reporter, &cancel));
    progress_handler.finish();
    let coverage = outcome?;
    let mut writer = open_output(args.input.output.as_deref())?;
    writeln!(writer, "{}\t{}", coverage.coverage, coverage.exact)?;
    writer.flush()?;
    Ok(())
}
