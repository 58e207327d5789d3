use super::competition::{self, CompetitionTable, RelevantHelix};
use super::null_distribution::{TrialOutcome, aggregate};
use crate::core::models::alignment::AlignmentModel;
use crate::engine::context::AnalysisContext;
use crate::engine::error::EngineError;
use crate::engine::external::JavaRealigner;
use crate::engine::metrics::mean_log_odds;
use crate::engine::progress::Progress;
use crate::engine::shuffle::{
    RngStream, column_shuffler, helix_preserving_base, randomize_unpaired, trial_rng,
};
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Trials sharing one realigned base before it is rebuilt.
pub const TRIALS_PER_REALIGNMENT: usize = 100;

/// A relevant competing helix scored against the null model of its true helix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCompetitor {
    pub true_helix: usize,
    /// Position among the true helix's relevant competitors.
    pub rank: usize,
    pub competitor: RelevantHelix,
    pub log_likelihood: f64,
    pub pvalue: f64,
}

fn competitor_scores(
    context: &AnalysisContext,
    alignment: &AlignmentModel,
    relevant: &[RelevantHelix],
) -> Result<Vec<f64>, EngineError> {
    let mut evaluator = context.phylo.evaluator(alignment)?;
    Ok(relevant
        .iter()
        .map(|r| {
            let pairs: Vec<(usize, usize)> =
                r.helix.aligned_pairs(alignment.seq_to_aln(r.seq)).collect();
            mean_log_odds(&mut evaluator, &pairs)
        })
        .collect())
}

/// Empirical p-values of every relevant competing helix, true helix by true helix.
///
/// For true helix `h`, each trial holds `h`'s columns fixed, permutes the other
/// columns and pools the scores of the clean competitors of `h` found in the
/// randomized alignment.
#[instrument(skip_all, name = "true_helix_pvalues_task")]
pub fn run(
    context: &AnalysisContext,
    table: &CompetitionTable,
) -> Result<Vec<ScoredCompetitor>, EngineError> {
    let alignment = context.alignment;
    let config = context.config;
    let realigner = config
        .interval_realigner
        .as_ref()
        .map(|r| JavaRealigner::new(r.java.clone(), r.classpath.clone(), context.phylo.tree()));
    if realigner.is_some() && context.phylo.non_gap_pair() {
        warn!(
            target: crate::engine::ADVISORY_TARGET,
            "Interval realignment combined with non-gap pairing has not been validated."
        );
    }
    let shuffler = column_shuffler(&config.shuffler);

    let mut scored = Vec::new();
    for true_helix in 0..alignment.true_helix_count() {
        context.check_cancelled()?;
        let relevant = table.relevant(alignment, true_helix);
        if relevant.is_empty() {
            debug!(true_helix, "No relevant competitors; skipping.");
            continue;
        }
        let observed = competitor_scores(context, alignment, &relevant)?;

        let pvalues = if config.compute_pvalues && config.trials > 0 {
            info!(
                true_helix,
                competitors = relevant.len(),
                trials = config.trials,
                "Sampling null distribution for true helix."
            );
            let base_count = match realigner {
                Some(_) => config.trials.div_ceil(TRIALS_PER_REALIGNMENT),
                None => 1,
            };
            let bases = (0..base_count)
                .map(|_| helix_preserving_base(alignment, true_helix, realigner.as_ref()))
                .collect::<Result<Vec<_>, _>>()?;

            context.reporter.report(Progress::TaskStart {
                total_steps: config.trials as u64,
            });
            let trial_indices: Vec<usize> = (0..config.trials).collect();

            #[cfg(not(feature = "parallel"))]
            let iterator = trial_indices.iter();

            #[cfg(feature = "parallel")]
            let iterator = trial_indices.par_iter();

            let outcomes = iterator
                .map(|&trial| -> Result<TrialOutcome, EngineError> {
                    context.check_cancelled()?;
                    let base = &bases[(trial / TRIALS_PER_REALIGNMENT).min(bases.len() - 1)];
                    let stream_index = (true_helix * config.trials + trial) as u64;
                    let mut rng = trial_rng(config.seed, RngStream::TrueHelix, stream_index);
                    let shuffled = randomize_unpaired(base, shuffler.as_ref(), &mut rng)?;
                    let null_table = competition::run(context, &shuffled);
                    let null_relevant = null_table.relevant(&shuffled, 0);
                    let sample = competitor_scores(context, &shuffled, &null_relevant)?;
                    context.reporter.report(Progress::TaskIncrement { amount: 1 });
                    Ok(TrialOutcome::rank(&observed, sample))
                })
                .collect::<Result<Vec<_>, EngineError>>()?;
            context.reporter.report(Progress::TaskFinish);
            aggregate(observed.len(), &outcomes).pvalues
        } else {
            vec![0.0; relevant.len()]
        };

        scored.extend(
            relevant
                .into_iter()
                .zip(observed)
                .zip(pvalues)
                .enumerate()
                .map(|(rank, ((competitor, log_likelihood), pvalue))| ScoredCompetitor {
                    true_helix,
                    rank,
                    competitor,
                    log_likelihood,
                    pvalue,
                }),
        );
    }
    Ok(scored)
}
