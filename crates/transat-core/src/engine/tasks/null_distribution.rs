use super::helix_detection;
use crate::core::models::alignment::AlignmentModel;
use crate::engine::context::AnalysisContext;
use crate::engine::error::EngineError;
use crate::engine::metrics::mean_log_odds;
use crate::engine::progress::Progress;
use crate::engine::shuffle::{RngStream, column_shuffler, shuffled_alignment, trial_rng};
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Empirical p-values of the observed helices against shuffled alignments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HelixPvalues {
    /// Mean over trials of the fraction of null helices scoring at least as high.
    pub pvalues: Vec<f64>,
    /// One minus the pooled fraction of null helices scoring strictly lower.
    pub new_pvalues: Vec<f64>,
}

impl HelixPvalues {
    pub fn zeros(count: usize) -> Self {
        Self {
            pvalues: vec![0.0; count],
            new_pvalues: vec![0.0; count],
        }
    }
}

/// Ranks of the observed scores within one trial's null sample.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrialOutcome {
    /// Number of null scores strictly below each observed score.
    pub lower: Vec<usize>,
    pub sample_size: usize,
}

impl TrialOutcome {
    pub fn rank(observed: &[f64], mut sample: Vec<f64>) -> Self {
        sample.sort_by(f64::total_cmp);
        let lower = observed
            .iter()
            .map(|&score| sample.partition_point(|&null| null < score))
            .collect();
        Self {
            lower,
            sample_size: sample.len(),
        }
    }
}

/// Folds per-trial outcomes, in trial order, into p-values.
///
/// A trial with an empty null sample adds nothing to the per-trial average but
/// still counts towards the number of trials.
pub fn aggregate(observed: usize, outcomes: &[TrialOutcome]) -> HelixPvalues {
    if outcomes.is_empty() {
        return HelixPvalues::zeros(observed);
    }
    let mut sums = vec![0.0; observed];
    let mut lower_totals = vec![0usize; observed];
    let mut null_total = 0usize;
    for outcome in outcomes {
        if outcome.sample_size > 0 {
            let size = outcome.sample_size as f64;
            for ((sum, total), &lower) in sums.iter_mut().zip(&mut lower_totals).zip(&outcome.lower) {
                *sum += 1.0 - lower as f64 / size;
                *total += lower;
            }
        }
        null_total += outcome.sample_size;
    }
    let trials = outcomes.len() as f64;
    HelixPvalues {
        pvalues: sums.into_iter().map(|sum| sum / trials).collect(),
        new_pvalues: lower_totals
            .into_iter()
            .map(|lower| {
                if null_total == 0 {
                    0.0
                } else {
                    1.0 - lower as f64 / null_total as f64
                }
            })
            .collect(),
    }
}

/// Monte Carlo p-values for the helices whose log-likelihood ratios are `observed`.
///
/// Every trial permutes all columns of `null_base`, reruns helix detection and pools
/// the log-likelihood ratios of everything found.
#[instrument(skip_all, name = "null_distribution_task")]
pub fn run(
    context: &AnalysisContext,
    null_base: &AlignmentModel,
    observed: &[f64],
) -> Result<HelixPvalues, EngineError> {
    let trials = context.config.trials;
    info!(trials, helices = observed.len(), "Sampling the all-helices null distribution.");
    if observed.is_empty() || trials == 0 {
        return Ok(HelixPvalues::zeros(observed.len()));
    }

    let shuffler = column_shuffler(&context.config.shuffler);
    context.reporter.report(Progress::TaskStart {
        total_steps: trials as u64,
    });

    let trial_indices: Vec<usize> = (0..trials).collect();

    #[cfg(not(feature = "parallel"))]
    let iterator = trial_indices.iter();

    #[cfg(feature = "parallel")]
    let iterator = trial_indices.par_iter();

    let outcomes = iterator
        .map(|&trial| -> Result<TrialOutcome, EngineError> {
            context.check_cancelled()?;
            let mut rng = trial_rng(context.config.seed, RngStream::AllHelices, trial as u64);
            let shuffled = shuffled_alignment(null_base, shuffler.as_ref(), &mut rng)?;
            let helices = helix_detection::run(context, &shuffled);
            let mut evaluator = context.phylo.evaluator(&shuffled)?;
            let sample: Vec<f64> = helices
                .iter()
                .map(|helix| mean_log_odds(&mut evaluator, helix.pairs()))
                .collect();
            context.reporter.report(Progress::TaskIncrement { amount: 1 });
            Ok(TrialOutcome::rank(observed, sample))
        })
        .collect::<Result<Vec<_>, EngineError>>()?;
    context.reporter.report(Progress::TaskFinish);

    let pooled: usize = outcomes.iter().map(|o| o.sample_size).sum();
    debug!(pooled, "Pooled null helices.");
    Ok(aggregate(observed.len(), &outcomes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_counts_strictly_lower_scores() {
        let outcome = TrialOutcome::rank(&[1.0, 5.0, -3.0], vec![4.0, 1.0, 0.5, 1.0]);
        assert_eq!(outcome.lower, vec![1, 4, 0]);
        assert_eq!(outcome.sample_size, 4);
    }

    #[test]
    fn aggregate_averages_over_all_trials() {
        let outcomes = vec![
            TrialOutcome {
                lower: vec![3],
                sample_size: 4,
            },
            TrialOutcome {
                lower: vec![0],
                sample_size: 0,
            },
            TrialOutcome {
                lower: vec![1],
                sample_size: 4,
            },
        ];
        let pvalues = aggregate(1, &outcomes);
        // (0.25 + 0 + 0.75) / 3
        assert!((pvalues.pvalues[0] - 1.0 / 3.0).abs() < 1e-12);
        // 1 - 4 / 8
        assert!((pvalues.new_pvalues[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_null_samples_give_zero_pvalues() {
        let outcomes = vec![
            TrialOutcome {
                lower: vec![0, 0],
                sample_size: 0,
            };
            5
        ];
        let pvalues = aggregate(2, &outcomes);
        assert_eq!(pvalues, HelixPvalues::zeros(2));
    }

    #[test]
    fn base_without_pairing_potential_gives_zero_pvalues() {
        use crate::core::evolution::EvolutionModel;
        use crate::core::io::stacking::StackingTable;
        use crate::core::models::tree::PhyloTree;
        use crate::engine::config::AnalysisConfigBuilder;
        use crate::engine::likelihood::PhyloModel;
        use crate::engine::progress::{CancellationFlag, ProgressReporter};

        let names = vec!["1".to_string(), "2".to_string()];
        let base = AlignmentModel::new(
            names,
            vec!["AAAAAAAAAAAAAAA".to_string(), "AAAAAAAAAAAAAAA".to_string()],
            None,
        )
        .unwrap();
        let phylo = PhyloModel::new(
            PhyloTree::balanced(2, 0.4).unwrap(),
            &EvolutionModel::standard().unwrap(),
            true,
        );
        let stacking = StackingTable::turner();
        let config = AnalysisConfigBuilder::new()
            .min_stem_length(3)
            .trials(4)
            .seed(9)
            .build()
            .unwrap();
        let reporter = ProgressReporter::new();
        let cancel = CancellationFlag::new();
        let context = AnalysisContext::new(&base, &phylo, &stacking, &config, &reporter, &cancel);

        let pvalues = run(&context, &base, &[0.7, -0.2]).unwrap();
        assert_eq!(pvalues.pvalues, vec![0.0, 0.0]);
        assert_eq!(pvalues.new_pvalues, vec![0.0, 0.0]);
    }

    #[test]
    fn no_trials_gives_zero_pvalues() {
        assert_eq!(aggregate(3, &[]), HelixPvalues::zeros(3));
    }
}
