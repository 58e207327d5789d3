use crate::core::evolution::EvolutionModel;
use crate::core::io::fasta::{alignment_from_records, records_from_alignment};
use crate::core::io::report::{BpFeatureRow, CompetitionRow, HelixRow};
use crate::core::io::stacking::StackingTable;
use crate::core::models::alignment::AlignmentModel;
use crate::core::models::helix::AlignedHelix;
use crate::core::models::structure::MIN_DIST;
use crate::core::models::tree::PhyloTree;
use crate::engine::config::{AnalysisConfig, DetectionMode};
use crate::engine::context::AnalysisContext;
use crate::engine::error::EngineError;
use crate::engine::external::TCoffee;
use crate::engine::likelihood::PhyloModel;
use crate::engine::metrics::{
    self, Coverage, competing_metrics, consensus_bp_fraction, covariance, helix_metrics,
};
use crate::engine::progress::{CancellationFlag, Progress, ProgressReporter};
use crate::engine::tasks::{competition, helix_detection, null_distribution, true_helix_pvalues};
use tracing::{info, instrument, warn};

/// Consensus fraction a helix must exceed to count towards coverage.
pub const COVERAGE_CUTOFF: f64 = 0.5;

/// Everything an analysis reads besides its configuration.
#[derive(Debug, Clone)]
pub struct AnalysisInput {
    pub alignment: AlignmentModel,
    pub tree: PhyloTree,
    pub evolution: EvolutionModel,
    pub stacking: StackingTable,
}

fn prepare(input: &AnalysisInput, config: &AnalysisConfig, reporter: &ProgressReporter) -> Result<PhyloModel, EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    let phylo = PhyloModel::new(input.tree.clone(), &input.evolution, config.non_gap_pair);
    // Fails early when tree leaves and sequence names disagree.
    phylo.evaluator(&input.alignment)?;
    info!(
        sequences = input.alignment.num_sequences(),
        columns = input.alignment.len(),
        true_helices = input.alignment.true_helix_count(),
        tree_length = phylo.tree_length(),
        "Inputs prepared."
    );
    reporter.report(Progress::PhaseFinish);
    Ok(phylo)
}

fn detect(context: &AnalysisContext) -> Result<Vec<AlignedHelix>, EngineError> {
    context.reporter.report(Progress::PhaseStart {
        name: "Helix Detection",
    });
    let helices = match context.config.detection {
        DetectionMode::Dynamic => helix_detection::run(context, context.alignment),
        DetectionMode::Grow {
            seed_threshold,
            grow_threshold,
        } => helix_detection::run_grow(context, context.alignment, seed_threshold, grow_threshold)?,
    };
    info!(helices = helices.len(), "Helix detection finished.");
    context.reporter.report(Progress::PhaseFinish);
    Ok(helices)
}

/// The alignment whose columns the all-helices null permutes.
fn null_base(context: &AnalysisContext) -> Result<AlignmentModel, EngineError> {
    let alignment = context.alignment;
    match &context.config.tcoffee {
        Some(program) => {
            info!(program = %program.display(), "Realigning with T-Coffee before shuffling.");
            let records = records_from_alignment(alignment, false);
            let realigned = TCoffee::new(program.clone()).align(&records, context.phylo.tree())?;
            Ok(alignment_from_records(realigned, false, None)?)
        }
        None => Ok(alignment.clone()),
    }
}

/// The all-helices table: every detected helix with its likelihood, column and
/// competition statistics and its empirical p-values.
#[instrument(skip_all, name = "helices_workflow")]
pub fn helices(
    input: &AnalysisInput,
    config: &AnalysisConfig,
    reporter: &ProgressReporter,
    cancel: &CancellationFlag,
) -> Result<Vec<HelixRow>, EngineError> {
    // === Phase 0: Preparation ===
    let phylo = prepare(input, config, reporter)?;
    let context = AnalysisContext::new(
        &input.alignment,
        &phylo,
        &input.stacking,
        config,
        reporter,
        cancel,
    );
    let alignment = context.alignment;

    // === Phase 1: Helix detection ===
    let helices = detect(&context)?;
    if helices.is_empty() {
        warn!("No helices found; the table will be empty.");
    }
    context.check_cancelled()?;

    // === Phase 2: Helix statistics ===
    reporter.report(Progress::PhaseStart {
        name: "Helix Statistics",
    });
    let mut evaluator = phylo.evaluator(alignment)?;
    let scored: Vec<_> = helices
        .iter()
        .map(|helix| (helix_metrics(&mut evaluator, helix), helix.compete_score(alignment)))
        .collect();
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: All-helices null distribution ===
    let observed: Vec<f64> = scored.iter().map(|(m, _)| m.log_like_ratio).collect();
    let pvalues = if config.compute_pvalues && !helices.is_empty() {
        reporter.report(Progress::PhaseStart {
            name: "Null Distribution",
        });
        let base = null_base(&context)?;
        let pvalues = null_distribution::run(&context, &base, &observed)?;
        reporter.report(Progress::PhaseFinish);
        pvalues
    } else {
        null_distribution::HelixPvalues::zeros(helices.len())
    };

    // === Phase 4: Report rows ===
    let length = alignment.len();
    let rows = helices
        .iter()
        .zip(scored)
        .enumerate()
        .map(|(i, (helix, (metrics, stats)))| HelixRow {
            pvalue: pvalues.pvalues[i],
            log_like_ratio: metrics.log_like_ratio,
            paired_log_likelihood: metrics.paired_log_likelihood,
            unpaired_log_likelihood: metrics.unpaired_log_likelihood,
            mean_frac_canonical_bp: metrics.canonical_bp,
            covariance: metrics.covariance,
            conservation: metrics.conservation,
            length: helix.len(),
            midpoint: helix.midpoint(),
            normalized_midpoint: helix.normalized_midpoint(length),
            appearances: helix.appearances(),
            is_consensus_helix: helix.is_consensus_helix(alignment),
            is_partial_consensus_helix: helix.is_partial_consensus_helix(alignment),
            is_competing_helix: helix.is_competing_helix(alignment),
            consensus_bps: helix.consensus_bps(alignment),
            structure: if config.verbose_structure {
                helix.dot_bracket(length)
            } else {
                "0".to_string()
            },
            alignment_size: alignment.num_sequences(),
            alignment_length: length,
            tree_length: phylo.tree_length(),
            bps: helix.bps_string(),
            cis: stats.cis(),
            trans: stats.trans(),
            cis5: stats.cis5(),
            cis3: stats.cis3(),
            trans5: stats.trans5(),
            trans3: stats.trans3(),
            mid5: stats.mid5(),
            mid3: stats.mid3(),
            new_pvalue: pvalues.new_pvalues[i],
        })
        .collect::<Vec<_>>();

    info!(rows = rows.len(), "All-helices analysis complete.");
    Ok(rows)
}

/// The per-true-helix table: every clean competing helix of every sequence, scored
/// against the null model of the consensus helix it competes with.
#[instrument(skip_all, name = "competition_workflow")]
pub fn competition(
    input: &AnalysisInput,
    config: &AnalysisConfig,
    reporter: &ProgressReporter,
    cancel: &CancellationFlag,
) -> Result<Vec<CompetitionRow>, EngineError> {
    // === Phase 0: Preparation ===
    let phylo = prepare(input, config, reporter)?;
    let context = AnalysisContext::new(
        &input.alignment,
        &phylo,
        &input.stacking,
        config,
        reporter,
        cancel,
    );
    let alignment = context.alignment;
    if alignment.true_helix_count() == 0 {
        warn!("The consensus structure has no helices; nothing can compete with it.");
    }

    // === Phase 1: Competition statistics ===
    reporter.report(Progress::PhaseStart {
        name: "Competition Statistics",
    });
    let table = competition::run(&context, alignment);
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Per-true-helix null distributions ===
    reporter.report(Progress::PhaseStart {
        name: "True Helix P-values",
    });
    let scored = true_helix_pvalues::run(&context, &table)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: Report rows ===
    let length = alignment.len();
    let rows = scored
        .iter()
        .map(|s| {
            let competitor = &s.competitor;
            let columns = competing_metrics(alignment, competitor.seq, &competitor.helix);
            CompetitionRow {
                pvalue: s.pvalue,
                log_likelihood: s.log_likelihood,
                sequence_index: competitor.seq,
                true_helix: s.true_helix,
                competing_helix: competitor.index,
                cis3: competitor.stats.cis3(),
                cis5: competitor.stats.cis5(),
                trans3: competitor.stats.trans3(),
                trans5: competitor.stats.trans5(),
                mid3: competitor.stats.mid3(),
                mid5: competitor.stats.mid5(),
                midpoint: competitor.helix.midpoint(),
                structure: if config.verbose_structure {
                    competitor
                        .helix
                        .aligned_dot_bracket(alignment.seq_to_aln(competitor.seq), length)
                } else {
                    "-".to_string()
                },
                consensus_bp: columns.consensus_bp,
                no_gap_consensus_bp: columns.no_gap_consensus_bp,
                gaps: columns.gap_fraction,
                seq_cons: columns.conservation,
                covariance: columns.covariance,
            }
        })
        .collect::<Vec<_>>();

    info!(rows = rows.len(), "Competition analysis complete.");
    Ok(rows)
}

/// One sparse feature row per column pair `(i, j)` with `j - i >= MIN_DIST`.
///
/// Likelihood features are divided by the tree length. The outer neighbour pair
/// `(i - 1, j + 1)` contributes features 5 and 6 only when it lies inside the
/// alignment; the indices are skipped otherwise.
#[instrument(skip_all, name = "bp_table_workflow")]
pub fn bp_table(
    input: &AnalysisInput,
    config: &AnalysisConfig,
    reporter: &ProgressReporter,
    cancel: &CancellationFlag,
) -> Result<Vec<BpFeatureRow>, EngineError> {
    let phylo = prepare(input, config, reporter)?;
    let tree_length = phylo.tree_length();
    if tree_length <= 0.0 {
        return Err(EngineError::PhaseFailed {
            phase: "bp_table",
            reason: "tree has zero total branch length".into(),
        });
    }
    let alignment = &input.alignment;
    let length = alignment.len();
    let mut evaluator = phylo.evaluator(alignment)?;

    reporter.report(Progress::PhaseStart {
        name: "Base-pair Features",
    });
    reporter.report(Progress::TaskStart {
        total_steps: length.saturating_sub(MIN_DIST) as u64,
    });
    let mut rows = Vec::new();
    for i in 0..length.saturating_sub(MIN_DIST) {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        for j in i + MIN_DIST..length {
            let mut pair_features = |pos5: usize, pos3: usize| {
                (
                    evaluator.log_paired(pos5, pos3) / tree_length,
                    (evaluator.log_single(pos5) + evaluator.log_single(pos3)) / tree_length,
                )
            };
            let mut features = Vec::with_capacity(9);
            let (paired, unpaired) = pair_features(i, j);
            features.extend([(1, paired), (2, unpaired)]);
            let (paired, unpaired) = pair_features(i + 1, j - 1);
            features.extend([(3, paired), (4, unpaired)]);
            if i > 0 && j + 1 < length {
                let (paired, unpaired) = pair_features(i - 1, j + 1);
                features.extend([(5, paired), (6, unpaired)]);
            }
            features.extend([
                (7, (j - i) as f64),
                (8, consensus_bp_fraction(alignment, i, j)),
                (9, covariance(alignment, i, j)),
            ]);
            rows.push(BpFeatureRow {
                paired: alignment.is_consensus_pair(i, j),
                features,
            });
        }
        reporter.report(Progress::TaskIncrement { amount: 1 });
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);
    info!(rows = rows.len(), cached = evaluator.cached_entries(), "Feature table complete.");
    Ok(rows)
}

/// Fractions of the consensus structure recovered by the detected helices, at
/// [`COVERAGE_CUTOFF`].
#[instrument(skip_all, name = "coverage_workflow")]
pub fn coverage(
    input: &AnalysisInput,
    config: &AnalysisConfig,
    reporter: &ProgressReporter,
    cancel: &CancellationFlag,
) -> Result<Coverage, EngineError> {
    let phylo = prepare(input, config, reporter)?;
    let context = AnalysisContext::new(
        &input.alignment,
        &phylo,
        &input.stacking,
        config,
        reporter,
        cancel,
    );
    let helices = detect(&context)?;
    let coverage = metrics::coverage(&input.alignment, &helices, COVERAGE_CUTOFF);
    info!(coverage = coverage.coverage, exact = coverage.exact, "Coverage computed.");
    Ok(coverage)
}
