//! Column and helix summary statistics.
//!
//! Column statistics are plain functions of one [`AlignmentModel`]; helix statistics
//! aggregate them over the helix pairs and, where a likelihood is involved, go through
//! a [`LikelihoodEvaluator`] bound to the same alignment.

use super::likelihood::LikelihoodEvaluator;
use crate::core::models::alignment::AlignmentModel;
use crate::core::models::helix::{AlignedHelix, CompetingHelix};
use crate::core::models::nucleotide::{is_canonical_pair, is_gap};
use itertools::Itertools;

/// Fraction of sequences whose bases at `pos5` and `pos3` form a canonical pair.
pub fn consensus_bp_fraction(alignment: &AlignmentModel, pos5: usize, pos3: usize) -> f64 {
    let canonical = (0..alignment.num_sequences())
        .filter(|&seq| is_canonical_pair(alignment.base(seq, pos5), alignment.base(seq, pos3)))
        .count();
    canonical as f64 / alignment.num_sequences() as f64
}

pub fn gap_fraction(alignment: &AlignmentModel, position: usize) -> f64 {
    let gaps = alignment.column(position).filter(|&c| is_gap(c)).count();
    gaps as f64 / alignment.num_sequences() as f64
}

/// Fraction of sequence pairs carrying the same character at `position`.
///
/// A single-sequence alignment is fully conserved.
pub fn sequence_conservation(alignment: &AlignmentModel, position: usize) -> f64 {
    let column: Vec<char> = alignment.column(position).collect();
    let mut total = 0usize;
    let mut matching = 0usize;
    for (a, b) in column.iter().tuple_combinations() {
        total += 1;
        if a == b {
            matching += 1;
        }
    }
    if total == 0 { 1.0 } else { matching as f64 / total as f64 }
}

/// Pairwise pairing consistency of two columns.
///
/// For every sequence pair, the number of shared characters across the two columns
/// is added if both sequences form canonical pairs and subtracted otherwise; the sum
/// is averaged over sequence pairs. Zero for a single sequence.
pub fn covariance(alignment: &AlignmentModel, pos5: usize, pos3: usize) -> f64 {
    let pairs: Vec<(char, char)> = (0..alignment.num_sequences())
        .map(|seq| (alignment.base(seq, pos5), alignment.base(seq, pos3)))
        .collect();
    let mut total = 0usize;
    let mut score = 0i64;
    for (&(ia, ib), &(ja, jb)) in pairs.iter().tuple_combinations() {
        total += 1;
        let shared = i64::from(ia == ja) + i64::from(ib == jb);
        if shared > 0 {
            if is_canonical_pair(ia, ib) && is_canonical_pair(ja, jb) {
                score += shared;
            } else {
                score -= shared;
            }
        }
    }
    if total == 0 { 0.0 } else { score as f64 / total as f64 }
}

/// Likelihood and column statistics of one aligned helix.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HelixMetrics {
    /// Mean paired-versus-unpaired log-likelihood ratio per pair.
    pub log_like_ratio: f64,
    pub paired_log_likelihood: f64,
    pub unpaired_log_likelihood: f64,
    pub canonical_bp: f64,
    pub covariance: f64,
    pub conservation: f64,
}

pub fn mean_log_odds(evaluator: &mut LikelihoodEvaluator, pairs: &[(usize, usize)]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    let total: f64 = pairs.iter().map(|&(pos5, pos3)| evaluator.log_odds(pos5, pos3)).sum();
    total / pairs.len() as f64
}

pub fn helix_metrics(evaluator: &mut LikelihoodEvaluator, helix: &AlignedHelix) -> HelixMetrics {
    let pairs = helix.pairs();
    if pairs.is_empty() {
        return HelixMetrics::default();
    }
    let alignment = evaluator.alignment();
    let size = pairs.len() as f64;

    let mut paired = 0.0;
    let mut unpaired = 0.0;
    let mut canonical = 0.0;
    let mut cov = 0.0;
    let mut conservation = 0.0;
    for &(pos5, pos3) in pairs {
        paired += evaluator.log_paired(pos5, pos3);
        unpaired += evaluator.log_single(pos5) + evaluator.log_single(pos3);
        canonical += consensus_bp_fraction(alignment, pos5, pos3);
        cov += covariance(alignment, pos5, pos3);
        conservation += sequence_conservation(alignment, pos5) + sequence_conservation(alignment, pos3);
    }

    HelixMetrics {
        log_like_ratio: mean_log_odds(evaluator, pairs),
        paired_log_likelihood: paired / size,
        unpaired_log_likelihood: unpaired / size,
        canonical_bp: canonical / size,
        covariance: cov / size,
        conservation: conservation / (2.0 * size),
    }
}

/// Column statistics of a competing helix, taken over its aligned pairs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CompetingMetrics {
    pub consensus_bp: f64,
    /// Canonical fraction pooled over the sequences without a gap at either column.
    pub no_gap_consensus_bp: f64,
    pub gap_fraction: f64,
    pub conservation: f64,
    pub covariance: f64,
}

pub fn competing_metrics(
    alignment: &AlignmentModel,
    seq: usize,
    helix: &CompetingHelix,
) -> CompetingMetrics {
    let pairs: Vec<(usize, usize)> = helix.aligned_pairs(alignment.seq_to_aln(seq)).collect();
    if pairs.is_empty() {
        return CompetingMetrics::default();
    }
    let size = pairs.len() as f64;

    let mut metrics = CompetingMetrics::default();
    let mut no_gap_total = 0usize;
    let mut no_gap_canonical = 0usize;
    for &(pos5, pos3) in &pairs {
        metrics.consensus_bp += consensus_bp_fraction(alignment, pos5, pos3);
        metrics.gap_fraction += gap_fraction(alignment, pos5) + gap_fraction(alignment, pos3);
        metrics.conservation +=
            sequence_conservation(alignment, pos5) + sequence_conservation(alignment, pos3);
        metrics.covariance += covariance(alignment, pos5, pos3);
        for other in 0..alignment.num_sequences() {
            let (a, b) = (alignment.base(other, pos5), alignment.base(other, pos3));
            if !is_gap(a) && !is_gap(b) {
                no_gap_total += 1;
                if is_canonical_pair(a, b) {
                    no_gap_canonical += 1;
                }
            }
        }
    }

    metrics.consensus_bp /= size;
    metrics.gap_fraction /= 2.0 * size;
    metrics.conservation /= 2.0 * size;
    metrics.covariance /= size;
    metrics.no_gap_consensus_bp = if no_gap_total == 0 {
        0.0
    } else {
        no_gap_canonical as f64 / no_gap_total as f64
    };
    metrics
}

/// Fractions of consensus-paired columns covered by detected helices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coverage {
    /// Covered by consensus pairs of helices whose consensus fraction exceeds the cutoff.
    pub coverage: f64,
    /// Covered by exact consensus helices.
    pub exact: f64,
}

pub fn coverage(alignment: &AlignmentModel, helices: &[AlignedHelix], cutoff: f64) -> Coverage {
    let length = alignment.len();
    let mut covered = vec![false; length];
    let mut exact = vec![false; length];

    for helix in helices {
        if helix.is_empty() {
            continue;
        }
        if helix.is_consensus_helix(alignment) {
            for &(pos5, pos3) in helix.pairs() {
                exact[pos5] = true;
                exact[pos3] = true;
            }
        }
        let consensus = helix.consensus_bps(alignment);
        let fraction = consensus as f64 / helix.len() as f64;
        if fraction > cutoff || (cutoff >= 1.0 && consensus == helix.len()) {
            for &(pos5, pos3) in helix.pairs() {
                if alignment.is_consensus_pair(pos5, pos3) {
                    covered[pos5] = true;
                    covered[pos3] = true;
                }
            }
        }
    }

    let paired: Vec<usize> = (0..length).filter(|&c| alignment.structure().is_paired(c)).collect();
    if paired.is_empty() {
        return Coverage {
            coverage: 0.0,
            exact: 0.0,
        };
    }
    let matches = paired.iter().filter(|&&c| covered[c] || exact[c]).count();
    let exact_matches = paired.iter().filter(|&&c| exact[c]).count();
    Coverage {
        coverage: matches as f64 / paired.len() as f64,
        exact: exact_matches as f64 / paired.len() as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::structure::SecondaryStructure;

    fn model(sequences: &[&str], structure: Option<&str>) -> AlignmentModel {
        let names = (0..sequences.len()).map(|i| format!("s{i}")).collect();
        let structure = structure.map(|s| SecondaryStructure::from_dot_bracket(s).unwrap());
        AlignmentModel::new(names, sequences.iter().map(|s| s.to_string()).collect(), structure)
            .unwrap()
    }

    #[test]
    fn column_fractions() {
        let aln = model(&["GAAAC", "G-AAU", "AAAAC", "CAAAG"], None);
        assert_eq!(consensus_bp_fraction(&aln, 0, 4), 0.75);
        assert_eq!(gap_fraction(&aln, 1), 0.25);
        // G,G,A,C: one matching pair out of six
        assert!((sequence_conservation(&aln, 0) - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn covariance_rewards_shared_canonical_pairs() {
        let conserved = model(&["GAAAC", "GAAAC", "GAAAC"], None);
        assert_eq!(covariance(&conserved, 0, 4), 2.0);
        let broken = model(&["GAAAC", "GAAAA"], None);
        assert_eq!(covariance(&broken, 0, 4), -1.0);
        let single = model(&["GAAAC"], None);
        assert_eq!(covariance(&single, 0, 4), 0.0);
        assert_eq!(sequence_conservation(&single, 0), 1.0);
    }

    #[test]
    fn competing_metrics_pool_over_ungapped_sequences() {
        let aln = model(&["GGAAACC", "G-AAACC"], None);
        let helix = CompetingHelix::new(0, 1, 5, 6);
        let metrics = competing_metrics(&aln, 0, &helix);
        // pairs (0,6) and (1,5); the second sequence has a gap at column 1
        assert_eq!(metrics.consensus_bp, 0.75);
        assert_eq!(metrics.no_gap_consensus_bp, 1.0);
        assert_eq!(metrics.gap_fraction, 0.125);
    }

    #[test]
    fn coverage_distinguishes_exact_and_partial_matches() {
        let aln = model(&["GGGGAAAACCCCAA"], Some("((((....)))).."));
        let exact = AlignedHelix::from_outer_pair(0, 11, 4);
        let cov = coverage(&aln, &[exact], 0.5);
        assert_eq!(cov.coverage, 1.0);
        assert_eq!(cov.exact, 1.0);

        // covers three of the four consensus pairs without matching the stack exactly
        let shifted = AlignedHelix::from_outer_pair(1, 10, 3);
        let partial = AlignedHelix::from_outer_pair(0, 13, 1);
        let cov = coverage(&aln, &[shifted, partial], 0.5);
        assert_eq!(cov.exact, 0.0);
        assert_eq!(cov.coverage, 0.75);
    }

    #[test]
    fn coverage_without_consensus_pairs_is_zero() {
        let aln = model(&["GGGGAAAACCCC"], None);
        let cov = coverage(&aln, &[AlignedHelix::from_outer_pair(0, 11, 4)], 0.5);
        assert_eq!(cov, Coverage { coverage: 0.0, exact: 0.0 });
    }
}
