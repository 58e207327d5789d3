use super::helix_detection::StackMatrix;
use crate::core::io::stacking::StackingTable;
use crate::core::models::alignment::AlignmentModel;
use crate::core::models::helix::{CompetingHelix, Helix};
use crate::core::models::stats::{CompetitionStats, Direction};
use crate::core::models::structure::in_long_helix;
use crate::engine::context::AnalysisContext;
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Competing helices of one sequence and their stats against every true helix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceCompetition {
    pub competing: Vec<CompetingHelix>,
    /// Indexed `[true_helix][competing]`.
    pub stats: Vec<Vec<CompetitionStats>>,
}

/// Competition statistics of a whole alignment, indexed `[seq][true_helix][competing]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompetitionTable {
    sequences: Vec<SequenceCompetition>,
}

/// A clean competing helix with non-zero stats against one true helix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevantHelix {
    pub seq: usize,
    pub index: usize,
    pub helix: CompetingHelix,
    pub stats: CompetitionStats,
}

impl CompetitionTable {
    pub fn sequence(&self, seq: usize) -> &SequenceCompetition {
        &self.sequences[seq]
    }

    pub fn num_sequences(&self) -> usize {
        self.sequences.len()
    }

    pub fn total_competing(&self) -> usize {
        self.sequences.iter().map(|s| s.competing.len()).sum()
    }

    pub fn stats(&self, seq: usize, true_helix: usize, competing: usize) -> &CompetitionStats {
        &self.sequences[seq].stats[true_helix][competing]
    }

    /// Competing helices, in sequence then discovery order, that are clean and
    /// interact with `true_helix`.
    pub fn relevant(&self, alignment: &AlignmentModel, true_helix: usize) -> Vec<RelevantHelix> {
        let mut relevant = Vec::new();
        for (seq, competition) in self.sequences.iter().enumerate() {
            let Some(row) = competition.stats.get(true_helix) else {
                continue;
            };
            for (index, (helix, stats)) in competition.competing.iter().zip(row).enumerate() {
                if !stats.is_zero() && is_clean(alignment, seq, helix) {
                    relevant.push(RelevantHelix {
                        seq,
                        index,
                        helix: *helix,
                        stats: *stats,
                    });
                }
            }
        }
        relevant
    }
}

/// A competing helix is clean unless one of its pairs joins two consensus-paired
/// columns of the same true helix.
pub fn is_clean(alignment: &AlignmentModel, seq: usize, helix: &CompetingHelix) -> bool {
    helix
        .aligned_pairs(alignment.seq_to_aln(seq))
        .all(|(pos5, pos3)| match alignment.column_label(pos5) {
            Some(label) => alignment.column_label(pos3) != Some(label),
            None => true,
        })
}

/// A run competes if none of its pairs is a projected pair and at least one of its
/// bases is paired in the projected structure.
fn is_competing(partners: &[Option<usize>], run: &Helix) -> bool {
    let mut competing = false;
    for (pos5, pos3) in run.pairs() {
        if partners[pos5] == Some(pos3) {
            return false;
        }
        if partners[pos5].is_some() || partners[pos3].is_some() {
            competing = true;
        }
    }
    competing
}

fn stacking_energy(sequence: &[char], run: &Helix, stacking: &StackingTable) -> f64 {
    run.pairs()
        .take(run.length.saturating_sub(1))
        .map(|(pos5, pos3)| {
            stacking.stack_energy(sequence[pos5], sequence[pos5 + 1], sequence[pos3 - 1], sequence[pos3])
        })
        .sum()
}

/// Directional stats of every competing helix of sequence `seq`.
pub fn sequence_stats(
    alignment: &AlignmentModel,
    stacking: &StackingTable,
    seq: usize,
    min_stem_length: usize,
) -> SequenceCompetition {
    let sequence = alignment.ungapped(seq);
    let partners = alignment.seq_structure(seq);
    let length = sequence.len() as f64;
    let true_helices = alignment.true_helix_count();

    let mut competition = SequenceCompetition {
        competing: Vec::new(),
        stats: vec![Vec::new(); true_helices],
    };

    for run in StackMatrix::new(sequence).terminated_runs(min_stem_length) {
        if !is_competing(partners, &run) {
            continue;
        }
        let energy = stacking_energy(sequence, &run, stacking);
        let mut per_helix = vec![CompetitionStats::default(); true_helices];

        for (i2, j2) in run.pairs() {
            let span = (j2 - i2) as f64;
            let (i, j) = (i2 as f64, j2 as f64);

            if let Some(p) = partners[i2].filter(|_| in_long_helix(partners, i2)) {
                if let Some(label) = alignment.seq_label(seq, i2) {
                    let pf = p as f64;
                    let entry = if p < i2 {
                        Some((Direction::Cis3, -energy / (span * (length - i).ln())))
                    } else if p < j2 {
                        Some((Direction::Trans3, -energy / ((j - pf) * (length - pf).ln())))
                    } else if p > j2 {
                        Some((Direction::Mid3, -energy / (span * (pf - i).ln())))
                    } else {
                        None
                    };
                    if let Some((direction, value)) = entry {
                        per_helix[label].record(direction, value);
                    }
                }
            }

            if let Some(p) = partners[j2].filter(|_| in_long_helix(partners, j2)) {
                if let Some(label) = alignment.seq_label(seq, j2) {
                    let pf = p as f64;
                    let entry = if p > j2 {
                        Some((Direction::Cis5, -energy / (span * j.ln())))
                    } else if p > i2 {
                        Some((Direction::Trans5, -energy / ((pf - i) * pf.ln())))
                    } else if p < i2 {
                        Some((Direction::Mid5, -energy / ((i - pf) * (j - pf).ln())))
                    } else {
                        None
                    };
                    if let Some((direction, value)) = entry {
                        per_helix[label].record(direction, value);
                    }
                }
            }
        }

        for (row, stats) in competition.stats.iter_mut().zip(per_helix) {
            row.push(stats);
        }
        competition.competing.push(CompetingHelix::new(
            run.pos5,
            run.pos5 + run.length - 1,
            run.pos3 + 1 - run.length,
            run.pos3,
        ));
    }
    competition
}

/// Competition statistics for every sequence of `alignment`.
#[instrument(skip_all, name = "competition_task")]
pub fn run(context: &AnalysisContext, alignment: &AlignmentModel) -> CompetitionTable {
    let min_stem_length = context.config.min_stem_length;
    let sequences: Vec<usize> = (0..alignment.num_sequences()).collect();

    #[cfg(not(feature = "parallel"))]
    let iterator = sequences.iter();

    #[cfg(feature = "parallel")]
    let iterator = sequences.par_iter();

    let sequences: Vec<SequenceCompetition> = iterator
        .map(|&seq| sequence_stats(alignment, context.stacking, seq, min_stem_length))
        .collect();

    let table = CompetitionTable { sequences };
    debug!(
        competing = table.total_competing(),
        true_helices = alignment.true_helix_count(),
        "Computed competition statistics."
    );
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::structure::SecondaryStructure;

    fn model(sequences: &[&str], structure: &str) -> AlignmentModel {
        let names = (0..sequences.len()).map(|i| format!("s{i}")).collect();
        let structure = SecondaryStructure::from_dot_bracket(structure).unwrap();
        AlignmentModel::new(names, sequences.iter().map(|s| s.to_string()).collect(), Some(structure))
            .unwrap()
    }

    // The consensus pairs the GGGG block with the first CCCC block; the second
    // CCCC block offers an alternative 3' partner.
    const SEQUENCE: &str = "AGGGGAAAACCCCAAAACCCCA";
    const STRUCTURE: &str = ".((((....))))........";

    fn competing_model() -> AlignmentModel {
        model(&[SEQUENCE], &format!("{STRUCTURE}."))
    }

    #[test]
    fn alternative_partner_is_a_competing_helix() {
        let aln = competing_model();
        let competition = sequence_stats(&aln, &StackingTable::turner(), 0, 3);
        assert_eq!(competition.competing, vec![CompetingHelix::new(1, 4, 17, 20)]);
        assert_eq!(competition.stats.len(), 1);
        let stats = competition.stats[0][0];
        assert!(!stats.is_zero());
        // the 5' bases are paired downstream of themselves but upstream of the
        // competing partners
        assert_eq!(stats.count(Direction::Trans3), 4);
        assert!(stats.trans3() > 0.0);
        assert_eq!(stats.count(Direction::Cis5), 0);
    }

    #[test]
    fn consensus_helix_is_not_competing() {
        let aln = model(&["AGGGGAAAACCCCA"], ".((((....)))).");
        let competition = sequence_stats(&aln, &StackingTable::turner(), 0, 3);
        assert!(competition.competing.is_empty());
    }

    #[test]
    fn helix_without_paired_bases_is_not_competing() {
        let aln = model(&["AGGGGAAAACCCCA"], "..............");
        let competition = sequence_stats(&aln, &StackingTable::turner(), 0, 3);
        assert!(competition.competing.is_empty());
        assert!(competition.stats.is_empty());
    }

    #[test]
    fn cleanliness_rejects_pairs_inside_one_true_helix() {
        let aln = competing_model();
        assert!(is_clean(&aln, 0, &CompetingHelix::new(1, 4, 17, 20)));
        // (1,11) and (2,10) join columns of the same consensus helix
        assert!(!is_clean(&aln, 0, &CompetingHelix::new(1, 2, 10, 11)));
    }

    #[test]
    fn relevant_helices_are_clean_and_nonzero() {
        let aln = competing_model();
        let table = CompetitionTable {
            sequences: vec![sequence_stats(&aln, &StackingTable::turner(), 0, 3)],
        };
        let relevant = table.relevant(&aln, 0);
        assert_eq!(relevant.len(), 1);
        assert_eq!(relevant[0].seq, 0);
        assert_eq!(relevant[0].helix, CompetingHelix::new(1, 4, 17, 20));
        assert!(table.relevant(&aln, 1).is_empty());
    }
}
