use super::alignment::AlignmentModel;
use super::stats::{CompetitionStats, Direction};
use super::structure::in_long_helix;
use std::collections::BTreeSet;

/// A maximal run of stacked pairs in sequence coordinates, anchored at its outer pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Helix {
    pub pos5: usize,
    pub pos3: usize,
    pub length: usize,
}

impl Helix {
    pub fn new(pos5: usize, pos3: usize, length: usize) -> Self {
        debug_assert!(length == 0 || pos5 + length - 1 < pos3 + 1 - length);
        Self { pos5, pos3, length }
    }

    /// Pairs from the outermost inward.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.length).map(move |k| (self.pos5 + k, self.pos3 - k))
    }
}

/// A helix in alignment coordinates, shared by every sequence that exhibits the
/// identical pair-set.
///
/// Helices found by the phylogenetic grow mode are not tied to any sequence and
/// carry an empty `appears_in`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedHelix {
    pairs: Vec<(usize, usize)>,
    appears_in: BTreeSet<usize>,
}

impl AlignedHelix {
    pub fn from_helix(helix: &Helix, seq: usize, seq_to_aln: &[usize]) -> Self {
        Self {
            pairs: project(helix, seq_to_aln),
            appears_in: BTreeSet::from([seq]),
        }
    }

    pub fn from_outer_pair(pos5: usize, pos3: usize, length: usize) -> Self {
        Self {
            pairs: (0..length).map(|k| (pos5 + k, pos3 - k)).collect(),
            appears_in: BTreeSet::new(),
        }
    }

    /// Records `seq` if its helix maps onto exactly the same aligned pairs.
    pub fn insert(&mut self, helix: &Helix, seq: usize, seq_to_aln: &[usize]) -> bool {
        if helix.length != self.pairs.len() {
            return false;
        }
        let matches = helix
            .pairs()
            .zip(&self.pairs)
            .all(|((s5, s3), &pair)| (seq_to_aln[s5], seq_to_aln[s3]) == pair);
        if matches {
            self.appears_in.insert(seq);
        }
        matches
    }

    #[inline]
    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn outer_pair(&self) -> Option<(usize, usize)> {
        self.pairs.first().copied()
    }

    pub fn appears_in(&self) -> &BTreeSet<usize> {
        &self.appears_in
    }

    pub fn appearances(&self) -> usize {
        self.appears_in.len()
    }

    pub fn dot_bracket(&self, alignment_length: usize) -> String {
        let mut out = vec!['.'; alignment_length];
        for &(pos5, pos3) in &self.pairs {
            out[pos5] = '(';
            out[pos3] = ')';
        }
        out.into_iter().collect()
    }

    /// Pairs rendered as `p5:p3,p5:p3,...`.
    pub fn bps_string(&self) -> String {
        self.pairs
            .iter()
            .map(|(pos5, pos3)| format!("{pos5}:{pos3}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn midpoint(&self) -> f64 {
        if self.pairs.is_empty() {
            return 0.0;
        }
        let total: usize = self.pairs.iter().map(|(a, b)| a + b).sum();
        total as f64 / (2 * self.pairs.len()) as f64
    }

    pub fn normalized_midpoint(&self, alignment_length: usize) -> f64 {
        self.midpoint() / alignment_length as f64
    }

    pub fn consensus_bps(&self, alignment: &AlignmentModel) -> usize {
        self.pairs
            .iter()
            .filter(|&&(pos5, pos3)| alignment.is_consensus_pair(pos5, pos3))
            .count()
    }

    /// True if at least one pair belongs to the consensus structure.
    pub fn is_partial_consensus_helix(&self, alignment: &AlignmentModel) -> bool {
        self.consensus_bps(alignment) > 0
    }

    /// True if every pair is a consensus pair and the helix is not a fragment of a
    /// longer consensus stack.
    pub fn is_consensus_helix(&self, alignment: &AlignmentModel) -> bool {
        let structure = alignment.structure();
        let length = alignment.len();
        for (index, &(pos5, pos3)) in self.pairs.iter().enumerate() {
            if structure.partner(pos5) != Some(pos3) {
                return false;
            }
            if pos3 > 0 && structure.partner(pos5 + 1) == Some(pos3 - 1) {
                let continues = self.pairs.get(index + 1) == Some(&(pos5 + 1, pos3 - 1));
                if !continues {
                    return false;
                }
            }
            if pos5 > 0 && pos3 + 1 < length && structure.partner(pos5 - 1) == Some(pos3 + 1) {
                let continues = index > 0 && self.pairs[index - 1] == (pos5 - 1, pos3 + 1);
                if !continues {
                    return false;
                }
            }
        }
        true
    }

    /// True if, in some sequence exhibiting the helix, one of its bases is paired
    /// elsewhere inside a consensus stack of at least three pairs.
    pub fn is_competing_helix(&self, alignment: &AlignmentModel) -> bool {
        for &(pos5, pos3) in &self.pairs {
            for &seq in &self.appears_in {
                let backward = alignment.aln_to_seq(seq);
                let (Some(s5), Some(s3)) = (backward[pos5], backward[pos3]) else {
                    continue;
                };
                let partners = alignment.seq_structure(seq);
                let competes = |pos: usize, own: usize| {
                    matches!(partners[pos], Some(p) if p != own) && in_long_helix(partners, pos)
                };
                if competes(s5, s3) || competes(s3, s5) {
                    return true;
                }
            }
        }
        false
    }

    /// Directional competition of the helix against the consensus structure.
    ///
    /// For each base `i` of the helix paired with `c` in the helix and with `î`
    /// in the consensus, the relative order of `c`, `i` and `î` selects the
    /// cis/trans/mid class, weighted by the inverse span times a log-distance term.
    pub fn compete_score(&self, alignment: &AlignmentModel) -> CompetitionStats {
        let structure = alignment.structure();
        let length = alignment.len() as f64;
        let mut stats = CompetitionStats::default();

        for &(pos5, pos3) in &self.pairs {
            if let Some(consensus) = structure.partner(pos5) {
                let (i, c, ib) = (pos5 as f64, pos3 as f64, consensus as f64);
                if consensus != pos3 {
                    let (direction, value) = if consensus < pos5 {
                        (Direction::Cis3, 1.0 / ((c - i) * (length - i).ln()))
                    } else if consensus < pos3 {
                        (Direction::Trans3, 1.0 / ((c - ib) * (length - ib).ln()))
                    } else {
                        (Direction::Mid3, 1.0 / ((c - i) * (ib - i).ln()))
                    };
                    stats.record(direction, value);
                }
            }
            if let Some(consensus) = structure.partner(pos3) {
                let (i, c, ib) = (pos3 as f64, pos5 as f64, consensus as f64);
                if consensus != pos5 {
                    let (direction, value) = if consensus > pos3 {
                        (Direction::Cis5, 1.0 / ((i - c) * (i + 1.0).ln()))
                    } else if consensus > pos5 {
                        (Direction::Trans5, 1.0 / ((ib - c) * (ib + 1.0).ln()))
                    } else {
                        (Direction::Mid5, 1.0 / ((i - c) * (i - ib).ln()))
                    };
                    stats.record(direction, value);
                }
            }
        }
        stats
    }
}

fn project(helix: &Helix, seq_to_aln: &[usize]) -> Vec<(usize, usize)> {
    helix
        .pairs()
        .map(|(s5, s3)| (seq_to_aln[s5], seq_to_aln[s3]))
        .collect()
}

/// A per-sequence helix that conflicts with the sequence's projected consensus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompetingHelix {
    pub start5: usize,
    pub end5: usize,
    pub start3: usize,
    pub end3: usize,
}

impl CompetingHelix {
    pub fn new(start5: usize, end5: usize, start3: usize, end3: usize) -> Self {
        debug_assert!(start5 <= end5 && end5 < start3 && start3 <= end3);
        Self {
            start5,
            end5,
            start3,
            end3,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end5 - self.start5 + 1
    }

    pub fn midpoint(&self) -> f64 {
        (self.end3 + self.start5) as f64 / 2.0
    }

    pub fn contains(&self, position: usize) -> bool {
        (self.start5..=self.end5).contains(&position) || (self.start3..=self.end3).contains(&position)
    }

    /// Pairs in sequence coordinates, outermost first.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.len()).map(move |k| (self.start5 + k, self.end3 - k))
    }

    /// Pairs mapped to alignment columns through a sequence's coordinate map.
    pub fn aligned_pairs<'a>(
        &'a self,
        seq_to_aln: &'a [usize],
    ) -> impl Iterator<Item = (usize, usize)> + 'a {
        self.pairs().map(move |(s5, s3)| (seq_to_aln[s5], seq_to_aln[s3]))
    }

    pub fn aligned_dot_bracket(&self, seq_to_aln: &[usize], alignment_length: usize) -> String {
        let mut out = vec!['.'; alignment_length];
        for (pos5, pos3) in self.aligned_pairs(seq_to_aln) {
            out[pos5] = '(';
            out[pos3] = ')';
        }
        out.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::structure::SecondaryStructure;

    fn model(sequences: &[&str], structure: &str) -> AlignmentModel {
        let names = (0..sequences.len()).map(|i| format!("s{i}")).collect();
        let seqs = sequences.iter().map(|s| s.to_string()).collect();
        let structure = SecondaryStructure::from_dot_bracket(structure).unwrap();
        AlignmentModel::new(names, seqs, Some(structure)).unwrap()
    }

    #[test]
    fn from_helix_projects_through_gaps() {
        let helix = Helix::new(0, 7, 2);
        let aligned = AlignedHelix::from_helix(&helix, 3, &[0, 2, 3, 4, 5, 6, 8, 9]);
        assert_eq!(aligned.pairs(), &[(0, 9), (2, 8)]);
        assert_eq!(aligned.appears_in().iter().copied().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn insert_merges_only_identical_pair_sets() {
        let identity: Vec<usize> = (0..12).collect();
        let mut aligned = AlignedHelix::from_helix(&Helix::new(0, 11, 3), 0, &identity);
        assert!(aligned.insert(&Helix::new(0, 11, 3), 1, &identity));
        assert!(!aligned.insert(&Helix::new(0, 11, 2), 2, &identity));
        assert!(!aligned.insert(&Helix::new(0, 10, 3), 3, &identity));
        assert_eq!(aligned.appearances(), 2);
    }

    #[test]
    fn dot_bracket_and_bps_string_render_pairs() {
        let helix = AlignedHelix::from_outer_pair(1, 9, 3);
        assert_eq!(helix.dot_bracket(11), ".(((...))).");
        assert_eq!(helix.bps_string(), "1:9,2:8,3:7");
        assert_eq!(helix.midpoint(), 5.0);
        assert!(helix.appears_in().is_empty());
    }

    #[test]
    fn exact_consensus_stack_is_a_consensus_helix() {
        let alignment = model(&["GGGGGAAAAACCCCC"], "(((((.....)))))");
        let helix = AlignedHelix::from_outer_pair(0, 14, 5);
        assert!(helix.is_consensus_helix(&alignment));
        assert!(helix.is_partial_consensus_helix(&alignment));
        assert_eq!(helix.consensus_bps(&alignment), 5);
    }

    #[test]
    fn fragment_of_consensus_stack_is_not_a_consensus_helix() {
        let alignment = model(&["GGGGGAAAAACCCCC"], "(((((.....)))))");
        let inner = AlignedHelix::from_outer_pair(1, 13, 4);
        assert!(!inner.is_consensus_helix(&alignment));
        let outer = AlignedHelix::from_outer_pair(0, 14, 4);
        assert!(!outer.is_consensus_helix(&alignment));
    }

    #[test]
    fn helix_extending_consensus_on_one_side_is_partial() {
        let alignment = model(&["GGGGGAAAAACCCCC"], "(((.........)))");
        let helix = AlignedHelix::from_outer_pair(0, 14, 5);
        assert!(helix.is_partial_consensus_helix(&alignment));
        assert!(!helix.is_consensus_helix(&alignment));
        assert_eq!(helix.consensus_bps(&alignment), 3);

        let disjoint = AlignedHelix::from_outer_pair(5, 11, 2);
        assert!(!disjoint.is_partial_consensus_helix(&alignment));
    }

    #[test]
    fn competing_helix_detected_when_base_is_paired_in_long_consensus_stack() {
        let alignment = model(&["GGGGAAAACCCCAAAACCCC"], "((((....))))........");
        let identity: Vec<usize> = (0..20).collect();
        // 5' side of the consensus stack pairing with the downstream C run.
        let helix = AlignedHelix::from_helix(&Helix::new(0, 19, 4), 0, &identity);
        assert!(helix.is_competing_helix(&alignment));

        let elsewhere = AlignedHelix::from_helix(&Helix::new(12, 19, 2), 0, &identity);
        assert!(!elsewhere.is_competing_helix(&alignment));
    }

    #[test]
    fn compete_score_classifies_three_prime_trans() {
        // consensus 0-10, helix 0-15: consensus partner lies between i and c
        let alignment = model(&["GAAAAAAAAACAAAAC"], "(.........).....");
        let helix = AlignedHelix::from_outer_pair(0, 15, 1);
        let stats = helix.compete_score(&alignment);
        let expected = 1.0 / ((15.0 - 10.0) * (16.0f64 - 10.0).ln());
        assert!((stats.trans3() - expected).abs() < 1e-12);
        assert_eq!(stats.cis3(), 0.0);
        assert_eq!(stats.count(Direction::Trans3), 1);
    }

    #[test]
    fn compete_score_classifies_five_prime_cis() {
        // consensus 10-15, helix 0-10: the 3' base pairs further downstream
        let alignment = model(&["GAAAAAAAAACAAAAG"], "..........(....)");
        let helix = AlignedHelix::from_outer_pair(0, 10, 1);
        let stats = helix.compete_score(&alignment);
        let expected = 1.0 / (10.0 * 11.0f64.ln());
        assert!((stats.cis5() - expected).abs() < 1e-12);
        assert!((stats.cis() - expected).abs() < 1e-12);
    }

    #[test]
    fn competing_helix_coordinates() {
        let helix = CompetingHelix::new(2, 5, 10, 13);
        assert_eq!(helix.len(), 4);
        assert_eq!(helix.midpoint(), 7.5);
        assert!(helix.contains(4));
        assert!(!helix.contains(7));
        assert_eq!(helix.pairs().collect::<Vec<_>>(), vec![(2, 13), (3, 12), (4, 11), (5, 10)]);
        let identity: Vec<usize> = (0..16).collect();
        assert_eq!(helix.aligned_dot_bracket(&identity, 16), "..((((....)))).." );
    }
}
