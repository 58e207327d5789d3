use super::cache::LikelihoodCache;
use super::error::EngineError;
use crate::core::evolution::EvolutionModel;
use crate::core::models::alignment::AlignmentModel;
use crate::core::models::nucleotide::{
    self, PAIR_STATES, SINGLE_STATES, leaf_states, non_pairing_gap_states,
};
use crate::core::models::tree::{NodeId, PhyloTree};
use nalgebra::SMatrix;
use slotmap::SecondaryMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

const ALL_STATES: [f64; SINGLE_STATES] = [1.0; SINGLE_STATES];

/// The phylogeny together with per-branch transition matrices for both the single
/// and the paired substitution model.
///
/// Immutable after construction except for the one-shot underflow flags, so a single
/// instance is shared by every evaluator and every Monte Carlo trial.
#[derive(Debug)]
pub struct PhyloModel {
    tree: PhyloTree,
    single_transitions: SecondaryMap<NodeId, SMatrix<f64, SINGLE_STATES, SINGLE_STATES>>,
    pair_transitions: SecondaryMap<NodeId, SMatrix<f64, PAIR_STATES, PAIR_STATES>>,
    single_frequencies: [f64; SINGLE_STATES],
    pair_frequencies: [f64; PAIR_STATES],
    non_gap_pair: bool,
    single_underflow: AtomicBool,
    pair_underflow: AtomicBool,
}

impl PhyloModel {
    pub fn new(tree: PhyloTree, model: &EvolutionModel, non_gap_pair: bool) -> Self {
        let mut single_transitions = SecondaryMap::new();
        let mut pair_transitions = SecondaryMap::new();
        for (id, node) in tree.nodes() {
            single_transitions.insert(id, model.single().transition(node.branch_length));
            pair_transitions.insert(id, model.pair().transition(node.branch_length));
        }
        let single_frequencies = std::array::from_fn(|i| model.single().frequencies()[i]);
        let pair_frequencies = std::array::from_fn(|i| model.pair().frequencies()[i]);
        debug!(
            nodes = tree.len(),
            tree_length = tree.total_length(),
            "Precomputed branch transition matrices."
        );
        Self {
            tree,
            single_transitions,
            pair_transitions,
            single_frequencies,
            pair_frequencies,
            non_gap_pair,
            single_underflow: AtomicBool::new(false),
            pair_underflow: AtomicBool::new(false),
        }
    }

    pub fn tree(&self) -> &PhyloTree {
        &self.tree
    }

    pub fn tree_length(&self) -> f64 {
        self.tree.total_length()
    }

    pub fn non_gap_pair(&self) -> bool {
        self.non_gap_pair
    }

    /// Binds the model to an alignment whose sequence names match the tree leaves.
    pub fn evaluator<'a>(
        &'a self,
        alignment: &'a AlignmentModel,
    ) -> Result<LikelihoodEvaluator<'a>, EngineError> {
        let leaves = self.tree.map_leaves(alignment.names())?;
        Ok(LikelihoodEvaluator {
            model: self,
            alignment,
            leaves,
            cache: LikelihoodCache::new(),
        })
    }

    fn paired_leaf(&self, a: char, b: char) -> [f64; PAIR_STATES] {
        let gap_like = |c: char| nucleotide::is_gap(c) || c == 'N';
        let states = |c: char| {
            if gap_like(c) {
                ALL_STATES
            } else {
                leaf_states(c).unwrap_or(ALL_STATES)
            }
        };
        let (mut left, mut right) = (states(a), states(b));
        if self.non_gap_pair {
            match (gap_like(a), gap_like(b)) {
                (true, false) => left = non_pairing_gap_states(&right),
                (false, true) => right = non_pairing_gap_states(&left),
                _ => {}
            }
        }
        std::array::from_fn(|k| left[k / SINGLE_STATES] * right[k % SINGLE_STATES])
    }

    fn prune<const N: usize>(
        &self,
        node: NodeId,
        transitions: &SecondaryMap<NodeId, SMatrix<f64, N, N>>,
        leaf: &dyn Fn(usize) -> [f64; N],
        leaves: &SecondaryMap<NodeId, usize>,
        underflow: &AtomicBool,
        kind: &'static str,
    ) -> [f64; N] {
        let Some((left, right)) = self.tree.node(node).children else {
            return leaves.get(node).map_or([1.0; N], |&seq| leaf(seq));
        };
        let left_partial = self.prune(left, transitions, leaf, leaves, underflow, kind);
        let right_partial = self.prune(right, transitions, leaf, leaves, underflow, kind);
        let (left_matrix, right_matrix) = (&transitions[left], &transitions[right]);

        let mut partial = [0.0; N];
        for i in 0..N {
            let mut left_sum = 0.0;
            let mut right_sum = 0.0;
            for j in 0..N {
                left_sum += left_matrix[(i, j)] * left_partial[j];
                right_sum += right_matrix[(i, j)] * right_partial[j];
            }
            partial[i] = left_sum * right_sum;
            if partial[i] <= 0.0 {
                if !underflow.swap(true, Ordering::Relaxed) {
                    warn!(
                        target: super::ADVISORY_TARGET,
                        kind,
                        "Likelihood underflow; clamping to the smallest positive value."
                    );
                }
                partial[i] = f64::MIN_POSITIVE;
            }
        }
        partial
    }

    /// Felsenstein likelihood of columns `pos5` and `pos3` evolving as a base pair.
    pub fn paired_likelihood(
        &self,
        alignment: &AlignmentModel,
        leaves: &SecondaryMap<NodeId, usize>,
        pos5: usize,
        pos3: usize,
    ) -> f64 {
        let leaf = |seq: usize| self.paired_leaf(alignment.base(seq, pos5), alignment.base(seq, pos3));
        let root = self.prune(
            self.tree.root(),
            &self.pair_transitions,
            &leaf,
            leaves,
            &self.pair_underflow,
            "paired",
        );
        root.iter().zip(&self.pair_frequencies).map(|(v, p)| v * p).sum()
    }

    /// Felsenstein likelihood of column `position` evolving on its own.
    pub fn single_likelihood(
        &self,
        alignment: &AlignmentModel,
        leaves: &SecondaryMap<NodeId, usize>,
        position: usize,
    ) -> f64 {
        let leaf = |seq: usize| leaf_states(alignment.base(seq, position)).unwrap_or(ALL_STATES);
        let root = self.prune(
            self.tree.root(),
            &self.single_transitions,
            &leaf,
            leaves,
            &self.single_underflow,
            "single",
        );
        root.iter().zip(&self.single_frequencies).map(|(v, p)| v * p).sum()
    }
}

/// Memoizing log-likelihood queries against one alignment.
pub struct LikelihoodEvaluator<'a> {
    model: &'a PhyloModel,
    alignment: &'a AlignmentModel,
    leaves: SecondaryMap<NodeId, usize>,
    cache: LikelihoodCache,
}

impl<'a> LikelihoodEvaluator<'a> {
    pub fn alignment(&self) -> &'a AlignmentModel {
        self.alignment
    }

    pub fn model(&self) -> &'a PhyloModel {
        self.model
    }

    /// `log2` of the paired likelihood.
    pub fn log_paired(&mut self, pos5: usize, pos3: usize) -> f64 {
        if let Some(value) = self.cache.paired(pos5, pos3) {
            return value;
        }
        let value = self
            .model
            .paired_likelihood(self.alignment, &self.leaves, pos5, pos3)
            .log2();
        self.cache.insert_paired(pos5, pos3, value);
        value
    }

    /// `log2` of the single-column likelihood.
    pub fn log_single(&mut self, position: usize) -> f64 {
        if let Some(value) = self.cache.single(position) {
            return value;
        }
        let value = self
            .model
            .single_likelihood(self.alignment, &self.leaves, position)
            .log2();
        self.cache.insert_single(position, value);
        value
    }

    /// Paired versus independent log-likelihood ratio of two columns.
    pub fn log_odds(&mut self, pos5: usize, pos3: usize) -> f64 {
        self.log_paired(pos5, pos3) - self.log_single(pos5) - self.log_single(pos3)
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}
