use crate::core::evolution::EvolutionModel;
use crate::core::models::alignment::AlignmentModel;
use crate::core::models::nucleotide::{pair_state_bases, state_base};
use crate::core::models::structure::SecondaryStructure;
use crate::core::models::tree::{NodeId, PhyloTree};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::shuffle::{RngStream, trial_rng};
use nalgebra::SMatrix;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use slotmap::SecondaryMap;
use tracing::{info, instrument};

/// Per-branch transition matrices of one substitution model.
struct BranchTransitions<const N: usize> {
    matrices: SecondaryMap<NodeId, SMatrix<f64, N, N>>,
}

impl<const N: usize> BranchTransitions<N> {
    fn new(tree: &PhyloTree, transition: impl Fn(f64) -> SMatrix<f64, N, N>) -> Self {
        let matrices = tree
            .nodes()
            .map(|(id, node)| (id, transition(node.branch_length)))
            .collect();
        Self { matrices }
    }

    /// Draws a state at the root from `root` and carries it down to every leaf.
    fn evolve(
        &self,
        tree: &PhyloTree,
        root: impl IntoIterator<Item = f64>,
        rng: &mut StdRng,
        leaf_states: &mut SecondaryMap<NodeId, usize>,
    ) -> Result<(), EngineError> {
        let state = draw(root, rng)?;
        self.descend(tree, tree.root(), state, rng, leaf_states)
    }

    fn descend(
        &self,
        tree: &PhyloTree,
        node: NodeId,
        state: usize,
        rng: &mut StdRng,
        leaf_states: &mut SecondaryMap<NodeId, usize>,
    ) -> Result<(), EngineError> {
        let Some((left, right)) = tree.node(node).children else {
            leaf_states.insert(node, state);
            return Ok(());
        };
        for child in [left, right] {
            let row = self.matrices[child].row(state);
            let child_state = draw(row.iter().copied(), rng)?;
            self.descend(tree, child, child_state, rng, leaf_states)?;
        }
        Ok(())
    }
}

fn draw(weights: impl IntoIterator<Item = f64>, rng: &mut StdRng) -> Result<usize, EngineError> {
    let distribution = WeightedIndex::new(weights.into_iter().map(|w| w.max(0.0)))
        .map_err(|e| EngineError::Internal(format!("invalid state distribution: {e}")))?;
    Ok(distribution.sample(rng))
}

/// Simulates an alignment with one sequence per tree leaf, named after the leaves
/// in left-to-right order.
///
/// Unpaired positions of `structure` evolve under the single-nucleotide model and
/// every base pair as one column pair under the pair model. The result carries
/// `structure` as its consensus.
#[instrument(skip_all, name = "simulation_workflow")]
pub fn run(
    tree: &PhyloTree,
    evolution: &EvolutionModel,
    structure: &SecondaryStructure,
    seed: u64,
    reporter: &ProgressReporter,
) -> Result<AlignmentModel, EngineError> {
    let length = structure.len();
    let leaves = tree.leaves();
    info!(leaves = leaves.len(), columns = length, seed, "Simulating alignment.");

    let single = BranchTransitions::new(tree, |t| evolution.single().transition(t));
    let pair = BranchTransitions::new(tree, |t| evolution.pair().transition(t));
    let mut rng = trial_rng(seed, RngStream::Simulation, 0);

    let mut sequences = vec![vec!['-'; length]; leaves.len()];
    let mut leaf_states = SecondaryMap::new();
    reporter.report(Progress::TaskStart {
        total_steps: length as u64,
    });
    for position in 0..length {
        match structure.partner(position) {
            None => {
                single.evolve(
                    tree,
                    evolution.single().frequencies().iter().copied(),
                    &mut rng,
                    &mut leaf_states,
                )?;
                for (sequence, leaf) in sequences.iter_mut().zip(&leaves) {
                    sequence[position] = state_base(leaf_states[*leaf]);
                }
            }
            Some(partner) if position < partner => {
                pair.evolve(
                    tree,
                    evolution.pair().frequencies().iter().copied(),
                    &mut rng,
                    &mut leaf_states,
                )?;
                for (sequence, leaf) in sequences.iter_mut().zip(&leaves) {
                    let (base5, base3) = pair_state_bases(leaf_states[*leaf]);
                    sequence[position] = base5;
                    sequence[partner] = base3;
                }
            }
            Some(_) => {}
        }
        reporter.report(Progress::TaskIncrement { amount: 1 });
    }
    reporter.report(Progress::TaskFinish);

    let sequences = sequences.into_iter().map(String::from_iter).collect();
    Ok(AlignmentModel::new(
        tree.leaf_names(),
        sequences,
        Some(structure.clone()),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::nucleotide::is_canonical_pair;

    const STRUCTURE: &str = "((((....))))..((...))";

    fn simulate(tree: &PhyloTree, seed: u64) -> AlignmentModel {
        let structure = SecondaryStructure::from_dot_bracket(STRUCTURE).unwrap();
        run(
            tree,
            &EvolutionModel::standard().unwrap(),
            &structure,
            seed,
            &ProgressReporter::new(),
        )
        .unwrap()
    }

    #[test]
    fn sequences_follow_tree_leaves_and_keep_structure() {
        let tree = PhyloTree::balanced(5, 1.0).unwrap();
        let aln = simulate(&tree, 42);
        assert_eq!(aln.names(), tree.leaf_names().as_slice());
        assert_eq!(aln.num_sequences(), 5);
        assert_eq!(aln.len(), STRUCTURE.len());
        assert_eq!(aln.structure().to_dot_bracket().unwrap(), STRUCTURE);
        assert!(aln.aligned_strings().iter().all(|s| !s.contains('-')));
    }

    #[test]
    fn fixed_seed_reproduces_the_alignment() {
        let tree = PhyloTree::balanced(4, 2.0).unwrap();
        assert_eq!(simulate(&tree, 7), simulate(&tree, 7));
    }

    #[test]
    fn zero_length_branches_copy_the_root_state() {
        let tree = PhyloTree::balanced(6, 0.0).unwrap();
        let aln = simulate(&tree, 3);
        let first = aln.aligned(0).to_vec();
        for seq in 1..aln.num_sequences() {
            assert_eq!(aln.aligned(seq), first.as_slice());
        }
    }

    #[test]
    fn paired_columns_are_mostly_canonical() {
        let tree = PhyloTree::balanced(8, 0.5).unwrap();
        let aln = simulate(&tree, 19);
        let structure = aln.structure().clone();
        let mut canonical = 0;
        let mut total = 0;
        for (pos5, pos3) in structure.pairs() {
            for seq in 0..aln.num_sequences() {
                total += 1;
                if is_canonical_pair(aln.base(seq, pos5), aln.base(seq, pos3)) {
                    canonical += 1;
                }
            }
        }
        assert!(canonical * 2 > total);
    }
}
