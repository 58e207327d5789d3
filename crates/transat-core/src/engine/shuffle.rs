//! Randomized alignments for the Monte Carlo null model.
//!
//! ## Overview
//!
//! A randomized alignment permutes whole columns, so every column keeps its
//! composition and gap pattern while the pairing signal between columns is destroyed.
//! Two families are produced:
//!
//! - **Structure-free** alignments ([`shuffled_alignment`]) permute every column and
//!   carry no consensus.
//! - **Helix-preserving** alignments ([`helix_preserving_base`] followed by
//!   [`randomize_unpaired`]) hold the columns of one consensus helix fixed and permute
//!   the rest. The base may first have the intervals between the held columns realigned
//!   by the Java realigner.
//!
//! ## Determinism
//!
//! Every trial draws from its own [`StdRng`] derived by [`trial_rng`] from the
//! configured seed, so a run is reproducible regardless of how trials are scheduled
//! across threads. The external shuffler is outside this guarantee.

use super::config::Shuffler;
use super::error::EngineError;
use super::external::{JavaRealigner, RnazShuffler};
use crate::core::io::clustal::{project_columns, scatter_columns};
use crate::core::io::fasta::SequenceRecord;
use crate::core::models::alignment::AlignmentModel;
use crate::core::models::structure::SecondaryStructure;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::ops::Range;
use tracing::trace;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Independent random streams drawn from one configured seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum RngStream {
    AllHelices = 1,
    TrueHelix = 2,
    Simulation = 3,
}

/// Generator for trial `trial` of `stream`, independent of every other trial.
pub fn trial_rng(seed: u64, stream: RngStream, trial: u64) -> StdRng {
    let mut mixed = seed ^ (stream as u64).wrapping_mul(GOLDEN_GAMMA).rotate_left(17);
    mixed = mixed.wrapping_add(trial.wrapping_add(1).wrapping_mul(GOLDEN_GAMMA));
    // splitmix64 finalizer
    mixed = (mixed ^ (mixed >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    mixed = (mixed ^ (mixed >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    StdRng::seed_from_u64(mixed ^ (mixed >> 31))
}

/// Permutes a set of alignment columns in place.
pub trait ColumnShuffler: Send + Sync {
    /// Rearranges `columns` of the row-major `rows`; every other column is untouched.
    fn shuffle(
        &self,
        rows: &mut [Vec<char>],
        columns: &[usize],
        rng: &mut StdRng,
    ) -> Result<(), EngineError>;
}

/// Uniformly random permutation of whole columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformShuffler;

impl ColumnShuffler for UniformShuffler {
    fn shuffle(
        &self,
        rows: &mut [Vec<char>],
        columns: &[usize],
        rng: &mut StdRng,
    ) -> Result<(), EngineError> {
        let mut order = columns.to_vec();
        order.shuffle(rng);
        let originals: Vec<Vec<char>> = columns
            .iter()
            .map(|&c| rows.iter().map(|row| row[c]).collect())
            .collect();
        for (&target, source) in order.iter().zip(&originals) {
            for (row, &base) in rows.iter_mut().zip(source) {
                row[target] = base;
            }
        }
        Ok(())
    }
}

/// Delegates to the external stratified shuffler, sending only the selected columns.
impl ColumnShuffler for RnazShuffler {
    fn shuffle(
        &self,
        rows: &mut [Vec<char>],
        columns: &[usize],
        _rng: &mut StdRng,
    ) -> Result<(), EngineError> {
        if columns.is_empty() {
            return Ok(());
        }
        let block = project_columns(rows, columns);
        let shuffled = self.shuffle_block(&block)?;
        scatter_columns(rows, columns, &shuffled).map_err(|e| EngineError::ExternalTool {
            tool: RnazShuffler::TOOL.to_string(),
            reason: e.to_string(),
        })
    }
}

pub fn column_shuffler(shuffler: &Shuffler) -> Box<dyn ColumnShuffler> {
    match shuffler {
        Shuffler::Uniform => Box::new(UniformShuffler),
        Shuffler::External { program } => Box::new(RnazShuffler::new(program.clone())),
    }
}

fn rows_of(alignment: &AlignmentModel) -> Vec<Vec<char>> {
    (0..alignment.num_sequences())
        .map(|seq| alignment.aligned(seq).to_vec())
        .collect()
}

fn into_strings(rows: Vec<Vec<char>>) -> Vec<String> {
    rows.into_iter().map(|row| row.into_iter().collect()).collect()
}

/// Permutes every column and drops the consensus.
pub fn shuffled_alignment(
    alignment: &AlignmentModel,
    shuffler: &dyn ColumnShuffler,
    rng: &mut StdRng,
) -> Result<AlignmentModel, EngineError> {
    let mut rows = rows_of(alignment);
    let columns: Vec<usize> = (0..alignment.len()).collect();
    shuffler.shuffle(&mut rows, &columns, rng)?;
    Ok(AlignmentModel::new(
        alignment.names().to_vec(),
        into_strings(rows),
        None,
    )?)
}

/// Permutes the columns left unpaired by `base`'s consensus, keeping the consensus.
pub fn randomize_unpaired(
    base: &AlignmentModel,
    shuffler: &dyn ColumnShuffler,
    rng: &mut StdRng,
) -> Result<AlignmentModel, EngineError> {
    let mut rows = rows_of(base);
    let structure = base.structure();
    let columns: Vec<usize> = (0..base.len()).filter(|&c| !structure.is_paired(c)).collect();
    shuffler.shuffle(&mut rows, &columns, rng)?;
    Ok(AlignmentModel::new_unseparated(
        base.names().to_vec(),
        into_strings(rows),
        structure.clone(),
    )?)
}

/// The alignment with only the pairs of true helix `label` kept in its consensus.
///
/// With a realigner, every maximal interval between consecutive held columns is
/// realigned independently; interval lengths may change and the kept pairs are
/// re-indexed to their new columns. In the result the held helix carries label 0.
pub fn helix_preserving_base(
    alignment: &AlignmentModel,
    label: usize,
    realigner: Option<&JavaRealigner>,
) -> Result<AlignmentModel, EngineError> {
    let held = |column: usize| alignment.column_label(column) == Some(label);
    let Some(realigner) = realigner else {
        let kept = alignment.structure().retain_pairs(|pos5, _| held(pos5));
        return Ok(alignment.with_structure(kept)?);
    };

    let names = alignment.names();
    let mut rows: Vec<String> = vec![String::new(); alignment.num_sequences()];
    let mut new_index = vec![None; alignment.len()];
    let mut start = 0usize;

    let held_columns: Vec<usize> = (0..alignment.len()).filter(|&c| held(c)).collect();
    for &column in &held_columns {
        realign_interval(alignment, realigner, start..column, &mut rows)?;
        for (seq, row) in rows.iter_mut().enumerate() {
            row.push(alignment.base(seq, column));
        }
        new_index[column] = Some(rows[0].chars().count() - 1);
        start = column + 1;
    }
    realign_interval(alignment, realigner, start..alignment.len(), &mut rows)?;
    let columns_written = rows[0].chars().count();
    trace!(
        label,
        before = alignment.len(),
        after = columns_written,
        "Realigned intervals around held helix."
    );

    let mut partners = vec![None; columns_written];
    for (pos5, pos3) in alignment.structure().pairs() {
        if let (Some(new5), Some(new3)) = (new_index[pos5], new_index[pos3]) {
            partners[new5] = Some(new3);
            partners[new3] = Some(new5);
        }
    }
    let structure = SecondaryStructure::from_partners_unseparated(partners)?;
    Ok(AlignmentModel::new_unseparated(names.to_vec(), rows, structure)?)
}

fn realign_interval(
    alignment: &AlignmentModel,
    realigner: &JavaRealigner,
    interval: Range<usize>,
    rows: &mut [String],
) -> Result<(), EngineError> {
    if interval.is_empty() {
        return Ok(());
    }
    let block: Vec<SequenceRecord> = (0..alignment.num_sequences())
        .map(|seq| {
            let chunk: String = alignment.aligned(seq)[interval.clone()].iter().collect();
            SequenceRecord::new(alignment.name(seq), chunk)
        })
        .collect();
    let realigned = realigner.realign(&block)?;
    for (row, record) in rows.iter_mut().zip(&realigned) {
        row.push_str(&record.sequence);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn model(sequences: &[&str], structure: Option<&str>) -> AlignmentModel {
        let names = (0..sequences.len()).map(|i| format!("s{i}")).collect();
        let structure = structure.map(|s| SecondaryStructure::from_dot_bracket(s).unwrap());
        AlignmentModel::new(names, sequences.iter().map(|s| s.to_string()).collect(), structure)
            .unwrap()
    }

    fn sorted_columns(alignment: &AlignmentModel) -> Vec<String> {
        let mut columns: Vec<String> = (0..alignment.len())
            .map(|c| alignment.column(c).collect())
            .collect();
        columns.sort();
        columns
    }

    #[test]
    fn trial_rngs_are_reproducible_and_distinct() {
        let a: u64 = trial_rng(42, RngStream::TrueHelix, 3).r#gen();
        let b: u64 = trial_rng(42, RngStream::TrueHelix, 3).r#gen();
        let c: u64 = trial_rng(42, RngStream::TrueHelix, 4).r#gen();
        let d: u64 = trial_rng(42, RngStream::AllHelices, 3).r#gen();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn shuffling_with_fixed_seed_is_deterministic() {
        let aln = model(&["GGGAAACCCUUAGC", "GGCAAAGCCUAAGC"], None);
        let first = shuffled_alignment(&aln, &UniformShuffler, &mut trial_rng(7, RngStream::AllHelices, 0)).unwrap();
        let second = shuffled_alignment(&aln, &UniformShuffler, &mut trial_rng(7, RngStream::AllHelices, 0)).unwrap();
        assert_eq!(first.aligned_strings(), second.aligned_strings());
    }

    #[test]
    fn shuffling_permutes_whole_columns() {
        let aln = model(&["GGGAAACCCUUAGC", "GG-AAAGCCUAAGC", "AGCAAAGCUUAACC"], None);
        let shuffled = shuffled_alignment(&aln, &UniformShuffler, &mut trial_rng(1, RngStream::AllHelices, 0)).unwrap();
        assert_eq!(sorted_columns(&shuffled), sorted_columns(&aln));
        assert_eq!(shuffled.structure().paired_count(), 0);
    }

    #[test]
    fn randomize_unpaired_holds_paired_columns() {
        let aln = model(&["GGGAAAACCCUAGA", "GCGAAAACGCAAGU"], Some("(((....)))...."));
        let randomized = randomize_unpaired(&aln, &UniformShuffler, &mut trial_rng(3, RngStream::TrueHelix, 0)).unwrap();
        for column in [0, 1, 2, 7, 8, 9] {
            assert_eq!(
                randomized.column(column).collect::<String>(),
                aln.column(column).collect::<String>()
            );
        }
        assert_eq!(randomized.structure(), aln.structure());
        assert_eq!(sorted_columns(&randomized), sorted_columns(&aln));
    }

    #[test]
    fn helix_preserving_base_keeps_only_the_held_helix() {
        let aln = model(&["GGGAAAACCCGCGAAAACGC"], Some("(((....)))(((....)))"));
        assert_eq!(aln.true_helix_count(), 2);
        let base = helix_preserving_base(&aln, 1, None).unwrap();
        assert_eq!(base.structure().to_dot_bracket().unwrap(), "..........(((....)))");
        assert_eq!(base.true_helix_count(), 1);
        assert_eq!(base.column_label(10), Some(0));
        assert_eq!(base.aligned_strings(), aln.aligned_strings());
    }

    #[cfg(unix)]
    #[test]
    fn realigner_may_compact_a_loop_below_the_minimum_separation() {
        use crate::core::models::tree::PhyloTree;
        use std::os::unix::fs::PermissionsExt;

        // Stand-in realigner that strips every gap from the interval it is given.
        let dir = tempfile::tempdir().unwrap();
        let java = dir.path().join("java");
        std::fs::write(&java, "#!/bin/sh\nsed '/^>/!s/-//g' \"$4\"\n").unwrap();
        std::fs::set_permissions(&java, std::fs::Permissions::from_mode(0o755)).unwrap();
        let tree = PhyloTree::balanced(2, 0.1).unwrap();
        let realigner = JavaRealigner::new(java, "unused".to_string(), &tree);

        let aln = model(&["GGGA---CCC", "GGG-A--CCC"], Some("(((....)))"));
        let base = helix_preserving_base(&aln, 0, Some(&realigner)).unwrap();
        assert_eq!(base.len(), 7);
        assert_eq!(base.structure().to_dot_bracket().unwrap(), "(((.)))");
        assert_eq!(base.structure().partner(2), Some(4));
        assert_eq!(base.true_helix_count(), 1);
        assert_eq!(base.aligned_strings(), vec!["GGGACCC".to_string(), "GGGACCC".to_string()]);

        let mut rng = trial_rng(3, RngStream::TrueHelix, 0);
        let shuffled = randomize_unpaired(&base, &UniformShuffler, &mut rng).unwrap();
        assert_eq!(shuffled.structure(), base.structure());
    }
}
