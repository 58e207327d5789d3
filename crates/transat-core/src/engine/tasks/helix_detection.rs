use crate::core::models::alignment::AlignmentModel;
use crate::core::models::helix::{AlignedHelix, Helix};
use crate::core::models::nucleotide::is_canonical_pair;
use crate::core::models::structure::MIN_DIST;
use crate::engine::context::AnalysisContext;
use crate::engine::error::EngineError;
use crate::engine::progress::Progress;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Lengths of the canonical stacks ending at every position pair of one sequence.
///
/// Cell `(i, j)` holds the number of consecutive canonical pairs
/// `(i, j), (i+1, j-1), ...`; it is zero whenever `j - i < MIN_DIST`.
pub(crate) struct StackMatrix {
    size: usize,
    cells: Vec<u32>,
}

impl StackMatrix {
    pub(crate) fn new(sequence: &[char]) -> Self {
        let size = sequence.len();
        let mut matrix = Self {
            size,
            cells: vec![0; size * size],
        };
        for j in MIN_DIST..size {
            for i in (0..=j - MIN_DIST).rev() {
                if is_canonical_pair(sequence[i], sequence[j]) {
                    let inner = if j - i >= MIN_DIST + 2 {
                        matrix.get(i + 1, j - 1)
                    } else {
                        0
                    };
                    matrix.cells[i * size + j] = inner + 1;
                }
            }
        }
        matrix
    }

    #[inline]
    fn get(&self, i: usize, j: usize) -> u32 {
        self.cells[i * self.size + j]
    }

    /// Runs longer than `min_stem_length` that end strictly inside the matrix,
    /// i.e. whose outer pair is followed by a non-pairing `(i-1, j+1)`.
    pub(crate) fn terminated_runs(&self, min_stem_length: usize) -> Vec<Helix> {
        let mut runs = Vec::new();
        for j in MIN_DIST..self.size {
            for i in (0..=j - MIN_DIST).rev() {
                if self.get(i, j) != 0 || j - i < MIN_DIST + 2 {
                    continue;
                }
                let inner = self.get(i + 1, j - 1) as usize;
                if inner > min_stem_length {
                    runs.push(Helix::new(i + 1, j - 1, inner));
                }
            }
        }
        runs
    }

    /// Runs longer than `min_stem_length` whose outer pair touches the first or the
    /// last position.
    pub(crate) fn edge_runs(&self, min_stem_length: usize) -> Vec<Helix> {
        let Some(last) = self.size.checked_sub(1) else {
            return Vec::new();
        };
        let mut runs = Vec::new();
        for j in 0..self.size {
            let first_row = self.get(0, j) as usize;
            if first_row > min_stem_length {
                runs.push(Helix::new(0, j, first_row));
            }
            let last_column = self.get(j, last) as usize;
            if j != 0 && last_column > min_stem_length {
                runs.push(Helix::new(j, last, last_column));
            }
        }
        runs
    }
}

/// Every maximal canonical stack of one ungapped sequence longer than `min_stem_length`.
pub fn find_sequence_helices(sequence: &[char], min_stem_length: usize) -> Vec<Helix> {
    let matrix = StackMatrix::new(sequence);
    let mut helices = matrix.terminated_runs(min_stem_length);
    helices.extend(matrix.edge_runs(min_stem_length));
    helices
}

/// Triangular flattening of an outer pair, used as the merge bucket.
#[inline]
pub fn bucket_index(pos5: usize, pos3: usize, alignment_length: usize) -> usize {
    pos5 * alignment_length + pos3 - (pos5 + 2) * (pos5 + 1) / 2
}

/// Merges per-sequence helices into aligned helices, in sequence order.
///
/// A helix joins an existing aligned helix only if all of its pairs land on the same
/// columns; the result is ordered by bucket, then by first appearance.
pub fn merge_sequence_helices(
    alignment: &AlignmentModel,
    per_sequence: &[Vec<Helix>],
) -> Vec<AlignedHelix> {
    let length = alignment.len();
    let mut buckets: BTreeMap<usize, Vec<AlignedHelix>> = BTreeMap::new();
    for (seq, helices) in per_sequence.iter().enumerate() {
        let seq_to_aln = alignment.seq_to_aln(seq);
        for helix in helices {
            let bucket = buckets
                .entry(bucket_index(seq_to_aln[helix.pos5], seq_to_aln[helix.pos3], length))
                .or_default();
            if !bucket.iter_mut().any(|aligned| aligned.insert(helix, seq, seq_to_aln)) {
                bucket.push(AlignedHelix::from_helix(helix, seq, seq_to_aln));
            }
        }
    }
    buckets.into_values().flatten().collect()
}

/// Finds all helices of `alignment` with the per-sequence dynamic program.
#[instrument(skip_all, name = "helix_detection_task")]
pub fn run(context: &AnalysisContext, alignment: &AlignmentModel) -> Vec<AlignedHelix> {
    let min_stem_length = context.config.min_stem_length;
    debug!(
        sequences = alignment.num_sequences(),
        min_stem_length, "Detecting helices."
    );

    let sequences: Vec<usize> = (0..alignment.num_sequences()).collect();

    #[cfg(not(feature = "parallel"))]
    let iterator = sequences.iter();

    #[cfg(feature = "parallel")]
    let iterator = sequences.par_iter();

    let per_sequence: Vec<Vec<Helix>> = iterator
        .map(|&seq| find_sequence_helices(alignment.ungapped(seq), min_stem_length))
        .collect();

    merge_sequence_helices(alignment, &per_sequence)
}

/// Finds helices by growing high-likelihood column pairs along their diagonals.
///
/// Ratios are the paired-versus-unpaired log-odds divided by the total tree length.
#[instrument(skip_all, name = "helix_grow_task")]
pub fn run_grow(
    context: &AnalysisContext,
    alignment: &AlignmentModel,
    seed_threshold: f64,
    grow_threshold: f64,
) -> Result<Vec<AlignedHelix>, EngineError> {
    info!(seed_threshold, grow_threshold, "Growing helices from phylogenetic seeds.");
    let tree_length = context.phylo.tree_length();
    if tree_length <= 0.0 {
        return Err(EngineError::PhaseFailed {
            phase: "helix_grow",
            reason: "tree has zero total branch length".into(),
        });
    }
    let ratio_rows = grow_ratios(context, alignment, tree_length)?;

    let marked = grow_marks(&ratio_rows, seed_threshold, grow_threshold);
    let helices = collapse_diagonals(&marked, context.config.min_stem_length);
    debug!(count = helices.len(), "Collapsed grown pairs into helices.");
    Ok(helices)
}

/// Log-odds of every column pair over the tree length, `-inf` below `MIN_DIST`.
///
/// Single-column log-likelihoods are computed once and shared by all rows.
fn grow_ratios(
    context: &AnalysisContext,
    alignment: &AlignmentModel,
    tree_length: f64,
) -> Result<Vec<Vec<f64>>, EngineError> {
    let length = alignment.len();
    let singles: Vec<f64> = {
        let mut evaluator = context.phylo.evaluator(alignment)?;
        (0..length).map(|c| evaluator.log_single(c)).collect()
    };
    context.reporter.report(Progress::TaskStart {
        total_steps: length as u64,
    });

    let rows: Vec<usize> = (0..length).collect();

    #[cfg(not(feature = "parallel"))]
    let iterator = rows.iter();

    #[cfg(feature = "parallel")]
    let iterator = rows.par_iter();

    let ratio_rows = iterator
        .map(|&i| -> Result<Vec<f64>, EngineError> {
            let mut evaluator = context.phylo.evaluator(alignment)?;
            let row: Vec<f64> = (0..length)
                .map(|j| {
                    if j >= i + MIN_DIST {
                        (evaluator.log_paired(i, j) - singles[i] - singles[j]) / tree_length
                    } else {
                        f64::NEG_INFINITY
                    }
                })
                .collect();
            context.reporter.report(Progress::TaskIncrement { amount: 1 });
            Ok(row)
        })
        .collect::<Result<Vec<Vec<f64>>, EngineError>>()?;
    context.reporter.report(Progress::TaskFinish);
    Ok(ratio_rows)
}

fn grow_marks(ratios: &[Vec<f64>], seed_threshold: f64, grow_threshold: f64) -> Vec<Vec<bool>> {
    let length = ratios.len();
    let mut marked = vec![vec![false; length]; length];
    let mut queue = VecDeque::new();

    for i in 0..length {
        for j in (i + MIN_DIST)..length {
            if ratios[i][j] > seed_threshold {
                marked[i][j] = true;
                queue.push_back((i, j));
            }
        }
    }

    while let Some((i, j)) = queue.pop_front() {
        let mut neighbours = Vec::with_capacity(2);
        if i > 0 && j + 1 < length {
            neighbours.push((i - 1, j + 1));
        }
        if j >= 1 && i + 1 + MIN_DIST <= j - 1 {
            neighbours.push((i + 1, j - 1));
        }
        for (a, b) in neighbours {
            if !marked[a][b] && ratios[a][b] > grow_threshold {
                marked[a][b] = true;
                queue.push_back((a, b));
            }
        }
    }
    marked
}

// Stacked pairs share the anti-diagonal i + j; each maximal marked run on one
// anti-diagonal becomes a helix anchored at its outermost pair.
fn collapse_diagonals(marked: &[Vec<bool>], min_stem_length: usize) -> Vec<AlignedHelix> {
    let length = marked.len();
    let mut helices = Vec::new();
    for sum in MIN_DIST..(2 * length).saturating_sub(1) {
        let mut run: Option<(usize, usize)> = None;
        let first = sum.saturating_sub(length - 1);
        let mut i = first;
        while 2 * i + MIN_DIST <= sum {
            let j = sum - i;
            if marked[i][j] {
                let (start, count) = run.unwrap_or((i, 0));
                run = Some((start, count + 1));
            } else if let Some((start, count)) = run.take() {
                if count > min_stem_length {
                    helices.push(AlignedHelix::from_outer_pair(start, sum - start, count));
                }
            }
            i += 1;
        }
        if let Some((start, count)) = run {
            if count > min_stem_length {
                helices.push(AlignedHelix::from_outer_pair(start, sum - start, count));
            }
        }
    }
    helices.sort_by_key(|helix| helix.outer_pair());
    helices
}
