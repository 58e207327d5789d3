use super::nucleotide::{self, GAP};
use super::structure::{SecondaryStructure, StructureError};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum AlignmentError {
    #[error("Alignment contains no sequences")]
    Empty,
    #[error("Got {names} sequence names for {sequences} sequences")]
    NameCountMismatch { names: usize, sequences: usize },
    #[error("Duplicate sequence name '{0}'")]
    DuplicateName(String),
    #[error("Sequence '{name}' has aligned length {found}, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Unrecognized character '{symbol}' at column {position} of sequence '{name}'")]
    UnrecognizedCharacter {
        name: String,
        symbol: char,
        position: usize,
    },
    #[error("Structure length {found} does not match alignment length {expected}")]
    StructureLength { expected: usize, found: usize },
    #[error("Invalid consensus structure: {0}")]
    Structure(#[from] StructureError),
}

/// A multiple sequence alignment annotated with a consensus secondary structure.
///
/// All derived data (ungapped sequences, coordinate maps, per-sequence projected
/// structures and helix labels) is computed once at construction. Any change to
/// sequence or structure content goes through a new `AlignmentModel`.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentModel {
    names: Vec<String>,
    aligned: Vec<Vec<char>>,
    ungapped: Vec<Vec<char>>,
    seq_to_aln: Vec<Vec<usize>>,
    aln_to_seq: Vec<Vec<Option<usize>>>,
    structure: SecondaryStructure,
    seq_structures: Vec<Vec<Option<usize>>>,
    column_labels: Vec<Option<usize>>,
    seq_labels: Vec<Vec<Option<usize>>>,
    true_helix_count: usize,
}

impl AlignmentModel {
    /// Builds an alignment from gapped sequences.
    ///
    /// Sequences are upper-cased and `T` is mapped to `U`. Without a structure the
    /// alignment carries an empty (all unpaired) consensus.
    pub fn new(
        names: Vec<String>,
        sequences: Vec<String>,
        structure: Option<SecondaryStructure>,
    ) -> Result<Self, AlignmentError> {
        Self::build(names, sequences, structure, true)
    }

    /// Builds a realigned alignment whose consensus pairs may sit closer than
    /// [`MIN_DIST`](crate::core::models::structure::MIN_DIST).
    pub(crate) fn new_unseparated(
        names: Vec<String>,
        sequences: Vec<String>,
        structure: SecondaryStructure,
    ) -> Result<Self, AlignmentError> {
        Self::build(names, sequences, Some(structure), false)
    }

    fn build(
        names: Vec<String>,
        sequences: Vec<String>,
        structure: Option<SecondaryStructure>,
        check_separation: bool,
    ) -> Result<Self, AlignmentError> {
        if sequences.is_empty() {
            return Err(AlignmentError::Empty);
        }
        if names.len() != sequences.len() {
            return Err(AlignmentError::NameCountMismatch {
                names: names.len(),
                sequences: sequences.len(),
            });
        }
        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(AlignmentError::DuplicateName(name.clone()));
            }
        }

        let aligned = names
            .iter()
            .zip(&sequences)
            .map(|(name, sequence)| normalize_sequence(name, sequence))
            .collect::<Result<Vec<_>, _>>()?;

        let length = aligned[0].len();
        for (name, sequence) in names.iter().zip(&aligned) {
            if sequence.len() != length {
                return Err(AlignmentError::LengthMismatch {
                    name: name.clone(),
                    expected: length,
                    found: sequence.len(),
                });
            }
        }

        let structure = structure.unwrap_or_else(|| SecondaryStructure::unpaired(length));
        if structure.len() != length {
            return Err(AlignmentError::StructureLength {
                expected: length,
                found: structure.len(),
            });
        }
        if check_separation {
            structure.check_min_separation()?;
        }

        let mut ungapped = Vec::with_capacity(aligned.len());
        let mut seq_to_aln = Vec::with_capacity(aligned.len());
        let mut aln_to_seq = Vec::with_capacity(aligned.len());
        for sequence in &aligned {
            let mut bases = Vec::new();
            let mut forward = Vec::new();
            let mut backward = Vec::with_capacity(length);
            for (column, &base) in sequence.iter().enumerate() {
                if base == GAP {
                    backward.push(None);
                } else {
                    backward.push(Some(bases.len()));
                    bases.push(base);
                    forward.push(column);
                }
            }
            ungapped.push(bases);
            seq_to_aln.push(forward);
            aln_to_seq.push(backward);
        }

        let mut model = Self {
            names,
            aligned,
            ungapped,
            seq_to_aln,
            aln_to_seq,
            structure,
            seq_structures: Vec::new(),
            column_labels: Vec::new(),
            seq_labels: Vec::new(),
            true_helix_count: 0,
        };
        model.fill_seq_structures();
        model.label_helices();
        Ok(model)
    }

    /// Rebuilds the alignment with the same sequences and a different consensus.
    pub fn with_structure(&self, structure: SecondaryStructure) -> Result<Self, AlignmentError> {
        Self::new(self.names.clone(), self.aligned_strings(), Some(structure))
    }

    // A base is paired in its sequence only where the consensus partner column
    // holds a base that forms a canonical pair with it.
    fn fill_seq_structures(&mut self) {
        self.seq_structures = self
            .aligned
            .iter()
            .zip(&self.aln_to_seq)
            .map(|(sequence, backward)| {
                sequence
                    .iter()
                    .enumerate()
                    .filter(|&(_, &base)| base != GAP)
                    .map(|(column, &base)| {
                        self.structure.partner(column).and_then(|partner| {
                            if nucleotide::is_canonical_pair(base, sequence[partner]) {
                                backward[partner]
                            } else {
                                None
                            }
                        })
                    })
                    .collect()
            })
            .collect();
    }

    // Consecutive stacked pairs share a label; a helix also continues across a
    // bulge or interior loop when the next opening pair closes on the next paired
    // column inward from the previous pair's partner.
    fn label_helices(&mut self) {
        let length = self.len();
        let partners = self.structure.partners().to_vec();
        self.column_labels = vec![None; length];
        self.seq_labels = self
            .seq_structures
            .iter()
            .map(|s| vec![None; s.len()])
            .collect();

        let mut counter = 0;
        let mut i = 0;
        while i < length {
            match partners[i] {
                Some(partner) if partner > i => {
                    let label = counter;
                    counter += 1;
                    let mut current = i;
                    let mut current_partner = partner;
                    loop {
                        self.assign_label(current, current_partner, label);

                        let next = current + 1;
                        if next < length && current_partner > 0 && partners[next] == Some(current_partner - 1) {
                            current = next;
                            current_partner -= 1;
                            continue;
                        }

                        let mut next = current + 1;
                        while next < length && partners[next].is_none() {
                            next += 1;
                        }
                        let Some(next_partner) = partners.get(next).copied().flatten() else {
                            break;
                        };
                        if next_partner <= next {
                            break;
                        }
                        let mut end = current_partner - 1;
                        while end > next && partners[end].is_none() {
                            end -= 1;
                        }
                        if next_partner == end {
                            current = next;
                            current_partner = next_partner;
                            continue;
                        }
                        break;
                    }
                    i = current + 1;
                }
                _ => i += 1,
            }
        }
        self.true_helix_count = counter;
    }

    fn assign_label(&mut self, pos5: usize, pos3: usize, label: usize) {
        self.column_labels[pos5] = Some(label);
        self.column_labels[pos3] = Some(label);
        for seq in 0..self.aligned.len() {
            let (Some(s5), Some(s3)) = (self.aln_to_seq[seq][pos5], self.aln_to_seq[seq][pos3])
            else {
                continue;
            };
            if self.seq_structures[seq][s5].is_some() && self.seq_structures[seq][s3].is_some() {
                self.seq_labels[seq][s5] = Some(label);
                self.seq_labels[seq][s3] = Some(label);
            }
        }
    }

    #[inline]
    pub fn num_sequences(&self) -> usize {
        self.aligned.len()
    }

    /// Alignment length in columns.
    #[inline]
    pub fn len(&self) -> usize {
        self.structure.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.structure.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, seq: usize) -> &str {
        &self.names[seq]
    }

    pub fn aligned(&self, seq: usize) -> &[char] {
        &self.aligned[seq]
    }

    pub fn ungapped(&self, seq: usize) -> &[char] {
        &self.ungapped[seq]
    }

    pub fn aligned_strings(&self) -> Vec<String> {
        self.aligned.iter().map(|s| s.iter().collect()).collect()
    }

    pub fn ungapped_strings(&self) -> Vec<String> {
        self.ungapped.iter().map(|s| s.iter().collect()).collect()
    }

    #[inline]
    pub fn base(&self, seq: usize, column: usize) -> char {
        self.aligned[seq][column]
    }

    pub fn column(&self, column: usize) -> impl Iterator<Item = char> + '_ {
        self.aligned.iter().map(move |s| s[column])
    }

    /// Sequence position -> alignment column.
    pub fn seq_to_aln(&self, seq: usize) -> &[usize] {
        &self.seq_to_aln[seq]
    }

    /// Alignment column -> sequence position (`None` at gaps).
    pub fn aln_to_seq(&self, seq: usize) -> &[Option<usize>] {
        &self.aln_to_seq[seq]
    }

    pub fn structure(&self) -> &SecondaryStructure {
        &self.structure
    }

    /// Consensus pairing projected onto the ungapped sequence, in sequence coordinates.
    pub fn seq_structure(&self, seq: usize) -> &[Option<usize>] {
        &self.seq_structures[seq]
    }

    pub fn column_label(&self, column: usize) -> Option<usize> {
        self.column_labels[column]
    }

    pub fn column_labels(&self) -> &[Option<usize>] {
        &self.column_labels
    }

    pub fn seq_label(&self, seq: usize, position: usize) -> Option<usize> {
        self.seq_labels[seq][position]
    }

    /// Number of labelled consensus helices.
    pub fn true_helix_count(&self) -> usize {
        self.true_helix_count
    }

    #[inline]
    pub fn is_consensus_pair(&self, pos5: usize, pos3: usize) -> bool {
        self.structure.partner(pos5) == Some(pos3)
    }

    /// Dot-bracket string marking only the consensus pairs of one labelled helix.
    pub fn true_helix_dot_bracket(&self, label: usize) -> String {
        (0..self.len())
            .map(|column| match (self.column_labels[column], self.structure.partner(column)) {
                (Some(l), Some(partner)) if l == label => {
                    if partner > column {
                        '('
                    } else {
                        ')'
                    }
                }
                _ => '.',
            })
            .collect()
    }
}

fn normalize_sequence(name: &str, sequence: &str) -> Result<Vec<char>, AlignmentError> {
    sequence
        .chars()
        .enumerate()
        .map(|(position, symbol)| {
            let base = nucleotide::normalize(symbol);
            if nucleotide::is_recognized(base) {
                Ok(base)
            } else {
                Err(AlignmentError::UnrecognizedCharacter {
                    name: name.to_string(),
                    symbol,
                    position,
                })
            }
        })
        .collect()
}
