use crate::core::io::traits::TextFormat;
use crate::core::models::nucleotide::stacking_index;
use std::io::{self, BufRead, Write};
use thiserror::Error;

const BASES: usize = 4;
const ENTRIES: usize = BASES * BASES * BASES * BASES;

// Turner 1999 Watson-Crick stacks: 5' dinucleotide, 3'->5' partner, kcal/mol.
const WATSON_CRICK_STACKS: [(&str, &str, f64); 10] = [
    ("AA", "UU", -0.93),
    ("AU", "UA", -1.10),
    ("UA", "AU", -1.33),
    ("CU", "GA", -2.08),
    ("CA", "GU", -2.11),
    ("GU", "CA", -2.24),
    ("GA", "CU", -2.35),
    ("CG", "GC", -2.36),
    ("GG", "CC", -3.26),
    ("GC", "CG", -3.42),
];

#[derive(Debug, Error)]
pub enum StackingError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid energy value '{value}' at entry {index}")]
    InvalidValue { index: usize, value: String },
    #[error("Stacking table has {found} entries, expected {ENTRIES}")]
    WrongCount { found: usize },
}

/// Nearest-neighbour stacking energies `E[a][b][c][d]` for the stack formed by the
/// pairs `a-d` and `b-c`, with bases indexed A=0, C=1, G=2, U=3.
#[derive(Debug, Clone, PartialEq)]
pub struct StackingTable {
    energies: Vec<f64>,
}

#[inline]
fn offset(a: usize, b: usize, c: usize, d: usize) -> usize {
    ((a * BASES + b) * BASES + c) * BASES + d
}

impl StackingTable {
    /// Watson-Crick stacks from the Turner 1999 parameters; every other entry is zero.
    pub fn turner() -> Self {
        let mut energies = vec![0.0; ENTRIES];
        for (five, three, energy) in WATSON_CRICK_STACKS {
            let index = |s: &str, k: usize| s.chars().nth(k).and_then(stacking_index).unwrap_or(0);
            let (i, j) = (index(five, 0), index(five, 1));
            let (l, k) = (index(three, 0), index(three, 1));
            energies[offset(i, j, k, l)] = energy;
            energies[offset(k, l, i, j)] = energy;
        }
        Self { energies }
    }

    #[inline]
    pub fn energy(&self, a: usize, b: usize, c: usize, d: usize) -> f64 {
        self.energies[offset(a, b, c, d)]
    }

    /// Energy of the stack `outer5-outer3` / `inner5-inner3`; zero if any base is not
    /// one of A, C, G, U.
    pub fn stack_energy(&self, outer5: char, inner5: char, inner3: char, outer3: char) -> f64 {
        match (
            stacking_index(outer5),
            stacking_index(inner5),
            stacking_index(inner3),
            stacking_index(outer3),
        ) {
            (Some(a), Some(b), Some(c), Some(d)) => self.energy(a, b, c, d),
            _ => 0.0,
        }
    }
}

impl Default for StackingTable {
    fn default() -> Self {
        Self::turner()
    }
}

/// Whitespace-separated table of 256 energies, iterating `a`, `b`, `d`, `c` from the
/// outermost loop inward.
pub struct StackingFile;

impl TextFormat for StackingFile {
    type Value = StackingTable;
    type Error = StackingError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self::Value, Self::Error> {
        let mut values = Vec::with_capacity(ENTRIES);
        for line in reader.lines() {
            for field in line?.split_whitespace() {
                let value = field.parse::<f64>().map_err(|_| StackingError::InvalidValue {
                    index: values.len(),
                    value: field.to_string(),
                })?;
                values.push(value);
            }
        }
        if values.len() != ENTRIES {
            return Err(StackingError::WrongCount { found: values.len() });
        }

        let mut energies = vec![0.0; ENTRIES];
        let mut values = values.into_iter();
        for a in 0..BASES {
            for b in 0..BASES {
                for d in 0..BASES {
                    for c in 0..BASES {
                        energies[offset(a, b, c, d)] = values.next().unwrap_or(0.0);
                    }
                }
            }
        }
        Ok(StackingTable { energies })
    }

    fn write_to(value: &Self::Value, writer: &mut impl Write) -> Result<(), Self::Error> {
        for a in 0..BASES {
            for b in 0..BASES {
                for d in 0..BASES {
                    let row: Vec<String> = (0..BASES)
                        .map(|c| value.energy(a, b, c, d).to_string())
                        .collect();
                    writeln!(writer, "{}", row.join(" "))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn turner_table_is_symmetric_under_strand_swap() {
        let table = StackingTable::turner();
        // 5'-GC-3' / 3'-CG-5'
        assert_eq!(table.stack_energy('G', 'C', 'G', 'C'), -3.42);
        // 5'-CA-3' / 3'-GU-5' read from the other strand is 5'-UG-3' / 3'-AC-5'
        assert_eq!(table.stack_energy('C', 'A', 'U', 'G'), -2.11);
        assert_eq!(table.stack_energy('U', 'G', 'C', 'A'), -2.11);
    }

    #[test]
    fn non_canonical_and_ambiguous_stacks_are_zero() {
        let table = StackingTable::turner();
        assert_eq!(table.stack_energy('A', 'A', 'A', 'A'), 0.0);
        assert_eq!(table.stack_energy('G', 'N', 'C', 'C'), 0.0);
    }

    #[test]
    fn table_file_reads_back() {
        let table = StackingTable::turner();
        let mut buffer = Vec::new();
        StackingFile::write_to(&table, &mut buffer).unwrap();
        let parsed = StackingFile::read_from(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(parsed, table);
    }

    #[test]
    fn wrong_entry_count_is_rejected() {
        assert!(matches!(
            StackingFile::read_from(&mut Cursor::new("1 2 3\n")),
            Err(StackingError::WrongCount { found: 3 })
        ));
    }

    #[test]
    fn non_numeric_entry_is_rejected() {
        assert!(matches!(
            StackingFile::read_from(&mut Cursor::new("1 x\n")),
            Err(StackingError::InvalidValue { index: 1, .. })
        ));
    }
}
