use crate::core::io::traits::TextFormat;
use crate::core::models::alignment::{AlignmentError, AlignmentModel};
use crate::core::models::structure::{SecondaryStructure, StructureError};
use std::io::{self, BufRead, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub name: String,
    pub sequence: String,
}

impl SequenceRecord {
    pub fn new(name: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sequence: sequence.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FastaError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Sequence data on line {line} precedes the first '>' header")]
    MissingHeader { line: usize },
    #[error("FASTA input contains no records")]
    Empty,
    #[error("FASTA input has no record left for the sequences after taking the structure")]
    StructureOnly,
    #[error("Invalid structure record: {0}")]
    Structure(#[from] StructureError),
    #[error("Invalid alignment: {0}")]
    Alignment(#[from] AlignmentError),
}

/// Plain FASTA: `>name` headers followed by one or more sequence lines.
///
/// Lines are trimmed and blank lines are skipped. Record text is kept verbatim so the
/// same reader serves both nucleotide records and a trailing dot-bracket record.
pub struct FastaFile;

impl TextFormat for FastaFile {
    type Value = Vec<SequenceRecord>;
    type Error = FastaError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self::Value, Self::Error> {
        let mut records: Vec<SequenceRecord> = Vec::new();
        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(name) = line.strip_prefix('>') {
                records.push(SequenceRecord::new(name.trim(), String::new()));
            } else {
                let current = records
                    .last_mut()
                    .ok_or(FastaError::MissingHeader { line: line_num + 1 })?;
                current.sequence.push_str(line);
            }
        }
        if records.is_empty() {
            return Err(FastaError::Empty);
        }
        Ok(records)
    }

    fn write_to(value: &Self::Value, writer: &mut impl Write) -> Result<(), Self::Error> {
        for record in value {
            writeln!(writer, ">{}", record.name)?;
            writeln!(writer, "{}", record.sequence)?;
        }
        Ok(())
    }
}

/// Builds an alignment from FASTA records.
///
/// With `includes_structure` the last record is taken as the dot-bracket consensus
/// structure; otherwise the alignment carries `structure` (or none).
pub fn alignment_from_records(
    mut records: Vec<SequenceRecord>,
    includes_structure: bool,
    structure: Option<SecondaryStructure>,
) -> Result<AlignmentModel, FastaError> {
    let structure = if includes_structure {
        let record = records.pop().ok_or(FastaError::Empty)?;
        if records.is_empty() {
            return Err(FastaError::StructureOnly);
        }
        Some(SecondaryStructure::from_dot_bracket(&record.sequence)?)
    } else {
        structure
    };
    let (names, sequences) = records.into_iter().map(|r| (r.name, r.sequence)).unzip();
    Ok(AlignmentModel::new(names, sequences, structure)?)
}

pub fn read_alignment(
    path: &Path,
    includes_structure: bool,
    structure: Option<SecondaryStructure>,
) -> Result<AlignmentModel, FastaError> {
    let records = FastaFile::read_from_path(path)?;
    alignment_from_records(records, includes_structure, structure)
}

/// Records for every sequence, gapped or with gaps removed.
pub fn records_from_alignment(alignment: &AlignmentModel, aligned: bool) -> Vec<SequenceRecord> {
    (0..alignment.num_sequences())
        .map(|seq| {
            let sequence: String = if aligned {
                alignment.aligned(seq).iter().collect()
            } else {
                alignment.ungapped(seq).iter().collect()
            };
            SequenceRecord::new(alignment.name(seq), sequence)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn multi_line_records_are_concatenated() {
        let input = ">s1\nGGG\n  AAA \n\n>s2\nCCCUUU\n";
        let records = FastaFile::read_from(&mut Cursor::new(input)).unwrap();
        assert_eq!(
            records,
            vec![SequenceRecord::new("s1", "GGGAAA"), SequenceRecord::new("s2", "CCCUUU")]
        );
    }

    #[test]
    fn sequence_before_header_is_rejected() {
        let input = "ACGU\n>s1\nACGU\n";
        assert!(matches!(
            FastaFile::read_from(&mut Cursor::new(input)),
            Err(FastaError::MissingHeader { line: 1 })
        ));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            FastaFile::read_from(&mut Cursor::new("\n\n")),
            Err(FastaError::Empty)
        ));
    }

    #[test]
    fn last_record_is_taken_as_structure() {
        let input = ">a\nggggaaaacccc\n>b\nGGGGAAAACCCC\n>structure\n((((....))))\n";
        let records = FastaFile::read_from(&mut Cursor::new(input)).unwrap();
        let alignment = alignment_from_records(records, true, None).unwrap();
        assert_eq!(alignment.num_sequences(), 2);
        assert_eq!(alignment.structure().partner(0), Some(11));
        assert_eq!(alignment.aligned(0)[0], 'G');
    }

    #[test]
    fn structure_length_mismatch_is_reported() {
        let input = ">a\nGGGGAAAACCCC\n>structure\n((((....)))).\n";
        let records = FastaFile::read_from(&mut Cursor::new(input)).unwrap();
        assert!(matches!(
            alignment_from_records(records, true, None),
            Err(FastaError::Alignment(AlignmentError::StructureLength { .. }))
        ));
    }

    #[test]
    fn write_and_read_back_through_a_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.fasta");
        let alignment = AlignmentModel::new(
            vec!["x".into(), "y".into()],
            vec!["AC-GU".into(), "ACCGU".into()],
            None,
        )
        .unwrap();
        FastaFile::write_to_path(&records_from_alignment(&alignment, false), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, ">x\nACGU\n>y\nACCGU\n");
    }

    #[test]
    fn aligned_records_keep_their_gaps() {
        let alignment = AlignmentModel::new(
            vec!["x".into(), "y".into()],
            vec!["AC-GU".into(), "ACCGU".into()],
            None,
        )
        .unwrap();
        let records = records_from_alignment(&alignment, true);
        assert_eq!(
            records,
            vec![SequenceRecord::new("x", "AC-GU"), SequenceRecord::new("y", "ACCGU")]
        );
    }
}
