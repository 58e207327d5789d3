use crate::core::io::traits::TextFormat;
use crate::core::models::structure::{SecondaryStructure, StructureError};
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CtError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("Invalid structure: {0}")]
    Structure(#[from] StructureError),
}

/// Connect-table structure files.
///
/// The first line is a header. Every further non-blank line describes one position;
/// its fifth column is the 1-based partner, with 0 meaning unpaired.
pub struct CtFile;

const PARTNER_COLUMN: usize = 4;

impl TextFormat for CtFile {
    type Value = SecondaryStructure;
    type Error = CtError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self::Value, Self::Error> {
        let mut partners = Vec::new();
        for (line_num, line_res) in reader.lines().enumerate().skip(1) {
            let line = line_res?;
            let line_num = line_num + 1;
            if line.trim().is_empty() {
                continue;
            }
            let field = line
                .split_whitespace()
                .nth(PARTNER_COLUMN)
                .ok_or_else(|| CtError::Parse {
                    line: line_num,
                    reason: "fewer than five columns".into(),
                })?;
            let partner: usize = field.parse().map_err(|_| CtError::Parse {
                line: line_num,
                reason: format!("invalid partner index '{field}'"),
            })?;
            partners.push(partner.checked_sub(1));
        }
        Ok(SecondaryStructure::from_partners(partners)?)
    }

    fn write_to(value: &Self::Value, writer: &mut impl Write) -> Result<(), Self::Error> {
        let length = value.len();
        writeln!(writer, "{length}\tstructure")?;
        for position in 0..length {
            let partner = value.partner(position).map_or(0, |p| p + 1);
            writeln!(
                writer,
                "{}\tN\t{}\t{}\t{}\t{}",
                position + 1,
                position,
                position + 2,
                partner,
                position + 1
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HAIRPIN: &str = "8 hairpin\n\
        1 G 0 2 8 1\n\
        2 G 1 3 7 2\n\
        3 A 2 4 0 3\n\
        \n\
        4 A 3 5 0 4\n\
        5 A 4 6 0 5\n\
        6 A 5 7 0 6\n\
        7 C 6 8 2 7\n\
        8 C 7 9 1 8\n";

    #[test]
    fn partners_are_read_from_fifth_column() {
        let structure = CtFile::read_from(&mut Cursor::new(HAIRPIN)).unwrap();
        assert_eq!(structure.len(), 8);
        assert_eq!(structure.partner(0), Some(7));
        assert_eq!(structure.partner(1), Some(6));
        assert_eq!(structure.partner(3), None);
        assert_eq!(structure.to_dot_bracket().unwrap(), "((....))");
    }

    #[test]
    fn short_line_is_a_parse_error() {
        let input = "2 x\n1 G 0 2\n";
        assert!(matches!(
            CtFile::read_from(&mut Cursor::new(input)),
            Err(CtError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn asymmetric_pairing_is_rejected() {
        let input = "5 x\n1 G 0 2 5 1\n2 A 1 3 0 2\n3 A 2 4 0 3\n4 A 3 5 0 4\n5 C 4 6 0 5\n";
        assert!(matches!(
            CtFile::read_from(&mut Cursor::new(input)),
            Err(CtError::Structure(StructureError::Asymmetric { .. }))
        ));
    }

    #[test]
    fn written_table_reads_back() {
        let structure = SecondaryStructure::from_dot_bracket("((....))").unwrap();
        let mut buffer = Vec::new();
        CtFile::write_to(&structure, &mut buffer).unwrap();
        let parsed = CtFile::read_from(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(parsed.partners(), structure.partners());
    }
}
