use crate::core::io::fasta::SequenceRecord;
use crate::core::io::traits::TextFormat;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use thiserror::Error;

const HEADER: &str = "CLUSTAL W";
const NAME_WIDTH: usize = 11;

#[derive(Debug, Error)]
pub enum ClustalError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Missing 'CLUSTAL' header line")]
    MissingHeader,
    #[error("Malformed line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("Clustal alignment contains no sequences")]
    Empty,
    #[error("Sequences have unequal lengths in Clustal alignment")]
    RaggedAlignment,
    #[error("Expected {expected} sequences of {columns} columns, found {found}")]
    ShapeMismatch {
        expected: usize,
        columns: usize,
        found: usize,
    },
}

/// Single-block ClustalW alignments, as consumed by external column shufflers.
pub struct ClustalFile;

impl TextFormat for ClustalFile {
    type Value = Vec<SequenceRecord>;
    type Error = ClustalError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self::Value, Self::Error> {
        let mut order: Vec<String> = Vec::new();
        let mut sequences: HashMap<String, String> = HashMap::new();
        let mut seen_header = false;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            if line.trim().is_empty() {
                continue;
            }
            if !seen_header {
                if !line.starts_with("CLUSTAL") {
                    return Err(ClustalError::MissingHeader);
                }
                seen_header = true;
                continue;
            }
            // Conservation lines are indented.
            if line.starts_with(char::is_whitespace) {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            let chunk = match fields.as_slice() {
                [_, chunk] => *chunk,
                [_, chunk, count] if count.chars().all(|c| c.is_ascii_digit()) => *chunk,
                _ => {
                    return Err(ClustalError::Parse {
                        line: line_num + 1,
                        reason: "expected a name and a sequence block".into(),
                    });
                }
            };
            let name = fields[0].to_string();
            if !sequences.contains_key(&name) {
                order.push(name.clone());
            }
            sequences.entry(name).or_default().push_str(chunk);
        }

        if !seen_header {
            return Err(ClustalError::MissingHeader);
        }
        if order.is_empty() {
            return Err(ClustalError::Empty);
        }
        let records: Vec<SequenceRecord> = order
            .into_iter()
            .map(|name| {
                let sequence = sequences.remove(&name).unwrap_or_default();
                SequenceRecord { name, sequence }
            })
            .collect();
        let length = records[0].sequence.chars().count();
        if records.iter().any(|r| r.sequence.chars().count() != length) {
            return Err(ClustalError::RaggedAlignment);
        }
        Ok(records)
    }

    fn write_to(value: &Self::Value, writer: &mut impl Write) -> Result<(), Self::Error> {
        writeln!(writer, "{HEADER}\n")?;
        let width = value
            .iter()
            .map(|r| r.name.len() + 1)
            .max()
            .unwrap_or(0)
            .max(NAME_WIDTH);
        for record in value {
            writeln!(writer, "{:<width$}{}", record.name, record.sequence)?;
        }
        writeln!(writer, "{:width$}{}", "", conservation_line(value))?;
        Ok(())
    }
}

/// `*` under every column where all sequences carry the same character.
fn conservation_line(records: &[SequenceRecord]) -> String {
    let rows: Vec<Vec<char>> = records.iter().map(|r| r.sequence.chars().collect()).collect();
    let length = rows.first().map_or(0, Vec::len);
    (0..length)
        .map(|column| {
            let first = rows[0].get(column);
            if rows.iter().all(|row| row.get(column) == first) {
                '*'
            } else {
                ' '
            }
        })
        .collect()
}

/// Records restricted to `columns`, named by their sequence index.
pub fn project_columns(aligned: &[Vec<char>], columns: &[usize]) -> Vec<SequenceRecord> {
    aligned
        .iter()
        .enumerate()
        .map(|(seq, row)| SequenceRecord {
            name: seq.to_string(),
            sequence: columns.iter().map(|&c| row[c]).collect(),
        })
        .collect()
}

/// Writes the characters of `records` back into `columns` of `aligned`, in order.
pub fn scatter_columns(
    aligned: &mut [Vec<char>],
    columns: &[usize],
    records: &[SequenceRecord],
) -> Result<(), ClustalError> {
    let expected = aligned.len();
    let shape_error = || ClustalError::ShapeMismatch {
        expected,
        columns: columns.len(),
        found: records.len(),
    };
    if records.len() != aligned.len() {
        return Err(shape_error());
    }
    for (row, record) in aligned.iter_mut().zip(records) {
        let chars: Vec<char> = record.sequence.chars().collect();
        if chars.len() != columns.len() {
            return Err(shape_error());
        }
        for (&column, &c) in columns.iter().zip(&chars) {
            row[column] = c;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn records() -> Vec<SequenceRecord> {
        vec![
            SequenceRecord::new("0", "ACGU-A"),
            SequenceRecord::new("1", "ACGUUA"),
        ]
    }

    #[test]
    fn writer_emits_header_rows_and_conservation() {
        let mut buffer = Vec::new();
        ClustalFile::write_to(&records(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "CLUSTAL W");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "0          ACGU-A");
        assert_eq!(lines[3], "1          ACGUUA");
        assert_eq!(lines[4], "           **** *");
    }

    #[test]
    fn written_alignment_reads_back() {
        let mut buffer = Vec::new();
        ClustalFile::write_to(&records(), &mut buffer).unwrap();
        let parsed = ClustalFile::read_from(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(parsed, records());
    }

    #[test]
    fn interleaved_blocks_are_concatenated_by_name() {
        let input = "CLUSTAL W (1.83) multiple sequence alignment\n\n\
            a   ACG 3\n\
            b   AC- 2\n\
            \x20   ** \n\n\
            a   UU\n\
            b   UA\n";
        let parsed = ClustalFile::read_from(&mut Cursor::new(input)).unwrap();
        assert_eq!(
            parsed,
            vec![SequenceRecord::new("a", "ACGUU"), SequenceRecord::new("b", "AC-UA")]
        );
    }

    #[test]
    fn missing_header_is_rejected() {
        assert!(matches!(
            ClustalFile::read_from(&mut Cursor::new("a ACGU\n")),
            Err(ClustalError::MissingHeader)
        ));
    }

    #[test]
    fn ragged_alignment_is_rejected() {
        let input = "CLUSTAL W\n\na ACGU\nb ACG\n";
        assert!(matches!(
            ClustalFile::read_from(&mut Cursor::new(input)),
            Err(ClustalError::RaggedAlignment)
        ));
    }

    #[test]
    fn columns_are_projected_and_scattered_back() {
        let mut aligned = vec![
            "GGAACC".chars().collect::<Vec<_>>(),
            "GGUUCC".chars().collect::<Vec<_>>(),
        ];
        let columns = [2, 3];
        let projected = project_columns(&aligned, &columns);
        assert_eq!(projected[1].sequence, "UU");

        let swapped = vec![SequenceRecord::new("0", "UU"), SequenceRecord::new("1", "AA")];
        scatter_columns(&mut aligned, &columns, &swapped).unwrap();
        assert_eq!(aligned[0].iter().collect::<String>(), "GGUUCC");
        assert_eq!(aligned[1].iter().collect::<String>(), "GGAACC");

        let short = vec![SequenceRecord::new("0", "U"), SequenceRecord::new("1", "A")];
        assert!(matches!(
            scatter_columns(&mut aligned, &columns, &short),
            Err(ClustalError::ShapeMismatch { expected: 2, columns: 2, found: 2 })
        ));
    }

    #[test]
    fn missing_records_report_the_expected_row_count() {
        let mut aligned = vec!["GGAACC".chars().collect::<Vec<_>>(); 3];
        let one = vec![SequenceRecord::new("0", "UU")];
        assert!(matches!(
            scatter_columns(&mut aligned, &[2, 3], &one),
            Err(ClustalError::ShapeMismatch { expected: 3, columns: 2, found: 1 })
        ));
        assert_eq!(aligned[0].iter().collect::<String>(), "GGAACC");
    }
}
