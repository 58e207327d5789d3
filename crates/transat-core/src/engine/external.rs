//! Adapters for the external programs Transat can delegate to.
//!
//! Every invocation follows the same contract: inputs are written to fresh files in
//! a private temporary directory, the program runs synchronously, and its FASTA or
//! ClustalW output is parsed and checked against the block that was sent. Any
//! failure surfaces as [`EngineError::ExternalTool`].

use super::error::EngineError;
use crate::core::io::clustal::ClustalFile;
use crate::core::io::fasta::{FastaFile, SequenceRecord};
use crate::core::io::traits::TextFormat;
use crate::core::models::tree::PhyloTree;
use std::ffi::OsStr;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::debug;

fn tool_error(tool: &str, reason: impl ToString) -> EngineError {
    EngineError::ExternalTool {
        tool: tool.to_string(),
        reason: reason.to_string(),
    }
}

fn scratch_dir(tool: &str) -> Result<TempDir, EngineError> {
    tempfile::Builder::new()
        .prefix("transat-")
        .tempdir()
        .map_err(|e| tool_error(tool, format!("cannot create scratch directory: {e}")))
}

fn write_input<F: TextFormat>(tool: &str, value: &F::Value, path: &Path) -> Result<(), EngineError> {
    F::write_to_path(value, path).map_err(|e| tool_error(tool, format!("cannot write input: {e}")))
}

/// Runs `program` to completion and returns its standard output.
fn run<I, S>(tool: &str, program: &Path, args: I) -> Result<String, EngineError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command.args(args);
    debug!(?command, "Invoking external tool.");
    let output = command
        .output()
        .map_err(|e| tool_error(tool, format!("cannot start '{}': {e}", program.display())))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(tool_error(
            tool,
            format!("exited with {}: {}", output.status, stderr.trim()),
        ));
    }
    String::from_utf8(output.stdout).map_err(|e| tool_error(tool, format!("non-UTF-8 output: {e}")))
}

fn check_names(tool: &str, sent: &[SequenceRecord], received: &[SequenceRecord]) -> Result<(), EngineError> {
    if sent.len() != received.len() {
        return Err(tool_error(
            tool,
            format!("returned {} sequences, expected {}", received.len(), sent.len()),
        ));
    }
    for (expected, found) in sent.iter().zip(received) {
        if expected.name != found.name {
            return Err(tool_error(
                tool,
                format!("returned sequence '{}' where '{}' was expected", found.name, expected.name),
            ));
        }
    }
    Ok(())
}

fn check_equal_lengths(tool: &str, records: &[SequenceRecord]) -> Result<usize, EngineError> {
    let length = records.first().map_or(0, |r| r.sequence.chars().count());
    if records.iter().any(|r| r.sequence.chars().count() != length) {
        return Err(tool_error(tool, "returned sequences of unequal length"));
    }
    Ok(length)
}

fn ungapped(sequence: &str) -> String {
    sequence
        .chars()
        .filter(|&c| c != '-' && c != '.')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Progressive multiple alignment of ungapped sequences along a guide tree.
#[derive(Debug, Clone)]
pub struct TCoffee {
    program: PathBuf,
}

impl TCoffee {
    pub const TOOL: &'static str = "t_coffee";

    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    /// Realigns `records` (gaps are removed first), returning them in input order.
    pub fn align(&self, records: &[SequenceRecord], tree: &PhyloTree) -> Result<Vec<SequenceRecord>, EngineError> {
        let dir = scratch_dir(Self::TOOL)?;
        let input = dir.path().join("input.fasta");
        let tree_path = dir.path().join("guide.dnd");
        let output = dir.path().join("output.fasta");

        let plain: Vec<SequenceRecord> = records
            .iter()
            .map(|r| SequenceRecord::new(r.name.clone(), ungapped(&r.sequence)))
            .collect();
        write_input::<FastaFile>(Self::TOOL, &plain, &input)?;
        std::fs::write(&tree_path, format!("{}\n", tree.newick_string()))
            .map_err(|e| tool_error(Self::TOOL, format!("cannot write guide tree: {e}")))?;

        run(
            Self::TOOL,
            &self.program,
            [
                input.as_os_str(),
                OsStr::new("-outfile"),
                output.as_os_str(),
                OsStr::new("-usetree"),
                tree_path.as_os_str(),
                OsStr::new("-output"),
                OsStr::new("fasta"),
                OsStr::new("-n_core"),
                OsStr::new("1"),
                OsStr::new("-outorder"),
                OsStr::new("input"),
                OsStr::new("-quiet"),
            ],
        )?;

        let aligned = FastaFile::read_from_path(&output)
            .map_err(|e| tool_error(Self::TOOL, format!("unreadable output: {e}")))?;
        check_names(Self::TOOL, records, &aligned)?;
        check_equal_lengths(Self::TOOL, &aligned)?;
        Ok(aligned)
    }
}

/// Java realigner for the gapped intervals between held-fixed columns.
#[derive(Debug, Clone)]
pub struct JavaRealigner {
    java: PathBuf,
    classpath: String,
    newick: String,
}

impl JavaRealigner {
    pub const TOOL: &'static str = "Realigner";
    const MAIN_CLASS: &'static str = "Realigner";

    pub fn new(java: PathBuf, classpath: String, tree: &PhyloTree) -> Self {
        Self {
            java,
            classpath,
            newick: tree.newick_string(),
        }
    }

    /// Realigns one interval block; the result has the same names in order, equal
    /// row lengths and unchanged ungapped content.
    pub fn realign(&self, block: &[SequenceRecord]) -> Result<Vec<SequenceRecord>, EngineError> {
        let dir = scratch_dir(Self::TOOL)?;
        let input = dir.path().join("interval.fasta");
        let tree_path = dir.path().join("tree.newick");
        write_input::<FastaFile>(Self::TOOL, &block.to_vec(), &input)?;
        std::fs::write(&tree_path, format!("{}\n", self.newick))
            .map_err(|e| tool_error(Self::TOOL, format!("cannot write tree: {e}")))?;

        let stdout = run(
            Self::TOOL,
            &self.java,
            [
                OsStr::new("-cp"),
                OsStr::new(&self.classpath),
                OsStr::new(Self::MAIN_CLASS),
                input.as_os_str(),
                tree_path.as_os_str(),
            ],
        )?;
        let realigned = FastaFile::read_from(&mut Cursor::new(stdout))
            .map_err(|e| tool_error(Self::TOOL, format!("unreadable output: {e}")))?;
        check_names(Self::TOOL, block, &realigned)?;
        check_equal_lengths(Self::TOOL, &realigned)?;
        for (sent, received) in block.iter().zip(&realigned) {
            if ungapped(&sent.sequence) != ungapped(&received.sequence) {
                return Err(tool_error(
                    Self::TOOL,
                    format!("changed the residues of sequence '{}'", sent.name),
                ));
            }
        }
        Ok(realigned)
    }
}

/// Dinucleotide-preserving column shuffler reading and writing ClustalW.
#[derive(Debug, Clone)]
pub struct RnazShuffler {
    program: PathBuf,
}

impl RnazShuffler {
    pub const TOOL: &'static str = "rnazRandomizeAln.pl";

    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    pub fn shuffle_block(&self, block: &[SequenceRecord]) -> Result<Vec<SequenceRecord>, EngineError> {
        let dir = scratch_dir(Self::TOOL)?;
        let input = dir.path().join("block.aln");
        write_input::<ClustalFile>(Self::TOOL, &block.to_vec(), &input)?;

        let stdout = run(
            Self::TOOL,
            &self.program,
            [OsStr::new("-l"), OsStr::new("1"), input.as_os_str()],
        )?;
        let shuffled = ClustalFile::read_from(&mut Cursor::new(stdout))
            .map_err(|e| tool_error(Self::TOOL, format!("unreadable output: {e}")))?;
        check_names(Self::TOOL, block, &shuffled)?;
        let expected = block.first().map_or(0, |r| r.sequence.chars().count());
        if check_equal_lengths(Self::TOOL, &shuffled)? != expected {
            return Err(tool_error(Self::TOOL, "changed the alignment length"));
        }
        Ok(shuffled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<SequenceRecord> {
        vec![SequenceRecord::new("a", "AC-GU"), SequenceRecord::new("b", "ACCGU")]
    }

    #[test]
    fn missing_program_is_an_external_tool_error() {
        let shuffler = RnazShuffler::new(PathBuf::from("/nonexistent/transat-shuffler"));
        assert!(matches!(
            shuffler.shuffle_block(&records()),
            Err(EngineError::ExternalTool { tool, .. }) if tool == RnazShuffler::TOOL
        ));
    }

    #[test]
    fn renamed_sequences_are_rejected() {
        let received = vec![SequenceRecord::new("a", "ACGU"), SequenceRecord::new("c", "ACCGU")];
        assert!(matches!(
            check_names("test", &records(), &received),
            Err(EngineError::ExternalTool { .. })
        ));
        assert!(check_names("test", &records(), &records()).is_ok());
    }

    #[test]
    fn ragged_output_is_rejected() {
        let ragged = vec![SequenceRecord::new("a", "ACGU"), SequenceRecord::new("b", "ACCGU")];
        assert!(check_equal_lengths("test", &ragged).is_err());
        assert_eq!(check_equal_lengths("test", &records()).unwrap(), 5);
    }

    #[test]
    fn ungapped_ignores_gap_symbols_and_case() {
        assert_eq!(ungapped("a-C.g"), "ACG");
    }

    #[cfg(unix)]
    #[test]
    fn failing_program_reports_exit_status() {
        let result = run("false", Path::new("false"), std::iter::empty::<&str>());
        assert!(matches!(result, Err(EngineError::ExternalTool { .. })));
    }
}
