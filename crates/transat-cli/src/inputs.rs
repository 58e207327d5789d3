use crate::cli::InputArgs;
use crate::error::{CliError, Result};
use std::path::Path;
use tracing::info;
use transat::core::evolution::EvolutionModel;
use transat::core::io::ct::CtFile;
use transat::core::io::fasta::read_alignment;
use transat::core::io::newick::NewickFile;
use transat::core::io::stacking::{StackingFile, StackingTable};
use transat::core::io::traits::TextFormat;
use transat::engine::error::EngineError;
use transat::workflows::analyze::AnalysisInput;

fn parse_error<E>(path: &Path) -> impl FnOnce(E) -> CliError + '_
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    }
}

pub fn load_tree(path: &Path) -> Result<transat::core::models::tree::PhyloTree> {
    info!("Loading tree from {:?}", path);
    NewickFile::read_from_path(path).map_err(parse_error(path))
}

pub fn load_evolution(path: Option<&Path>) -> Result<EvolutionModel> {
    match path {
        Some(path) => {
            info!("Loading evolution model parameters from {:?}", path);
            EvolutionModel::load(path).map_err(parse_error(path))
        }
        None => Ok(EvolutionModel::standard().map_err(EngineError::from)?),
    }
}

fn load_stacking(path: Option<&Path>) -> Result<StackingTable> {
    match path {
        Some(path) => {
            info!("Loading stacking energies from {:?}", path);
            StackingFile::read_from_path(path).map_err(parse_error(path))
        }
        None => Ok(StackingTable::turner()),
    }
}

/// Reads the alignment with its consensus from the FASTA file, a CT file, or neither.
pub fn load_inputs(args: &InputArgs) -> Result<AnalysisInput> {
    info!("Loading alignment from {:?}", &args.fasta);
    let alignment = match (&args.ct, args.no_struct) {
        (Some(ct), _) => {
            let structure = CtFile::read_from_path(ct).map_err(parse_error(ct))?;
            read_alignment(&args.fasta, false, Some(structure))
        }
        (None, true) => read_alignment(&args.fasta, false, None),
        (None, false) => read_alignment(&args.fasta, true, None),
    }
    .map_err(parse_error(&args.fasta))?;
    info!(
        "Alignment has {} sequences over {} columns and {} consensus helices.",
        alignment.num_sequences(),
        alignment.len(),
        alignment.true_helix_count()
    );

    Ok(AnalysisInput {
        alignment,
        tree: load_tree(&args.tree)?,
        evolution: load_evolution(args.model.as_deref())?,
        stacking: load_stacking(args.stacking.as_deref())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn input_args(dir: &Path, fasta: &str, ct: Option<&str>, no_struct: bool) -> InputArgs {
        let fasta_path = dir.join("aln.fa");
        fs::write(&fasta_path, fasta).unwrap();
        let tree_path = dir.join("tree.nwk");
        fs::write(&tree_path, "(s1:0.1,s2:0.1);\n").unwrap();
        let ct = ct.map(|content| {
            let path = dir.join("s.ct");
            fs::write(&path, content).unwrap();
            path
        });
        InputArgs {
            fasta: fasta_path,
            ct,
            no_struct,
            tree: tree_path,
            stacking: None,
            model: None,
            config: None,
            output: None,
        }
    }

    #[test]
    fn structure_record_is_read_from_fasta() {
        let dir = tempdir().unwrap();
        let args = input_args(
            dir.path(),
            ">s1\nGGGGAAAACCCC\n>s2\nGGGGAAAACCCC\n>structure\n((((....))))\n",
            None,
            false,
        );
        let input = load_inputs(&args).unwrap();
        assert_eq!(input.alignment.num_sequences(), 2);
        assert_eq!(input.alignment.true_helix_count(), 1);
        assert_eq!(input.tree.leaf_names(), vec!["s1", "s2"]);
    }

    #[test]
    fn no_struct_reads_every_record_as_a_sequence() {
        let dir = tempdir().unwrap();
        let args = input_args(dir.path(), ">s1\nGGGGAAAACCCC\n>s2\nGGGGAAAACCCC\n", None, true);
        let input = load_inputs(&args).unwrap();
        assert_eq!(input.alignment.num_sequences(), 2);
        assert_eq!(input.alignment.true_helix_count(), 0);
    }

    #[test]
    fn ct_file_supplies_the_structure() {
        let dir = tempdir().unwrap();
        let ct = "8 example\n1 G 0 2 8 1\n2 G 1 3 7 2\n3 A 2 4 0 3\n4 A 3 5 0 4\n5 A 4 6 0 5\n6 A 5 7 0 6\n7 C 6 8 2 7\n8 C 7 9 1 8\n";
        let args = input_args(dir.path(), ">s1\nGGAAAACC\n>s2\nGGAAAACC\n", Some(ct), false);
        let input = load_inputs(&args).unwrap();
        assert_eq!(input.alignment.structure().partner(0), Some(7));
        assert_eq!(input.alignment.structure().partner(1), Some(6));
    }

    #[test]
    fn malformed_fasta_reports_its_path() {
        let dir = tempdir().unwrap();
        let args = input_args(dir.path(), ">s1\nGGGG\n>structure\n((((\n", None, false);
        let result = load_inputs(&args);
        assert!(
            matches!(result, Err(CliError::FileParsing { path, .. }) if path == dir.path().join("aln.fa"))
        );
    }

    #[test]
    fn missing_tree_is_a_parse_error() {
        let result = load_tree(&PathBuf::from("/nonexistent/tree.nwk"));
        assert!(matches!(result, Err(CliError::FileParsing { .. })));
    }
}
