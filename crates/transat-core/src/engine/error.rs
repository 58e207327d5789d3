use thiserror::Error;

use super::config::ConfigError;
use crate::core::evolution::ModelError;
use crate::core::io::clustal::ClustalError;
use crate::core::io::ct::CtError;
use crate::core::io::fasta::FastaError;
use crate::core::io::newick::NewickError;
use crate::core::io::stacking::StackingError;
use crate::core::models::alignment::AlignmentError;
use crate::core::models::structure::StructureError;
use crate::core::models::tree::TreeError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid alignment: {0}")]
    Alignment(#[from] AlignmentError),

    #[error("Invalid structure: {0}")]
    Structure(#[from] StructureError),

    #[error("Invalid tree: {0}")]
    Tree(#[from] TreeError),

    #[error("Evolution model error: {0}")]
    Model(#[from] ModelError),

    #[error("FASTA error: {0}")]
    Fasta(#[from] FastaError),

    #[error("CT error: {0}")]
    Ct(#[from] CtError),

    #[error("Newick error: {0}")]
    Newick(#[from] NewickError),

    #[error("ClustalW error: {0}")]
    Clustal(#[from] ClustalError),

    #[error("Stacking table error: {0}")]
    Stacking(#[from] StackingError),

    #[error("Phase '{phase}' failed: {reason}")]
    PhaseFailed { phase: &'static str, reason: String },

    #[error("External tool '{tool}' failed: {reason}")]
    ExternalTool { tool: String, reason: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Internal logic error: {0}")]
    Internal(String),
}
