use std::path::PathBuf;
use thiserror::Error;
use transat::core::io::report::ReportError;
use transat::core::models::alignment::AlignmentError;
use transat::core::models::tree::TreeError;
use transat::engine::error::EngineError;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    TransatCore(EngineError),

    /// The tree, alignment and consensus structure were each readable but do not
    /// describe the same sequences or columns.
    #[error("Inputs do not match each other: {0}")]
    InputMismatch(String),

    #[error("External program '{tool}' failed: {reason} (check its path in the configuration)")]
    ExternalTool { tool: String, reason: String },

    #[error("Interrupted before the analysis completed")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to write report: {0}")]
    Report(#[from] ReportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Tree(
                e @ (TreeError::LeafNotInAlignment(_)
                | TreeError::SequenceNotInTree(_)
                | TreeError::DuplicateLeaf(_)),
            ) => CliError::InputMismatch(e.to_string()),
            EngineError::Alignment(e @ AlignmentError::StructureLength { .. }) => {
                CliError::InputMismatch(e.to_string())
            }
            EngineError::ExternalTool { tool, reason } => CliError::ExternalTool { tool, reason },
            EngineError::Cancelled => CliError::Cancelled,
            other => CliError::TransatCore(other),
        }
    }
}
