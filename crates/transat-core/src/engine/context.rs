use super::config::AnalysisConfig;
use super::error::EngineError;
use super::likelihood::PhyloModel;
use super::progress::{CancellationFlag, ProgressReporter};
use crate::core::io::stacking::StackingTable;
use crate::core::models::alignment::AlignmentModel;

/// Read-only inputs shared by every task of one analysis run.
///
/// `alignment` is the observed alignment; tasks that run on randomized copies take
/// the alignment to work on as an explicit argument and use the context for
/// everything else.
#[derive(Clone, Copy)]
pub struct AnalysisContext<'a> {
    pub alignment: &'a AlignmentModel,
    pub phylo: &'a PhyloModel,
    pub stacking: &'a StackingTable,
    pub config: &'a AnalysisConfig,
    pub reporter: &'a ProgressReporter<'a>,
    pub cancel: &'a CancellationFlag,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(
        alignment: &'a AlignmentModel,
        phylo: &'a PhyloModel,
        stacking: &'a StackingTable,
        config: &'a AnalysisConfig,
        reporter: &'a ProgressReporter<'a>,
        cancel: &'a CancellationFlag,
    ) -> Self {
        Self {
            alignment,
            phylo,
            stacking,
            config,
            reporter,
            cancel,
        }
    }

    #[inline]
    pub fn check_cancelled(&self) -> Result<(), EngineError> {
        if self.cancel.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}
