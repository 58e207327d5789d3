//! Provides input/output functionality for the text formats Transat reads and writes.
//!
//! Every format implements the [`traits::TextFormat`] trait, which pairs a reader and a
//! writer with path-based helpers. Alignments arrive as FASTA (optionally carrying the
//! consensus structure as the last record) with structures optionally supplied as
//! connect tables; trees arrive as Newick. ClustalW is only used to hand column
//! subsets to external shufflers. Result tables are written through [`report`].

pub mod clustal;
pub mod ct;
pub mod fasta;
pub mod newick;
pub mod report;
pub mod stacking;
pub mod traits;
