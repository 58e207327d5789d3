//! # Transat Core Library
//!
//! Detection of helices in RNA multiple sequence alignments and estimation of their
//! evolutionary significance, with particular attention to helices that compete with
//! the known consensus structure.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture to keep data, algorithms and
//! end-to-end procedures apart.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`AlignmentModel`,
//!   `PhyloTree`, helices), the substitution models and all file formats.
//!
//! - **[`engine`]: The Logic Core.** Helix detection, the phylogenetic likelihood
//!   evaluator with its memoization, the cis/trans/mid competition statistics, column
//!   shuffling, external tool adapters and the Monte Carlo null distributions.
//!
//! - **[`workflows`]: The Public API.** Complete procedures that tie the engine and
//!   the core together: the all-helices analysis, the per-true-helix competition
//!   analysis, the base-pair feature table, structure coverage and alignment
//!   simulation.

pub mod core;
pub mod engine;
pub mod workflows;
