//! # Core Module
//!
//! This module provides the fundamental data models, substitution models and file
//! formats used by Transat, serving as the stateless foundation of the library.
//!
//! ## Overview
//!
//! The core module describes *what* is analysed: an RNA multiple sequence alignment
//! annotated with a consensus secondary structure, the phylogeny relating its
//! sequences, and the evolutionary models that assign likelihoods to paired and
//! unpaired columns. None of its types hold analysis state; they are built once and
//! queried by the [`crate::engine`] layer.
//!
//! ## Architecture
//!
//! - **Data Models** ([`models`]) - Alignments, structures, helices, competition scores and trees
//! - **Evolution** ([`evolution`]) - Reversible 4-state and 16-state substitution models
//! - **File I/O** ([`io`]) - FASTA, CT, Newick, ClustalW, stacking tables and result tables
//!
//! ## Key Capabilities
//!
//! - **Validated construction** of alignments, structures and trees with typed errors
//! - **Per-sequence projection** of the consensus structure and helix labels
//! - **Closed-form transition matrices** for any branch length
//! - **Round-trippable text formats** for every input the analyses consume

pub mod evolution;
pub mod io;
pub mod models;
