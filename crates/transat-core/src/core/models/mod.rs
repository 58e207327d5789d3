//! # Core Models Module
//!
//! This module contains the fundamental data structures used to represent annotated RNA
//! alignments, helices and phylogenies in Transat.
//!
//! ## Overview
//!
//! The models describe an alignment together with its consensus ("true") secondary
//! structure, the helices that can be formed by individual sequences, and the tree that
//! relates the sequences. These models are designed to:
//!
//! - **Be immutable once built** - An alignment derives every coordinate map, projected
//!   structure and helix label at construction; a changed alignment is a new value
//! - **Be index-addressed** - Sequences, positions and tree nodes are addressed by plain
//!   indices or arena keys rather than owning pointers
//! - **Validate early** - Malformed structures, characters and trees are rejected with
//!   typed errors when the model is constructed
//!
//! ## Key Components
//!
//! - [`nucleotide`] - IUPAC interpretation, canonical pairing and state encodings
//! - [`structure`] - Dot-bracket pairing vectors with pseudoknot levels
//! - [`alignment`] - The annotated multiple sequence alignment
//! - [`helix`] - Sequence helices, aligned helices and competing helices
//! - [`stats`] - Directional competition scores
//! - [`tree`] - Arena-backed binary phylogeny
//!
//! ## Usage
//!
//! ```ignore
//! use transat::core::models::{alignment::AlignmentModel, structure::SecondaryStructure};
//!
//! let structure = SecondaryStructure::from_dot_bracket("(((((.....)))))")?;
//! let alignment = AlignmentModel::new(
//!     vec!["seq1".into()],
//!     vec!["GGGGGAAAAACCCCC".into()],
//!     Some(structure),
//! )?;
//! assert_eq!(alignment.true_helix_count(), 1);
//! ```

pub mod alignment;
pub mod helix;
pub mod nucleotide;
pub mod stats;
pub mod structure;
pub mod tree;
