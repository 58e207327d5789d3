//! # Evolution Model Module
//!
//! Continuous-time substitution models for unpaired nucleotides and for base pairs,
//! used by the phylogenetic likelihood evaluator and by the alignment simulator.
//!
//! ## Overview
//!
//! Two time-reversible Markov models are carried side by side:
//!
//! - **Single model** - 4 states (A, U, G, C) for columns evolving independently
//! - **Pair model** - 16 states (`4 * five_prime + three_prime`) for two columns that
//!   evolve as a base pair, with stationary mass concentrated on canonical pairs
//!
//! Each model is decomposed once into eigenvalues and left/right eigenvectors, so the
//! transition matrix for any branch length is `P(t) = V exp(Λt) W`.
//!
//! The built-in parameters can be overridden from a TOML file (see
//! [`model::EvolutionParams`]).

pub mod model;

pub use model::{EvolutionModel, EvolutionParams, ModelError, SubstitutionModel};
