//! # Workflows Module
//!
//! End-to-end procedures that load nothing themselves but tie the engine tasks into
//! complete analyses of one alignment.
//!
//! ## Overview
//!
//! Each workflow takes fully parsed inputs, an [`AnalysisConfig`](crate::engine::config::AnalysisConfig)
//! where one applies, a progress reporter and a cancellation flag, and returns
//! report rows ready to be written by [`core::io::report`](crate::core::io::report).
//!
//! ## Architecture
//!
//! - **Analysis** ([`analyze`]) - the all-helices table with its Monte Carlo
//!   p-values, the per-true-helix competition table, the sparse base-pair feature
//!   table and consensus coverage.
//! - **Simulation** ([`simulate`]) - evolves sequences down a tree under the single
//!   and pair substitution models for a given consensus structure.
//!
//! ## Key Capabilities
//!
//! - **Phase reporting** through [`Progress`](crate::engine::progress::Progress)
//!   events, so front ends can render progress bars
//! - **Reproducible randomness** from one configured seed
//! - **Cooperative cancellation** between Monte Carlo trials

pub mod analyze;
pub mod simulate;
